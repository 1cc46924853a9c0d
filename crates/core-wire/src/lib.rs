//! core-wire: client for the virtual-HID device service.
//!
//! The service (the Karabiner DriverKit virtual-HID daemon) listens on a
//! datagram socket under a root-only directory and owns a synthetic keyboard
//! and pointing device. This crate speaks its binary protocol: a heartbeat
//! frame keeping the client registered, and versioned user-data frames
//! carrying device-control requests and packed input reports. The client
//! owns one connection, a heartbeat timer thread, a liveness timer thread
//! watching the server socket path, and a reader thread applying the
//! service's acknowledgments to the readiness flags.

pub mod client;
pub mod frame;

pub use client::{ClientOptions, ConnectionState, HidClient};
pub use frame::{HEARTBEAT_DEADLINE_MS, PROTOCOL_VERSION, Request, ServiceResponse};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("no virtual-HID service socket under {0}")]
    ServiceNotFound(String),
    #[error("virtual-HID service disconnected")]
    Disconnected,
    #[error("keyboard not ready")]
    KeyboardNotReady,
    #[error("pointing not ready")]
    PointingNotReady,
    #[error("virtual-HID send failed: {0}")]
    Send(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
