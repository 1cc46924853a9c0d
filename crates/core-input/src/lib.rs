//! core-input: the user-side input orchestrator.
//!
//! Sits between the hosting program's tool dispatch and the privileged
//! helper. For every call it resolves the mirrored window's geometry, maps
//! window-relative points to absolute screen coordinates (failing fast on
//! anything outside the window), consults the fail-closed permission policy,
//! and brokers one newline-delimited JSON request to the helper socket with
//! exactly one transparent reconnect-and-retry on transport failure.
//!
//! The window bridge, screen capture, and screen describer are external
//! capabilities; this crate defines only the traits it consumes or exposes.

pub mod bridge;
pub mod client;
pub mod orchestrator;

pub use bridge::{MirroringState, ScreenCapture, ScreenDescriber, WindowBridge, WindowGeometry};
pub use client::HelperClient;
pub use orchestrator::{Orchestrator, TypeOutcome};

use thiserror::Error;

/// Failures surfaced to the hosting program, separated by kind so it can
/// present appropriate feedback.
#[derive(Debug, Error)]
pub enum InputError {
    /// Transport: the helper socket could not be (re)used even after the
    /// one-shot retry.
    #[error("helper not available")]
    HelperUnavailable,
    /// The mirroring window could not be resolved.
    #[error("mirroring window not available")]
    WindowUnavailable,
    /// Window-relative coordinates outside `[0, size)`.
    #[error("coordinates out of window bounds: ({x}, {y})")]
    OutOfBounds { x: f64, y: f64 },
    /// The policy hides or denies the capability.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// `launch_app` target is on the blocked list.
    #[error("application blocked: {0}")]
    AppBlocked(String),
    /// The helper answered `ok: false`.
    #[error("helper error: {0}")]
    Helper(String),
    /// The helper answered with something that is not a response line.
    #[error("protocol error: {0}")]
    Protocol(#[from] core_proto::ProtoError),
    /// Window activation failed.
    #[error("window activation failed: {0}")]
    Activation(String),
}
