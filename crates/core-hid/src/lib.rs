//! core-hid: HID report shapes and keyboard translation tables.
//!
//! Everything in this crate is pure data manipulation: packed report records
//! with field-wise little-endian serialization, the USB usage-code catalogue,
//! the US-QWERTY character map, per-layout substitution tables, and the
//! chunker that turns a string into a sequence of keyboard emissions.
//!
//! The consuming virtual-device service reads raw bytes at fixed offsets, so
//! every record serializes through an explicit `to_bytes` rather than relying
//! on in-memory struct layout. Nothing here touches a socket or the OS; the
//! one platform-specific piece (the Carbon layout resolver) lives behind the
//! `LayoutResolver` trait and compiles only on macOS.

pub mod charmap;
pub mod chunk;
pub mod layout;
pub mod report;
pub mod usage;

pub use charmap::{CharMap, CharStrokes, KeyStroke, modifier_named, named_key};
pub use chunk::{Emission, Segment, chunk_text, segment_text};
pub use layout::{LayoutResolver, build_substitution};
pub use report::{
    Buttons, KEYBOARD_REPORT_LEN, KEYBOARD_SLOTS, KeyboardParameters, KeyboardReport, Modifiers,
    POINTING_REPORT_LEN, PointingReport,
};
