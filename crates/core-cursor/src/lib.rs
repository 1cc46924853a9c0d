//! core-cursor: cursor synchronization and pointer gestures.
//!
//! The virtual pointing device reports relative movement and the service
//! tracks its own idea of where the pointer is, independent of the system
//! cursor. Warping the cursor does not emit an HID event, so after a warp
//! the two disagree. The sync engine reconciles them around every pointer
//! action: save, dissociate the physical mouse, warp, nudge (+1/−1 with no
//! net movement), act, restore, re-associate.
//!
//! The OS cursor primitives sit behind [`CursorControl`] and report posting
//! behind [`PointingSink`], so the whole engine runs against in-memory
//! recorders in tests. The Quartz implementation is macOS-only.

pub mod engine;
#[cfg(target_os = "macos")]
pub mod quartz;

pub use engine::SyncEngine;
#[cfg(target_os = "macos")]
pub use quartz::QuartzCursor;

use anyhow::Result;
use core_hid::PointingReport;

/// System cursor primitives.
pub trait CursorControl {
    /// Current cursor position in global display points.
    fn position(&self) -> Result<(f64, f64)>;
    /// Move the cursor without generating an HID event.
    fn warp(&self, x: f64, y: f64) -> Result<()>;
    /// Couple or decouple physical mouse movement from the cursor.
    fn set_associated(&self, associated: bool) -> Result<()>;
}

/// Destination for pointing reports.
pub trait PointingSink {
    fn post(&self, report: &PointingReport) -> Result<()>;
}

/// Stand-in for platforms without a cursor backend; every call fails with a
/// clear message so the daemon can still start (and report readiness) there.
#[cfg(not(target_os = "macos"))]
pub struct UnsupportedCursor;

#[cfg(not(target_os = "macos"))]
impl CursorControl for UnsupportedCursor {
    fn position(&self) -> Result<(f64, f64)> {
        anyhow::bail!("cursor control requires macOS")
    }
    fn warp(&self, _x: f64, _y: f64) -> Result<()> {
        anyhow::bail!("cursor control requires macOS")
    }
    fn set_associated(&self, _associated: bool) -> Result<()> {
        anyhow::bail!("cursor control requires macOS")
    }
}
