//! External capability interfaces.
//!
//! The Accessibility bridge that finds the mirroring window, the screenshot
//! utility, and the vision describer are all implemented by the hosting
//! program; the orchestrator only consumes these contracts. Test doubles
//! implement them in-memory.

use anyhow::Result;

/// Placement of the mirrored-content window in global display points,
/// origin at the window's top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl WindowGeometry {
    /// Absolute coordinates for a window-relative point, or `None` when the
    /// point is non-finite or outside `[0, size)`.
    pub fn to_absolute(&self, wx: f64, wy: f64) -> Option<(f64, f64)> {
        let inside = wx.is_finite()
            && wy.is_finite()
            && wx >= 0.0
            && wy >= 0.0
            && wx < self.width
            && wy < self.height;
        inside.then(|| (self.origin_x + wx, self.origin_y + wy))
    }
}

/// Mirroring session state as the window bridge reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirroringState {
    Connected,
    Paused,
    Disconnected,
}

/// The Accessibility-based window bridge.
pub trait WindowBridge {
    /// Current geometry of the mirrored content, or `None` when the window
    /// cannot be found.
    fn window_geometry(&self) -> Option<WindowGeometry>;
    /// Bring the mirroring window to the front; no-op when it already is.
    fn ensure_frontmost(&self) -> Result<()>;
    /// Invoke a menu-bar item; `Ok(false)` when the item does not exist.
    fn trigger_menu_action(&self, menu: &str, item: &str) -> Result<bool>;
    /// Session state.
    fn state(&self) -> MirroringState;
}

/// Screenshot hook bound by the hosting program.
pub trait ScreenCapture {
    /// PNG bytes of the mirrored window.
    fn capture(&self) -> Result<Vec<u8>>;
}

/// A tappable element found on the captured screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenElement {
    pub text: String,
    pub tap_x: f64,
    pub tap_y: f64,
    pub confidence: f64,
}

/// Vision/OCR hook bound by the hosting program.
pub trait ScreenDescriber {
    /// Elements on screen plus an annotated rendering of the capture.
    fn describe(&self, skip_ocr: bool) -> Result<(Vec<ScreenElement>, Vec<u8>)>;
}
