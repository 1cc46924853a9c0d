//! Quartz implementation of [`CursorControl`].
//!
//! `CGWarpMouseCursorPosition` repositions the cursor without generating an
//! HID event, which is exactly why the nudge in the sync engine exists.
//! Dissociation keeps human mouse movement from fighting the warp while an
//! action is in flight.

use std::ffi::c_void;

use anyhow::{Result, bail};

use crate::CursorControl;

#[repr(C)]
#[derive(Clone, Copy)]
struct CGPoint {
    x: f64,
    y: f64,
}

type CGError = i32;
const K_CG_ERROR_SUCCESS: CGError = 0;

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGEventCreate(source: *const c_void) -> *mut c_void;
    fn CGEventGetLocation(event: *const c_void) -> CGPoint;
    fn CGWarpMouseCursorPosition(new_cursor_position: CGPoint) -> CGError;
    fn CGAssociateMouseAndMouseCursorPosition(connected: u32) -> CGError;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFRelease(cf: *const c_void);
}

/// The real system cursor.
pub struct QuartzCursor;

impl QuartzCursor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for QuartzCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorControl for QuartzCursor {
    fn position(&self) -> Result<(f64, f64)> {
        unsafe {
            let event = CGEventCreate(std::ptr::null());
            if event.is_null() {
                bail!("CGEventCreate returned null");
            }
            let location = CGEventGetLocation(event);
            CFRelease(event.cast_const());
            Ok((location.x, location.y))
        }
    }

    fn warp(&self, x: f64, y: f64) -> Result<()> {
        let status = unsafe { CGWarpMouseCursorPosition(CGPoint { x, y }) };
        if status != K_CG_ERROR_SUCCESS {
            bail!("CGWarpMouseCursorPosition failed: {status}");
        }
        Ok(())
    }

    fn set_associated(&self, associated: bool) -> Result<()> {
        let status = unsafe { CGAssociateMouseAndMouseCursorPosition(u32::from(associated)) };
        if status != K_CG_ERROR_SUCCESS {
            bail!("CGAssociateMouseAndMouseCursorPosition failed: {status}");
        }
        Ok(())
    }
}
