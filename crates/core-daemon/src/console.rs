//! Console user resolution.
//!
//! The console user is whoever sits at the physical display. Socket
//! ownership and peer admission both key off this uid, and it is re-resolved
//! for every accepted connection so fast user switching takes effect
//! immediately. Behind a trait so the accept loop can be tested with a fixed
//! uid.

/// Source of the current console uid.
pub trait ConsoleUserSource: Send + Sync {
    /// Uid of the user at the physical console, or `None` when nobody is
    /// logged in there.
    fn console_uid(&self) -> Option<u32>;
}

/// The OS session service.
pub struct SystemConsoleUser;

#[cfg(target_os = "macos")]
mod system {
    use std::ffi::c_void;

    #[link(name = "SystemConfiguration", kind = "framework")]
    unsafe extern "C" {
        fn SCDynamicStoreCopyConsoleUser(
            store: *const c_void,
            uid: *mut u32,
            gid: *mut u32,
        ) -> *const c_void;
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    unsafe extern "C" {
        fn CFRelease(cf: *const c_void);
    }

    pub fn console_uid() -> Option<u32> {
        let mut uid: u32 = 0;
        let mut gid: u32 = 0;
        let name = unsafe { SCDynamicStoreCopyConsoleUser(std::ptr::null(), &mut uid, &mut gid) };
        if name.is_null() {
            return None;
        }
        unsafe { CFRelease(name) };
        Some(uid)
    }
}

impl ConsoleUserSource for SystemConsoleUser {
    #[cfg(target_os = "macos")]
    fn console_uid(&self) -> Option<u32> {
        system::console_uid()
    }

    #[cfg(not(target_os = "macos"))]
    fn console_uid(&self) -> Option<u32> {
        None
    }
}

/// Fixed answer, for tests.
pub struct FixedConsoleUser(pub Option<u32>);

impl ConsoleUserSource for FixedConsoleUser {
    fn console_uid(&self) -> Option<u32> {
        self.0
    }
}
