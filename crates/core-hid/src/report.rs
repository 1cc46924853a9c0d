//! Packed input-report records.
//!
//! The virtual-device service consumes these as raw bytes at fixed offsets,
//! so each record is serialized field by field in little-endian order. The
//! in-memory representation is free to be whatever rustc picks; only
//! `to_bytes`/`from_bytes` define the wire shape.

use bitflags::bitflags;

/// Wire size of a [`PointingReport`].
pub const POINTING_REPORT_LEN: usize = 8;

/// Wire size of a [`KeyboardReport`].
pub const KEYBOARD_REPORT_LEN: usize = 67;

/// Number of usage-code slots in a keyboard report.
pub const KEYBOARD_SLOTS: usize = 32;

/// Wire size of [`KeyboardParameters`].
pub const KEYBOARD_PARAMETERS_LEN: usize = 24;

bitflags! {
    /// Pointer button bitmask. Bit 0 is the primary button.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u32 {
        const PRIMARY = 1 << 0;
        const SECONDARY = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

bitflags! {
    /// Keyboard modifier bitmask, low nibble left-side, high nibble right-side.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const LEFT_CONTROL = 0x01;
        const LEFT_SHIFT = 0x02;
        const LEFT_OPTION = 0x04;
        const LEFT_COMMAND = 0x08;
        const RIGHT_CONTROL = 0x10;
        const RIGHT_SHIFT = 0x20;
        const RIGHT_OPTION = 0x40;
        const RIGHT_COMMAND = 0x80;
    }
}

/// Relative pointing-device report: button state, movement deltas, wheel deltas.
///
/// Layout: `buttons` u32 LE at offset 0, then one signed byte each for x, y,
/// vertical wheel, horizontal wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointingReport {
    pub buttons: Buttons,
    pub x: i8,
    pub y: i8,
    pub vertical_wheel: i8,
    pub horizontal_wheel: i8,
}

impl PointingReport {
    /// Movement-only report with no buttons held.
    pub fn movement(x: i8, y: i8) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    /// Wheel-only report used for scroll gestures.
    pub fn wheel(vertical: i8, horizontal: i8) -> Self {
        Self {
            vertical_wheel: vertical,
            horizontal_wheel: horizontal,
            ..Self::default()
        }
    }

    /// Stationary report holding the given buttons.
    pub fn buttons(buttons: Buttons) -> Self {
        Self {
            buttons,
            ..Self::default()
        }
    }

    pub fn to_bytes(&self) -> [u8; POINTING_REPORT_LEN] {
        let mut out = [0u8; POINTING_REPORT_LEN];
        out[..4].copy_from_slice(&self.buttons.bits().to_le_bytes());
        out[4] = self.x as u8;
        out[5] = self.y as u8;
        out[6] = self.vertical_wheel as u8;
        out[7] = self.horizontal_wheel as u8;
        out
    }

    pub fn from_bytes(raw: &[u8; POINTING_REPORT_LEN]) -> Self {
        let buttons = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        Self {
            buttons: Buttons::from_bits_retain(buttons),
            x: raw[4] as i8,
            y: raw[5] as i8,
            vertical_wheel: raw[6] as i8,
            horizontal_wheel: raw[7] as i8,
        }
    }
}

/// Keyboard report: report id, modifier byte, reserved byte, then 32 slots of
/// u16 LE usage codes starting at offset 3 with no padding in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardReport {
    pub modifiers: Modifiers,
    pub keys: [u16; KEYBOARD_SLOTS],
}

impl Default for KeyboardReport {
    fn default() -> Self {
        Self {
            modifiers: Modifiers::empty(),
            keys: [0; KEYBOARD_SLOTS],
        }
    }
}

impl KeyboardReport {
    const REPORT_ID: u8 = 1;

    /// All-zero report releasing every key and modifier.
    pub fn release() -> Self {
        Self::default()
    }

    /// Report pressing `keys` (at most [`KEYBOARD_SLOTS`]) under one combined
    /// modifier mask. Excess keys beyond the slot count are a caller bug.
    pub fn pressed(modifiers: Modifiers, keys: &[u16]) -> Self {
        assert!(keys.len() <= KEYBOARD_SLOTS, "keyboard report overflows slots");
        let mut slots = [0u16; KEYBOARD_SLOTS];
        slots[..keys.len()].copy_from_slice(keys);
        Self {
            modifiers,
            keys: slots,
        }
    }

    pub fn is_release(&self) -> bool {
        self.modifiers.is_empty() && self.keys.iter().all(|&k| k == 0)
    }

    pub fn to_bytes(&self) -> [u8; KEYBOARD_REPORT_LEN] {
        let mut out = [0u8; KEYBOARD_REPORT_LEN];
        out[0] = Self::REPORT_ID;
        out[1] = self.modifiers.bits();
        // out[2] reserved
        for (i, usage) in self.keys.iter().enumerate() {
            let off = 3 + i * 2;
            out[off..off + 2].copy_from_slice(&usage.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(raw: &[u8; KEYBOARD_REPORT_LEN]) -> Self {
        let mut keys = [0u16; KEYBOARD_SLOTS];
        for (i, slot) in keys.iter_mut().enumerate() {
            let off = 3 + i * 2;
            *slot = u16::from_le_bytes([raw[off], raw[off + 1]]);
        }
        Self {
            modifiers: Modifiers::from_bits_retain(raw[1]),
            keys,
        }
    }
}

/// One-shot device parameters sent when the virtual keyboard is initialized:
/// three u64 LE integers (vendor id, product id, country code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardParameters {
    pub vendor_id: u64,
    pub product_id: u64,
    pub country_code: u64,
}

impl Default for KeyboardParameters {
    fn default() -> Self {
        // Apple vendor id, the product id the service advertises for its
        // synthetic keyboard, ISO country code.
        Self {
            vendor_id: 0x05AC,
            product_id: 0x0250,
            country_code: 1,
        }
    }
}

impl KeyboardParameters {
    pub fn to_bytes(&self) -> [u8; KEYBOARD_PARAMETERS_LEN] {
        let mut out = [0u8; KEYBOARD_PARAMETERS_LEN];
        out[..8].copy_from_slice(&self.vendor_id.to_le_bytes());
        out[8..16].copy_from_slice(&self.product_id.to_le_bytes());
        out[16..].copy_from_slice(&self.country_code.to_le_bytes());
        out
    }

    pub fn from_bytes(raw: &[u8; KEYBOARD_PARAMETERS_LEN]) -> Self {
        let word = |off: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&raw[off..off + 8]);
            u64::from_le_bytes(buf)
        };
        Self {
            vendor_id: word(0),
            product_id: word(8),
            country_code: word(16),
        }
    }
}
