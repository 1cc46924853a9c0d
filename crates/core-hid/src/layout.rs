//! Per-layout key substitution.
//!
//! When the host keyboard is not US-QWERTY, every character of the reference
//! table is reverse-looked-up on the configured layout through the OS key
//! translation service: which physical key plus modifiers produces it there.
//! Characters with no producing combination become `Skip` entries so typing
//! can silently drop them and report their scalar values. The OS lookup sits
//! behind [`LayoutResolver`] so the table builder and everything above it can
//! run against an in-memory resolver on any platform.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::charmap::{CharMap, CharStrokes};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("unknown keyboard layout: {0}")]
    UnknownLayout(String),
    #[error("layout has no key-translation data: {0}")]
    MissingLayoutData(String),
    #[error("key translation failed with status {0}")]
    TranslateFailed(i32),
}

/// Reverse lookup of characters on one concrete keyboard layout.
pub trait LayoutResolver {
    /// Opaque identifier of the layout this resolver answers for.
    fn layout_id(&self) -> &str;

    /// The keystroke sequence producing `c` on this layout, or `None` when
    /// the layout cannot produce it at all.
    fn resolve(&self, c: char) -> Option<CharStrokes>;
}

/// Build the substitution table for `resolver`: one entry per reference
/// character, either the layout's own strokes or `Skip`.
pub fn build_substitution(
    resolver: &dyn LayoutResolver,
    reference: &CharMap,
) -> HashMap<char, CharStrokes> {
    let mut table = HashMap::new();
    let mut unreachable = 0usize;
    for c in reference.reference_chars() {
        match resolver.resolve(c) {
            Some(strokes) => {
                table.insert(c, strokes);
            }
            None => {
                debug!(target: "hid.layout", character = c as u32, "unreachable_on_layout");
                table.insert(c, CharStrokes::Skip);
                unreachable += 1;
            }
        }
    }
    info!(
        target: "hid.layout",
        layout = resolver.layout_id(),
        entries = table.len(),
        unreachable,
        "substitution_built"
    );
    table
}

#[cfg(target_os = "macos")]
pub use carbon::CarbonLayoutResolver;

/// Carbon/Text Input Services implementation of [`LayoutResolver`].
///
/// The whole reverse table is computed once at construction: every virtual
/// keycode is run through `UCKeyTranslate` under the plain, shift, option and
/// shift+option states, then every dead key found that way is paired with
/// every base key to discover composed characters.
#[cfg(target_os = "macos")]
mod carbon {
    use super::{LayoutError, LayoutResolver};
    use crate::charmap::{CharStrokes, KeyStroke};
    use crate::report::Modifiers;
    use crate::usage;
    use std::collections::HashMap;
    use std::ffi::c_void;

    type CFIndex = isize;
    type CFTypeRef = *const c_void;
    type CFStringRef = *const c_void;
    type CFArrayRef = *const c_void;
    type CFDataRef = *const c_void;
    type CFDictionaryRef = *const c_void;
    type CFAllocatorRef = *const c_void;
    type TISInputSourceRef = *const c_void;
    type OSStatus = i32;

    const K_CF_STRING_ENCODING_UTF8: u32 = 0x0800_0100;
    const K_UC_KEY_ACTION_DOWN: u16 = 0;

    // EventRecord modifier bits shifted right by 8, as UCKeyTranslate wants.
    const STATE_PLAIN: u32 = 0;
    const STATE_SHIFT: u32 = 2;
    const STATE_OPTION: u32 = 8;
    const STATE_SHIFT_OPTION: u32 = 10;

    #[link(name = "CoreFoundation", kind = "framework")]
    unsafe extern "C" {
        fn CFStringCreateWithCString(
            alloc: CFAllocatorRef,
            c_str: *const u8,
            encoding: u32,
        ) -> CFStringRef;
        fn CFDictionaryCreate(
            allocator: CFAllocatorRef,
            keys: *const CFTypeRef,
            values: *const CFTypeRef,
            num_values: CFIndex,
            key_callbacks: *const c_void,
            value_callbacks: *const c_void,
        ) -> CFDictionaryRef;
        fn CFArrayGetCount(array: CFArrayRef) -> CFIndex;
        fn CFArrayGetValueAtIndex(array: CFArrayRef, idx: CFIndex) -> CFTypeRef;
        fn CFDataGetBytePtr(data: CFDataRef) -> *const u8;
        fn CFRelease(cf: CFTypeRef);
        static kCFTypeDictionaryKeyCallBacks: c_void;
        static kCFTypeDictionaryValueCallBacks: c_void;
    }

    #[link(name = "Carbon", kind = "framework")]
    unsafe extern "C" {
        fn TISCreateInputSourceList(
            properties: CFDictionaryRef,
            include_all_installed: bool,
        ) -> CFArrayRef;
        fn TISGetInputSourceProperty(source: TISInputSourceRef, key: CFStringRef) -> CFTypeRef;
        fn UCKeyTranslate(
            key_layout_ptr: *const c_void,
            virtual_key_code: u16,
            key_action: u16,
            modifier_key_state: u32,
            keyboard_type: u32,
            key_translate_options: u32,
            dead_key_state: *mut u32,
            max_string_length: usize,
            actual_string_length: *mut usize,
            unicode_string: *mut u16,
        ) -> OSStatus;
        fn LMGetKbdType() -> u8;
        static kTISPropertyInputSourceID: CFStringRef;
        static kTISPropertyUnicodeKeyLayoutData: CFStringRef;
    }

    /// HID usage for a macOS virtual keycode, character keys only.
    fn usage_for_keycode(vk: u16) -> Option<u16> {
        let code = match vk {
            0x00 => usage::A,
            0x01 => usage::S,
            0x02 => usage::D,
            0x03 => usage::F,
            0x04 => usage::H,
            0x05 => usage::G,
            0x06 => usage::Z,
            0x07 => usage::X,
            0x08 => usage::C,
            0x09 => usage::V,
            0x0A => usage::NON_US_BACKSLASH,
            0x0B => usage::B,
            0x0C => usage::Q,
            0x0D => usage::W,
            0x0E => usage::E,
            0x0F => usage::R,
            0x10 => usage::Y,
            0x11 => usage::T,
            0x12 => usage::DIGIT_1,
            0x13 => usage::DIGIT_2,
            0x14 => usage::DIGIT_3,
            0x15 => usage::DIGIT_4,
            0x16 => usage::DIGIT_6,
            0x17 => usage::DIGIT_5,
            0x18 => usage::EQUAL,
            0x19 => usage::DIGIT_9,
            0x1A => usage::DIGIT_7,
            0x1B => usage::HYPHEN,
            0x1C => usage::DIGIT_8,
            0x1D => usage::DIGIT_0,
            0x1E => usage::CLOSE_BRACKET,
            0x1F => usage::O,
            0x20 => usage::U,
            0x21 => usage::OPEN_BRACKET,
            0x22 => usage::I,
            0x23 => usage::P,
            0x24 => usage::RETURN,
            0x25 => usage::L,
            0x26 => usage::J,
            0x27 => usage::QUOTE,
            0x28 => usage::K,
            0x29 => usage::SEMICOLON,
            0x2A => usage::BACKSLASH,
            0x2B => usage::COMMA,
            0x2C => usage::SLASH,
            0x2D => usage::N,
            0x2E => usage::M,
            0x2F => usage::PERIOD,
            0x30 => usage::TAB,
            0x31 => usage::SPACE,
            0x32 => usage::GRAVE,
            0x33 => usage::DELETE,
            _ => return None,
        };
        Some(code)
    }

    /// The Return key translates as CR; the reference table keys newline.
    fn normalize(c: char) -> char {
        if c == '\r' { '\n' } else { c }
    }

    fn modifiers_for_state(state: u32) -> Modifiers {
        let mut mods = Modifiers::empty();
        if state & STATE_SHIFT != 0 {
            mods |= Modifiers::LEFT_SHIFT;
        }
        if state & STATE_OPTION != 0 {
            mods |= Modifiers::LEFT_OPTION;
        }
        mods
    }

    pub struct CarbonLayoutResolver {
        layout_id: String,
        table: HashMap<char, CharStrokes>,
    }

    impl CarbonLayoutResolver {
        /// Resolve `layout_id` (a Text Input Services input-source id such as
        /// `com.apple.keylayout.German`) and precompute its reverse table.
        pub fn new(layout_id: &str) -> Result<Self, LayoutError> {
            let table = unsafe { reverse_table(layout_id)? };
            Ok(Self {
                layout_id: layout_id.to_string(),
                table,
            })
        }
    }

    impl LayoutResolver for CarbonLayoutResolver {
        fn layout_id(&self) -> &str {
            &self.layout_id
        }

        fn resolve(&self, c: char) -> Option<CharStrokes> {
            self.table.get(&c).copied()
        }
    }

    struct Translator {
        layout: *const c_void,
        kbd_type: u32,
    }

    impl Translator {
        /// One `UCKeyTranslate` step. Returns the produced character (if any)
        /// and whether a dead-key state is now pending.
        unsafe fn step(
            &self,
            vk: u16,
            state: u32,
            dead_state: &mut u32,
        ) -> Result<(Option<char>, bool), LayoutError> {
            let mut buf = [0u16; 4];
            let mut len = 0usize;
            let status = unsafe {
                UCKeyTranslate(
                    self.layout,
                    vk,
                    K_UC_KEY_ACTION_DOWN,
                    state,
                    self.kbd_type,
                    0,
                    dead_state,
                    buf.len(),
                    &mut len,
                    buf.as_mut_ptr(),
                )
            };
            if status != 0 {
                return Err(LayoutError::TranslateFailed(status));
            }
            let produced = if len == 1 {
                char::from_u32(buf[0] as u32)
            } else {
                None
            };
            Ok((produced, *dead_state != 0))
        }
    }

    unsafe fn reverse_table(
        layout_id: &str,
    ) -> Result<HashMap<char, CharStrokes>, LayoutError> {
        let id_owned = format!("{layout_id}\0");
        let id_ref = unsafe {
            CFStringCreateWithCString(
                std::ptr::null(),
                id_owned.as_ptr(),
                K_CF_STRING_ENCODING_UTF8,
            )
        };
        let keys = [unsafe { kTISPropertyInputSourceID } as CFTypeRef];
        let values = [id_ref as CFTypeRef];
        let filter = unsafe {
            CFDictionaryCreate(
                std::ptr::null(),
                keys.as_ptr(),
                values.as_ptr(),
                1,
                &raw const kCFTypeDictionaryKeyCallBacks,
                &raw const kCFTypeDictionaryValueCallBacks,
            )
        };
        let sources = unsafe { TISCreateInputSourceList(filter, true) };
        unsafe {
            CFRelease(filter);
            CFRelease(id_ref);
        }
        if sources.is_null() || unsafe { CFArrayGetCount(sources) } == 0 {
            if !sources.is_null() {
                unsafe { CFRelease(sources) };
            }
            return Err(LayoutError::UnknownLayout(layout_id.to_string()));
        }
        let source = unsafe { CFArrayGetValueAtIndex(sources, 0) };
        let data =
            unsafe { TISGetInputSourceProperty(source, kTISPropertyUnicodeKeyLayoutData) };
        if data.is_null() {
            unsafe { CFRelease(sources) };
            return Err(LayoutError::MissingLayoutData(layout_id.to_string()));
        }
        let translator = Translator {
            layout: unsafe { CFDataGetBytePtr(data) } as *const c_void,
            kbd_type: unsafe { LMGetKbdType() } as u32,
        };
        let result = translate_all(&translator);
        unsafe { CFRelease(sources) };
        result
    }

    fn translate_all(
        translator: &Translator,
    ) -> Result<HashMap<char, CharStrokes>, LayoutError> {
        let states = [STATE_PLAIN, STATE_SHIFT, STATE_OPTION, STATE_SHIFT_OPTION];
        let mut table: HashMap<char, CharStrokes> = HashMap::new();
        let mut dead_keys: Vec<(u16, u32)> = Vec::new();

        // Direct characters first; remember dead keys for the compose pass.
        for vk in 0u16..0x34 {
            let Some(code) = usage_for_keycode(vk) else {
                continue;
            };
            for &state in &states {
                let mut dead = 0u32;
                let (produced, pending) = unsafe { translator.step(vk, state, &mut dead)? };
                if pending {
                    dead_keys.push((vk, state));
                    continue;
                }
                if let Some(c) = produced {
                    table
                        .entry(normalize(c))
                        .or_insert(CharStrokes::Single(KeyStroke {
                            usage: code,
                            modifiers: modifiers_for_state(state),
                        }));
                }
            }
        }

        // Compose pass: dead key followed by an unmodified base key.
        for &(dead_vk, dead_state) in &dead_keys {
            let Some(dead_code) = usage_for_keycode(dead_vk) else {
                continue;
            };
            for base_vk in 0u16..0x34 {
                let Some(base_code) = usage_for_keycode(base_vk) else {
                    continue;
                };
                let mut carry = 0u32;
                let (_, pending) =
                    unsafe { translator.step(dead_vk, dead_state, &mut carry)? };
                if !pending {
                    continue;
                }
                let (produced, _) =
                    unsafe { translator.step(base_vk, STATE_PLAIN, &mut carry)? };
                if let Some(c) = produced {
                    table.entry(normalize(c)).or_insert(CharStrokes::Compose {
                        dead: KeyStroke {
                            usage: dead_code,
                            modifiers: modifiers_for_state(dead_state),
                        },
                        base: KeyStroke::plain(base_code),
                    });
                }
            }
        }
        Ok(table)
    }
}
