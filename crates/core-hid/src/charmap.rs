//! Character-to-keystroke tables.
//!
//! The reference table covers everything typable on a US-QWERTY layout:
//! letters (left-shift for uppercase), digits, punctuation, and the shifted
//! digit row. Hosts configured with a different physical layout overlay a
//! per-character substitution table built by [`crate::layout`]; substitution
//! entries win over the reference entry for the same character, and a
//! substitution `Skip` shadows a reference entry the layout cannot produce.

use std::collections::HashMap;

use crate::report::Modifiers;
use crate::usage;

/// A single key press: usage code plus the modifiers held for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub usage: u16,
    pub modifiers: Modifiers,
}

impl KeyStroke {
    pub fn plain(usage: u16) -> Self {
        Self {
            usage,
            modifiers: Modifiers::empty(),
        }
    }

    pub fn shifted(usage: u16) -> Self {
        Self {
            usage,
            modifiers: Modifiers::LEFT_SHIFT,
        }
    }
}

/// How a character is produced on the effective layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharStrokes {
    /// One key press.
    Single(KeyStroke),
    /// Dead key followed by a base key (accented characters on some layouts).
    Compose { dead: KeyStroke, base: KeyStroke },
    /// Unreachable on the effective layout.
    Skip,
}

/// Effective character map: US-QWERTY reference plus an optional per-layout
/// substitution overlay.
#[derive(Debug, Clone, Default)]
pub struct CharMap {
    reference: HashMap<char, KeyStroke>,
    substitution: HashMap<char, CharStrokes>,
}

impl CharMap {
    /// The US-QWERTY reference map with no substitution.
    pub fn reference() -> Self {
        let mut reference = HashMap::new();

        for (i, lower) in ('a'..='z').enumerate() {
            let code = usage::A + i as u16;
            reference.insert(lower, KeyStroke::plain(code));
            reference.insert(lower.to_ascii_uppercase(), KeyStroke::shifted(code));
        }

        for (i, digit) in ('1'..='9').enumerate() {
            reference.insert(digit, KeyStroke::plain(usage::DIGIT_1 + i as u16));
        }
        reference.insert('0', KeyStroke::plain(usage::DIGIT_0));

        // Shifted digit row.
        for (shifted, code) in [
            ('!', usage::DIGIT_1),
            ('@', usage::DIGIT_2),
            ('#', usage::DIGIT_3),
            ('$', usage::DIGIT_4),
            ('%', usage::DIGIT_5),
            ('^', usage::DIGIT_6),
            ('&', usage::DIGIT_7),
            ('*', usage::DIGIT_8),
            ('(', usage::DIGIT_9),
            (')', usage::DIGIT_0),
        ] {
            reference.insert(shifted, KeyStroke::shifted(code));
        }

        // Punctuation keys and their shifted pairs.
        for (plain, shifted, code) in [
            ('-', '_', usage::HYPHEN),
            ('=', '+', usage::EQUAL),
            ('[', '{', usage::OPEN_BRACKET),
            (']', '}', usage::CLOSE_BRACKET),
            ('\\', '|', usage::BACKSLASH),
            (';', ':', usage::SEMICOLON),
            ('\'', '"', usage::QUOTE),
            ('`', '~', usage::GRAVE),
            (',', '<', usage::COMMA),
            ('.', '>', usage::PERIOD),
            ('/', '?', usage::SLASH),
        ] {
            reference.insert(plain, KeyStroke::plain(code));
            reference.insert(shifted, KeyStroke::shifted(code));
        }

        reference.insert(' ', KeyStroke::plain(usage::SPACE));
        reference.insert('\n', KeyStroke::plain(usage::RETURN));
        reference.insert('\t', KeyStroke::plain(usage::TAB));

        Self {
            reference,
            substitution: HashMap::new(),
        }
    }

    /// Reference map overlaid with a per-layout substitution table.
    pub fn with_substitution(substitution: HashMap<char, CharStrokes>) -> Self {
        let mut map = Self::reference();
        map.substitution = substitution;
        map
    }

    /// How `c` is produced, substitution first, reference second.
    pub fn resolve(&self, c: char) -> CharStrokes {
        if let Some(sub) = self.substitution.get(&c) {
            return *sub;
        }
        match self.reference.get(&c) {
            Some(stroke) => CharStrokes::Single(*stroke),
            None => CharStrokes::Skip,
        }
    }

    pub fn is_typeable(&self, c: char) -> bool {
        !matches!(self.resolve(c), CharStrokes::Skip)
    }

    /// Every character the reference table covers. Substitution builders
    /// iterate this to reverse-look-up each one on the configured layout.
    pub fn reference_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.reference.keys().copied()
    }
}

/// Usage code for a named special key (`return`, `escape`, arrows, `f1`..).
pub fn named_key(name: &str) -> Option<u16> {
    let code = match name {
        "return" | "enter" => usage::RETURN,
        "escape" | "esc" => usage::ESCAPE,
        "delete" | "backspace" => usage::DELETE,
        "forward_delete" => usage::DELETE_FORWARD,
        "tab" => usage::TAB,
        "space" => usage::SPACE,
        "up" => usage::UP_ARROW,
        "down" => usage::DOWN_ARROW,
        "left" => usage::LEFT_ARROW,
        "right" => usage::RIGHT_ARROW,
        "home" => usage::HOME,
        "end" => usage::END,
        "page_up" | "pageup" => usage::PAGE_UP,
        "page_down" | "pagedown" => usage::PAGE_DOWN,
        "caps_lock" => usage::CAPS_LOCK,
        "f1" => usage::F1,
        "f2" => usage::F2,
        "f3" => usage::F3,
        "f4" => usage::F4,
        "f5" => usage::F5,
        "f6" => usage::F6,
        "f7" => usage::F7,
        "f8" => usage::F8,
        "f9" => usage::F9,
        "f10" => usage::F10,
        "f11" => usage::F11,
        "f12" => usage::F12,
        _ => return None,
    };
    Some(code)
}

/// Modifier mask for a named modifier.
pub fn modifier_named(name: &str) -> Option<Modifiers> {
    let mask = match name {
        "command" | "cmd" => Modifiers::LEFT_COMMAND,
        "shift" => Modifiers::LEFT_SHIFT,
        "option" | "alt" => Modifiers::LEFT_OPTION,
        "control" | "ctrl" => Modifiers::LEFT_CONTROL,
        "right_command" => Modifiers::RIGHT_COMMAND,
        "right_shift" => Modifiers::RIGHT_SHIFT,
        "right_option" => Modifiers::RIGHT_OPTION,
        "right_control" => Modifiers::RIGHT_CONTROL,
        _ => return None,
    };
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_letters_and_shift() {
        let map = CharMap::reference();
        assert_eq!(
            map.resolve('h'),
            CharStrokes::Single(KeyStroke::plain(usage::H))
        );
        assert_eq!(
            map.resolve('H'),
            CharStrokes::Single(KeyStroke::shifted(usage::H))
        );
        assert_eq!(
            map.resolve('!'),
            CharStrokes::Single(KeyStroke::shifted(usage::DIGIT_1))
        );
        assert_eq!(
            map.resolve('?'),
            CharStrokes::Single(KeyStroke::shifted(usage::SLASH))
        );
    }

    #[test]
    fn characters_outside_reference_skip() {
        let map = CharMap::reference();
        assert_eq!(map.resolve('\u{e9}'), CharStrokes::Skip);
        assert_eq!(map.resolve('\u{1F600}'), CharStrokes::Skip);
        assert!(!map.is_typeable('\u{e9}'));
    }

    #[test]
    fn substitution_wins_over_reference() {
        let mut sub = HashMap::new();
        // On a layout where 'z' lives on the QWERTY 'y' key.
        sub.insert('z', CharStrokes::Single(KeyStroke::plain(usage::Y)));
        sub.insert('@', CharStrokes::Skip);
        let map = CharMap::with_substitution(sub);
        assert_eq!(
            map.resolve('z'),
            CharStrokes::Single(KeyStroke::plain(usage::Y))
        );
        assert_eq!(map.resolve('@'), CharStrokes::Skip);
        // Untouched characters still resolve through the reference table.
        assert_eq!(
            map.resolve('a'),
            CharStrokes::Single(KeyStroke::plain(usage::A))
        );
    }

    #[test]
    fn named_keys_and_modifiers() {
        assert_eq!(named_key("return"), Some(usage::RETURN));
        assert_eq!(named_key("f11"), Some(usage::F11));
        assert_eq!(named_key("bogus"), None);
        assert_eq!(modifier_named("command"), Some(Modifiers::LEFT_COMMAND));
        assert_eq!(
            modifier_named("shift").unwrap() | modifier_named("ctrl").unwrap(),
            Modifiers::LEFT_SHIFT | Modifiers::LEFT_CONTROL
        );
        assert_eq!(modifier_named("hyper"), None);
    }
}
