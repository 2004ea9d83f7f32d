//! The key-symbol namespace.
//!
//! A key symbol ("keysym") is an opaque 32-bit code for a logical keyboard
//! input: a letter, a piece of punctuation, a dead key, a modifier. Compose
//! files refer to keysyms by name, so this module provides the name lookup
//! in both directions, plus the handful of classifications the engine needs:
//! which keysyms are modifiers (ignored inside a sequence) and which have a
//! direct Unicode interpretation.
//!
//! Codes below 0x100 coincide with Latin-1. Codes with the `0x0100_0000`
//! bit set encode a Unicode codepoint in their low 24 bits. Everything else
//! (function keys, dead keys, modifiers) has no Unicode form.

mod names;

use std::fmt;

/// Bit flagging a keysym as a direct Unicode codepoint.
const UNICODE_FLAG: u32 = 0x0100_0000;

/// An opaque 32-bit key-symbol code.
///
/// # Example
///
/// ```
/// use kseq_util::keysym::{self, Keysym, NO_SYMBOL};
///
/// let at = keysym::from_name("at");
/// assert_eq!(at, Keysym(0x40));
/// assert_eq!(at.to_char(), Some('@'));
/// assert_eq!(keysym::from_name("no_such_keysym"), NO_SYMBOL);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Keysym(pub u32);

/// The reserved "no symbol" sentinel.
pub const NO_SYMBOL: Keysym = Keysym(0);

impl Keysym {
    /// Returns the raw 32-bit code.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns true if this keysym is a dedicated modifier key.
    ///
    /// Modifier keys are transparent to compose sequences: feeding one
    /// neither advances nor cancels a pending sequence. The set is closed:
    /// Shift, Control, Alt, Meta, Super and Hyper (left and right),
    /// Caps_Lock, Shift_Lock, Num_Lock, Scroll_Lock, Mode_switch, and the
    /// ISO level shifts, latches and locks.
    pub fn is_modifier(self) -> bool {
        matches!(self.0,
            0xffe1..=0xffee     // Shift_L through Hyper_R
            | 0xfe01..=0xfe13   // ISO_Lock through ISO_Level5_Lock
            | 0xff7e            // Mode_switch
            | 0xff7f            // Num_Lock
            | 0xff14)           // Scroll_Lock
    }

    /// Returns the Unicode interpretation of this keysym, if it has one.
    ///
    /// Printable Latin-1 codes map to themselves; codes carrying the
    /// Unicode flag map to their embedded codepoint. Dead keys, modifiers
    /// and function keys return `None`.
    pub fn to_char(self) -> Option<char> {
        match self.0 {
            0x0020..=0x007e | 0x00a0..=0x00ff => char::from_u32(self.0),
            code if code & 0xff00_0000 == UNICODE_FLAG => {
                char::from_u32(code & 0x00ff_ffff)
            }
            _ => None,
        }
    }

    /// Returns the keysym for a Unicode character.
    ///
    /// The inverse of [`Keysym::to_char`]: Latin-1 maps directly, anything
    /// else is encoded with the Unicode flag.
    pub fn from_char(c: char) -> Keysym {
        let cp = c as u32;
        if (0x20..=0x7e).contains(&cp) || (0xa0..=0xff).contains(&cp) {
            Keysym(cp)
        } else {
            Keysym(cp | UNICODE_FLAG)
        }
    }

    /// Returns the canonical name of this keysym.
    ///
    /// Falls back to `U%04X` for Unicode-flagged codes and `0x%08x` for
    /// anything without a name in the table.
    pub fn name(self) -> String {
        if self == NO_SYMBOL {
            return "NoSymbol".to_string();
        }
        if let Some(&name) = names::CODE_TO_NAME.get(&self.0) {
            return name.to_string();
        }
        match self.0 {
            code @ (0x30..=0x39 | 0x41..=0x5a | 0x61..=0x7a) => {
                (code as u8 as char).to_string()
            }
            code if code & 0xff00_0000 == UNICODE_FLAG => {
                format!("U{:04X}", code & 0x00ff_ffff)
            }
            code => format!("0x{:08x}", code),
        }
    }
}

impl fmt::Display for Keysym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolves a keysym name to its code.
///
/// Lookup is case-sensitive. Single ASCII letters and digits are their own
/// names. Beyond the static table, two generic forms are accepted:
/// `U<hex>` resolves the hexadecimal Unicode codepoint, and `0x<hex>` a raw
/// keysym code. Unknown names yield [`NO_SYMBOL`].
pub fn from_name(name: &str) -> Keysym {
    if name.len() == 1 {
        let b = name.as_bytes()[0];
        if b.is_ascii_alphanumeric() {
            return Keysym(b as u32);
        }
    }

    if let Some(&code) = names::NAME_TO_CODE.get(name) {
        return Keysym(code);
    }

    // U<hex>: a Unicode codepoint, e.g. U263A.
    if let Some(hex) = name.strip_prefix('U') {
        if !hex.is_empty()
            && hex.len() <= 6
            && hex.bytes().all(|b| b.is_ascii_hexdigit())
        {
            if let Some(c) = u32::from_str_radix(hex, 16)
                .ok()
                .filter(|&cp| cp >= 0x20)
                .and_then(char::from_u32)
            {
                return Keysym::from_char(c);
            }
        }
        return NO_SYMBOL;
    }

    // 0x<hex>: a raw keysym code.
    if let Some(hex) = name.strip_prefix("0x") {
        if !hex.is_empty()
            && hex.len() <= 8
            && hex.bytes().all(|b| b.is_ascii_hexdigit())
        {
            if let Ok(code) = u32::from_str_radix(hex, 16) {
                return Keysym(code);
            }
        }
    }

    NO_SYMBOL
}

/// Named constants for the keysyms the engine itself refers to.
pub mod syms {
    use super::Keysym;

    pub const MULTI_KEY: Keysym = Keysym(0xff20);
    pub const SCROLL_LOCK: Keysym = Keysym(0xff14);
    pub const MODE_SWITCH: Keysym = Keysym(0xff7e);
    pub const NUM_LOCK: Keysym = Keysym(0xff7f);

    pub const SHIFT_L: Keysym = Keysym(0xffe1);
    pub const SHIFT_R: Keysym = Keysym(0xffe2);
    pub const CONTROL_L: Keysym = Keysym(0xffe3);
    pub const CONTROL_R: Keysym = Keysym(0xffe4);
    pub const CAPS_LOCK: Keysym = Keysym(0xffe5);
    pub const SHIFT_LOCK: Keysym = Keysym(0xffe6);
    pub const META_L: Keysym = Keysym(0xffe7);
    pub const ALT_L: Keysym = Keysym(0xffe9);
    pub const SUPER_L: Keysym = Keysym(0xffeb);
    pub const HYPER_R: Keysym = Keysym(0xffee);

    pub const ISO_LEVEL3_SHIFT: Keysym = Keysym(0xfe03);
    pub const ISO_LEVEL5_SHIFT: Keysym = Keysym(0xfe11);

    pub const DEAD_GRAVE: Keysym = Keysym(0xfe50);
    pub const DEAD_ACUTE: Keysym = Keysym(0xfe51);
    pub const DEAD_CIRCUMFLEX: Keysym = Keysym(0xfe52);
    pub const DEAD_TILDE: Keysym = Keysym(0xfe53);
    pub const DEAD_DIAERESIS: Keysym = Keysym(0xfe57);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_character_names() {
        assert_eq!(from_name("A"), Keysym(0x41));
        assert_eq!(from_name("a"), Keysym(0x61));
        assert_eq!(from_name("7"), Keysym(0x37));
        // Single punctuation characters are not names.
        assert_eq!(from_name("@"), NO_SYMBOL);
    }

    #[test]
    fn test_table_names() {
        assert_eq!(from_name("at"), Keysym(0x40));
        assert_eq!(from_name("dollar"), Keysym(0x24));
        assert_eq!(from_name("asciitilde"), Keysym(0x7e));
        assert_eq!(from_name("acute"), Keysym(0xb4));
        assert_eq!(from_name("dead_acute"), syms::DEAD_ACUTE);
        assert_eq!(from_name("Multi_key"), syms::MULTI_KEY);
        assert_eq!(from_name("eacute"), Keysym(0xe9));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert_eq!(from_name("Adiaeresis"), Keysym(0xc4));
        assert_eq!(from_name("adiaeresis"), Keysym(0xe4));
        assert_eq!(from_name("AT"), NO_SYMBOL);
    }

    #[test]
    fn test_unicode_form() {
        assert_eq!(from_name("U0041"), Keysym(0x41));
        assert_eq!(from_name("U00E9"), Keysym(0xe9));
        assert_eq!(from_name("U263A"), Keysym(0x263a | 0x0100_0000));
        assert_eq!(from_name("U"), NO_SYMBOL);
        assert_eq!(from_name("Uzzzz"), NO_SYMBOL);
    }

    #[test]
    fn test_raw_hex_form() {
        assert_eq!(from_name("0xfe51"), syms::DEAD_ACUTE);
        assert_eq!(from_name("0x1000263a"), Keysym(0x1000_263a));
        assert_eq!(from_name("0x"), NO_SYMBOL);
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(from_name(""), NO_SYMBOL);
        assert_eq!(from_name("definitely_not_a_keysym"), NO_SYMBOL);
    }

    #[test]
    fn test_to_char() {
        assert_eq!(Keysym(0x41).to_char(), Some('A'));
        assert_eq!(Keysym(0x7e).to_char(), Some('~'));
        assert_eq!(Keysym(0xb4).to_char(), Some('´'));
        assert_eq!(Keysym(0x263a | 0x0100_0000).to_char(), Some('☺'));
        // Dead keys and modifiers have no Unicode form.
        assert_eq!(syms::DEAD_ACUTE.to_char(), None);
        assert_eq!(syms::SHIFT_L.to_char(), None);
        assert_eq!(NO_SYMBOL.to_char(), None);
    }

    #[test]
    fn test_from_char_roundtrip() {
        for c in ['A', 'z', '0', '@', '~', 'é', '☺'] {
            assert_eq!(Keysym::from_char(c).to_char(), Some(c));
        }
    }

    #[test]
    fn test_modifier_set() {
        for sym in [
            syms::SHIFT_L,
            syms::SHIFT_R,
            syms::CONTROL_L,
            syms::CAPS_LOCK,
            syms::SHIFT_LOCK,
            syms::META_L,
            syms::ALT_L,
            syms::SUPER_L,
            syms::HYPER_R,
            syms::NUM_LOCK,
            syms::SCROLL_LOCK,
            syms::MODE_SWITCH,
            syms::ISO_LEVEL3_SHIFT,
            syms::ISO_LEVEL5_SHIFT,
        ] {
            assert!(sym.is_modifier(), "{} should be a modifier", sym);
        }

        assert!(!syms::MULTI_KEY.is_modifier());
        assert!(!syms::DEAD_ACUTE.is_modifier());
        assert!(!Keysym(0x41).is_modifier());
        assert!(!NO_SYMBOL.is_modifier());
    }

    #[test]
    fn test_name_rendering() {
        assert_eq!(Keysym(0x41).name(), "A");
        assert_eq!(Keysym(0x40).name(), "at");
        assert_eq!(syms::DEAD_ACUTE.name(), "dead_acute");
        assert_eq!(NO_SYMBOL.name(), "NoSymbol");
        assert_eq!(Keysym(0x263a | 0x0100_0000).name(), "U263A");
        assert_eq!(Keysym(0xabcd0123).name(), "0xabcd0123");
    }

    #[test]
    fn test_name_lookup_roundtrip() {
        for name in ["at", "dead_tilde", "Multi_key", "eacute", "Shift_L"] {
            let sym = from_name(name);
            assert_ne!(sym, NO_SYMBOL);
            assert_eq!(from_name(&sym.name()), sym);
        }
    }
}
