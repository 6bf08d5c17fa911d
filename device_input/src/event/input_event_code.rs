// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words qwertyuiop asdfghjkl zxcvbnm KPENTER KPSLASH KPCOMMA

use std::fmt::{Display, Formatter, Result};

/// The `code` field of a record. For keys this is the `KEY_*` scan code from
/// `linux/input-event-codes.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InputEventCode(pub u16);

impl InputEventCode {
    /// The character a US layout key produces without modifiers, for keys that produce
    /// one. Shift, caps lock and keyboard layouts aren't taken into account, this is
    /// meant for scanners and numeric keypads which send plain characters.
    ///
    /// ```
    /// use r3bl_device_input::InputEventCode;
    ///
    /// assert_eq!(InputEventCode(30).character(), Some('a'));
    /// assert_eq!(InputEventCode(0x201).character(), Some('1'));
    /// assert_eq!(InputEventCode(1).character(), None); // Escape.
    /// ```
    #[must_use]
    pub fn character(self) -> Option<char> {
        let it = match self.0 {
            // Top row digits. KEY_1..=KEY_9 then KEY_0.
            code @ 2..=10 => digit(code - 1),
            11 => '0',
            12 => '-',
            13 => '=',
            15 => '\t',
            code @ 16..=25 => nth_char("qwertyuiop", code - 16)?,
            26 => '(',
            27 => ')',
            28 => '\n',
            code @ 30..=38 => nth_char("asdfghjkl", code - 30)?,
            39 => ';',
            40 => '`',
            41 => '^',
            43 => '\\',
            code @ 44..=50 => nth_char("zxcvbnm", code - 44)?,
            51 => ',',
            52 => '.',
            53 => '/',
            55 => '*',
            57 => ' ',
            // Keypad.
            71 => '7',
            72 => '8',
            73 => '9',
            74 => '-',
            75 => '4',
            76 => '5',
            77 => '6',
            78 => '+',
            79 => '1',
            80 => '2',
            81 => '3',
            82 => '0',
            83 => '.',
            // KEY_KPCOMMA, KEY_KPSLASH, KEY_KPENTER.
            95 => ',',
            98 => '/',
            101 => '\n',
            // KEY_DOLLAR, KEY_EURO.
            0x1b2 => '$',
            0x1b3 => '€',
            // KEY_NUMERIC_0..=KEY_NUMERIC_9, star, pound, then A..=D.
            code @ 0x200..=0x209 => digit(code - 0x200),
            0x20a => '*',
            0x20b => '#',
            code @ 0x20c..=0x20f => nth_char("abcd", code - 0x20c)?,
            _ => return None,
        };
        Some(it)
    }
}

fn digit(value: u16) -> char {
    char::from_digit(u32::from(value), 10).unwrap_or('0')
}

fn nth_char(row: &str, index: u16) -> Option<char> { row.chars().nth(usize::from(index)) }

impl From<u16> for InputEventCode {
    fn from(code: u16) -> Self { Self(code) }
}

impl Display for InputEventCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result { write!(f, "{:#x}", self.0) }
}
