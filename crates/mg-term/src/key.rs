// SPDX-License-Identifier: MIT
//
// Key codes.
//
// The editor sees the keyboard as a stream of 16-bit key codes. Codes
// 0–255 are raw bytes exactly as the terminal sent them: `C-a` is 0x01,
// `RET` is 0x0d, `DEL` is 0x7f, and 8-bit bytes pass through untouched.
// Codes from 256 upward name the keys that terminals encode as escape
// sequences (arrows, paging keys, function keys).
//
// There is no separate Meta modifier. Like every Emacs-family editor on a
// plain terminal, `M-x` is the two-key sequence `ESC x`; the keymap layer
// binds ESC as a prefix. Display and parsing fold that pair back into the
// familiar `M-x` spelling.

use std::fmt;

/// A single key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Key(pub u16);

impl Key {
    pub const NUL: Self = Self(0x00);
    pub const TAB: Self = Self(0x09);
    pub const LFD: Self = Self(0x0a);
    pub const RET: Self = Self(0x0d);
    pub const ESC: Self = Self(0x1b);
    pub const SPC: Self = Self(0x20);
    pub const DEL: Self = Self(0x7f);

    pub const UP: Self = Self(256);
    pub const DOWN: Self = Self(257);
    pub const LEFT: Self = Self(258);
    pub const RIGHT: Self = Self(259);
    pub const HOME: Self = Self(260);
    pub const END: Self = Self(261);
    pub const PAGE_UP: Self = Self(262);
    pub const PAGE_DOWN: Self = Self(263);
    pub const INSERT: Self = Self(264);
    pub const DELETE: Self = Self(265);
    /// `F1`; `F2`..`F12` follow contiguously.
    pub const F1: Self = Self(266);

    /// One past the largest key code the terminal layer produces.
    pub const LIMIT: u16 = 278;

    /// The control version of an ASCII character: `Key::ctrl(b'x')` is `C-x`.
    ///
    /// `C-?` is DEL, matching what terminals send.
    #[inline]
    #[must_use]
    pub const fn ctrl(c: u8) -> Self {
        if c == b'?' {
            Self::DEL
        } else {
            Self((c & 0x1f) as u16)
        }
    }

    /// Function key `Fn`, 1-based. Returns `None` outside F1–F12.
    #[must_use]
    pub const fn function(n: u8) -> Option<Self> {
        if n >= 1 && n <= 12 {
            Some(Self(Self::F1.0 + n as u16 - 1))
        } else {
            None
        }
    }

    /// Key for a raw byte.
    #[inline]
    #[must_use]
    pub const fn byte(b: u8) -> Self {
        Self(b as u16)
    }

    /// The byte this key stands for, if it is a plain byte key.
    #[inline]
    #[must_use]
    pub const fn as_byte(self) -> Option<u8> {
        if self.0 < 256 {
            Some(self.0 as u8)
        } else {
            None
        }
    }

    /// True for control characters (0x00–0x1f and DEL).
    #[inline]
    #[must_use]
    pub const fn is_ctrl(self) -> bool {
        self.0 < 0x20 || self.0 == 0x7f
    }

    /// True for ASCII `A`–`Z`.
    #[inline]
    #[must_use]
    pub const fn is_upper(self) -> bool {
        self.0 >= b'A' as u16 && self.0 <= b'Z' as u16
    }

    /// ASCII lowercase version of this key; other keys are unchanged.
    #[inline]
    #[must_use]
    pub const fn to_lower(self) -> Self {
        if self.is_upper() {
            Self(self.0 + 32)
        } else {
            self
        }
    }

    /// ASCII digit value, if this is `0`–`9`.
    #[inline]
    #[must_use]
    pub const fn digit(self) -> Option<u8> {
        if self.0 >= b'0' as u16 && self.0 <= b'9' as u16 {
            Some((self.0 - b'0' as u16) as u8)
        } else {
            None
        }
    }
}

const NAMED: &[(Key, &str)] = &[
    (Key::UP, "up"),
    (Key::DOWN, "down"),
    (Key::LEFT, "left"),
    (Key::RIGHT, "right"),
    (Key::HOME, "home"),
    (Key::END, "end"),
    (Key::PAGE_UP, "prior"),
    (Key::PAGE_DOWN, "next"),
    (Key::INSERT, "insert"),
    (Key::DELETE, "delete"),
];

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NUL => f.write_str("C-SPC"),
            Self::TAB => f.write_str("TAB"),
            Self::LFD => f.write_str("LFD"),
            Self::RET => f.write_str("RET"),
            Self::ESC => f.write_str("ESC"),
            Self::SPC => f.write_str("SPC"),
            Self::DEL => f.write_str("DEL"),
            Self(c) if c < 0x20 => write!(f, "C-{}", char::from((c as u8) | 0x60)),
            Self(c) if c < 0x7f => write!(f, "{}", char::from(c as u8)),
            Self(c) if c < 256 => write!(f, "\\{c:o}"),
            Self(c) if (Self::F1.0..Self::LIMIT).contains(&c) => {
                write!(f, "f{}", c - Self::F1.0 + 1)
            }
            key => match NAMED.iter().find(|(k, _)| *k == key) {
                Some((_, name)) => f.write_str(name),
                None => write!(f, "key-{}", key.0),
            },
        }
    }
}

/// Render a key sequence the way the echo line shows it: `C-x C-f`,
/// with `ESC x` folded to `M-x`.
#[must_use]
pub fn describe(keys: &[Key]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < keys.len() {
        if !out.is_empty() {
            out.push(' ');
        }
        if keys[i] == Key::ESC && i + 1 < keys.len() {
            out.push_str("M-");
            out.push_str(&keys[i + 1].to_string());
            i += 2;
        } else {
            out.push_str(&keys[i].to_string());
            i += 1;
        }
    }
    out
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a key sequence as written in startup scripts.
///
/// Two notations are accepted:
///
/// - Named: whitespace-separated tokens like `C-x C-f`, `M-%`, `RET`,
///   `C-M-v`, `f1`, `up`.
/// - Escaped: a run of characters where `\^X` is a control key, `\e` is ESC,
///   `\t`, `\n`, `\r` their usual bytes, `\\` and `\"` literals, and
///   `\NNN` an octal byte.
///
/// Returns `None` for an empty or malformed sequence.
#[must_use]
pub fn parse(spec: &str) -> Option<Vec<Key>> {
    if spec.is_empty() {
        return None;
    }
    if !spec.contains('\\') {
        if let Some(keys) = parse_named(spec) {
            return Some(keys);
        }
    }
    parse_escaped(spec)
}

fn parse_named(spec: &str) -> Option<Vec<Key>> {
    let mut keys = Vec::new();
    for token in spec.split_whitespace() {
        keys.extend(parse_token(token)?);
    }
    if keys.is_empty() { None } else { Some(keys) }
}

fn parse_token(token: &str) -> Option<Vec<Key>> {
    let mut meta = false;
    let mut ctrl = false;
    let mut rest = token;
    loop {
        if rest.len() > 2 && rest.starts_with("C-") {
            ctrl = true;
            rest = &rest[2..];
        } else if rest.len() > 2 && rest.starts_with("M-") {
            meta = true;
            rest = &rest[2..];
        } else {
            break;
        }
    }

    let base = match rest {
        "RET" => Key::RET,
        "TAB" => Key::TAB,
        "ESC" => Key::ESC,
        "SPC" => Key::SPC,
        "DEL" => Key::DEL,
        "LFD" => Key::LFD,
        _ => {
            if let Some((k, _)) = NAMED.iter().find(|(_, n)| *n == rest) {
                *k
            } else if let Some(n) = rest.strip_prefix('f').and_then(|d| d.parse::<u8>().ok()) {
                Key::function(n)?
            } else {
                let mut chars = rest.chars();
                let c = chars.next()?;
                if chars.next().is_some() || !c.is_ascii() {
                    return None;
                }
                Key::byte(c as u8)
            }
        }
    };

    let base = if ctrl {
        match base {
            Key::SPC => Key::NUL,
            Key(c) if c < 128 => Key::ctrl(c as u8),
            _ => return None,
        }
    } else {
        base
    };

    Some(if meta { vec![Key::ESC, base] } else { vec![base] })
}

fn parse_escaped(spec: &str) -> Option<Vec<Key>> {
    let bytes = spec.as_bytes();
    let mut keys = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            keys.push(Key::byte(b));
            i += 1;
            continue;
        }
        let next = *bytes.get(i + 1)?;
        i += 2;
        match next {
            b'^' => {
                let c = *bytes.get(i)?;
                i += 1;
                keys.push(Key::ctrl(c.to_ascii_uppercase()));
            }
            b'e' | b'E' => keys.push(Key::ESC),
            b't' => keys.push(Key::TAB),
            b'n' => keys.push(Key::LFD),
            b'r' => keys.push(Key::RET),
            b'0'..=b'7' => {
                let mut value = u16::from(next - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match bytes.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u16::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                if value > 255 {
                    return None;
                }
                keys.push(Key(value));
            }
            other => keys.push(Key::byte(other)),
        }
    }
    if keys.is_empty() { None } else { Some(keys) }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
