// SPDX-License-Identifier: MIT
//
// Keyboard bytes to key codes.
//
// Turns raw stdin bytes into editor key codes. Plain bytes (control
// characters, ASCII, 8-bit) become byte keys unchanged. The sequences
// terminals send for cursor and function keys become named keys:
//
// - Legacy CSI sequences (arrows, paging keys, F1-F12)
// - SS3 sequences (arrow and F1-F4 encoding in application mode)
//
// ESC followed by anything else is *not* folded into a modifier. It comes
// out as the ESC key followed by whatever came next, which is exactly the
// `M-x` prefix sequence the keymap expects.
//
// The parser keeps a small byte buffer because escape sequences can span
// multiple `read()` calls. After a quiet period with no new bytes, call
// [`Parser::flush`] to emit any pending lone ESC as a real key.

use crate::key::Key;

/// Longest CSI sequence we wait for before giving up on it.
const MAX_SEQUENCE: usize = 32;

// ─── Decoder ─────────────────────────────────────────────────────────────────

/// Key decoder with a carry-over buffer.
///
/// Feed raw bytes via [`advance`](Parser::advance) and collect [`Key`]s.
/// Incomplete sequences stay buffered until more bytes arrive or
/// [`flush`](Parser::flush) resolves them.
pub struct Parser {
    buf: Vec<u8>,
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64),
        }
    }

    /// Feed raw bytes and return every key that can be decoded so far.
    pub fn advance(&mut self, data: &[u8]) -> Vec<Key> {
        self.buf.extend_from_slice(data);
        let mut keys = Vec::new();
        let mut pos = 0;

        while pos < self.buf.len() {
            match try_parse(&self.buf[pos..]) {
                Parsed::Key(key, consumed) => {
                    keys.push(key);
                    pos += consumed;
                }
                Parsed::Incomplete => {
                    if self.buf.len() - pos > MAX_SEQUENCE {
                        keys.push(Key::byte(self.buf[pos]));
                        pos += 1;
                    } else {
                        break;
                    }
                }
                Parsed::Skip(n) => pos += n,
            }
        }

        if pos > 0 {
            self.buf.drain(..pos);
        }
        keys
    }

    /// A partial sequence is waiting for more bytes.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Flush pending bytes as literal byte keys.
    ///
    /// Called after a timeout to resolve the ESC ambiguity: a lone ESC
    /// becomes the ESC key, and a half-received sequence becomes the bytes
    /// that were typed.
    pub fn flush(&mut self) -> Vec<Key> {
        let keys = self.buf.iter().map(|&b| Key::byte(b)).collect();
        self.buf.clear();
        keys
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Sequences ───────────────────────────────────────────────────────────────

/// Result of trying to parse one key from the front of a buffer.
enum Parsed {
    /// Decoded a key, consuming `usize` bytes.
    Key(Key, usize),
    /// Sequence is incomplete; need more bytes.
    Incomplete,
    /// Recognized but unsupported sequence; drop `usize` bytes.
    Skip(usize),
}

fn try_parse(buf: &[u8]) -> Parsed {
    match buf {
        [] => Parsed::Skip(0),
        [0x1b, ..] => parse_escape(buf),
        [b, ..] => Parsed::Key(Key::byte(*b), 1),
    }
}

fn parse_escape(buf: &[u8]) -> Parsed {
    match buf.get(1) {
        None => Parsed::Incomplete,
        Some(b'[') => parse_csi(buf),
        Some(b'O') => parse_ss3(buf),
        // ESC then something ordinary: the ESC stands alone and the next
        // byte is parsed on its own.
        Some(_) => Parsed::Key(Key::ESC, 1),
    }
}

// ── CSI ─────────────────────────────────────────────────────────────────────

fn parse_csi(buf: &[u8]) -> Parsed {
    let mut end = 2;
    while end < buf.len() {
        let b = buf[end];
        if (0x40..=0x7e).contains(&b) {
            break;
        }
        if !(0x20..=0x3f).contains(&b) {
            // Not a CSI after all: ESC and '[' were typed.
            return Parsed::Key(Key::ESC, 1);
        }
        end += 1;
    }
    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let final_byte = buf[end];
    let first = leading_param(&buf[2..end]);
    let consumed = end + 1;

    let key = match final_byte {
        b'~' => match first {
            1 | 7 => Key::HOME,
            2 => Key::INSERT,
            3 => Key::DELETE,
            4 | 8 => Key::END,
            5 => Key::PAGE_UP,
            6 => Key::PAGE_DOWN,
            11..=15 => fkey(first - 10),
            17..=21 => fkey(first - 11),
            23 | 24 => fkey(first - 12),
            _ => return Parsed::Skip(consumed),
        },
        b'A' => Key::UP,
        b'B' => Key::DOWN,
        b'C' => Key::RIGHT,
        b'D' => Key::LEFT,
        b'H' => Key::HOME,
        b'F' => Key::END,
        b'P' => fkey(1),
        b'Q' => fkey(2),
        b'R' => fkey(3),
        b'S' => fkey(4),
        _ => return Parsed::Skip(consumed),
    };
    Parsed::Key(key, consumed)
}

// ── SS3 ─────────────────────────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    let Some(&b) = buf.get(2) else {
        return Parsed::Incomplete;
    };
    let key = match b {
        b'A' => Key::UP,
        b'B' => Key::DOWN,
        b'C' => Key::RIGHT,
        b'D' => Key::LEFT,
        b'H' => Key::HOME,
        b'F' => Key::END,
        b'P' => fkey(1),
        b'Q' => fkey(2),
        b'R' => fkey(3),
        b'S' => fkey(4),
        // ESC O typed by hand.
        _ => return Parsed::Key(Key::ESC, 1),
    };
    Parsed::Key(key, 3)
}

/// First numeric CSI parameter, 0 when absent. Modifier parameters after
/// `;` are ignored: a shifted arrow is still an arrow.
fn leading_param(raw: &[u8]) -> u16 {
    raw.iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u16, |acc, &b| {
            acc.saturating_mul(10).saturating_add(u16::from(b - b'0'))
        })
}

fn fkey(n: u16) -> Key {
    Key(Key::F1.0 + n - 1)
}
