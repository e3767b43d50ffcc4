//! Lines: the unit of text storage.
//!
//! A buffer's text is a doubly linked ring of [`Line`]s living in a
//! per-buffer arena. Links are [`LineId`] handles rather than pointers, so a
//! handle to a line that has since been freed is detected (the arena lookup
//! fails) instead of reading freed memory.
//!
//! Storage grows in [`NBLOCK`]-byte steps so that typing into a line
//! reallocates only every few characters. All growth goes through
//! `try_reserve`, which turns allocation failure into
//! [`Error::OutOfMemory`] with the line left as it was.

use slotmap::new_key_type;

use crate::error::{Error, Result};

new_key_type! {
    /// Handle to a line in a buffer's arena.
    pub struct LineId;
}

/// Line capacity is rounded up to a multiple of this.
pub const NBLOCK: usize = 16;

/// A position in a buffer: a line and a byte offset into it.
///
/// The offset may equal the line length (end of line) but never exceed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    pub line: LineId,
    pub offset: usize,
}

impl Pos {
    #[inline]
    #[must_use]
    pub const fn new(line: LineId, offset: usize) -> Self {
        Self { line, offset }
    }
}

/// One line of text without its terminating newline.
#[derive(Debug, Clone)]
pub struct Line {
    text: Vec<u8>,
    pub(crate) prev: LineId,
    pub(crate) next: LineId,
}

impl Line {
    /// An unlinked line holding `text`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the storage cannot be allocated.
    pub fn alloc(text: &[u8]) -> Result<Self> {
        let mut storage = Vec::new();
        storage.try_reserve_exact(round_up(text.len()))?;
        storage.extend_from_slice(text);
        Ok(Self {
            text: storage,
            prev: LineId::default(),
            next: LineId::default(),
        })
    }

    /// The line's bytes.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Number of bytes in use.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Allocated capacity; always at least `len()`.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    /// Next line in the ring (the header after the last line).
    #[inline]
    #[must_use]
    pub const fn next(&self) -> LineId {
        self.next
    }

    /// Previous line in the ring (the header before the first line).
    #[inline]
    #[must_use]
    pub const fn prev(&self) -> LineId {
        self.prev
    }

    /// Make room for `extra` more bytes, rounding the new capacity up to a
    /// whole number of blocks.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`]; the line is unchanged.
    pub fn grow(&mut self, extra: usize) -> Result<()> {
        let need = self.text.len().checked_add(extra).ok_or(Error::OutOfMemory)?;
        if need > self.text.capacity() {
            let target = round_up(need);
            self.text.try_reserve_exact(target - self.text.len())?;
        }
        Ok(())
    }

    /// Insert `bytes` at `offset`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the line cannot grow, or
    /// [`Error::Invariant`] if `offset` is past the end.
    pub fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        if offset > self.text.len() {
            return Err(Error::invariant("insert past end of line"));
        }
        self.grow(bytes.len())?;
        self.text.splice(offset..offset, bytes.iter().copied());
        Ok(())
    }

    /// Insert `n` copies of `byte` at `offset`.
    ///
    /// # Errors
    ///
    /// As for [`insert`](Self::insert).
    pub fn insert_repeated(&mut self, offset: usize, n: usize, byte: u8) -> Result<()> {
        if offset > self.text.len() {
            return Err(Error::invariant("insert past end of line"));
        }
        self.grow(n)?;
        self.text
            .splice(offset..offset, std::iter::repeat_n(byte, n));
        Ok(())
    }

    /// Remove up to `n` bytes at `offset`, returning them.
    pub fn remove(&mut self, offset: usize, n: usize) -> Vec<u8> {
        let start = offset.min(self.text.len());
        let end = start.saturating_add(n).min(self.text.len());
        self.text.drain(start..end).collect()
    }

    /// Cut the line at `offset`, returning the tail.
    pub fn split_off(&mut self, offset: usize) -> Vec<u8> {
        self.text.split_off(offset.min(self.text.len()))
    }

    /// Append bytes to the end of the line.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`]; the line is unchanged.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.grow(bytes.len())?;
        self.text.extend_from_slice(bytes);
        Ok(())
    }

    /// Replace the whole contents.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`]; the line is unchanged.
    pub fn set_text(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.text.capacity() {
            self.grow(bytes.len() - self.text.len().min(bytes.len()))?;
        }
        self.text.clear();
        self.text.extend_from_slice(bytes);
        Ok(())
    }
}

const fn round_up(n: usize) -> usize {
    if n == 0 { NBLOCK } else { n.div_ceil(NBLOCK) * NBLOCK }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_rounds_capacity_to_blocks() {
        let line = Line::alloc(b"hello").unwrap();
        assert_eq!(line.text(), b"hello");
        assert_eq!(line.capacity() % NBLOCK, 0);
        assert!(line.capacity() >= 5);
        assert!(Line::alloc(b"").unwrap().capacity() >= NBLOCK);
    }

    #[test]
    fn repeated_appends_amortize() {
        let mut line = Line::alloc(b"").unwrap();
        let mut reallocs = 0;
        let mut cap = line.capacity();
        for _ in 0..64 {
            line.append(b"x").unwrap();
            if line.capacity() != cap {
                reallocs += 1;
                cap = line.capacity();
            }
        }
        assert!(reallocs <= 64 / NBLOCK);
        assert_eq!(line.len(), 64);
    }

    #[test]
    fn insert_and_remove_keep_counts() {
        let mut line = Line::alloc(b"hello world").unwrap();
        line.insert(5, b",").unwrap();
        assert_eq!(line.text(), b"hello, world");
        line.insert_repeated(0, 2, b'>').unwrap();
        assert_eq!(line.text(), b">>hello, world");
        let gone = line.remove(2, 7);
        assert_eq!(gone, b"hello, ");
        assert_eq!(line.text(), b">>world");
        assert_eq!(line.len(), 11 + 1 + 2 - 7);
    }

    #[test]
    fn remove_clamps_to_line() {
        let mut line = Line::alloc(b"abc").unwrap();
        assert_eq!(line.remove(1, 100), b"bc");
        assert_eq!(line.remove(9, 1), b"");
        assert_eq!(line.text(), b"a");
    }

    #[test]
    fn insert_past_end_is_invariant_error() {
        let mut line = Line::alloc(b"abc").unwrap();
        assert!(matches!(line.insert(4, b"x"), Err(Error::Invariant(_))));
        assert_eq!(line.text(), b"abc");
    }

    #[test]
    fn split_off_returns_tail() {
        let mut line = Line::alloc(b"head|tail").unwrap();
        let tail = line.split_off(5);
        assert_eq!(line.text(), b"head|");
        assert_eq!(tail, b"tail");
    }

    #[test]
    fn set_text_replaces() {
        let mut line = Line::alloc(b"short").unwrap();
        line.set_text(b"a much longer replacement line").unwrap();
        assert_eq!(line.text(), b"a much longer replacement line");
        line.set_text(b"").unwrap();
        assert!(line.is_empty());
    }
}
