//! Buffers: named rings of lines.
//!
//! A [`Buffer`] owns its lines in an arena and links them into a ring
//! through a sentinel *header* line that holds no text. Walking `next`
//! from the header visits every line in order and comes back to the
//! header. A buffer always has at least one real line; an empty buffer is
//! one empty line.
//!
//! The buffer's text is its lines joined by `\n`. Absolute offsets (used by
//! the undo log) count each line as its length plus one for the newline
//! that separates it from the next.
//!
//! Structural mutation that must keep windows consistent (inserting,
//! deleting, splitting and joining) lives on the registry, which can see
//! every window. The methods here only read, or build text before any
//! window looks at it.

use std::path::PathBuf;

use bitflags::bitflags;
use slotmap::{SlotMap, new_key_type};

use crate::error::{Error, Result};
use crate::line::{Line, LineId, Pos};
use crate::mode::ModeId;
use crate::undo::UndoLog;

new_key_type! {
    /// Handle to a buffer in the registry.
    pub struct BufferId;
}

bitflags! {
    /// Buffer state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BufFlags: u8 {
        /// Modified since last read or write.
        const CHANGED = 1 << 0;
        /// Edits are refused.
        const READ_ONLY = 1 << 1;
        /// Typed characters replace instead of insert.
        const OVERWRITE = 1 << 2;
        /// Tab inserts spaces to the next tab stop.
        const NOTAB = 1 << 3;
    }
}

/// A named ring of lines with its own saved cursor, modes and undo log.
#[derive(Debug)]
pub struct Buffer {
    pub name: String,
    pub file: Option<PathBuf>,
    lines: SlotMap<LineId, Line>,
    header: LineId,
    /// Saved cursor; meaningful while no window shows the buffer.
    pub dot: Pos,
    /// Saved mark; meaningful while no window shows the buffer.
    pub mark: Option<Pos>,
    /// Number of windows displaying the buffer.
    pub nwnd: usize,
    pub flags: BufFlags,
    /// Mode stack; index 0 is always fundamental mode, the last entry is
    /// the topmost.
    pub modes: Vec<ModeId>,
    pub undo: UndoLog,
}

impl Buffer {
    /// A buffer holding one empty line.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the first line cannot be allocated.
    pub fn new(name: &str, undo_pool: usize) -> Result<Self> {
        let mut lines = SlotMap::with_key();
        let header = lines.insert(Line::alloc(b"")?);
        let first = lines.insert(Line::alloc(b"")?);
        lines[header].next = first;
        lines[header].prev = first;
        lines[first].next = header;
        lines[first].prev = header;
        Ok(Self {
            name: name.to_string(),
            file: None,
            lines,
            header,
            dot: Pos::new(first, 0),
            mark: None,
            nwnd: 0,
            flags: BufFlags::empty(),
            modes: vec![ModeId::FUNDAMENTAL],
            undo: UndoLog::new(undo_pool),
        })
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// The sentinel line.
    #[inline]
    #[must_use]
    pub const fn header(&self) -> LineId {
        self.header
    }

    #[inline]
    #[must_use]
    pub fn is_header(&self, id: LineId) -> bool {
        id == self.header
    }

    /// The first real line.
    #[must_use]
    pub fn first_line(&self) -> LineId {
        self.lines[self.header].next
    }

    /// The last real line.
    #[must_use]
    pub fn last_line(&self) -> LineId {
        self.lines[self.header].prev
    }

    /// Look up a line.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a handle to a freed line.
    pub fn line(&self, id: LineId) -> Result<&Line> {
        self.lines
            .get(id)
            .ok_or_else(|| Error::invariant(format!("stale line in buffer {}", self.name)))
    }

    pub(crate) fn line_mut(&mut self, id: LineId) -> Result<&mut Line> {
        let name = &self.name;
        self.lines
            .get_mut(id)
            .ok_or_else(|| Error::invariant(format!("stale line in buffer {name}")))
    }

    /// Whether `id` is a live line of this buffer (the header included).
    #[must_use]
    pub fn contains(&self, id: LineId) -> bool {
        self.lines.contains_key(id)
    }

    /// Text of a line; empty for the header or a stale handle.
    #[must_use]
    pub fn text(&self, id: LineId) -> &[u8] {
        self.lines.get(id).map_or(&[], Line::text)
    }

    /// Length of a line; 0 for the header or a stale handle.
    #[must_use]
    pub fn len_of(&self, id: LineId) -> usize {
        self.lines.get(id).map_or(0, Line::len)
    }

    /// Line after `id` (the header after the last line).
    #[must_use]
    pub fn next(&self, id: LineId) -> LineId {
        self.lines.get(id).map_or(self.header, Line::next)
    }

    /// Line before `id` (the header before the first line).
    #[must_use]
    pub fn prev(&self, id: LineId) -> LineId {
        self.lines.get(id).map_or(self.header, Line::prev)
    }

    /// Iterate over the real lines in order.
    pub fn line_ids(&self) -> impl Iterator<Item = LineId> + '_ {
        let mut id = self.first_line();
        std::iter::from_fn(move || {
            if id == self.header {
                None
            } else {
                let current = id;
                id = self.next(id);
                Some(current)
            }
        })
    }

    /// Number of real lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len() - 1
    }

    /// 1-based line number of `id`.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] if `id` is not a real line of this buffer.
    pub fn line_number(&self, id: LineId) -> Result<usize> {
        self.line_ids()
            .position(|l| l == id)
            .map(|i| i + 1)
            .ok_or_else(|| Error::invariant("line not in buffer"))
    }

    /// The line with 1-based number `n`, clamped to the last line.
    #[must_use]
    pub fn line_at(&self, n: usize) -> LineId {
        self.line_ids()
            .take(n.max(1))
            .last()
            .unwrap_or_else(|| self.first_line())
    }

    /// Start of the buffer.
    #[must_use]
    pub fn start(&self) -> Pos {
        Pos::new(self.first_line(), 0)
    }

    /// End of the buffer.
    #[must_use]
    pub fn end(&self) -> Pos {
        let last = self.last_line();
        Pos::new(last, self.len_of(last))
    }

    // -----------------------------------------------------------------------
    // Absolute offsets
    // -----------------------------------------------------------------------

    /// Absolute offset of `pos` from the start of the buffer.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] if the line is not in the buffer or the offset
    /// is past its end.
    pub fn offset_of(&self, pos: Pos) -> Result<usize> {
        let mut total = 0;
        for id in self.line_ids() {
            if id == pos.line {
                if pos.offset > self.len_of(id) {
                    return Err(Error::invariant("offset past end of line"));
                }
                return Ok(total + pos.offset);
            }
            total += self.len_of(id) + 1;
        }
        Err(Error::invariant("position not in buffer"))
    }

    /// Position at absolute `offset`.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] if `offset` is past the end of the buffer.
    pub fn pos_at(&self, offset: usize) -> Result<Pos> {
        let mut remaining = offset;
        for id in self.line_ids() {
            let len = self.len_of(id);
            if remaining <= len {
                return Ok(Pos::new(id, remaining));
            }
            remaining -= len + 1;
        }
        Err(Error::invariant(format!("offset {offset} past end of buffer")))
    }

    /// Total size in bytes, newlines between lines included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.line_ids().map(|id| self.len_of(id) + 1).sum::<usize>() - 1
    }

    /// The whole text, lines joined by `\n`.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        for (i, id) in self.line_ids().enumerate() {
            if i > 0 {
                out.push(b'\n');
            }
            out.extend_from_slice(self.text(id));
        }
        out
    }

    /// Bytes from `from` (inclusive) to `to` (exclusive), newlines included.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] if either position is not in the buffer.
    pub fn slice(&self, from: Pos, to: Pos) -> Result<Vec<u8>> {
        let a = self.offset_of(from)?;
        let b = self.offset_of(to)?;
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let text = self.contents();
        Ok(text[a..b].to_vec())
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Link a new line holding `text` after `after`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] or [`Error::Invariant`] for a stale `after`.
    pub(crate) fn insert_line_after(&mut self, after: LineId, text: &[u8]) -> Result<LineId> {
        let next = self.line(after)?.next;
        let mut line = Line::alloc(text)?;
        line.prev = after;
        line.next = next;
        let id = self.lines.insert(line);
        self.lines[after].next = id;
        self.lines[next].prev = id;
        Ok(id)
    }

    /// Unlink and free a real line, returning its successor.
    pub(crate) fn free_line(&mut self, id: LineId) -> Result<LineId> {
        if id == self.header {
            return Err(Error::invariant("attempt to free the header line"));
        }
        let line = self
            .lines
            .remove(id)
            .ok_or_else(|| Error::invariant("free of a stale line"))?;
        self.lines[line.prev].next = line.next;
        self.lines[line.next].prev = line.prev;
        Ok(line.next)
    }

    /// Replace the whole text with `lines`, leaving at least one line.
    /// Only for buffers no window depends on, or whose windows the caller
    /// resets afterwards.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`]; the old text is kept on failure.
    pub(crate) fn reset_lines<I, T>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut fresh: SlotMap<LineId, Line> = SlotMap::with_key();
        let header = fresh.insert(Line::alloc(b"")?);
        let mut last = header;
        for text in lines {
            let mut line = Line::alloc(text.as_ref())?;
            line.prev = last;
            line.next = header;
            let id = fresh.insert(line);
            fresh[last].next = id;
            last = id;
        }
        if last == header {
            let mut line = Line::alloc(b"")?;
            line.prev = header;
            line.next = header;
            let id = fresh.insert(line);
            fresh[header].next = id;
            last = id;
        }
        fresh[header].prev = last;
        self.lines = fresh;
        self.header = header;
        let first = self.first_line();
        self.dot = Pos::new(first, 0);
        self.mark = None;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        self.flags.contains(BufFlags::CHANGED)
    }

    #[inline]
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.flags.contains(BufFlags::READ_ONLY)
    }

    /// Error unless the buffer accepts edits.
    ///
    /// # Errors
    ///
    /// [`Error::User`] for a read-only buffer.
    pub fn check_writable(&self) -> Result<()> {
        if self.is_read_only() {
            Err(Error::user("Buffer is read only"))
        } else {
            Ok(())
        }
    }

    /// Whether `pos` refers to a live line and a valid offset.
    #[must_use]
    pub fn is_valid(&self, pos: Pos) -> bool {
        pos.line != self.header
            && self
                .lines
                .get(pos.line)
                .is_some_and(|l| pos.offset <= l.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffer_with(lines: &[&str]) -> Buffer {
        let mut b = Buffer::new("test", 8).unwrap();
        b.reset_lines(lines.iter().map(|s| s.as_bytes())).unwrap();
        b
    }

    // ── Construction ────────────────────────────────────────────────────

    #[test]
    fn new_buffer_has_one_empty_line() {
        let b = Buffer::new("scratch", 8).unwrap();
        assert_eq!(b.line_count(), 1);
        assert_eq!(b.first_line(), b.last_line());
        assert_eq!(b.contents(), b"");
        assert_eq!(b.dot, b.start());
        assert_eq!(b.modes, vec![ModeId::FUNDAMENTAL]);
    }

    #[test]
    fn ring_links_through_header() {
        let b = buffer_with(&["a", "b", "c"]);
        let header = b.header();
        assert_eq!(b.next(b.last_line()), header);
        assert_eq!(b.prev(b.first_line()), header);
        assert_eq!(b.next(header), b.first_line());
        let texts: Vec<&[u8]> = b.line_ids().map(|id| b.text(id)).collect();
        assert_eq!(texts, vec![&b"a"[..], b"b", b"c"]);
    }

    #[test]
    fn reset_with_nothing_leaves_one_line() {
        let b = buffer_with(&[]);
        assert_eq!(b.line_count(), 1);
        assert_eq!(b.contents(), b"");
    }

    // ── Offsets ─────────────────────────────────────────────────────────

    #[test]
    fn offsets_count_newlines() {
        let b = buffer_with(&["ab", "", "cde"]);
        let third = b.line_at(3);
        assert_eq!(b.offset_of(Pos::new(third, 1)).unwrap(), 5);
        assert_eq!(b.pos_at(5).unwrap(), Pos::new(third, 1));
        assert_eq!(b.pos_at(3).unwrap(), Pos::new(b.line_at(2), 0));
        assert_eq!(b.pos_at(2).unwrap(), Pos::new(b.first_line(), 2));
        assert_eq!(b.size(), 7);
    }

    #[test]
    fn pos_at_past_end_is_invariant_error() {
        let b = buffer_with(&["ab"]);
        assert!(b.pos_at(2).is_ok());
        assert!(matches!(b.pos_at(3), Err(Error::Invariant(_))));
    }

    #[test]
    fn offset_of_bad_position_is_invariant_error() {
        let b = buffer_with(&["ab"]);
        let pos = Pos::new(b.first_line(), 3);
        assert!(matches!(b.offset_of(pos), Err(Error::Invariant(_))));
    }

    #[test]
    fn slice_spans_lines() {
        let b = buffer_with(&["hello", "world"]);
        let from = Pos::new(b.first_line(), 3);
        let to = Pos::new(b.last_line(), 2);
        assert_eq!(b.slice(from, to).unwrap(), b"lo\nwo");
        assert_eq!(b.slice(to, from).unwrap(), b"lo\nwo");
    }

    // ── Structure ───────────────────────────────────────────────────────

    #[test]
    fn free_line_invalidates_handle() {
        let mut b = buffer_with(&["a", "b"]);
        let second = b.last_line();
        b.free_line(second).unwrap();
        assert!(!b.contains(second));
        assert!(matches!(b.line(second), Err(Error::Invariant(_))));
        assert_eq!(b.contents(), b"a");
    }

    #[test]
    fn header_cannot_be_freed() {
        let mut b = buffer_with(&["a"]);
        let header = b.header();
        assert!(b.free_line(header).is_err());
    }

    #[test]
    fn line_numbers_round_trip() {
        let b = buffer_with(&["a", "b", "c"]);
        for n in 1..=3 {
            assert_eq!(b.line_number(b.line_at(n)).unwrap(), n);
        }
        assert_eq!(b.line_at(99), b.last_line());
        assert_eq!(b.line_at(0), b.first_line());
    }

    #[test]
    fn read_only_check() {
        let mut b = buffer_with(&["a"]);
        assert!(b.check_writable().is_ok());
        b.flags.insert(BufFlags::READ_ONLY);
        assert_eq!(
            b.check_writable(),
            Err(Error::user("Buffer is read only"))
        );
    }
}
