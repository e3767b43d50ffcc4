//! Text mutation with position fixups.
//!
//! Every change to a buffer's text goes through the methods here. Each one
//! checks that the buffer is writable, performs the change, logs it in the
//! buffer's undo log and then rewrites every position that pointed into
//! the affected lines: the dot and mark of every window on the buffer, the
//! window's top line and the buffer's own saved dot and mark.
//!
//! The rules:
//!
//! - inserting `n` bytes at `o` moves positions after `o` right by `n`
//! - splitting a line at `o` moves positions at or after `o` to the new
//!   line, offset reduced by `o`
//! - deleting a span pulls positions inside it to its start and shifts
//!   positions after it left
//! - joining a line onto its predecessor moves positions on it to the
//!   predecessor, offset increased by the predecessor's old length; a
//!   window whose top line disappears takes the predecessor as top
//!
//! Positions are never left past the end of their line.

use crate::buffer::{BufFlags, BufferId};
use crate::error::{Error, Result};
use crate::line::{LineId, Pos};
use crate::registry::Registry;
use crate::undo::{UndoKind, UndoRecord};
use crate::window::WinFlags;

/// Capitalization pattern inferred from replaced text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Lower,
    Capitalized,
    Upper,
}

impl Case {
    fn infer(text: &[u8]) -> Self {
        let mut letters = text.iter().filter(|b| b.is_ascii_alphabetic());
        let Some(first) = letters.next() else {
            return Self::Lower;
        };
        if !first.is_ascii_uppercase() {
            return Self::Lower;
        }
        let rest: Vec<&u8> = letters.collect();
        if !rest.is_empty() && rest.iter().all(|b| b.is_ascii_uppercase()) {
            Self::Upper
        } else {
            Self::Capitalized
        }
    }

    fn apply(self, text: &[u8]) -> Vec<u8> {
        match self {
            Self::Lower => text.to_vec(),
            Self::Upper => text.to_ascii_uppercase(),
            Self::Capitalized => {
                let mut out = text.to_vec();
                if let Some(b) = out.iter_mut().find(|b| b.is_ascii_alphabetic()) {
                    b.make_ascii_uppercase();
                }
                out
            }
        }
    }
}

impl Registry {
    // -----------------------------------------------------------------------
    // Fixup helpers
    // -----------------------------------------------------------------------

    /// Apply `f` to every stored position into buffer `bid`.
    fn fix_positions(&mut self, bid: BufferId, mut f: impl FnMut(&mut Pos)) {
        for w in self.windows.values_mut().filter(|w| w.buffer == bid) {
            f(&mut w.dot);
            if let Some(m) = w.mark.as_mut() {
                f(m);
            }
        }
        if let Some(b) = self.buffers.get_mut(bid) {
            f(&mut b.dot);
            if let Some(m) = b.mark.as_mut() {
                f(m);
            }
        }
    }

    /// Record that `line` of buffer `bid` changed. The current window gets
    /// `EDIT` while every change since the last update is confined to one
    /// line; any other change, and any other window, repaints.
    fn touch(&mut self, bid: BufferId, line: LineId, hard: bool) {
        let Some(b) = self.buffers.get_mut(bid) else {
            return;
        };
        let first = !b.flags.contains(BufFlags::CHANGED);
        b.flags |= BufFlags::CHANGED;
        let current = self.current;
        for (id, w) in &mut self.windows {
            if w.buffer != bid {
                continue;
            }
            let one_line = id == current
                && !hard
                && !w.flags.contains(WinFlags::HARD)
                && w.edited.is_none_or(|l| l == line);
            if one_line {
                w.flags |= WinFlags::EDIT;
                w.edited = Some(line);
            } else {
                w.flags |= WinFlags::HARD;
                w.edited = None;
            }
            if first {
                w.flags |= WinFlags::MODE;
            }
        }
    }

    fn checked(&self, bid: BufferId, at: Pos) -> Result<()> {
        let b = self.buffer(bid)?;
        b.check_writable()?;
        if !b.is_valid(at) {
            return Err(Error::invariant(format!(
                "edit at a stale position in buffer {}",
                b.name
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    /// Insert `bytes` (no newlines) at `at`, returning the position just
    /// after them.
    ///
    /// # Errors
    ///
    /// [`Error::User`] for a read-only buffer, [`Error::OutOfMemory`], or
    /// [`Error::Invariant`] for a stale position.
    pub fn insert_bytes(&mut self, bid: BufferId, at: Pos, bytes: &[u8]) -> Result<Pos> {
        self.checked(bid, at)?;
        if bytes.is_empty() {
            return Ok(at);
        }
        let offset = self.buffers[bid].offset_of(at)?;
        self.buffers[bid].line_mut(at.line)?.insert(at.offset, bytes)?;
        self.buffers[bid].undo.add_insert(offset, bytes.len());

        let n = bytes.len();
        self.fix_positions(bid, |p| {
            if p.line == at.line && p.offset > at.offset {
                p.offset += n;
            }
        });
        self.touch(bid, at.line, false);
        Ok(Pos::new(at.line, at.offset + n))
    }

    /// Insert `n` copies of `byte` at `at`.
    ///
    /// # Errors
    ///
    /// As for [`insert_bytes`](Self::insert_bytes).
    pub fn insert_repeated(&mut self, bid: BufferId, at: Pos, n: usize, byte: u8) -> Result<Pos> {
        if byte == b'\n' {
            let mut pos = at;
            for _ in 0..n {
                pos = self.newline(bid, pos)?;
            }
            return Ok(pos);
        }
        let mut run = Vec::new();
        run.try_reserve_exact(n)?;
        run.resize(n, byte);
        self.insert_bytes(bid, at, &run)
    }

    /// Split the line at `at`, returning the start of the new line.
    ///
    /// # Errors
    ///
    /// As for [`insert_bytes`](Self::insert_bytes).
    pub fn newline(&mut self, bid: BufferId, at: Pos) -> Result<Pos> {
        self.checked(bid, at)?;
        let offset = self.buffers[bid].offset_of(at)?;
        let buffer = &mut self.buffers[bid];
        let tail = buffer.line(at.line)?.text()[at.offset..].to_vec();
        let new = buffer.insert_line_after(at.line, &tail)?;
        buffer.line_mut(at.line)?.split_off(at.offset);
        buffer.undo.add_insert(offset, 1);

        let split = at.offset;
        self.fix_positions(bid, |p| {
            if p.line == at.line && p.offset >= split {
                *p = Pos::new(new, p.offset - split);
            }
        });
        self.touch(bid, at.line, true);
        Ok(Pos::new(new, 0))
    }

    /// Insert text that may contain newlines, returning the position after
    /// it.
    ///
    /// # Errors
    ///
    /// As for [`insert_bytes`](Self::insert_bytes). Text inserted before a
    /// failure stays.
    pub fn insert_text(&mut self, bid: BufferId, at: Pos, text: &[u8]) -> Result<Pos> {
        let mut pos = at;
        for (i, piece) in text.split(|&b| b == b'\n').enumerate() {
            if i > 0 {
                pos = self.newline(bid, pos)?;
            }
            pos = self.insert_bytes(bid, pos, piece)?;
        }
        Ok(pos)
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Delete up to `n` bytes forward from `at` (a newline counts as one),
    /// returning the deleted text. Deletion stops at the end of the buffer.
    ///
    /// # Errors
    ///
    /// As for [`insert_bytes`](Self::insert_bytes).
    pub fn delete(&mut self, bid: BufferId, at: Pos, n: usize) -> Result<Vec<u8>> {
        self.checked(bid, at)?;
        let offset = self.buffers[bid].offset_of(at)?;
        let mut gone = Vec::new();
        let mut left = n;
        let mut joined = false;

        while left > 0 {
            let len = self.buffers[bid].len_of(at.line);
            let chunk = left.min(len - at.offset);
            if chunk > 0 {
                let bytes = self.buffers[bid].line_mut(at.line)?.remove(at.offset, chunk);
                gone.extend_from_slice(&bytes);
                left -= chunk;
                let (start, end) = (at.offset, at.offset + chunk);
                self.fix_positions(bid, |p| {
                    if p.line == at.line && p.offset > start {
                        p.offset = if p.offset <= end { start } else { p.offset - chunk };
                    }
                });
            }
            if left == 0 {
                break;
            }
            let next = self.buffers[bid].next(at.line);
            if self.buffers[bid].is_header(next) {
                break;
            }
            self.join(bid, at.line, next)?;
            gone.push(b'\n');
            left -= 1;
            joined = true;
        }

        if !gone.is_empty() {
            self.buffers[bid].undo.add_delete(offset, &gone);
            self.touch(bid, at.line, joined);
        }
        Ok(gone)
    }

    /// Append line `next` to `line` and free it.
    fn join(&mut self, bid: BufferId, line: LineId, next: LineId) -> Result<()> {
        let buffer = &mut self.buffers[bid];
        let base = buffer.len_of(line);
        let text = buffer.line(next)?.text().to_vec();
        buffer.line_mut(line)?.append(&text)?;
        buffer.free_line(next)?;

        self.fix_positions(bid, |p| {
            if p.line == next {
                *p = Pos::new(line, p.offset + base);
            }
        });
        for w in self.windows.values_mut().filter(|w| w.buffer == bid) {
            if w.top == next {
                w.top = line;
            }
        }
        Ok(())
    }

    /// Delete up to `n` bytes ending at `at`, returning the deleted text and
    /// the position where it started.
    ///
    /// # Errors
    ///
    /// As for [`delete`](Self::delete).
    pub fn delete_backward(&mut self, bid: BufferId, at: Pos, n: usize) -> Result<(Pos, Vec<u8>)> {
        self.checked(bid, at)?;
        let offset = self.buffers[bid].offset_of(at)?;
        let start = offset.saturating_sub(n);
        let from = self.buffers[bid].pos_at(start)?;
        let gone = self.delete(bid, from, offset - start)?;
        Ok((from, gone))
    }

    // -----------------------------------------------------------------------
    // Replacement
    // -----------------------------------------------------------------------

    /// Replace `plen` bytes at `at` with `new`, returning the position after
    /// the replacement. With `case_adjust`, the capitalization of the old
    /// text (all caps, capitalized, lower) is carried over to the new.
    ///
    /// # Errors
    ///
    /// As for [`insert_bytes`](Self::insert_bytes).
    pub fn replace(
        &mut self,
        bid: BufferId,
        at: Pos,
        plen: usize,
        new: &[u8],
        case_adjust: bool,
    ) -> Result<Pos> {
        self.checked(bid, at)?;
        let offset = self.buffers[bid].offset_of(at)?;
        let old = {
            let b = &self.buffers[bid];
            let end = b.pos_at((offset + plen).min(b.size()))?;
            b.slice(at, end)?
        };
        let text = if case_adjust {
            Case::infer(&old).apply(new)
        } else {
            new.to_vec()
        };

        let was = self.buffers[bid].undo.set_suspended(true);
        let result = self
            .delete(bid, at, old.len())
            .and_then(|_| self.insert_text(bid, at, &text));
        self.buffers[bid].undo.set_suspended(was);
        let end = result?;
        self.buffers[bid].undo.add_change(offset, text.len(), &old);
        Ok(end)
    }

    // -----------------------------------------------------------------------
    // Undo
    // -----------------------------------------------------------------------

    /// Undo the last `n` user actions in buffer `bid`, returning where the
    /// cursor belongs: the start of the last region restored.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if there is nothing to undo, or
    /// [`Error::Invariant`] if a record no longer fits the text.
    pub fn undo(&mut self, bid: BufferId, n: usize) -> Result<Pos> {
        let mut dot = None;
        for _ in 0..n.max(1) {
            let action = self.buffer_mut(bid)?.undo.pop_action();
            if action.is_empty() {
                break;
            }
            let was = self.buffers[bid].undo.set_suspended(true);
            let result = self.replay(bid, &action);
            self.buffers[bid].undo.set_suspended(was);
            self.buffers[bid].undo.release(action);
            dot = Some(result?);
        }
        dot.ok_or_else(|| Error::user("No further undo information"))
    }

    fn replay(&mut self, bid: BufferId, action: &[UndoRecord]) -> Result<Pos> {
        let mut dot = self.buffer(bid)?.start();
        for r in action {
            let at = self.buffers[bid].pos_at(r.offset)?;
            match r.kind {
                UndoKind::Insert => {
                    self.delete(bid, at, r.size)?;
                }
                UndoKind::Delete => {
                    self.insert_text(bid, at, &r.content)?;
                }
                UndoKind::Change => {
                    self.delete(bid, at, r.size)?;
                    self.insert_text(bid, at, &r.content)?;
                }
                UndoKind::Boundary => continue,
            }
            dot = self.buffers[bid].pos_at(r.offset)?;
        }
        Ok(dot)
    }

    /// Close the current user action in buffer `bid`'s undo log.
    pub fn undo_boundary(&mut self, bid: BufferId) {
        if let Some(b) = self.buffers.get_mut(bid) {
            b.undo.add_boundary();
        }
    }

    // -----------------------------------------------------------------------
    // Conveniences at the cursor
    // -----------------------------------------------------------------------

    /// Insert text at the current window's cursor and move past it.
    ///
    /// # Errors
    ///
    /// As for [`insert_text`](Self::insert_text).
    pub fn insert_at_dot(&mut self, text: &[u8]) -> Result<()> {
        let (bid, dot) = (self.current_buffer(), self.cur().dot);
        let pos = self.insert_text(bid, dot, text)?;
        self.cur_mut().dot = pos;
        Ok(())
    }

    /// Delete `n` bytes forward from the current window's cursor.
    ///
    /// # Errors
    ///
    /// As for [`delete`](Self::delete).
    pub fn delete_at_dot(&mut self, n: usize) -> Result<Vec<u8>> {
        let (bid, dot) = (self.current_buffer(), self.cur().dot);
        self.delete(bid, dot, n)
    }
}
