// SPDX-License-Identifier: MIT
//
// The terminal driver interface.
//
// The redisplay engine and the dispatcher never touch stdin or stdout
// directly. They talk to a `Tty`: a small set of primitive operations
// (move, put, erase, insert/delete lines, color) plus key input. The real
// implementation is `AnsiTty`; tests run against `Headless`, an in-memory
// screen that records exactly what was drawn.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;

use crate::key::Key;

// ─── Types ──────────────────────────────────────────────────────────────────

/// One unit of input from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A key code.
    Key(Key),
    /// The terminal changed size; query [`Tty::size`] for the new one.
    Resize,
}

/// Display color selected for subsequent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Normal buffer text.
    #[default]
    Text,
    /// Mode line (reverse video).
    Mode,
}

bitflags! {
    /// Optional terminal capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Caps: u8 {
        /// Hardware line insert and delete inside a region.
        const INSERT_DELETE = 1 << 0;
        /// Settable scroll region.
        const SCROLL_REGION = 1 << 1;
    }
}

/// Approximate output cost, in bytes, of the line operations.
///
/// The redisplay optimizer weighs these against the cost of redrawing
/// rows character by character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Costs {
    /// Inserting one line.
    pub insert_line: u32,
    /// Deleting one line.
    pub delete_line: u32,
    /// Clearing to end of line.
    pub erase_eol: u32,
}

impl Default for Costs {
    fn default() -> Self {
        Self {
            insert_line: 10,
            delete_line: 10,
            erase_eol: 3,
        }
    }
}

/// Screen size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows, including the echo line.
    pub rows: u16,
}

// ─── CancelToken ────────────────────────────────────────────────────────────

/// Shared "the user pressed C-g" flag.
///
/// The input side sets it the moment the keyboard interrupt arrives, even
/// while a long command is running. Long-running loops poll
/// [`is_set`](Self::is_set) and stop early; the dispatcher clears it before
/// each command.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    #[inline]
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear the request, returning whether it was set.
    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

// ─── Tty ────────────────────────────────────────────────────────────────────

/// Terminal driver operations.
///
/// Row and column coordinates are 0-based. Output may be buffered until
/// [`flush`](Self::flush).
pub trait Tty {
    /// Current screen size.
    fn size(&self) -> Size;

    /// Block until the next key or resize.
    ///
    /// # Errors
    ///
    /// Returns an error if the input side is closed.
    fn read_input(&mut self) -> io::Result<Input>;

    /// Whether input is already waiting, so redisplay can be deferred.
    fn typeahead(&mut self) -> bool;

    /// Move the cursor to `(row, col)`.
    fn move_to(&mut self, row: u16, col: u16);

    /// Write one byte at the cursor, advancing it.
    fn put(&mut self, byte: u8);

    /// Clear from the cursor to the end of its line.
    fn erase_eol(&mut self);

    /// Clear from the cursor to the end of the screen.
    fn erase_eop(&mut self);

    /// Select the color for subsequent output and erases.
    fn set_color(&mut self, color: Color);

    /// Insert `n` blank lines at `row`, pushing rows `row..=bot` down.
    /// Rows pushed past `bot` are lost; rows below `bot` do not move.
    fn insert_lines(&mut self, row: u16, bot: u16, n: u16);

    /// Delete `n` lines at `row`, pulling rows up from below within
    /// `row..=bot`. Blank lines appear at `bot`.
    fn delete_lines(&mut self, row: u16, bot: u16, n: u16);

    /// Optional capabilities.
    fn caps(&self) -> Caps;

    /// Cost model for line operations.
    fn costs(&self) -> Costs {
        Costs::default()
    }

    /// Ring the bell (or flash, when `visible`).
    fn beep(&mut self, visible: bool);

    /// Push buffered output to the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn flush(&mut self) -> io::Result<()>;

    /// The token the input side sets on C-g.
    fn cancel_token(&self) -> CancelToken;

    /// Stop the editor process (job control). Returns after resume.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be restored.
    fn suspend(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
