//! Windows: tiled views onto buffers.
//!
//! Windows stack top to bottom and share the screen above the echo line.
//! Each one owns `ntrows` text rows starting at `toprow`, followed by its
//! mode line, so a window occupies `ntrows + 1` screen rows and the windows
//! together cover every row the registry hands out.
//!
//! ```text
//! row 0   ┌ window 1 text      toprow = 0, ntrows = 3
//!         │
//!         │
//!         └ mode line
//!         ┌ window 2 text      toprow = 4, ntrows = 2
//!         │
//!         └ mode line
//!         echo line
//! ```
//!
//! A window holds its own cursor (dot), mark and top line. The buffer keeps
//! a saved copy only while no window shows it.

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::buffer::BufferId;
use crate::error::{Error, Result};
use crate::line::{LineId, Pos};
use crate::registry::Registry;

new_key_type! {
    /// Handle to a window in the registry.
    pub struct WindowId;
}

bitflags! {
    /// What the redisplay engine must do for a window. Commands set the
    /// weakest flag that is still sufficient.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WinFlags: u8 {
        /// Reframe around the `force` row on the next update.
        const FORCE = 1 << 0;
        /// Only the cursor moved.
        const MOVE = 1 << 1;
        /// Only the line in `Window::edited` changed.
        const EDIT = 1 << 2;
        /// Repaint every row.
        const HARD = 1 << 3;
        /// Repaint the mode line.
        const MODE = 1 << 4;
    }
}

/// A view onto a buffer.
#[derive(Debug, Clone)]
pub struct Window {
    pub buffer: BufferId,
    pub dot: Pos,
    pub mark: Option<Pos>,
    /// Buffer line shown on the window's first row.
    pub top: LineId,
    /// First screen row.
    pub toprow: u16,
    /// Number of text rows, mode line excluded. Never below 1.
    pub ntrows: u16,
    /// Reframe target: 0 centers the cursor, `n > 0` puts it on row `n`
    /// counted from 1 at the top, `n < 0` on row `-n` counted from the
    /// bottom.
    pub force: i32,
    pub flags: WinFlags,
    /// The one line an `EDIT` flag refers to.
    pub edited: Option<LineId>,
}

impl Window {
    pub(crate) fn new(buffer: BufferId, dot: Pos, toprow: u16, ntrows: u16) -> Self {
        Self {
            buffer,
            dot,
            mark: None,
            top: dot.line,
            toprow,
            ntrows,
            force: 0,
            flags: WinFlags::HARD | WinFlags::MODE,
            edited: None,
        }
    }

    /// Screen row of the mode line.
    #[inline]
    #[must_use]
    pub const fn mode_row(&self) -> u16 {
        self.toprow + self.ntrows
    }

    /// Mark for a full repaint.
    #[inline]
    pub fn garbage(&mut self) {
        self.flags |= WinFlags::HARD | WinFlags::MODE;
    }
}

impl Registry {
    // -----------------------------------------------------------------------
    // Buffer display
    // -----------------------------------------------------------------------

    /// Show `bid` in window `wid`.
    ///
    /// The previous buffer keeps the window's cursor and mark if this was
    /// its last window. A buffer shown for the first time takes its saved
    /// cursor; one already shown elsewhere takes that window's cursor.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for stale handles.
    pub fn show_buffer(&mut self, wid: WindowId, bid: BufferId) -> Result<()> {
        self.buffer(bid)?;
        let old = self.window(wid)?.buffer;
        if old == bid {
            self.windows[wid].flags |= WinFlags::HARD | WinFlags::MODE;
            return Ok(());
        }

        let (dot, mark) = {
            let w = &self.windows[wid];
            (w.dot, w.mark)
        };
        if let Some(prev) = self.buffers.get_mut(old) {
            prev.nwnd = prev.nwnd.saturating_sub(1);
            if prev.nwnd == 0 {
                prev.dot = dot;
                prev.mark = mark;
            }
        }

        let sibling = self
            .window_order
            .iter()
            .copied()
            .find(|&w| w != wid && self.windows[w].buffer == bid);
        let (dot, mark, top) = match sibling {
            Some(s) => {
                let w = &self.windows[s];
                (w.dot, w.mark, w.top)
            }
            None => {
                let b = &self.buffers[bid];
                (b.dot, b.mark, b.dot.line)
            }
        };
        self.buffers[bid].nwnd += 1;

        let w = &mut self.windows[wid];
        w.buffer = bid;
        w.dot = dot;
        w.mark = mark;
        w.top = top;
        w.force = 0;
        w.flags |= WinFlags::HARD | WinFlags::MODE;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    /// Split the current window in two. The new window appears below,
    /// shows the same buffer at the same position, and the current window
    /// stays current.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if the window has fewer than three text rows.
    pub fn split_window(&mut self) -> Result<WindowId> {
        let cur = self.current;
        let ntrows = self.windows[cur].ntrows;
        if ntrows < 3 {
            return Err(Error::user(format!("Cannot split a {ntrows} line window")));
        }
        self.window_order.try_reserve(1)?;

        let upper = (ntrows - 1) / 2;
        let lower = ntrows - 1 - upper;
        let mut new = self.windows[cur].clone();
        new.toprow = self.windows[cur].toprow + upper + 1;
        new.ntrows = lower;
        new.garbage();
        let bid = new.buffer;

        {
            let w = &mut self.windows[cur];
            w.ntrows = upper;
            w.garbage();
        }
        let id = self.windows.insert(new);
        let at = self.position_of(cur) + 1;
        self.window_order.insert(at, id);
        self.buffers[bid].nwnd += 1;
        log::debug!("split window: {upper} + {lower} rows");
        Ok(id)
    }

    fn position_of(&self, wid: WindowId) -> usize {
        self.window_order
            .iter()
            .position(|&w| w == wid)
            .unwrap_or(0)
    }

    /// Delete a window, giving its rows to the window above (or below, for
    /// the top window).
    ///
    /// # Errors
    ///
    /// [`Error::User`] for the only window, [`Error::Invariant`] for a
    /// stale handle.
    pub fn delete_window(&mut self, wid: WindowId) -> Result<()> {
        self.window(wid)?;
        if self.window_order.len() == 1 {
            return Err(Error::user("Cannot delete the only window"));
        }
        let idx = self.position_of(wid);
        let (receiver, above) = if idx > 0 {
            (self.window_order[idx - 1], true)
        } else {
            (self.window_order[1], false)
        };
        let (toprow, rows) = {
            let w = &self.windows[wid];
            (w.toprow, w.ntrows + 1)
        };
        {
            let r = &mut self.windows[receiver];
            if !above {
                r.toprow = toprow;
            }
            r.ntrows += rows;
            r.garbage();
        }
        self.detach(wid);
        self.windows.remove(wid);
        self.window_order.remove(idx);
        if self.current == wid {
            self.current = receiver;
        }
        log::debug!("deleted window, {} left", self.window_order.len());
        Ok(())
    }

    /// Drop the window's claim on its buffer, saving the cursor into the
    /// buffer if no other window shows it.
    fn detach(&mut self, wid: WindowId) {
        let w = &self.windows[wid];
        let (bid, dot, mark) = (w.buffer, w.dot, w.mark);
        if let Some(b) = self.buffers.get_mut(bid) {
            b.nwnd = b.nwnd.saturating_sub(1);
            if b.nwnd == 0 {
                b.dot = dot;
                b.mark = mark;
            }
        }
    }

    /// Make the current window the only one.
    pub fn delete_other_windows(&mut self) {
        let keep = self.current;
        let others: Vec<WindowId> = self
            .window_order
            .iter()
            .copied()
            .filter(|&w| w != keep)
            .collect();
        for w in others {
            self.detach(w);
            self.windows.remove(w);
        }
        self.window_order = vec![keep];
        let rows = self.rows;
        let w = &mut self.windows[keep];
        w.toprow = 0;
        w.ntrows = rows - 1;
        w.garbage();
    }

    /// Grow the current window by `n` rows (shrink for negative `n`),
    /// trading rows with the window below (or above, for the last window).
    ///
    /// # Errors
    ///
    /// [`Error::User`] with one window, or when either window would drop
    /// below one text row.
    pub fn enlarge_window(&mut self, n: i32) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        if self.window_order.len() == 1 {
            return Err(Error::user("Only one window"));
        }
        let idx = self.position_of(self.current);
        let below = idx + 1 < self.window_order.len();
        let other = if below {
            self.window_order[idx + 1]
        } else {
            self.window_order[idx - 1]
        };
        let cur = self.current;
        let cur_rows = i32::from(self.windows[cur].ntrows) + n;
        let other_rows = i32::from(self.windows[other].ntrows) - n;
        if cur_rows < 1 || other_rows < 1 {
            return Err(Error::user("Impossible change"));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (cur_rows, other_rows) = (cur_rows as u16, other_rows as u16);
        if below {
            let top = self.windows[cur].toprow + cur_rows + 1;
            self.windows[other].toprow = top;
        } else {
            let top = self.windows[other].toprow + other_rows + 1;
            self.windows[cur].toprow = top;
        }
        self.windows[cur].ntrows = cur_rows;
        self.windows[other].ntrows = other_rows;
        self.windows[cur].garbage();
        self.windows[other].garbage();
        Ok(())
    }

    /// Shrink the current window by `n` rows.
    ///
    /// # Errors
    ///
    /// As for [`enlarge_window`](Self::enlarge_window).
    pub fn shrink_window(&mut self, n: i32) -> Result<()> {
        self.enlarge_window(-n)
    }

    /// Move to the next window, wrapping around.
    pub fn next_window(&mut self) {
        let idx = (self.position_of(self.current) + 1) % self.window_order.len();
        self.current = self.window_order[idx];
    }

    /// Move to the previous window, wrapping around.
    pub fn previous_window(&mut self) {
        let len = self.window_order.len();
        let idx = (self.position_of(self.current) + len - 1) % len;
        self.current = self.window_order[idx];
    }

    /// Adapt the layout to a new screen height (echo line included).
    /// Windows that no longer fit are deleted; the last window absorbs the
    /// slack.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if the screen is too small for any window.
    pub fn resize_screen(&mut self, rows: u16) -> Result<()> {
        if rows < 3 {
            return Err(Error::user("Screen too small"));
        }
        let avail = rows - 1;
        let doomed: Vec<WindowId> = self
            .window_order
            .iter()
            .copied()
            .skip(1)
            .filter(|&w| self.windows[w].toprow + 2 > avail)
            .collect();
        for w in doomed {
            self.detach(w);
            self.windows.remove(w);
            self.window_order.retain(|&x| x != w);
            if self.current == w {
                self.current = self.window_order[0];
            }
        }
        self.rows = avail;
        if let Some(&last) = self.window_order.last() {
            let w = &mut self.windows[last];
            w.ntrows = avail - w.toprow - 1;
        }
        for w in self.windows.values_mut() {
            w.garbage();
        }
        Ok(())
    }

    /// Set the current window's reframe target and request reframing.
    pub fn recenter(&mut self, force: i32) {
        let w = self.cur_mut();
        w.force = force;
        w.flags |= WinFlags::FORCE | WinFlags::HARD;
    }
}
