//! The registry: every buffer and window in one place.
//!
//! Lines are shared between a buffer and every window that shows it (as
//! the cursor, the mark, the top-of-window line) and with the buffer's own
//! saved cursor. When a line is split, joined or freed, all of those
//! references must be rewritten together. The registry is the object that
//! can see them all, so every text mutation goes through it (see the
//! `edit` module) rather than through the buffer alone.
//!
//! Tests build isolated registries; nothing here is global.

use slotmap::SlotMap;

use crate::buffer::{BufFlags, Buffer, BufferId};
use crate::error::{Error, Result};
use crate::line::Pos;
use crate::undo::DEFAULT_POOL;
use crate::window::{WinFlags, Window, WindowId};

/// Name of the buffer that always exists.
pub const SCRATCH: &str = "*scratch*";

/// Owner of all buffers and windows.
#[derive(Debug)]
pub struct Registry {
    pub(crate) buffers: SlotMap<BufferId, Buffer>,
    pub(crate) buffer_order: Vec<BufferId>,
    pub(crate) windows: SlotMap<WindowId, Window>,
    pub(crate) window_order: Vec<WindowId>,
    pub(crate) current: WindowId,
    /// Screen rows available to windows (mode lines included, echo line
    /// excluded).
    pub(crate) rows: u16,
    undo_enabled: bool,
    undo_pool: usize,
}

impl Registry {
    /// A registry with one `*scratch*` buffer shown in one window filling
    /// a `rows`-row screen (the last row being the echo line).
    ///
    /// # Errors
    ///
    /// [`Error::User`] if the screen is too small for a window, or
    /// [`Error::OutOfMemory`].
    pub fn new(rows: u16) -> Result<Self> {
        if rows < 3 {
            return Err(Error::user("Screen too small"));
        }
        let mut buffers = SlotMap::with_key();
        let scratch = buffers.insert(Buffer::new(SCRATCH, DEFAULT_POOL)?);
        let dot = buffers[scratch].dot;
        buffers[scratch].nwnd = 1;

        let mut windows = SlotMap::with_key();
        let wid = windows.insert(Window::new(scratch, dot, 0, rows - 2));

        Ok(Self {
            buffers,
            buffer_order: vec![scratch],
            windows,
            window_order: vec![wid],
            current: wid,
            rows: rows - 1,
            undo_enabled: true,
            undo_pool: DEFAULT_POOL,
        })
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    /// Look up a buffer.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a killed buffer.
    pub fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers
            .get(id)
            .ok_or_else(|| Error::invariant("stale buffer handle"))
    }

    /// Look up a buffer for writing.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a killed buffer.
    pub fn buffer_mut(&mut self, id: BufferId) -> Result<&mut Buffer> {
        self.buffers
            .get_mut(id)
            .ok_or_else(|| Error::invariant("stale buffer handle"))
    }

    /// Look up a window.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a deleted window.
    pub fn window(&self, id: WindowId) -> Result<&Window> {
        self.windows
            .get(id)
            .ok_or_else(|| Error::invariant("stale window handle"))
    }

    /// Look up a window for writing.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a deleted window.
    pub fn window_mut(&mut self, id: WindowId) -> Result<&mut Window> {
        self.windows
            .get_mut(id)
            .ok_or_else(|| Error::invariant("stale window handle"))
    }

    /// The current window.
    #[must_use]
    pub fn cur(&self) -> &Window {
        &self.windows[self.current]
    }

    /// The current window, for writing.
    pub fn cur_mut(&mut self) -> &mut Window {
        &mut self.windows[self.current]
    }

    #[must_use]
    pub const fn current_window(&self) -> WindowId {
        self.current
    }

    /// Buffer shown in the current window.
    #[must_use]
    pub fn current_buffer(&self) -> BufferId {
        self.cur().buffer
    }

    /// The current window's buffer.
    #[must_use]
    pub fn cur_buf(&self) -> &Buffer {
        &self.buffers[self.cur().buffer]
    }

    /// The current window's buffer, for writing.
    pub fn cur_buf_mut(&mut self) -> &mut Buffer {
        let id = self.cur().buffer;
        &mut self.buffers[id]
    }

    /// Make `id` the current window.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a deleted window.
    pub fn set_current(&mut self, id: WindowId) -> Result<()> {
        self.window(id)?;
        self.current = id;
        Ok(())
    }

    /// Windows top to bottom.
    #[must_use]
    pub fn windows(&self) -> &[WindowId] {
        &self.window_order
    }

    /// Buffers in creation order.
    #[must_use]
    pub fn buffers(&self) -> &[BufferId] {
        &self.buffer_order
    }

    /// Screen rows shared by the windows.
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Windows currently showing `bid`.
    pub fn windows_on(&self, bid: BufferId) -> impl Iterator<Item = WindowId> + '_ {
        self.window_order
            .iter()
            .copied()
            .filter(move |&w| self.windows[w].buffer == bid)
    }

    /// Set the current window's cursor.
    pub fn set_dot(&mut self, pos: Pos) {
        let w = self.cur_mut();
        w.dot = pos;
        w.flags |= WinFlags::MOVE;
    }

    // -----------------------------------------------------------------------
    // Undo configuration
    // -----------------------------------------------------------------------

    /// Turn undo logging on or off in every buffer.
    pub fn set_undo_enabled(&mut self, on: bool) {
        self.undo_enabled = on;
        for b in self.buffers.values_mut() {
            b.undo.set_enabled(on);
        }
    }

    /// Set the undo free-pool capacity in every buffer.
    pub fn set_undo_pool(&mut self, cap: usize) {
        self.undo_pool = cap;
        for b in self.buffers.values_mut() {
            b.undo.set_pool_cap(cap);
        }
    }

    // -----------------------------------------------------------------------
    // Buffers
    // -----------------------------------------------------------------------

    /// Buffer named `name`, if any.
    #[must_use]
    pub fn find_buffer(&self, name: &str) -> Option<BufferId> {
        self.buffer_order
            .iter()
            .copied()
            .find(|&b| self.buffers[b].name == name)
    }

    /// Buffer named `name`, created empty if it does not exist.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`].
    pub fn find_or_create(&mut self, name: &str) -> Result<BufferId> {
        if let Some(b) = self.find_buffer(name) {
            return Ok(b);
        }
        self.create_buffer(name)
    }

    /// Create a buffer. Names are unique.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if the name is taken, or [`Error::OutOfMemory`].
    pub fn create_buffer(&mut self, name: &str) -> Result<BufferId> {
        if self.find_buffer(name).is_some() {
            return Err(Error::user(format!("Buffer {name} already exists")));
        }
        self.buffer_order.try_reserve(1)?;
        let mut buffer = Buffer::new(name, self.undo_pool)?;
        buffer.undo.set_enabled(self.undo_enabled);
        let id = self.buffers.insert(buffer);
        self.buffer_order.push(id);
        log::debug!("created buffer {name}");
        Ok(id)
    }

    /// A buffer name derived from `base` that is not in use.
    #[must_use]
    pub fn unique_name(&self, base: &str) -> String {
        if self.find_buffer(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}<{n}>"))
            .find(|name| self.find_buffer(name).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Some buffer other than `bid`, preferring the most recently listed.
    fn other_buffer(&self, bid: BufferId) -> Option<BufferId> {
        self.buffer_order.iter().rev().copied().find(|&b| b != bid)
    }

    /// Destroy a buffer. Windows showing it switch to another buffer;
    /// killing the only buffer leaves a fresh `*scratch*`.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a stale handle, or [`Error::OutOfMemory`].
    pub fn kill_buffer(&mut self, bid: BufferId) -> Result<()> {
        let name = self.buffer(bid)?.name.clone();
        let replacement = match self.other_buffer(bid) {
            Some(b) => b,
            None => {
                // Renaming first lets the replacement take the name.
                self.buffer_mut(bid)?.name.push_str("<dying>");
                self.create_buffer(SCRATCH)?
            }
        };
        let showing: Vec<WindowId> = self.windows_on(bid).collect();
        for w in showing {
            self.show_buffer(w, replacement)?;
        }
        self.buffers.remove(bid);
        self.buffer_order.retain(|&b| b != bid);
        log::debug!("killed buffer {name}");
        Ok(())
    }

    /// Empty a buffer: one empty line, no undo history, every window on it
    /// reset to the start.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a stale handle, or [`Error::OutOfMemory`].
    pub fn clear_buffer(&mut self, bid: BufferId) -> Result<()> {
        self.replace_text(bid, std::iter::empty::<&[u8]>())?;
        self.buffer_mut(bid)?.flags.remove(BufFlags::CHANGED);
        Ok(())
    }

    /// Replace a buffer's text with `lines` and reset every window on it.
    /// The undo log is discarded.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a stale handle, or [`Error::OutOfMemory`]
    /// (the old text is kept).
    pub fn replace_text<I, T>(&mut self, bid: BufferId, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let buffer = self.buffer_mut(bid)?;
        buffer.reset_lines(lines)?;
        buffer.undo.clear();
        let start = buffer.start();
        let showing: Vec<WindowId> = self.windows_on(bid).collect();
        for w in showing {
            let win = &mut self.windows[w];
            win.dot = start;
            win.mark = None;
            win.top = start.line;
            win.flags |= WinFlags::HARD | WinFlags::MODE;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_has_scratch_in_one_window() {
        let reg = Registry::new(24).unwrap();
        assert_eq!(reg.buffers().len(), 1);
        assert_eq!(reg.windows().len(), 1);
        assert_eq!(reg.cur_buf().name, SCRATCH);
        assert_eq!(reg.cur_buf().nwnd, 1);
        assert_eq!(reg.cur().ntrows, 22);
        assert_eq!(reg.rows(), 23);
    }

    #[test]
    fn tiny_screen_is_refused() {
        assert!(Registry::new(2).is_err());
    }

    #[test]
    fn buffer_names_are_unique() {
        let mut reg = Registry::new(24).unwrap();
        let a = reg.create_buffer("a").unwrap();
        assert!(reg.create_buffer("a").is_err());
        assert_eq!(reg.find_or_create("a").unwrap(), a);
        assert_eq!(reg.unique_name("a"), "a<2>");
        assert_eq!(reg.unique_name("b"), "b");
    }

    #[test]
    fn kill_buffer_switches_windows() {
        let mut reg = Registry::new(24).unwrap();
        let scratch = reg.current_buffer();
        let a = reg.create_buffer("a").unwrap();
        let w = reg.current_window();
        reg.show_buffer(w, a).unwrap();
        reg.kill_buffer(a).unwrap();
        assert_eq!(reg.current_buffer(), scratch);
        assert!(reg.buffer(a).is_err());
        assert_eq!(reg.cur_buf().nwnd, 1);
    }

    #[test]
    fn killing_last_buffer_recreates_scratch() {
        let mut reg = Registry::new(24).unwrap();
        let old = reg.current_buffer();
        reg.kill_buffer(old).unwrap();
        assert_eq!(reg.buffers().len(), 1);
        assert_ne!(reg.current_buffer(), old);
        assert_eq!(reg.cur_buf().name, SCRATCH);
    }

    #[test]
    fn replace_text_resets_windows() {
        let mut reg = Registry::new(24).unwrap();
        let bid = reg.current_buffer();
        reg.replace_text(bid, ["one", "two"]).unwrap();
        let buf = reg.buffer(bid).unwrap();
        assert_eq!(buf.contents(), b"one\ntwo");
        assert_eq!(reg.cur().dot, buf.start());
        assert_eq!(reg.cur().top, buf.first_line());
        reg.clear_buffer(bid).unwrap();
        assert_eq!(reg.buffer(bid).unwrap().contents(), b"");
    }
}
