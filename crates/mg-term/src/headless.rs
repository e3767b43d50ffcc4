// SPDX-License-Identifier: MIT
//
// In-memory terminal.
//
// `Headless` implements `Tty` on a plain character grid instead of a real
// terminal. It applies every driver call the way a VT100 would (including
// hardware line insert/delete inside a region) and counts the calls, so
// tests can check both *what* ended up on screen and *how much* output it
// took to get there.
//
// Clones share state: a test keeps one handle to inspect the screen and
// queue keys while the editor owns the other.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::key::Key;
use crate::tty::{CancelToken, Caps, Color, Costs, Input, Size, Tty};

/// Counters of driver calls since the last [`Headless::reset_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpStats {
    /// Bytes written with `put`.
    pub puts: u32,
    /// Cursor moves.
    pub moves: u32,
    /// Erase-to-end-of-line calls.
    pub erase_eols: u32,
    /// Erase-to-end-of-page calls.
    pub erase_eops: u32,
    /// Lines inserted (sum of counts).
    pub inserted: u32,
    /// Lines deleted (sum of counts).
    pub deleted: u32,
    /// Color changes.
    pub colors: u32,
    /// Bells.
    pub beeps: u32,
}

impl OpStats {
    /// Total number of output operations of any kind, bells excluded.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.puts
            + self.moves
            + self.erase_eols
            + self.erase_eops
            + self.inserted
            + self.deleted
            + self.colors
    }
}

struct State {
    size: Size,
    grid: Vec<Vec<(u8, Color)>>,
    row: u16,
    col: u16,
    color: Color,
    caps: Caps,
    costs: Costs,
    input: VecDeque<Input>,
    stats: OpStats,
    cancel: CancelToken,
    suspended: u32,
}

impl State {
    fn blank_row(cols: u16) -> Vec<(u8, Color)> {
        vec![(b' ', Color::Text); cols as usize]
    }

    fn fill(&mut self, row: u16, from: u16) {
        let color = self.color;
        if let Some(cells) = self.grid.get_mut(row as usize) {
            for cell in cells.iter_mut().skip(from as usize) {
                *cell = (b' ', color);
            }
        }
    }
}

/// A `Tty` backed by an in-memory grid.
#[derive(Clone)]
pub struct Headless {
    state: Rc<RefCell<State>>,
}

impl Headless {
    /// A blank `rows`×`cols` screen with insert/delete-line support.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        let size = Size { cols, rows };
        Self {
            state: Rc::new(RefCell::new(State {
                size,
                grid: (0..rows).map(|_| State::blank_row(cols)).collect(),
                row: 0,
                col: 0,
                color: Color::Text,
                caps: Caps::INSERT_DELETE | Caps::SCROLL_REGION,
                costs: Costs::default(),
                input: VecDeque::new(),
                stats: OpStats::default(),
                cancel: CancelToken::new(),
                suspended: 0,
            })),
        }
    }

    /// Replace the capability set (e.g. to force the row-by-row path).
    #[must_use]
    pub fn with_caps(self, caps: Caps) -> Self {
        self.state.borrow_mut().caps = caps;
        self
    }

    /// Replace the line-operation cost model.
    #[must_use]
    pub fn with_costs(self, costs: Costs) -> Self {
        self.state.borrow_mut().costs = costs;
        self
    }

    /// Queue keys for `read_input`.
    pub fn push_keys(&self, keys: &[Key]) {
        self.state
            .borrow_mut()
            .input
            .extend(keys.iter().map(|&k| Input::Key(k)));
    }

    /// Queue the bytes of `text` as keys.
    pub fn type_str(&self, text: &str) {
        self.state
            .borrow_mut()
            .input
            .extend(text.bytes().map(|b| Input::Key(Key::byte(b))));
    }

    /// Change the screen size and queue a resize notification. Existing
    /// content is kept where it fits.
    pub fn resize(&self, rows: u16, cols: u16) {
        let mut st = self.state.borrow_mut();
        st.size = Size { cols, rows };
        st.grid.resize_with(rows as usize, || State::blank_row(cols));
        for line in &mut st.grid {
            line.resize(cols as usize, (b' ', Color::Text));
        }
        st.row = st.row.min(rows.saturating_sub(1));
        st.col = st.col.min(cols);
        st.input.push_back(Input::Resize);
    }

    /// Raise the keyboard interrupt, as if C-g arrived while busy.
    pub fn interrupt(&self) {
        self.state.borrow().cancel.set();
    }

    /// Text of one row with trailing blanks removed.
    #[must_use]
    pub fn row_text(&self, row: u16) -> String {
        let st = self.state.borrow();
        st.grid.get(row as usize).map_or_else(String::new, |cells| {
            let bytes: Vec<u8> = cells.iter().map(|c| c.0).collect();
            String::from_utf8_lossy(&bytes).trim_end().to_string()
        })
    }

    /// Every row's text, top to bottom.
    #[must_use]
    pub fn screen(&self) -> Vec<String> {
        let rows = self.state.borrow().size.rows;
        (0..rows).map(|r| self.row_text(r)).collect()
    }

    /// Color of the cell at `(row, col)`.
    #[must_use]
    pub fn color_at(&self, row: u16, col: u16) -> Color {
        let st = self.state.borrow();
        st.grid
            .get(row as usize)
            .and_then(|cells| cells.get(col as usize))
            .map_or(Color::Text, |c| c.1)
    }

    /// Cursor position as `(row, col)`.
    #[must_use]
    pub fn cursor(&self) -> (u16, u16) {
        let st = self.state.borrow();
        (st.row, st.col)
    }

    /// Operation counters since the last reset.
    #[must_use]
    pub fn stats(&self) -> OpStats {
        self.state.borrow().stats
    }

    /// Zero the operation counters.
    pub fn reset_stats(&self) {
        self.state.borrow_mut().stats = OpStats::default();
    }

    /// How many times the editor asked to be suspended.
    #[must_use]
    pub fn suspend_count(&self) -> u32 {
        self.state.borrow().suspended
    }

    /// Keys still waiting to be read.
    #[must_use]
    pub fn pending_input(&self) -> usize {
        self.state.borrow().input.len()
    }
}

impl Tty for Headless {
    fn size(&self) -> Size {
        self.state.borrow().size
    }

    fn read_input(&mut self) -> io::Result<Input> {
        self.state
            .borrow_mut()
            .input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"))
    }

    fn typeahead(&mut self) -> bool {
        !self.state.borrow().input.is_empty()
    }

    fn move_to(&mut self, row: u16, col: u16) {
        let mut st = self.state.borrow_mut();
        st.row = row;
        st.col = col;
        st.stats.moves += 1;
    }

    fn put(&mut self, byte: u8) {
        let mut st = self.state.borrow_mut();
        let (row, col, color) = (st.row as usize, st.col as usize, st.color);
        if let Some(cell) = st.grid.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = (byte, color);
        }
        st.col = st.col.saturating_add(1);
        st.stats.puts += 1;
    }

    fn erase_eol(&mut self) {
        let mut st = self.state.borrow_mut();
        let (row, col) = (st.row, st.col);
        st.fill(row, col);
        st.stats.erase_eols += 1;
    }

    fn erase_eop(&mut self) {
        let mut st = self.state.borrow_mut();
        let (row, col) = (st.row, st.col);
        st.fill(row, col);
        for r in row + 1..st.size.rows {
            st.fill(r, 0);
        }
        st.stats.erase_eops += 1;
    }

    fn set_color(&mut self, color: Color) {
        let mut st = self.state.borrow_mut();
        st.color = color;
        st.stats.colors += 1;
    }

    fn insert_lines(&mut self, row: u16, bot: u16, n: u16) {
        let mut st = self.state.borrow_mut();
        let cols = st.size.cols;
        for _ in 0..n {
            st.grid.remove(bot as usize);
            st.grid.insert(row as usize, State::blank_row(cols));
        }
        // A real terminal homes the cursor when the region is reset.
        st.row = 0;
        st.col = 0;
        st.stats.inserted += u32::from(n);
    }

    fn delete_lines(&mut self, row: u16, bot: u16, n: u16) {
        let mut st = self.state.borrow_mut();
        let cols = st.size.cols;
        for _ in 0..n {
            st.grid.remove(row as usize);
            st.grid.insert(bot as usize, State::blank_row(cols));
        }
        st.row = 0;
        st.col = 0;
        st.stats.deleted += u32::from(n);
    }

    fn caps(&self) -> Caps {
        self.state.borrow().caps
    }

    fn costs(&self) -> Costs {
        self.state.borrow().costs
    }

    fn beep(&mut self, _visible: bool) {
        self.state.borrow_mut().stats.beeps += 1;
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn cancel_token(&self) -> CancelToken {
        self.state.borrow().cancel.clone()
    }

    fn suspend(&mut self) -> io::Result<()> {
        let mut st = self.state.borrow_mut();
        st.suspended += 1;
        st.input.push_back(Input::Resize);
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
