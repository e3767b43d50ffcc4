//! Redisplay: bringing the terminal in line with the buffers.
//!
//! The engine keeps two pictures of the screen above the echo line: the
//! *virtual* screen (what should be there) and the *physical* screen (what
//! the terminal shows). An update cycle:
//!
//! 1. Frames each window so its cursor line is visible, honoring a
//!    requested recenter row.
//! 2. Renders into virtual rows only what the window flags say changed:
//!    the cursor row for an edit, every row for a hard update, the mode
//!    line when asked.
//! 3. Scrolls the cursor row sideways when the cursor column would fall
//!    off the right edge, marking the cut with `$` in column 0.
//! 4. Reconciles. A garbaged screen is cleared and redrawn in full. With
//!    hardware line insert/delete, a dynamic-programming alignment (after
//!    Gosling) picks the cheapest mix of deleting lines, inserting lines
//!    and redrawing rows. Each row is then brought up to date by rewriting
//!    only the span between its common prefix and suffix, clearing to end
//!    of line when the tail is blank and long enough to be worth it.
//! 5. Draws the echo line and places the cursor.
//!
//! Every operation sent to the terminal is applied to the physical model as
//! well, so after an update the two screens are identical and a second
//! update with nothing changed writes nothing at all.

use std::hash::{DefaultHasher, Hash, Hasher};

use mg_term::{Caps, Color, Size, Tty};

use crate::buffer::Buffer;
use crate::echo::Echo;
use crate::error::Result;
use crate::line::{LineId, Pos};
use crate::mode::ModeTable;
use crate::options::Options;
use crate::registry::Registry;
use crate::window::{WinFlags, WindowId};

// ---------------------------------------------------------------------------
// UpdateStats
// ---------------------------------------------------------------------------

/// What one update cycle did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateStats {
    /// Rows whose physical content was rewritten.
    pub rows_drawn: usize,
    /// Rows that already matched and were skipped.
    pub rows_skipped: usize,
    /// Lines inserted by the scroll optimizer.
    pub lines_inserted: usize,
    /// Lines deleted by the scroll optimizer.
    pub lines_deleted: usize,
    /// Characters written.
    pub chars: usize,
    /// Whether the whole screen was redrawn.
    pub full: bool,
}

// ---------------------------------------------------------------------------
// VideoRow
// ---------------------------------------------------------------------------

/// One screen row: exactly `ncol` bytes in one color.
#[derive(Debug, Clone, PartialEq, Eq)]
struct VideoRow {
    text: Vec<u8>,
    color: Color,
}

impl VideoRow {
    fn blank(ncol: usize) -> Self {
        Self {
            text: vec![b' '; ncol],
            color: Color::Text,
        }
    }

    fn is_blank(&self) -> bool {
        self.color == Color::Text && self.text.iter().all(|&b| b == b' ')
    }

    /// Length without trailing blanks.
    fn used(&self) -> usize {
        self.text.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1)
    }

    fn hash(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.text.hash(&mut h);
        self.color.hash(&mut h);
        h.finish()
    }

    /// Cost of drawing the row from blank.
    fn cost(&self) -> u32 {
        u32::try_from(self.used()).unwrap_or(u32::MAX)
    }
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

/// Display glyphs for one byte at virtual column `col`.
fn glyphs(b: u8, col: usize, tab: usize, out: &mut Vec<u8>) {
    out.clear();
    match b {
        b'\t' => out.resize(tab - col % tab, b' '),
        0..=0x1f | 0x7f => {
            out.push(b'^');
            out.push(b ^ 0x40);
        }
        0x80..=0xff => {
            out.push(b'\\');
            out.push(b'0' + (b >> 6));
            out.push(b'0' + ((b >> 3) & 7));
            out.push(b'0' + (b & 7));
        }
        _ => out.push(b),
    }
}

/// Display column of byte `offset` in `text`.
#[must_use]
pub fn column_of(text: &[u8], offset: usize, tab: usize) -> usize {
    let mut col = 0;
    let mut g = Vec::with_capacity(4);
    for &b in text.iter().take(offset) {
        glyphs(b, col, tab, &mut g);
        col += g.len();
    }
    col
}

/// Byte offset in `text` whose display column is closest to `goal`
/// without passing it.
#[must_use]
pub fn offset_for_column(text: &[u8], goal: usize, tab: usize) -> usize {
    let mut col = 0;
    let mut g = Vec::with_capacity(4);
    for (i, &b) in text.iter().enumerate() {
        glyphs(b, col, tab, &mut g);
        if col + g.len() > goal {
            return i;
        }
        col += g.len();
    }
    text.len()
}

/// Render `text` into `ncol` cells starting at virtual column `lbound`.
/// Text running past the right edge ends in `$`; a shifted row starts
/// with `$`.
fn render_line(text: &[u8], tab: usize, ncol: usize, lbound: usize) -> Vec<u8> {
    let mut out = vec![b' '; ncol];
    let mut col = 0;
    let mut g = Vec::with_capacity(4);
    let mut overflow = false;
    'bytes: for &b in text {
        glyphs(b, col, tab, &mut g);
        for &c in &g {
            if col >= lbound {
                let x = col - lbound;
                if x >= ncol {
                    overflow = true;
                    break 'bytes;
                }
                out[x] = c;
            }
            col += 1;
        }
    }
    if overflow && ncol > 0 {
        out[ncol - 1] = b'$';
    }
    if lbound > 0 && ncol > 0 {
        out[0] = b'$';
    }
    out
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Alignment step chosen by the scroll optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Draw,
    Delete(usize),
    Insert(usize),
}

/// The redisplay engine.
#[derive(Debug)]
pub struct Display {
    nrow: u16,
    ncol: u16,
    vscreen: Vec<VideoRow>,
    pscreen: Vec<VideoRow>,
    pecho: Vec<u8>,
    garbage: bool,
    /// Physical cursor, when known.
    cursor: Option<(u16, u16)>,
    /// Physical color, when known.
    color: Option<Color>,
    /// Row currently shown scrolled sideways, and the line on it.
    extended: Option<(u16, WindowId, LineId)>,
    last: UpdateStats,
}

impl Display {
    /// An engine for a `size` screen. The first update redraws everything.
    #[must_use]
    pub fn new(size: Size) -> Self {
        let mut d = Self {
            nrow: 0,
            ncol: 0,
            vscreen: Vec::new(),
            pscreen: Vec::new(),
            pecho: Vec::new(),
            garbage: true,
            cursor: None,
            color: None,
            extended: None,
            last: UpdateStats::default(),
        };
        d.resize(size);
        d
    }

    /// Adopt a new screen size and schedule a full redraw.
    pub fn resize(&mut self, size: Size) {
        self.nrow = size.rows;
        self.ncol = size.cols;
        let rows = usize::from(size.rows.saturating_sub(1));
        let ncol = usize::from(size.cols);
        self.vscreen = vec![VideoRow::blank(ncol); rows];
        self.pscreen = vec![VideoRow::blank(ncol); rows];
        self.extended = None;
        self.garbage();
    }

    /// Schedule a full redraw.
    pub fn garbage(&mut self) {
        self.garbage = true;
        self.cursor = None;
        self.color = None;
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        Size {
            cols: self.ncol,
            rows: self.nrow,
        }
    }

    /// Whether the screen is big enough to draw on.
    #[must_use]
    pub const fn usable(&self) -> bool {
        self.nrow >= 3 && self.ncol >= 2
    }

    /// Statistics of the last update.
    #[must_use]
    pub const fn last_stats(&self) -> UpdateStats {
        self.last
    }

    /// Physical content of a row, as the engine believes the terminal
    /// shows it.
    #[must_use]
    pub fn physical_row(&self, row: u16) -> Option<&[u8]> {
        self.pscreen.get(usize::from(row)).map(|r| r.text.as_slice())
    }

    const fn text_rows(&self) -> usize {
        self.nrow.saturating_sub(1) as usize
    }

    // -----------------------------------------------------------------------
    // Update cycle
    // -----------------------------------------------------------------------

    /// Run one update cycle.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Invariant`] if a window refers to a stale buffer.
    /// Terminal write errors are logged, not returned.
    pub fn update(
        &mut self,
        reg: &mut Registry,
        modes: &ModeTable,
        echo: &mut Echo,
        opts: &Options,
        tty: &mut dyn Tty,
    ) -> Result<UpdateStats> {
        if !self.usable() {
            log::warn!("display unusable at {}x{}", self.ncol, self.nrow);
            return Ok(UpdateStats::default());
        }
        let mut stats = UpdateStats {
            full: self.garbage,
            ..UpdateStats::default()
        };

        if let Some((row, wid, line)) = self.extended.take() {
            if let Ok(w) = reg.window(wid) {
                if let Ok(b) = reg.buffer(w.buffer) {
                    if b.contains(line) && !b.is_header(line) {
                        self.set_text_row(row, b.text(line), opts.tab_width, 0);
                    }
                }
            }
        }

        let current = reg.current_window();
        let mut cursor = (0, 0);
        for wid in reg.windows().to_vec() {
            self.frame(reg, wid)?;
            let w = reg.window(wid)?.clone();
            let b = reg.buffer(w.buffer)?;

            if self.garbage || w.flags.contains(WinFlags::HARD) {
                self.render_rows(b, w.top, w.toprow, w.ntrows, opts.tab_width);
            } else if w.flags.contains(WinFlags::EDIT) {
                let line = w.edited.unwrap_or(w.dot.line);
                if b.contains(line) {
                    if let Some(i) = row_of(b, w.top, line, w.ntrows) {
                        self.set_text_row(w.toprow + i, b.text(line), opts.tab_width, 0);
                    }
                }
            }
            if self.garbage
                || w.flags.intersects(WinFlags::HARD | WinFlags::MODE)
                || (wid == current && opts.line_number)
            {
                let line = mode_line(reg, modes, wid, opts, usize::from(self.ncol))?;
                self.set_row(w.mode_row(), line, Color::Mode);
            }

            if wid == current {
                let row = row_of(b, w.top, w.dot.line, w.ntrows).unwrap_or(0);
                let text = b.text(w.dot.line);
                let col = column_of(text, w.dot.offset, opts.tab_width);
                let ncol = usize::from(self.ncol);
                let screen_row = w.toprow + row;
                let lbound = if col >= ncol - 1 {
                    let half = (ncol / 2).max(1);
                    (col - col % half).saturating_sub(ncol / 4).max(1)
                } else {
                    0
                };
                if lbound > 0 {
                    self.set_text_row(screen_row, text, opts.tab_width, lbound);
                    self.extended = Some((screen_row, wid, w.dot.line));
                }
                let x = u16::try_from(col - lbound).unwrap_or(self.ncol - 1);
                cursor = (screen_row, x.min(self.ncol - 1));
            }
            let w = reg.window_mut(wid)?;
            w.flags = WinFlags::empty();
            w.edited = None;
        }

        if self.garbage {
            self.set_color(tty, Color::Text);
            self.move_to(tty, 0, 0);
            tty.erase_eop();
            let ncol = usize::from(self.ncol);
            for row in &mut self.pscreen {
                *row = VideoRow::blank(ncol);
            }
            self.pecho.clear();
            self.garbage = false;
        } else if tty.caps().contains(Caps::INSERT_DELETE) && opts.insert_delete_lines {
            self.scroll(tty, &mut stats);
        }

        for row in 0..self.text_rows() {
            if self.vscreen[row] == self.pscreen[row] {
                stats.rows_skipped += 1;
            } else {
                self.uline(tty, row, &mut stats);
                stats.rows_drawn += 1;
            }
        }

        self.draw_echo(tty, echo, &mut stats);
        let (row, col) = match echo.cursor() {
            Some(c) => (
                self.nrow - 1,
                u16::try_from(c).unwrap_or(self.ncol - 1).min(self.ncol - 1),
            ),
            None => cursor,
        };
        self.move_to(tty, row, col);
        if let Err(e) = tty.flush() {
            log::error!("terminal write failed: {e}");
        }
        log::trace!("redisplay: {stats:?}");
        self.last = stats;
        Ok(stats)
    }

    /// Make sure the window's cursor line is on screen, reframing around
    /// the requested row when it is not or when asked to.
    fn frame(&self, reg: &mut Registry, wid: WindowId) -> Result<()> {
        let w = reg.window(wid)?;
        let b = reg.buffer(w.buffer)?;
        let top_ok = b.contains(w.top) && !b.is_header(w.top);
        let forced = w.flags.contains(WinFlags::FORCE);
        if !forced && top_ok && row_of(b, w.top, w.dot.line, w.ntrows).is_some() {
            return Ok(());
        }
        let rows = i32::from(w.ntrows);
        let target = if forced {
            match w.force {
                0 => rows / 2,
                n if n > 0 => (n - 1).min(rows - 1),
                n => (rows + n).max(0),
            }
        } else {
            rows / 2
        };
        let mut top = w.dot.line;
        for _ in 0..target {
            let prev = b.prev(top);
            if b.is_header(prev) {
                break;
            }
            top = prev;
        }
        let w = reg.window_mut(wid)?;
        w.top = top;
        w.flags.remove(WinFlags::FORCE);
        w.flags |= WinFlags::HARD;
        Ok(())
    }

    fn render_rows(&mut self, b: &Buffer, top: LineId, toprow: u16, ntrows: u16, tab: usize) {
        let mut line = top;
        for i in 0..ntrows {
            if b.is_header(line) || !b.contains(line) {
                self.set_row(toprow + i, Vec::new(), Color::Text);
            } else {
                self.set_text_row(toprow + i, b.text(line), tab, 0);
                line = b.next(line);
            }
        }
    }

    fn set_text_row(&mut self, row: u16, text: &[u8], tab: usize, lbound: usize) {
        let cells = render_line(text, tab, usize::from(self.ncol), lbound);
        self.set_row(row, cells, Color::Text);
    }

    fn set_row(&mut self, row: u16, mut text: Vec<u8>, color: Color) {
        let ncol = usize::from(self.ncol);
        if let Some(v) = self.vscreen.get_mut(usize::from(row)) {
            text.resize(ncol, b' ');
            v.text = text;
            v.color = color;
        }
    }

    // -----------------------------------------------------------------------
    // Terminal output with state tracking
    // -----------------------------------------------------------------------

    fn move_to(&mut self, tty: &mut dyn Tty, row: u16, col: u16) {
        if self.cursor != Some((row, col)) {
            tty.move_to(row, col);
            self.cursor = Some((row, col));
        }
    }

    fn set_color(&mut self, tty: &mut dyn Tty, color: Color) {
        if self.color != Some(color) {
            tty.set_color(color);
            self.color = Some(color);
        }
    }

    fn put_run(&mut self, tty: &mut dyn Tty, row: u16, col: usize, bytes: &[u8]) -> usize {
        for &b in bytes {
            tty.put(b);
        }
        let end = col + bytes.len();
        self.cursor = if end >= usize::from(self.ncol) {
            None
        } else {
            u16::try_from(end).ok().map(|c| (row, c))
        };
        bytes.len()
    }

    // -----------------------------------------------------------------------
    // Row update
    // -----------------------------------------------------------------------

    /// Bring physical row `row` up to date with the virtual one.
    fn uline(&mut self, tty: &mut dyn Tty, row: usize, stats: &mut UpdateStats) {
        let v = self.vscreen[row].clone();
        let p = &self.pscreen[row];
        let ncol = v.text.len();
        let r = u16::try_from(row).unwrap_or(u16::MAX);
        let vused = v.used();

        if v.color != p.color {
            self.move_to(tty, r, 0);
            self.set_color(tty, v.color);
            stats.chars += self.put_run(tty, r, 0, &v.text[..vused]);
            if vused < ncol {
                tty.erase_eol();
            }
            self.pscreen[row] = v;
            return;
        }

        let Some(first) = (0..ncol).find(|&i| v.text[i] != p.text[i]) else {
            return;
        };
        let mut end = ncol;
        while end > first && v.text[end - 1] == p.text[end - 1] {
            end -= 1;
        }
        let eol_cost = tty.costs().erase_eol as usize;
        let stop = vused.max(first);
        let erase = end > stop && end - stop > eol_cost;
        let write_end = if erase { stop } else { end };

        self.move_to(tty, r, u16::try_from(first).unwrap_or(0));
        self.set_color(tty, v.color);
        stats.chars += self.put_run(tty, r, first, &v.text[first..write_end]);
        if erase {
            tty.erase_eol();
        }
        self.pscreen[row] = v;
    }

    fn draw_echo(&mut self, tty: &mut dyn Tty, echo: &mut Echo, stats: &mut UpdateStats) {
        let mut line = echo.line();
        line.truncate(usize::from(self.ncol) - 1);
        echo.mark_clean();
        if line == self.pecho {
            return;
        }
        let row = self.nrow - 1;
        let first = line
            .iter()
            .zip(&self.pecho)
            .take_while(|(a, b)| a == b)
            .count();
        self.move_to(tty, row, u16::try_from(first).unwrap_or(0));
        self.set_color(tty, Color::Text);
        stats.chars += self.put_run(tty, row, first, &line[first..]);
        if self.pecho.len() > line.len() {
            tty.erase_eol();
        }
        self.pecho = line;
    }

    // -----------------------------------------------------------------------
    // Scroll optimizer
    // -----------------------------------------------------------------------

    /// Use line insert/delete to move rows that only changed position.
    fn scroll(&mut self, tty: &mut dyn Tty, stats: &mut UpdateStats) {
        let rows = self.text_rows();
        let vh: Vec<u64> = self.vscreen.iter().map(VideoRow::hash).collect();
        let ph: Vec<u64> = self.pscreen.iter().map(VideoRow::hash).collect();

        let mut top = 0;
        while top < rows && vh[top] == ph[top] {
            top += 1;
        }
        let mut bot = rows;
        while bot > top && vh[bot - 1] == ph[bot - 1] {
            bot -= 1;
        }
        let size = bot - top;
        if size < 2 {
            return;
        }
        let costs = tty.costs();
        let vcost: Vec<u32> = self.vscreen[top..bot].iter().map(VideoRow::cost).collect();
        let steps = align(&ph[top..bot], &vh[top..bot], &vcost, costs.insert_line, costs.delete_line);
        if !steps.iter().any(|s| matches!(s, Step::Delete(_))) {
            return;
        }

        let last = u16::try_from(bot - 1).unwrap_or(u16::MAX);
        // Deletes bottom-up, so rows above each delete have not moved.
        for (start, n) in runs(&steps, true).into_iter().rev() {
            let row = top + start;
            tty.delete_lines(u16::try_from(row).unwrap_or(0), last, n);
            for _ in 0..n {
                self.pscreen.remove(row);
                self.pscreen.insert(bot - 1, VideoRow::blank(usize::from(self.ncol)));
            }
            stats.lines_deleted += usize::from(n);
            self.cursor = None;
        }
        // Inserts top-down, so rows above each insert are final.
        for (start, n) in runs(&steps, false) {
            let row = top + start;
            if self.pscreen[row..bot].iter().all(VideoRow::is_blank) {
                continue;
            }
            tty.insert_lines(u16::try_from(row).unwrap_or(0), last, n);
            for _ in 0..n {
                self.pscreen.remove(bot - 1);
                self.pscreen.insert(row, VideoRow::blank(usize::from(self.ncol)));
            }
            stats.lines_inserted += usize::from(n);
            self.cursor = None;
        }
    }
}

/// Minimum-cost alignment of old rows `old` onto new rows `new` (by hash).
/// Drawing a row costs its `vcost` unless it already matches; inserting
/// costs `ins` plus drawing; deleting costs `del`. Ties go to drawing.
fn align(old: &[u64], new: &[u64], vcost: &[u32], ins: u32, del: u32) -> Vec<Step> {
    let n = old.len();
    let m = new.len();
    let w = m + 1;
    let mut cost = vec![0u32; (n + 1) * w];
    let mut pick = vec![Step::Draw; (n + 1) * w];

    for i in 1..=n {
        cost[i * w] = cost[(i - 1) * w].saturating_add(del);
        pick[i * w] = Step::Delete(i - 1);
    }
    for j in 1..=m {
        cost[j] = cost[j - 1].saturating_add(ins).saturating_add(vcost[j - 1]);
        pick[j] = Step::Insert(j - 1);
    }
    for i in 1..=n {
        for j in 1..=m {
            let redraw = if old[i - 1] == new[j - 1] { 0 } else { vcost[j - 1] };
            let draw = cost[(i - 1) * w + j - 1].saturating_add(redraw);
            let delete = cost[(i - 1) * w + j].saturating_add(del);
            let insert = cost[i * w + j - 1]
                .saturating_add(ins)
                .saturating_add(vcost[j - 1]);
            let (c, s) = if draw <= delete && draw <= insert {
                (draw, Step::Draw)
            } else if delete <= insert {
                (delete, Step::Delete(i - 1))
            } else {
                (insert, Step::Insert(j - 1))
            };
            cost[i * w + j] = c;
            pick[i * w + j] = s;
        }
    }

    let mut steps = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let s = pick[i * w + j];
        steps.push(s);
        match s {
            Step::Draw => {
                i -= 1;
                j -= 1;
            }
            Step::Delete(_) => i -= 1,
            Step::Insert(_) => j -= 1,
        }
    }
    steps.reverse();
    steps
}

/// Runs of consecutive deletes (by old index) or inserts (by new index),
/// as `(first index, count)`, top to bottom.
fn runs(steps: &[Step], deletes: bool) -> Vec<(usize, u16)> {
    let mut out: Vec<(usize, u16)> = Vec::new();
    let mut prev: Option<usize> = None;
    for s in steps {
        let idx = match (*s, deletes) {
            (Step::Delete(i), true) | (Step::Insert(i), false) => i,
            _ => {
                prev = None;
                continue;
            }
        };
        match (prev, out.last_mut()) {
            (Some(p), Some(run)) if p + 1 == idx => run.1 += 1,
            _ => out.push((idx, 1)),
        }
        prev = Some(idx);
    }
    out
}

/// Row index of `line` within `ntrows` rows starting at `top`.
fn row_of(b: &Buffer, top: LineId, line: LineId, ntrows: u16) -> Option<u16> {
    let mut cur = top;
    for i in 0..ntrows {
        if cur == line {
            return Some(i);
        }
        if b.is_header(cur) {
            return None;
        }
        cur = b.next(cur);
    }
    None
}

/// The mode line of a window, padded with `-` to `ncol`.
fn mode_line(
    reg: &Registry,
    modes: &ModeTable,
    wid: WindowId,
    opts: &Options,
    ncol: usize,
) -> Result<Vec<u8>> {
    let w = reg.window(wid)?;
    let b = reg.buffer(w.buffer)?;
    let state = if b.is_read_only() {
        "%%"
    } else if b.is_changed() {
        "**"
    } else {
        "--"
    };
    let mut s = format!(
        "--{state}-Mg: {}  ({})",
        b.name,
        modes.describe(b).join("-")
    );
    if let Some(file) = &b.file {
        s.push_str("  ");
        s.push_str(&file.display().to_string());
    }
    if opts.line_number {
        let line = b.line_number(w.dot.line).unwrap_or(0);
        let col = column_of(b.text(w.dot.line), w.dot.offset, opts.tab_width);
        s.push_str(&format!("--L{line}--C{col}"));
    }
    let mut out = s.into_bytes();
    out.resize(ncol.max(out.len()), b'-');
    out.truncate(ncol);
    Ok(out)
}

/// Where `pos` would be drawn in window `wid`, if visible.
#[must_use]
pub fn screen_position(reg: &Registry, wid: WindowId, pos: Pos, tab: usize) -> Option<(u16, usize)> {
    let w = reg.window(wid).ok()?;
    let b = reg.buffer(w.buffer).ok()?;
    let row = row_of(b, w.top, pos.line, w.ntrows)?;
    Some((w.toprow + row, column_of(b.text(pos.line), pos.offset, tab)))
}
