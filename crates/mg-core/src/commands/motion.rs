//! Cursor motion.
//!
//! Motion commands only move the current window's cursor; they never
//! change text. Vertical motion keeps a goal column across consecutive
//! `next-line` / `previous-line` so the cursor returns to its column after
//! passing through short lines.

use crate::buffer::Buffer;
use crate::command::{Arg, CmdFlags};
use crate::display::{column_of, offset_for_column};
use crate::editor::{Complete, Editor};
use crate::error::{Error, Result};
use crate::line::Pos;
use crate::window::WinFlags;

// ---------------------------------------------------------------------------
// Position helpers
// ---------------------------------------------------------------------------

/// Word constituents.
pub(crate) const fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Byte at `p`; the end of a line reads as a newline.
pub(crate) fn char_at(b: &Buffer, p: Pos) -> u8 {
    b.text(p.line).get(p.offset).copied().unwrap_or(b'\n')
}

/// One byte forward, crossing line ends.
pub(crate) fn step_forward(b: &Buffer, p: Pos) -> Option<Pos> {
    if p.offset < b.len_of(p.line) {
        return Some(Pos::new(p.line, p.offset + 1));
    }
    let next = b.next(p.line);
    if b.is_header(next) {
        None
    } else {
        Some(Pos::new(next, 0))
    }
}

/// One byte backward, crossing line starts.
pub(crate) fn step_backward(b: &Buffer, p: Pos) -> Option<Pos> {
    if p.offset > 0 {
        return Some(Pos::new(p.line, p.offset - 1));
    }
    let prev = b.prev(p.line);
    if b.is_header(prev) {
        None
    } else {
        Some(Pos::new(prev, b.len_of(prev)))
    }
}

fn distance(n: i32) -> usize {
    usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX)
}

// ---------------------------------------------------------------------------
// Characters and words
// ---------------------------------------------------------------------------

/// Move `n` bytes (backward for negative `n`), stopping at either end of
/// the buffer with an error.
fn move_chars(ed: &mut Editor, n: i32) -> Result<()> {
    let b = ed.reg.cur_buf();
    let here = b.offset_of(ed.reg.cur().dot)?;
    let dist = distance(n);
    let (target, limit) = if n >= 0 {
        match here.checked_add(dist).filter(|&t| t <= b.size()) {
            Some(t) => (t, None),
            None => (b.size(), Some("End of buffer")),
        }
    } else {
        match here.checked_sub(dist) {
            Some(t) => (t, None),
            None => (0, Some("Beginning of buffer")),
        }
    };
    let pos = b.pos_at(target)?;
    ed.reg.set_dot(pos);
    limit.map_or(Ok(()), |m| Err(Error::user(m)))
}

pub fn forward_char(ed: &mut Editor, arg: Arg) -> Result<()> {
    move_chars(ed, arg.n)
}

pub fn backward_char(ed: &mut Editor, arg: Arg) -> Result<()> {
    move_chars(ed, arg.n.saturating_neg())
}

fn words_forward(b: &Buffer, mut p: Pos, n: usize) -> Pos {
    for _ in 0..n {
        while !is_word(char_at(b, p)) {
            match step_forward(b, p) {
                Some(q) => p = q,
                None => return p,
            }
        }
        while is_word(char_at(b, p)) {
            match step_forward(b, p) {
                Some(q) => p = q,
                None => return p,
            }
        }
    }
    p
}

fn words_backward(b: &Buffer, mut p: Pos, n: usize) -> Pos {
    for _ in 0..n {
        while let Some(q) = step_backward(b, p) {
            if is_word(char_at(b, q)) {
                break;
            }
            p = q;
        }
        while let Some(q) = step_backward(b, p) {
            if !is_word(char_at(b, q)) {
                break;
            }
            p = q;
        }
    }
    p
}

fn move_words(ed: &mut Editor, n: i32) {
    let b = ed.reg.cur_buf();
    let dot = ed.reg.cur().dot;
    let pos = if n >= 0 {
        words_forward(b, dot, distance(n))
    } else {
        words_backward(b, dot, distance(n))
    };
    ed.reg.set_dot(pos);
}

pub fn forward_word(ed: &mut Editor, arg: Arg) -> Result<()> {
    move_words(ed, arg.n);
    Ok(())
}

pub fn backward_word(ed: &mut Editor, arg: Arg) -> Result<()> {
    move_words(ed, arg.n.saturating_neg());
    Ok(())
}

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

/// Move `n` lines, landing as close to the goal column as the target line
/// allows.
fn move_lines(ed: &mut Editor, n: i32) {
    let tab = ed.options.tab_width;
    let dot = ed.reg.cur().dot;
    if !ed.last_was(CmdFlags::GOAL) {
        ed.goal = column_of(ed.reg.cur_buf().text(dot.line), dot.offset, tab);
    }
    let b = ed.reg.cur_buf();
    let mut line = dot.line;
    for _ in 0..distance(n) {
        let next = if n > 0 { b.next(line) } else { b.prev(line) };
        if b.is_header(next) {
            break;
        }
        line = next;
    }
    let offset = offset_for_column(b.text(line), ed.goal, tab);
    ed.reg.set_dot(Pos::new(line, offset));
}

pub fn next_line(ed: &mut Editor, arg: Arg) -> Result<()> {
    move_lines(ed, arg.n);
    Ok(())
}

pub fn previous_line(ed: &mut Editor, arg: Arg) -> Result<()> {
    move_lines(ed, arg.n.saturating_neg());
    Ok(())
}

pub fn beginning_of_line(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let line = ed.reg.cur().dot.line;
    ed.reg.set_dot(Pos::new(line, 0));
    Ok(())
}

pub fn end_of_line(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let line = ed.reg.cur().dot.line;
    let len = ed.reg.cur_buf().len_of(line);
    ed.reg.set_dot(Pos::new(line, len));
    Ok(())
}

/// Jump to `pos`, leaving the mark where the cursor was.
fn jump(ed: &mut Editor, pos: Pos) {
    let w = ed.reg.cur_mut();
    w.mark = Some(w.dot);
    ed.reg.set_dot(pos);
}

pub fn beginning_of_buffer(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let pos = ed.reg.cur_buf().start();
    jump(ed, pos);
    Ok(())
}

pub fn end_of_buffer(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let pos = ed.reg.cur_buf().end();
    jump(ed, pos);
    Ok(())
}

pub fn goto_line(ed: &mut Editor, arg: Arg) -> Result<()> {
    let n = if arg.given {
        arg.n
    } else {
        let reply = ed.prompt("Goto line: ", Complete::Nothing)?;
        reply
            .trim()
            .parse()
            .map_err(|_| Error::user(format!("Bad line number: {reply}")))?
    };
    let b = ed.reg.cur_buf();
    // Negative numbers count from the end.
    let number = if n < 0 {
        b.line_count().saturating_sub(distance(n) - 1)
    } else {
        distance(n)
    };
    let pos = Pos::new(b.line_at(number), 0);
    jump(ed, pos);
    Ok(())
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Lines in a page: the window height less two lines of overlap.
fn page(ed: &Editor) -> i32 {
    (i32::from(ed.reg.cur().ntrows) - 2).max(1)
}

/// Move the window's first line by `n` lines. The cursor stays put if it is
/// still in the window, and moves to the new first line otherwise.
fn scroll_by(ed: &mut Editor, n: i32) -> Result<()> {
    let w = ed.reg.cur();
    let b = ed.reg.cur_buf();
    let mut top = w.top;
    let mut moved = 0;
    for _ in 0..distance(n) {
        let next = if n > 0 { b.next(top) } else { b.prev(top) };
        if b.is_header(next) {
            break;
        }
        top = next;
        moved += 1;
    }
    if moved == 0 {
        return Err(Error::user(if n > 0 {
            "End of buffer"
        } else {
            "Beginning of buffer"
        }));
    }
    let visible = std::iter::successors(Some(top), |&l| Some(b.next(l)))
        .take(usize::from(w.ntrows))
        .take_while(|&l| !b.is_header(l))
        .any(|l| l == w.dot.line);
    let dot = if visible { w.dot } else { Pos::new(top, 0) };

    let w = ed.reg.cur_mut();
    w.top = top;
    w.dot = dot;
    w.flags |= WinFlags::HARD;
    Ok(())
}

pub fn scroll_up(ed: &mut Editor, arg: Arg) -> Result<()> {
    let n = if arg.given { arg.n } else { page(ed) };
    scroll_by(ed, n)
}

pub fn scroll_down(ed: &mut Editor, arg: Arg) -> Result<()> {
    let n = if arg.given { arg.n } else { page(ed) };
    scroll_by(ed, n.saturating_neg())
}

// ---------------------------------------------------------------------------
// Mark
// ---------------------------------------------------------------------------

pub fn set_mark(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let w = ed.reg.cur_mut();
    w.mark = Some(w.dot);
    ed.message("Mark set");
    Ok(())
}

pub fn exchange_point_and_mark(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let w = ed.reg.cur_mut();
    let mark = w
        .mark
        .ok_or_else(|| Error::user("No mark set in this window"))?;
    w.mark = Some(w.dot);
    ed.reg.set_dot(mark);
    Ok(())
}
