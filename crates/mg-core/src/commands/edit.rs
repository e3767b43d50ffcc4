//! Text editing commands.
//!
//! Killing commands share the kill buffer: run back to back they extend the
//! same entry (forward kills append, backward kills prepend). Any other
//! command in between makes the next kill start afresh.

use crate::buffer::BufFlags;
use crate::command::{Arg, CmdFlags};
use crate::display::column_of;
use crate::editor::{Complete, Editor};
use crate::error::{Error, Result};
use crate::kill::KillDir;
use crate::line::Pos;

use super::region;

// ---------------------------------------------------------------------------
// Insertion
// ---------------------------------------------------------------------------

/// Insert `n` spaces' worth of indentation up to the next tab stop.
fn insert_tabstop(ed: &mut Editor, n: usize) -> Result<()> {
    let tab = ed.options.tab_width;
    let (bid, dot) = (ed.reg.current_buffer(), ed.reg.cur().dot);
    let col = column_of(ed.reg.cur_buf().text(dot.line), dot.offset, tab);
    let spaces = (tab - col % tab) + tab * n.saturating_sub(1);
    let pos = ed.reg.insert_repeated(bid, dot, spaces, b' ')?;
    ed.reg.cur_mut().dot = pos;
    Ok(())
}

/// Insert the key that invoked the command, `n` times.
pub fn self_insert(ed: &mut Editor, arg: Arg) -> Result<()> {
    let byte = ed
        .this_keys()
        .last()
        .and_then(|k| k.as_byte())
        .ok_or_else(|| Error::user("No character to insert"))?;
    if arg.n < 0 {
        return Err(Error::user("Negative argument"));
    }
    let n = arg.times();
    if n == 0 {
        return Ok(());
    }
    let flags = ed.reg.cur_buf().flags;
    if byte == b'\t' && flags.contains(BufFlags::NOTAB) {
        return insert_tabstop(ed, n);
    }

    let bid = ed.reg.current_buffer();
    if flags.contains(BufFlags::OVERWRITE) {
        for _ in 0..n {
            let dot = ed.reg.cur().dot;
            let len = ed.reg.cur_buf().len_of(dot.line);
            let pos = if dot.offset < len && byte != b'\n' {
                ed.reg.replace(bid, dot, 1, &[byte], false)?
            } else {
                ed.reg.insert_repeated(bid, dot, 1, byte)?
            };
            ed.reg.cur_mut().dot = pos;
        }
        return Ok(());
    }

    let dot = ed.reg.cur().dot;
    let pos = ed.reg.insert_repeated(bid, dot, n, byte)?;
    ed.reg.cur_mut().dot = pos;
    Ok(())
}

/// Insert a string read from the prompt, `n` times.
pub fn insert(ed: &mut Editor, arg: Arg) -> Result<()> {
    let text = ed.prompt_bytes("Insert: ", Complete::Nothing)?;
    for _ in 0..arg.times() {
        ed.reg.insert_at_dot(&text)?;
    }
    Ok(())
}

pub fn newline(ed: &mut Editor, arg: Arg) -> Result<()> {
    let bid = ed.reg.current_buffer();
    for _ in 0..arg.times() {
        let dot = ed.reg.cur().dot;
        let pos = ed.reg.newline(bid, dot)?;
        ed.reg.cur_mut().dot = pos;
    }
    Ok(())
}

/// Split the line at the cursor without moving it.
pub fn open_line(ed: &mut Editor, arg: Arg) -> Result<()> {
    let bid = ed.reg.current_buffer();
    let here = ed.reg.cur().dot;
    for _ in 0..arg.times() {
        ed.reg.newline(bid, here)?;
    }
    ed.reg.cur_mut().dot = here;
    Ok(())
}

/// Insert the next key literally.
pub fn quoted_insert(ed: &mut Editor, arg: Arg) -> Result<()> {
    let key = ed.get_key()?;
    let byte = key
        .as_byte()
        .ok_or_else(|| Error::user(format!("Cannot insert {key}")))?;
    let (bid, dot) = (ed.reg.current_buffer(), ed.reg.cur().dot);
    let pos = ed.reg.insert_repeated(bid, dot, arg.times(), byte)?;
    ed.reg.cur_mut().dot = pos;
    Ok(())
}

pub fn space_to_tabstop(ed: &mut Editor, arg: Arg) -> Result<()> {
    if arg.n <= 0 {
        return Ok(());
    }
    insert_tabstop(ed, arg.times())
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// Add `bytes` to the kill buffer, starting a fresh entry unless the
/// previous command also killed.
fn kill(ed: &mut Editor, bytes: &[u8], dir: KillDir) -> Result<()> {
    if !ed.last_was(CmdFlags::KILL) {
        ed.kill.clear();
    }
    ed.set_this(CmdFlags::KILL);
    ed.kill.add(bytes, dir)
}

/// Delete `n` characters forward. With an argument the text is killed.
pub fn delete_char(ed: &mut Editor, arg: Arg) -> Result<()> {
    if arg.n < 0 {
        return delete_backward_char(ed, Arg {
            n: arg.n.saturating_neg(),
            given: arg.given,
        });
    }
    let gone = ed.reg.delete_at_dot(arg.times())?;
    if gone.is_empty() && arg.n > 0 {
        return Err(Error::user("End of buffer"));
    }
    if arg.given {
        kill(ed, &gone, KillDir::Forward)?;
    }
    Ok(())
}

/// Delete `n` characters backward. With an argument the text is killed.
pub fn delete_backward_char(ed: &mut Editor, arg: Arg) -> Result<()> {
    if arg.n < 0 {
        return delete_char(ed, Arg {
            n: arg.n.saturating_neg(),
            given: arg.given,
        });
    }
    let (bid, dot) = (ed.reg.current_buffer(), ed.reg.cur().dot);
    let (pos, gone) = ed.reg.delete_backward(bid, dot, arg.times())?;
    ed.reg.cur_mut().dot = pos;
    if gone.is_empty() && arg.n > 0 {
        return Err(Error::user("Beginning of buffer"));
    }
    if arg.given {
        kill(ed, &gone, KillDir::Backward)?;
    }
    Ok(())
}

/// Kill to the end of the line; at the end of a line, kill the newline.
/// With a positive count, kill that many whole lines forward; with zero or
/// a negative count, kill back to the start of the line and that many
/// lines before it.
pub fn kill_line(ed: &mut Editor, arg: Arg) -> Result<()> {
    let dot = ed.reg.cur().dot;
    let b = ed.reg.cur_buf();
    let here = b.offset_of(dot)?;

    let (start, len, dir) = if !arg.given {
        let rest = b.len_of(dot.line) - dot.offset;
        (dot, if rest == 0 { 1 } else { rest }, KillDir::Forward)
    } else if arg.n > 0 {
        let mut line = dot.line;
        for _ in 0..arg.times() {
            line = b.next(line);
            if b.is_header(line) {
                break;
            }
        }
        let end = if b.is_header(line) {
            b.size()
        } else {
            b.offset_of(Pos::new(line, 0))?
        };
        (dot, end - here, KillDir::Forward)
    } else {
        let mut line = dot.line;
        for _ in 0..arg.n.unsigned_abs() {
            let prev = b.prev(line);
            if b.is_header(prev) {
                break;
            }
            line = prev;
        }
        let start = Pos::new(line, 0);
        (start, here - b.offset_of(start)?, KillDir::Backward)
    };

    let bid = ed.reg.current_buffer();
    let gone = ed.reg.delete(bid, start, len)?;
    if gone.is_empty() && len > 0 {
        return Err(Error::user("End of buffer"));
    }
    ed.reg.cur_mut().dot = start;
    kill(ed, &gone, dir)
}

pub fn kill_region(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let (start, len) = region(ed)?;
    let bid = ed.reg.current_buffer();
    let gone = ed.reg.delete(bid, start, len)?;
    ed.reg.cur_mut().dot = start;
    kill(ed, &gone, KillDir::Forward)
}

pub fn copy_region_as_kill(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let (start, len) = region(ed)?;
    let b = ed.reg.cur_buf();
    let end = b.pos_at(b.offset_of(start)? + len)?;
    let text = b.slice(start, end)?;
    kill(ed, &text, KillDir::Forward)
}

/// Insert the kill buffer `n` times, leaving the mark at the start.
pub fn yank(ed: &mut Editor, arg: Arg) -> Result<()> {
    if arg.n < 0 {
        return Err(Error::user("Negative argument"));
    }
    let text = ed.kill.text().to_vec();
    let at = ed.reg.cur_buf().offset_of(ed.reg.cur().dot)?;
    for _ in 0..arg.times() {
        ed.reg.insert_at_dot(&text)?;
    }
    let mark = ed.reg.cur_buf().pos_at(at)?;
    ed.reg.cur_mut().mark = Some(mark);
    Ok(())
}

/// Swap the characters around the cursor and move forward. At the end of
/// a line, swap the two characters before it.
pub fn transpose_chars(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let dot = ed.reg.cur().dot;
    let text = ed.reg.cur_buf().text(dot.line);
    let at = if dot.offset == text.len() {
        dot.offset.saturating_sub(1)
    } else {
        dot.offset
    };
    if at == 0 || text.len() < 2 {
        return Err(Error::user("Cannot transpose"));
    }
    let swapped = [text[at], text[at - 1]];
    let bid = ed.reg.current_buffer();
    let pos = ed
        .reg
        .replace(bid, Pos::new(dot.line, at - 1), 2, &swapped, false)?;
    ed.reg.cur_mut().dot = pos;
    Ok(())
}

// ---------------------------------------------------------------------------
// Undo
// ---------------------------------------------------------------------------

pub fn undo(ed: &mut Editor, arg: Arg) -> Result<()> {
    let bid = ed.reg.current_buffer();
    let pos = ed.reg.undo(bid, arg.times())?;
    ed.reg.set_dot(pos);
    Ok(())
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// Toggle a mode; a positive argument turns it on, zero or negative off.
fn toggle_mode(ed: &mut Editor, name: &str, arg: Arg) -> Result<()> {
    let id = ed
        .lookup_mode(name)
        .ok_or_else(|| Error::invariant(format!("mode {name} missing")))?;
    let on = arg.given.then_some(arg.n > 0);
    ed.set_mode(id, on)?;
    Ok(())
}

pub fn overwrite_mode(ed: &mut Editor, arg: Arg) -> Result<()> {
    toggle_mode(ed, "overwrite", arg)
}

pub fn no_tab_mode(ed: &mut Editor, arg: Arg) -> Result<()> {
    toggle_mode(ed, "notab", arg)
}

#[cfg(test)]
mod tests {
    use crate::editor::tests::{dot, editor, fill, goto, keys, text, type_text};
    use crate::error::Status;
    use pretty_assertions::assert_eq;

    // ── Insertion ───────────────────────────────────────────────────────

    #[test]
    fn newline_and_open_line() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["abcd"]);
        goto(&mut ed, 1, 2);
        keys(&mut ed, "C-o");
        assert_eq!(text(&ed), "ab\ncd");
        assert_eq!(dot(&ed), (1, 2));
        keys(&mut ed, "RET");
        assert_eq!(text(&ed), "ab\n\ncd");
        assert_eq!(dot(&ed), (2, 0));
    }

    #[test]
    fn overwrite_replaces_until_line_end() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["abc"]);
        ed.execute_command_line("overwrite-mode");
        goto(&mut ed, 1, 1);
        type_text(&mut ed, "XYZ");
        assert_eq!(text(&ed), "aXYZ");
        keys(&mut ed, "C-_");
        assert_eq!(text(&ed), "abc");
    }

    #[test]
    fn notab_inserts_spaces() {
        let (mut ed, _) = editor(10, 40);
        ed.execute_command_line("no-tab-mode");
        type_text(&mut ed, "ab\t");
        assert_eq!(text(&ed), "ab      ");
        ed.execute_command_line("0 no-tab-mode");
        type_text(&mut ed, "\t");
        assert_eq!(text(&ed), "ab      \t");
    }

    #[test]
    fn quoted_insert_takes_control_keys() {
        let (mut ed, _) = editor(10, 40);
        keys(&mut ed, "C-q C-a");
        assert_eq!(text(&ed), "\x01");
    }

    #[test]
    fn transpose_at_and_before_line_end() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["abcd"]);
        goto(&mut ed, 1, 1);
        keys(&mut ed, "C-t");
        assert_eq!(text(&ed), "bacd");
        assert_eq!(dot(&ed), (1, 2));
        keys(&mut ed, "C-e C-t");
        assert_eq!(text(&ed), "badc");
        goto(&mut ed, 1, 0);
        assert_eq!(keys(&mut ed, "C-t"), vec![Status::Fail]);
    }

    // ── Deletion and killing ────────────────────────────────────────────

    #[test]
    fn delete_char_at_buffer_end_fails() {
        let (mut ed, _) = editor(10, 40);
        type_text(&mut ed, "ab");
        keys(&mut ed, "DEL");
        assert_eq!(text(&ed), "a");
        assert_eq!(keys(&mut ed, "C-d"), vec![Status::Fail]);
        keys(&mut ed, "C-a C-d");
        assert_eq!(text(&ed), "");
        assert_eq!(keys(&mut ed, "DEL"), vec![Status::Fail]);
    }

    #[test]
    fn consecutive_kills_accumulate() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["one", "two", "three"]);
        keys(&mut ed, "C-k C-k C-k");
        assert_eq!(text(&ed), "\nthree");
        assert_eq!(ed.kill.text(), b"one\ntwo");
        keys(&mut ed, "C-y");
        assert_eq!(text(&ed), "one\ntwo\nthree");
        assert_eq!(dot(&ed), (2, 3));
        assert_eq!(ed.kill.text(), b"one\ntwo");
    }

    #[test]
    fn kill_after_other_command_starts_fresh() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["one", "two"]);
        keys(&mut ed, "C-k");
        keys(&mut ed, "C-n C-a C-k");
        assert_eq!(ed.kill.text(), b"two");
    }

    #[test]
    fn kill_line_with_counts() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["a", "b", "c", "d"]);
        keys(&mut ed, "C-u 2 C-k");
        assert_eq!(text(&ed), "c\nd");
        assert_eq!(ed.kill.text(), b"a\nb\n");
        goto(&mut ed, 2, 1);
        keys(&mut ed, "C-u 0 C-k");
        assert_eq!(text(&ed), "c\n");
    }

    #[test]
    fn region_kill_and_copy() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["hello world"]);
        goto(&mut ed, 1, 5);
        keys(&mut ed, "C-SPC C-e M-w");
        assert_eq!(ed.kill.text(), b" world");
        assert_eq!(text(&ed), "hello world");
        keys(&mut ed, "C-a C-w");
        assert_eq!(text(&ed), " world");
        assert_eq!(ed.kill.text(), b"hello");
        keys(&mut ed, "C-e C-u 2 C-y");
        assert_eq!(text(&ed), " worldhellohello");
    }

    #[test]
    fn region_needs_mark() {
        let (mut ed, _) = editor(10, 40);
        assert_eq!(keys(&mut ed, "C-w"), vec![Status::Fail]);
        assert_eq!(ed.echo.current(), b"No mark set in this window");
    }

    // ── Undo ────────────────────────────────────────────────────────────

    #[test]
    fn undo_restores_kill_and_moves_cursor() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["keep this"]);
        goto(&mut ed, 1, 4);
        keys(&mut ed, "C-k");
        assert_eq!(text(&ed), "keep");
        keys(&mut ed, "C-a C-x u");
        assert_eq!(text(&ed), "keep this");
        assert_eq!(dot(&ed), (1, 4));
    }
}
