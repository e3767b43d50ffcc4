// SPDX-License-Identifier: MIT
//
// VT100/ANSI encoders.
//
// Stateless writers for the few sequences mg's display issues. Rows and
// columns are 0-based here and converted to the terminal's 1-based
// numbering on the way out. Every function forwards the writer's error;
// the driver writes into an `OutputBuffer`, where that never happens.

use std::io::{self, Write};

/// CSI with an optional count: the count is omitted when it is 1, which
/// terminals read as the default.
fn csi_count(w: &mut impl Write, n: u16, op: u8) -> io::Result<()> {
    if n == 1 {
        w.write_all(&[0x1b, b'[', op])
    } else {
        write!(w, "\x1b[{n}{}", char::from(op))
    }
}

// ─── Cursor and erasing ──────────────────────────────────────────────────────

/// CUP to `row`, `col`.
pub fn move_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", row + 1, col + 1)
}

pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// ED 2.
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// EL 0: cursor to end of line, in the current color.
pub fn erase_eol(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

/// ED 0: cursor to end of screen.
pub fn erase_eop(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[J")
}

// ─── Colors ──────────────────────────────────────────────────────────────────

/// SGR 0, the text color.
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

/// SGR 7, the mode-line color.
pub fn reverse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[7m")
}

// ─── Line insert and delete ──────────────────────────────────────────────────

/// DECSTBM for rows `top..=bottom`. The cursor position is undefined
/// afterwards.
pub fn set_scroll_region(w: &mut impl Write, top: u16, bottom: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}r", top + 1, bottom + 1)
}

pub fn reset_scroll_region(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[r")
}

/// IL: open `n` blank lines at the cursor row.
pub fn insert_lines(w: &mut impl Write, n: u16) -> io::Result<()> {
    csi_count(w, n, b'L')
}

/// DL: remove `n` lines at the cursor row.
pub fn delete_lines(w: &mut impl Write, n: u16) -> io::Result<()> {
    csi_count(w, n, b'M')
}

/// Insert `n` lines at `row`, pushing rows down to `bottom` and no
/// further. Leaves the scroll region reset and the cursor at `row`.
pub fn insert_in_region(w: &mut impl Write, row: u16, bottom: u16, n: u16) -> io::Result<()> {
    set_scroll_region(w, row, bottom)?;
    move_to(w, row, 0)?;
    insert_lines(w, n)?;
    reset_scroll_region(w)
}

/// Delete `n` lines at `row`; rows up to `bottom` move up and blank rows
/// appear at `bottom`.
pub fn delete_in_region(w: &mut impl Write, row: u16, bottom: u16, n: u16) -> io::Result<()> {
    set_scroll_region(w, row, bottom)?;
    move_to(w, row, 0)?;
    delete_lines(w, n)?;
    reset_scroll_region(w)
}

// ─── Bells and screens ───────────────────────────────────────────────────────

pub fn bell(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x07")
}

/// Visible bell: reverse the whole screen and back.
pub fn flash(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?5h\x1b[?5l")
}

/// Switch to the alternate screen, saving the user's.
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}
