// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Owning the terminal: raw mode, the alternate screen, window size and
// job control.
//
// Raw mode here is stricter than a TUI's usual: ISIG and IXON are off so
// C-g, C-z, C-s and C-q arrive as ordinary keys. C-z suspends through
// the `suspend-emacs` command, not the tty driver.
//
// Restoration happens three ways: `leave`, `Drop`, and a panic hook. The
// hook writes a fixed byte string with a raw write(2) to fd 1, since the
// panicking thread may hold the stdout lock, then puts the saved termios
// back before the default hook prints the message.

use std::io::{self, Write};
use std::sync::{Mutex, Once};

use crate::ansi;
use crate::tty::Size;

/// Used when neither the tty nor `LINES`/`COLUMNS` know the size.
const FALLBACK: Size = Size { cols: 80, rows: 24 };

// ─── Size ────────────────────────────────────────────────────────────────────

#[cfg(unix)]
fn ioctl_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };
    (rc == 0).then_some(())?;
    size_from(ws.ws_row, ws.ws_col)
}

#[cfg(not(unix))]
const fn ioctl_size() -> Option<Size> {
    None
}

fn size_from(rows: u16, cols: u16) -> Option<Size> {
    (rows > 0 && cols > 0).then_some(Size { cols, rows })
}

/// Size from `LINES` and `COLUMNS`-style strings.
fn parse_env_size(lines: Option<&str>, columns: Option<&str>) -> Option<Size> {
    let rows = lines?.trim().parse().ok()?;
    let cols = columns?.trim().parse().ok()?;
    size_from(rows, cols)
}

/// The window size: the tty's, else the environment's, else 80x24.
#[must_use]
pub fn query_size() -> Size {
    ioctl_size()
        .or_else(|| {
            let lines = std::env::var("LINES").ok();
            let cols = std::env::var("COLUMNS").ok();
            parse_env_size(lines.as_deref(), cols.as_deref())
        })
        .unwrap_or(FALLBACK)
}

// ─── Raw mode ────────────────────────────────────────────────────────────────

/// `orig` with every input, output and line discipline feature the editor
/// does its own handling of turned off.
#[cfg(unix)]
fn make_raw(orig: &libc::termios) -> libc::termios {
    let mut t = *orig;
    t.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON);
    t.c_oflag &= !libc::OPOST;
    t.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    t.c_cflag &= !(libc::CSIZE | libc::PARENB);
    t.c_cflag |= libc::CS8;
    t.c_cc[libc::VMIN] = 1;
    t.c_cc[libc::VTIME] = 0;
    t
}

/// The termios in force before raw mode, for the panic hook.
#[cfg(unix)]
static SAVED: Mutex<Option<libc::termios>> = Mutex::new(None);

#[cfg(unix)]
fn set_termios(t: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, t) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Put stdin in raw mode. `None` when stdin is not a terminal.
#[cfg(unix)]
fn raw_mode_on() -> io::Result<Option<libc::termios>> {
    if unsafe { libc::isatty(libc::STDIN_FILENO) } == 0 {
        return Ok(None);
    }
    let mut orig: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &raw mut orig) } != 0 {
        return Err(io::Error::last_os_error());
    }
    if let Ok(mut saved) = SAVED.lock() {
        *saved = Some(orig);
    }
    set_termios(&make_raw(&orig))?;
    Ok(Some(orig))
}

#[cfg(unix)]
fn raw_mode_off(orig: &libc::termios) -> io::Result<()> {
    set_termios(orig)?;
    if let Ok(mut saved) = SAVED.lock() {
        *saved = None;
    }
    Ok(())
}

// ─── Screen sequences ────────────────────────────────────────────────────────

/// Bytes that switch to a clean alternate screen.
fn enter_sequence() -> Vec<u8> {
    let mut out = Vec::new();
    let _ = ansi::enter_alt_screen(&mut out)
        .and_then(|()| ansi::reset_scroll_region(&mut out))
        .and_then(|()| ansi::reset(&mut out))
        .and_then(|()| ansi::clear_screen(&mut out));
    out
}

/// Bytes that undo everything the editor may have left set, ending on the
/// user's original screen.
fn leave_sequence() -> Vec<u8> {
    let mut out = Vec::new();
    let _ = ansi::reset_scroll_region(&mut out)
        .and_then(|()| ansi::reset(&mut out))
        .and_then(|()| ansi::cursor_show(&mut out))
        .and_then(|()| ansi::exit_alt_screen(&mut out));
    out
}

/// `leave_sequence` spelled out for the panic hook, which must not
/// allocate through a possibly poisoned path.
const PANIC_RESTORE: &[u8] = b"\x1b[r\x1b[0m\x1b[?25h\x1b[?1049l";

fn write_stdout(bytes: &[u8]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(bytes)?;
    out.flush()
}

static HOOK: Once = Once::new();

fn install_panic_hook() {
    HOOK.call_once(|| {
        let next = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            #[cfg(unix)]
            {
                unsafe {
                    let _ = libc::write(
                        libc::STDOUT_FILENO,
                        PANIC_RESTORE.as_ptr().cast(),
                        PANIC_RESTORE.len(),
                    );
                }
                if let Ok(saved) = SAVED.lock() {
                    if let Some(orig) = saved.as_ref() {
                        let _ = set_termios(orig);
                    }
                }
            }
            #[cfg(not(unix))]
            let _ = write_stdout(PANIC_RESTORE);
            next(info);
        }));
    });
}

// ─── Terminal ────────────────────────────────────────────────────────────────

/// The controlling terminal. Restored on drop.
pub struct Terminal {
    #[cfg(unix)]
    orig: Option<libc::termios>,
    size: Size,
    active: bool,
}

impl Terminal {
    /// A handle on the terminal, not yet in raw mode.
    ///
    /// # Errors
    ///
    /// None at present on any platform.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            orig: None,
            size: query_size(),
            active: false,
        })
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Ask the OS for the size again, after SIGWINCH or a resume.
    pub fn refresh_size(&mut self) -> Size {
        self.size = query_size();
        self.size
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Raw mode on a cleared alternate screen. Does nothing if already
    /// active.
    ///
    /// # Errors
    ///
    /// termios or write failures.
    pub fn enter(&mut self) -> io::Result<()> {
        if self.active {
            return Ok(());
        }
        install_panic_hook();
        #[cfg(unix)]
        {
            self.orig = raw_mode_on()?;
        }
        write_stdout(&enter_sequence())?;
        self.active = true;
        log::debug!("raw mode on, {}x{}", self.size.cols, self.size.rows);
        Ok(())
    }

    /// Back to the original screen and line discipline. Does nothing if
    /// not active.
    ///
    /// # Errors
    ///
    /// termios or write failures.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        write_stdout(&leave_sequence())?;
        #[cfg(unix)]
        if let Some(orig) = self.orig.take() {
            raw_mode_off(&orig)?;
        }
        self.active = false;
        log::debug!("raw mode off");
        Ok(())
    }

    /// Restore the terminal, stop with SIGTSTP, and take the terminal back
    /// when the shell continues the process.
    ///
    /// # Errors
    ///
    /// As for [`leave`](Self::leave) and [`enter`](Self::enter).
    pub fn suspend(&mut self) -> io::Result<()> {
        self.leave()?;
        log::info!("suspending");
        #[cfg(unix)]
        unsafe {
            libc::kill(0, libc::SIGTSTP);
        }
        self.refresh_size();
        self.enter()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Size ────────────────────────────────────────────────────────────

    #[test]
    fn env_size_needs_both_values() {
        assert_eq!(
            parse_env_size(Some("40"), Some(" 100 ")),
            Some(Size { cols: 100, rows: 40 })
        );
        assert_eq!(parse_env_size(Some("40"), None), None);
        assert_eq!(parse_env_size(Some("0"), Some("80")), None);
        assert_eq!(parse_env_size(Some("x"), Some("80")), None);
    }

    #[test]
    fn query_size_is_never_zero() {
        let size = query_size();
        assert!(size.rows > 0 && size.cols > 0);
    }

    // ── Sequences ───────────────────────────────────────────────────────

    #[test]
    fn panic_restore_matches_leave_sequence() {
        assert_eq!(leave_sequence(), PANIC_RESTORE);
    }

    #[test]
    fn enter_clears_alternate_screen() {
        assert_eq!(enter_sequence(), b"\x1b[?1049h\x1b[r\x1b[0m\x1b[2J");
    }

    // ── Raw mode ────────────────────────────────────────────────────────

    #[cfg(unix)]
    #[test]
    fn raw_mode_passes_control_keys_through() {
        let mut orig: libc::termios = unsafe { std::mem::zeroed() };
        orig.c_lflag = libc::ISIG | libc::ICANON | libc::ECHO;
        orig.c_iflag = libc::IXON | libc::ICRNL;
        let raw = make_raw(&orig);
        assert_eq!(raw.c_lflag & (libc::ISIG | libc::ICANON | libc::ECHO), 0);
        assert_eq!(raw.c_iflag & (libc::IXON | libc::ICRNL), 0);
        assert_eq!(raw.c_cflag & libc::CSIZE, libc::CS8);
        assert_eq!(raw.c_cc[libc::VMIN], 1);
    }

    #[test]
    fn leave_without_enter_is_harmless() {
        let mut term = Terminal::new().unwrap();
        term.leave().unwrap();
        assert!(!term.is_active());
    }
}
