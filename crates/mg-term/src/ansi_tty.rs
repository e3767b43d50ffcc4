// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// The real terminal driver.
//
// `AnsiTty` wires the pieces of this crate into one `Tty`: raw-mode
// `Terminal`, a background `StdinReader`, the key `Parser`, and an
// `OutputBuffer` that collects a whole redisplay for a single write.
//
// # Input timing
//
// `read_input` blocks on the reader channel with a short timeout. The
// timeout does two jobs: a lone ESC that sees no follow-up bytes within it
// is flushed as the ESC key, and a SIGWINCH that arrived meanwhile is
// noticed and reported as `Input::Resize`.
//
// # SIGWINCH
//
// The signal handler only stores to an `AtomicBool`, one of the few
// operations permitted inside a signal handler.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::ansi;
use crate::input::Parser;
use crate::key::Key;
use crate::output::OutputBuffer;
use crate::reader::StdinReader;
use crate::terminal::Terminal;
use crate::tty::{CancelToken, Caps, Color, Costs, Input, Size, Tty};

/// How long a lone ESC waits for the rest of an escape sequence.
const ESC_TIMEOUT: Duration = Duration::from_millis(50);

// ─── SIGWINCH ────────────────────────────────────────────────────────────────

static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
fn install_sigwinch_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigwinch_handler() {}

// ─── AnsiTty ─────────────────────────────────────────────────────────────────

/// Terminal driver for ANSI/VT100-compatible terminals.
pub struct AnsiTty {
    terminal: Terminal,
    out: OutputBuffer,
    reader: StdinReader,
    rx: Receiver<Vec<u8>>,
    parser: Parser,
    pending: VecDeque<Key>,
    cancel: CancelToken,
    size: Size,
}

impl AnsiTty {
    /// Take over the terminal: raw mode, alternate screen, input thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be put in raw mode or the
    /// reader thread cannot be started.
    pub fn open() -> io::Result<Self> {
        let mut terminal = Terminal::new()?;
        terminal.enter()?;
        install_sigwinch_handler();

        let cancel = CancelToken::new();
        let (reader, rx) = StdinReader::spawn(cancel.clone())?;
        let size = terminal.size();
        log::info!("terminal opened at {}x{}", size.cols, size.rows);

        Ok(Self {
            terminal,
            out: OutputBuffer::stdout(),
            reader,
            rx,
            parser: Parser::new(),
            pending: VecDeque::new(),
            cancel,
            size,
        })
    }

    /// Bytes written to the terminal so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.out.bytes_sent()
    }

    fn take_chunk(&mut self, bytes: &[u8]) {
        self.pending.extend(self.parser.advance(bytes));
    }
}

impl Tty for AnsiTty {
    fn size(&self) -> Size {
        self.size
    }

    fn read_input(&mut self) -> io::Result<Input> {
        loop {
            if SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed) {
                self.size = self.terminal.refresh_size();
                log::debug!("resize to {}x{}", self.size.cols, self.size.rows);
                return Ok(Input::Resize);
            }
            if let Some(key) = self.pending.pop_front() {
                return Ok(Input::Key(key));
            }
            match self.rx.recv_timeout(ESC_TIMEOUT) {
                Ok(bytes) => self.take_chunk(&bytes),
                Err(RecvTimeoutError::Timeout) => {
                    if self.parser.has_pending() {
                        self.pending.extend(self.parser.flush());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "terminal input closed",
                    ));
                }
            }
        }
    }

    fn typeahead(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(bytes) => self.take_chunk(&bytes),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        !self.pending.is_empty() || self.parser.has_pending()
    }

    fn move_to(&mut self, row: u16, col: u16) {
        let _ = ansi::move_to(&mut self.out, row, col);
    }

    fn put(&mut self, byte: u8) {
        self.out.push(byte);
    }

    fn erase_eol(&mut self) {
        let _ = ansi::erase_eol(&mut self.out);
    }

    fn erase_eop(&mut self) {
        let _ = ansi::erase_eop(&mut self.out);
    }

    fn set_color(&mut self, color: Color) {
        let _ = match color {
            Color::Text => ansi::reset(&mut self.out),
            Color::Mode => ansi::reverse(&mut self.out),
        };
    }

    fn insert_lines(&mut self, row: u16, bot: u16, n: u16) {
        let _ = ansi::insert_in_region(&mut self.out, row, bot, n);
    }

    fn delete_lines(&mut self, row: u16, bot: u16, n: u16) {
        let _ = ansi::delete_in_region(&mut self.out, row, bot, n);
    }

    fn caps(&self) -> Caps {
        Caps::INSERT_DELETE | Caps::SCROLL_REGION
    }

    fn costs(&self) -> Costs {
        // Scroll region set + move + IL/DL + region reset.
        Costs {
            insert_line: 18,
            delete_line: 18,
            erase_eol: 3,
        }
    }

    fn beep(&mut self, visible: bool) {
        let _ = if visible {
            ansi::flash(&mut self.out)
        } else {
            ansi::bell(&mut self.out)
        };
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.send().map(drop)
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn suspend(&mut self) -> io::Result<()> {
        self.out.send()?;
        self.terminal.suspend()?;
        // The window may have changed size while we were stopped.
        SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for AnsiTty {
    fn drop(&mut self) {
        let _ = self.out.send();
        self.reader.stop();
        let _ = self.terminal.leave();
        log::info!("terminal restored");
    }
}
