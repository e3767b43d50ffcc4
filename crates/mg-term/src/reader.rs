// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Keyboard input thread.
//
// Input is read on its own thread and handed to the editor as raw byte
// chunks over a channel. Two things depend on that:
//
//   * `AnsiTty::read_input` can wait on the channel with a timeout, which
//     is how a lone ESC is told apart from the start of a sequence and how
//     a pending SIGWINCH gets noticed.
//   * C-g must reach a command that is busy and not reading keys. The
//     thread raises the shared `CancelToken` as soon as the byte arrives;
//     the chunk itself is still delivered in order.
//
// The thread never blocks indefinitely: it waits for input in short slices
// and checks its stop flag between them.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::tty::CancelToken;

/// The keyboard interrupt byte, C-g.
pub const INTERRUPT: u8 = 0x07;

const CHUNK: usize = 4096;

/// How long one wait for input lasts before the stop flag is checked.
const SLICE: Duration = Duration::from_millis(50);

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Somewhere keyboard bytes come from.
pub trait Source: Send + 'static {
    /// Wait up to `timeout` for input. `true` means a read will not block.
    ///
    /// # Errors
    ///
    /// Any error other than an interrupted wait.
    fn wait(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Read what is available. `Ok(0)` is end of input.
    ///
    /// # Errors
    ///
    /// The underlying read error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// The process's standard input.
pub struct Stdin;

#[cfg(unix)]
impl Source for Stdin {
    fn wait(&mut self, timeout: Duration) -> io::Result<bool> {
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut pfd = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        let n = unsafe { libc::poll(&raw mut pfd, 1, ms) };
        if n < 0 {
            let e = io::Error::last_os_error();
            return if e.kind() == io::ErrorKind::Interrupted {
                Ok(false)
            } else {
                Err(e)
            };
        }
        Ok(n > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
        usize::try_from(n).map_err(|_| io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
impl Source for Stdin {
    fn wait(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(true)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut io::stdin().lock(), buf)
    }
}

// ─── StdinReader ─────────────────────────────────────────────────────────────

/// Handle to the input thread. Dropping it stops the thread.
pub struct StdinReader {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl StdinReader {
    /// Start reading standard input.
    ///
    /// # Errors
    ///
    /// The OS refused to spawn the thread.
    pub fn spawn(cancel: CancelToken) -> io::Result<(Self, Receiver<Vec<u8>>)> {
        Self::spawn_on(Stdin, cancel)
    }

    /// Start reading `source`. Every chunk received is non-empty; the
    /// channel closes at end of input, on a read error, or on stop.
    ///
    /// # Errors
    ///
    /// The OS refused to spawn the thread.
    pub fn spawn_on<S: Source>(
        mut source: S,
        cancel: CancelToken,
    ) -> io::Result<(Self, Receiver<Vec<u8>>)> {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("mg-input".into())
            .spawn(move || pump(&mut source, &tx, &flag, &cancel))?;
        Ok((
            Self {
                handle: Some(handle),
                stop,
            },
            rx,
        ))
    }

    /// Stop the thread and wait for it to finish. Safe to call twice.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StdinReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump<S: Source>(source: &mut S, tx: &Sender<Vec<u8>>, stop: &AtomicBool, cancel: &CancelToken) {
    let mut buf = [0u8; CHUNK];
    while !stop.load(Ordering::Relaxed) {
        match source.wait(SLICE) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                log::warn!("input wait failed: {e}");
                break;
            }
        }
        let n = match source.read(&mut buf) {
            Ok(0) => {
                log::debug!("end of keyboard input");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("input read failed: {e}");
                break;
            }
        };
        let chunk = &buf[..n];
        if chunk.contains(&INTERRUPT) {
            log::debug!("keyboard interrupt");
            cancel.set();
        }
        if tx.send(chunk.to_vec()).is_err() {
            break;
        }
    }
}
