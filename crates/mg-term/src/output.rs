// SPDX-License-Identifier: MIT
//
// Batched terminal output.
//
// A redisplay is dozens of small driver operations. `OutputBuffer` holds
// them until the engine flushes, then hands the lot to its sink in one
// `write_all`, so the terminal never shows a half-updated screen. The sink
// is stdout for the real driver and a `Vec<u8>` in tests.

use std::io::{self, Stdout, Write};

/// Initial capacity; a full repaint of a large terminal fits without
/// growing.
const INITIAL_CAPACITY: usize = 16 * 1024;

/// Pending output plus the writer it goes to.
pub struct OutputBuffer<W: Write = Stdout> {
    pending: Vec<u8>,
    sink: W,
    sent: u64,
    sends: u64,
}

impl OutputBuffer<Stdout> {
    /// A buffer that sends to the process's stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::with_sink(io::stdout())
    }
}

impl<W: Write> OutputBuffer<W> {
    #[must_use]
    pub fn with_sink(sink: W) -> Self {
        Self {
            pending: Vec::with_capacity(INITIAL_CAPACITY),
            sink,
            sent: 0,
            sends: 0,
        }
    }

    /// Bytes waiting for the next send.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Bytes sent over the buffer's lifetime.
    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.sent
    }

    /// Number of non-empty sends.
    #[must_use]
    pub const fn sends(&self) -> u64 {
        self.sends
    }

    #[must_use]
    pub const fn sink(&self) -> &W {
        &self.sink
    }

    pub fn push(&mut self, byte: u8) {
        self.pending.push(byte);
    }

    /// Write everything pending to the sink and flush it. Returns the
    /// number of bytes sent; nothing is written when nothing is pending.
    ///
    /// # Errors
    ///
    /// The sink's write error. Pending bytes are dropped either way: a
    /// partial escape sequence must not be prefixed to the next update.
    pub fn send(&mut self) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let n = self.pending.len();
        let result = self
            .sink
            .write_all(&self.pending)
            .and_then(|()| self.sink.flush());
        self.pending.clear();
        result?;
        self.sent += n as u64;
        self.sends += 1;
        log::trace!("sent {n} bytes to terminal");
        Ok(n)
    }
}

impl<W: Write> Write for OutputBuffer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send().map(drop)
    }
}
