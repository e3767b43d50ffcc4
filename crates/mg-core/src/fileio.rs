//! File I/O: reading files into buffers and writing them back.
//!
//! Files are read line by line through [`LineReader`], which reports
//! whether the final line lacked a newline. A buffer's text is its lines
//! joined by `\n`, so a file that ends in a newline reads as a final empty
//! line; writing the buffer back reproduces the file byte for byte.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::buffer::{BufFlags, Buffer, BufferId};
use crate::error::{Error, Result};
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// LineReader
// ---------------------------------------------------------------------------

/// Reads newline-terminated lines, keeping bytes as they are.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// The next line without its newline, and whether it was partial (the
    /// input ended before a newline). `None` at end of input.
    ///
    /// # Errors
    ///
    /// Any error from the underlying reader.
    pub fn read_line(&mut self) -> io::Result<Option<(Vec<u8>, bool)>> {
        self.buf.clear();
        let n = self.inner.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        let partial = self.buf.last() != Some(&b'\n');
        if !partial {
            self.buf.pop();
        }
        Ok(Some((std::mem::take(&mut self.buf), partial)))
    }

    /// Every line, with a trailing empty line when the input ended in a
    /// newline (or was empty).
    ///
    /// # Errors
    ///
    /// Any error from the underlying reader.
    pub fn read_all(&mut self) -> io::Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        let mut partial = false;
        while let Some((line, p)) = self.read_line()? {
            lines.push(line);
            partial = p;
        }
        if !partial {
            lines.push(Vec::new());
        }
        Ok(lines)
    }
}

/// Write a buffer's text to `w`, returning the number of bytes written.
///
/// # Errors
///
/// Any error from the writer.
pub fn write_buffer(w: &mut impl Write, buffer: &Buffer) -> io::Result<usize> {
    let mut written = 0;
    for (i, id) in buffer.line_ids().enumerate() {
        if i > 0 {
            w.write_all(b"\n")?;
            written += 1;
        }
        let text = buffer.text(id);
        w.write_all(text)?;
        written += text.len();
    }
    w.flush()?;
    Ok(written)
}

// ---------------------------------------------------------------------------
// Registry operations
// ---------------------------------------------------------------------------

/// What reading a file found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The file was read; this many lines.
    Read(usize),
    /// No such file; the buffer is empty.
    NewFile,
}

impl Registry {
    /// Replace buffer `bid`'s text with the contents of `path` and
    /// associate the buffer with it. A missing file leaves the buffer
    /// empty.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] for unreadable files, [`Error::OutOfMemory`].
    pub fn read_file(&mut self, bid: BufferId, path: &Path) -> Result<ReadOutcome> {
        let outcome = match File::open(path) {
            Ok(file) => {
                let lines = LineReader::new(BufReader::new(file))
                    .read_all()
                    .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
                let count = lines.len();
                self.replace_text(bid, lines)?;
                log::info!("read {} ({count} lines)", path.display());
                ReadOutcome::Read(count)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.replace_text(bid, std::iter::empty::<&[u8]>())?;
                ReadOutcome::NewFile
            }
            Err(e) => return Err(Error::Io(format!("{}: {e}", path.display()))),
        };
        let buffer = self.buffer_mut(bid)?;
        buffer.file = Some(path.to_path_buf());
        buffer.flags.remove(BufFlags::CHANGED);
        let showing: Vec<_> = self.windows_on(bid).collect();
        for w in showing {
            self.windows[w].garbage();
        }
        Ok(outcome)
    }

    /// Write buffer `bid` to `path` (its own file when `None`), clearing
    /// the changed flag. Returns the line count.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if the buffer has no file, [`Error::Io`] on write
    /// failure (the buffer stays changed).
    pub fn write_file(&mut self, bid: BufferId, path: Option<&Path>) -> Result<usize> {
        let buffer = self.buffer(bid)?;
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => buffer
                .file
                .clone()
                .ok_or_else(|| Error::user("No file name"))?,
        };
        let io_err = |e: io::Error| Error::Io(format!("{}: {e}", path.display()));
        let file = fs::File::create(&path).map_err(io_err)?;
        let mut w = BufWriter::new(file);
        write_buffer(&mut w, buffer).map_err(io_err)?;
        let lines = buffer.line_count();
        log::info!("wrote {} ({lines} lines)", path.display());

        let buffer = self.buffer_mut(bid)?;
        buffer.file = Some(path);
        buffer.flags.remove(BufFlags::CHANGED);
        let showing: Vec<_> = self.windows_on(bid).collect();
        for w in showing {
            self.windows[w].flags |= crate::window::WinFlags::MODE;
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines_of(input: &[u8]) -> Vec<(Vec<u8>, bool)> {
        let mut r = LineReader::new(input);
        std::iter::from_fn(|| r.read_line().unwrap()).collect()
    }

    // ── LineReader ──────────────────────────────────────────────────────

    #[test]
    fn partial_flag_marks_missing_final_newline() {
        assert_eq!(
            lines_of(b"a\nb"),
            vec![(b"a".to_vec(), false), (b"b".to_vec(), true)]
        );
        assert_eq!(lines_of(b"a\n"), vec![(b"a".to_vec(), false)]);
        assert!(lines_of(b"").is_empty());
    }

    #[test]
    fn bytes_pass_through() {
        assert_eq!(
            lines_of(b"\xff\r\x00\n"),
            vec![(b"\xff\r\x00".to_vec(), false)]
        );
    }

    #[test]
    fn read_all_adds_final_empty_line() {
        assert_eq!(
            LineReader::new(&b"a\nb\n"[..]).read_all().unwrap(),
            vec![b"a".to_vec(), b"b".to_vec(), Vec::new()]
        );
        assert_eq!(
            LineReader::new(&b"a\nb"[..]).read_all().unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
        assert_eq!(
            LineReader::new(&b""[..]).read_all().unwrap(),
            vec![Vec::<u8>::new()]
        );
    }

    // ── Round trip ──────────────────────────────────────────────────────

    #[test]
    fn read_write_round_trip_is_exact() {
        let dir = std::env::temp_dir().join("mg_core_fileio_test");
        let _ = fs::create_dir_all(&dir);
        let cases: [&[u8]; 4] = [b"one\ntwo\n", b"no newline", b"", b"\n\n"];
        for (i, content) in cases.iter().enumerate() {
            let src = dir.join(format!("src{i}.txt"));
            let dst = dir.join(format!("dst{i}.txt"));
            fs::write(&src, content).unwrap();

            let mut reg = Registry::new(24).unwrap();
            let bid = reg.current_buffer();
            reg.read_file(bid, &src).unwrap();
            assert_eq!(reg.buffer(bid).unwrap().contents(), content.to_vec());
            reg.write_file(bid, Some(&dst)).unwrap();
            assert_eq!(fs::read(&dst).unwrap(), content.to_vec());
            assert_eq!(reg.buffer(bid).unwrap().file.as_deref(), Some(dst.as_path()));
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_new() {
        let mut reg = Registry::new(24).unwrap();
        let bid = reg.current_buffer();
        let path = std::env::temp_dir().join("mg_core_definitely_missing.txt");
        assert_eq!(reg.read_file(bid, &path).unwrap(), ReadOutcome::NewFile);
        assert_eq!(reg.buffer(bid).unwrap().contents(), b"");
    }

    #[test]
    fn write_without_file_name_fails() {
        let mut reg = Registry::new(24).unwrap();
        let bid = reg.current_buffer();
        assert_eq!(reg.write_file(bid, None), Err(Error::user("No file name")));
    }

    #[test]
    fn write_clears_changed_flag() {
        let dir = std::env::temp_dir().join("mg_core_fileio_changed");
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("out.txt");
        let mut reg = Registry::new(24).unwrap();
        let bid = reg.current_buffer();
        reg.insert_at_dot(b"text").unwrap();
        assert!(reg.cur_buf().is_changed());
        reg.write_file(bid, Some(&path)).unwrap();
        assert!(!reg.cur_buf().is_changed());
        let _ = fs::remove_dir_all(&dir);
    }
}
