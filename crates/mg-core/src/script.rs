//! Startup scripts: command lines read from a file.
//!
//! A script line is an optional leading integer (the numeric argument),
//! a command name, then arguments:
//!
//! ```text
//! ; comment
//! global-set-key "\^X\^B" list-buffers
//! 4 insert "-"
//! set tab-width=4
//! ```
//!
//! Arguments are bare words or double-quoted strings. Quoted strings
//! understand `\^X` (control), `\e`, `\n`, `\t`, `\r`, `\\`, `\"` and
//! `\NNN` octal escapes. Arguments answer the command's prompts in order,
//! in place of keyboard input. A command that asks for more replies than
//! the line supplies fails with "not enough arguments".
//!
//! Lines that are blank or start with `;` or `#` are skipped. A line that
//! fails is reported with its line number and the next one runs; a line
//! that aborts stops the file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::command::{Arg, CommandId};
use crate::editor::Editor;
use crate::error::{Error, Result, Status};
use crate::fileio::LineReader;
use crate::mode::ModeId;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub count: Option<i32>,
    pub name: String,
    /// Prompt replies, as bytes: a quoted `\351` is the byte 0xE9.
    pub args: Vec<Vec<u8>>,
}

/// Split a line into words, decoding quoted strings.
fn tokenize(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut words = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if bytes[i] == b'"' {
            let (word, next) = quoted(bytes, i + 1)?;
            words.push(word);
            i = next;
        } else {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            words.push(bytes[start..i].to_vec());
        }
    }
    Ok(words)
}

/// Decode a quoted string whose body starts at `i`. Returns the bytes and
/// the index past the closing quote.
fn quoted(bytes: &[u8], mut i: usize) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    loop {
        let Some(&b) = bytes.get(i) else {
            return Err(Error::user("Unterminated string"));
        };
        i += 1;
        match b {
            b'"' => return Ok((out, i)),
            b'\\' => {
                let Some(&e) = bytes.get(i) else {
                    return Err(Error::user("Unterminated string"));
                };
                i += 1;
                let c = match e {
                    b'^' => {
                        let c = *bytes.get(i).ok_or_else(|| Error::user("Bad escape"))?;
                        i += 1;
                        if c == b'?' { 0x7f } else { c.to_ascii_uppercase() & 0x1f }
                    }
                    b'e' | b'E' => 0x1b,
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'r' => b'\r',
                    b'0'..=b'7' => {
                        let mut v = u32::from(e - b'0');
                        let mut n = 1;
                        while n < 3 {
                            match bytes.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    v = v * 8 + u32::from(d - b'0');
                                    i += 1;
                                    n += 1;
                                }
                                _ => break,
                            }
                        }
                        u8::try_from(v).map_err(|_| Error::user("Bad escape"))?
                    }
                    other => other,
                };
                out.push(c);
            }
            _ => out.push(b),
        }
    }
}

/// Parse one script line. Blank and comment lines give `None`.
///
/// # Errors
///
/// [`Error::User`] for an unterminated string or a line with only a count.
pub fn parse_line(text: &[u8]) -> Result<Option<ScriptLine>> {
    let trimmed = text.trim_ascii();
    if trimmed.is_empty() || trimmed.starts_with(b";") || trimmed.starts_with(b"#") {
        return Ok(None);
    }
    let mut words = tokenize(trimmed)?.into_iter();
    let Some(first) = words.next() else {
        return Ok(None);
    };
    let count = std::str::from_utf8(&first)
        .ok()
        .and_then(|w| w.parse::<i32>().ok());
    let name = match count {
        Some(_) => words
            .next()
            .ok_or_else(|| Error::user("Missing function name"))?,
        None => first,
    };
    Ok(Some(ScriptLine {
        count,
        name: String::from_utf8_lossy(&name).into_owned(),
        args: words.collect(),
    }))
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

impl Editor {
    /// Command named `name`.
    #[must_use]
    pub fn lookup_function(&self, name: &str) -> Option<CommandId> {
        self.commands.lookup(name)
    }

    /// Mode named `name`.
    #[must_use]
    pub fn lookup_mode(&self, name: &str) -> Option<ModeId> {
        self.modes.lookup(name)
    }

    /// Run one script line, returning the command's raw result.
    ///
    /// # Errors
    ///
    /// Parse errors, an unknown function, or whatever the command returns.
    pub fn run_line(&mut self, text: &[u8]) -> Result<()> {
        let Some(line) = parse_line(text)? else {
            return Ok(());
        };
        let id = self
            .lookup_function(&line.name)
            .ok_or_else(|| Error::user(format!("Unknown function: {}", line.name)))?;
        let arg = line.count.map_or(Arg::NONE, Arg::count);
        self.this_keys.clear();
        self.with_script_args(line.args, |ed| ed.run_command(id, arg))
    }

    /// Run one script line and report a failure on the echo line.
    pub fn execute_command_line(&mut self, text: &str) -> Status {
        match self.run_line(text.as_bytes()) {
            Ok(()) => Status::Continue,
            Err(e) => self.report(e),
        }
    }

    /// Run every line of the script at `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be read, or the error of the line
    /// that aborted the script.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        let lines = LineReader::new(BufReader::new(file))
            .read_all()
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        log::info!("loading {}", path.display());
        for (n, raw) in lines.iter().enumerate() {
            let Err(e) = self.run_line(raw) else {
                continue;
            };
            log::warn!("{}:{}: {e}", path.display(), n + 1);
            match e.status() {
                Status::AbortScript => return Err(e),
                Status::Fail | Status::Continue => {
                    self.echo
                        .message(&format!("{}:{}: {e}", path.display(), n + 1));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::tests::{editor, text};
    use mg_term::Key;
    use pretty_assertions::assert_eq;

    // ── Parsing ─────────────────────────────────────────────────────────

    #[test]
    fn parses_count_name_and_args() {
        let line = parse_line(br#"  3 global-set-key "\^X\^B" list-buffers "#)
            .unwrap()
            .unwrap();
        assert_eq!(
            line,
            ScriptLine {
                count: Some(3),
                name: "global-set-key".into(),
                args: vec![b"\x18\x02".to_vec(), b"list-buffers".to_vec()],
            }
        );
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        assert_eq!(parse_line(b"; a comment").unwrap(), None);
        assert_eq!(parse_line(b"# another").unwrap(), None);
        assert_eq!(parse_line(b"   ").unwrap(), None);
    }

    #[test]
    fn quoted_escapes() {
        let line = parse_line(br#"insert "a\tb\e\101\"\\""#).unwrap().unwrap();
        assert_eq!(line.args, vec![b"a\tb\x1bA\"\\".to_vec()]);
        assert!(parse_line(br#"insert "open"#).is_err());
        assert!(parse_line(b"12").is_err());
    }

    #[test]
    fn octal_escapes_above_ascii_stay_single_bytes() {
        let line = parse_line(br#"insert "\351t\377""#).unwrap().unwrap();
        assert_eq!(line.args, vec![vec![0xe9, b't', 0xff]]);
        let (mut ed, _) = editor(10, 40);
        assert_eq!(ed.execute_command_line(r#"insert "caf\351""#), Status::Continue);
        assert_eq!(ed.reg.cur_buf().text(ed.reg.cur().dot.line), b"caf\xe9");
    }

    // ── Execution ───────────────────────────────────────────────────────

    #[test]
    fn command_line_runs_with_count() {
        let (mut ed, _) = editor(10, 40);
        assert_eq!(ed.execute_command_line(r#"insert "hi""#), Status::Continue);
        assert_eq!(ed.execute_command_line(r#"2 insert "!""#), Status::Continue);
        assert_eq!(text(&ed), "hi!!");
        // No key invoked it, so there is nothing to insert.
        assert_eq!(ed.execute_command_line("self-insert-command"), Status::Fail);
    }

    #[test]
    fn unknown_function_fails() {
        let (mut ed, _) = editor(10, 40);
        assert_eq!(ed.execute_command_line("no-such-thing"), Status::Fail);
        assert_eq!(ed.echo.current(), b"Unknown function: no-such-thing");
    }

    #[test]
    fn missing_arguments_fail() {
        let (mut ed, _) = editor(10, 40);
        assert_eq!(ed.execute_command_line("goto-line"), Status::Fail);
        assert_eq!(ed.echo.current(), b"not enough arguments");
    }

    #[test]
    fn rebinding_from_a_script() {
        let (mut ed, _) = editor(10, 40);
        let status = ed.execute_command_line(r#"global-set-key "\^Xz" end-of-buffer"#);
        assert_eq!(status, Status::Continue);
        let id = ed.lookup_function("end-of-buffer").unwrap();
        let keys = [Key::ctrl(b'x'), Key::byte(b'z')];
        assert_eq!(ed.lookup(&keys), crate::keymap::Binding::Command(id));
    }

    #[test]
    fn load_continues_past_failures() {
        let dir = std::env::temp_dir().join("mg_core_script_load");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("startup");
        std::fs::write(
            &path,
            "; startup\ninsert \"a\"\nbogus-command\ninsert \"b\"\n",
        )
        .unwrap();
        let (mut ed, _) = editor(10, 40);
        ed.load(&path).unwrap();
        assert_eq!(text(&ed), "ab");
        assert!(String::from_utf8_lossy(ed.echo.current()).contains(":3: Unknown function"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let (mut ed, _) = editor(10, 40);
        let r = ed.load(Path::new("/definitely/not/here/.mg"));
        assert!(matches!(r, Err(Error::Io(_))));
    }

    #[test]
    fn lookup_mode_by_name() {
        let (ed, _) = editor(10, 40);
        assert_eq!(ed.lookup_mode("fundamental"), Some(ModeId::FUNDAMENTAL));
        assert!(ed.lookup_mode("overwrite").is_some());
        assert_eq!(ed.lookup_mode("dired"), None);
    }
}
