//! Buffer and file commands.

use std::path::Path;

use crate::buffer::{BufFlags, BufferId};
use crate::command::Arg;
use crate::editor::{Complete, Editor};
use crate::error::{Error, Result};
use crate::fileio::ReadOutcome;
use crate::window::WindowId;

use super::expand;

const BUFFER_LIST: &str = "*Buffer List*";

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// A window other than the current one, splitting if there is only one.
fn other_window(ed: &mut Editor) -> Result<WindowId> {
    let wins = ed.reg.windows();
    if wins.len() == 1 {
        return ed.reg.split_window();
    }
    let cur = ed.reg.current_window();
    let idx = wins.iter().position(|&w| w == cur).unwrap_or(0);
    Ok(wins[(idx + 1) % wins.len()])
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

pub fn switch_to_buffer(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let cur = ed.reg.current_buffer();
    let default = ed
        .reg
        .buffers()
        .iter()
        .rev()
        .copied()
        .find(|&b| b != cur)
        .and_then(|b| ed.reg.buffer(b).ok())
        .map(|b| b.name.clone());
    let label = match &default {
        Some(d) => format!("Switch to buffer (default {d}): "),
        None => "Switch to buffer: ".to_string(),
    };
    let reply = ed.prompt(&label, Complete::Buffer)?;
    let name = if reply.is_empty() {
        default.ok_or_else(|| Error::user("No buffer name"))?
    } else {
        reply
    };
    let bid = ed.reg.find_or_create(&name)?;
    let wid = ed.reg.current_window();
    ed.reg.show_buffer(wid, bid)
}

pub fn kill_buffer(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let cur = ed.reg.cur_buf().name.clone();
    let reply = ed.prompt(&format!("Kill buffer (default {cur}): "), Complete::Buffer)?;
    let name = if reply.is_empty() { cur } else { reply };
    let bid = ed
        .reg
        .find_buffer(&name)
        .ok_or_else(|| Error::user(format!("No such buffer: {name}")))?;
    let b = ed.reg.buffer(bid)?;
    let ask = b.is_changed() && b.file.is_some();
    if ask && !ed.confirm(&format!("Buffer {name} modified; kill anyway?"))? {
        return Ok(());
    }
    ed.reg.kill_buffer(bid)
}

/// Show every buffer in `*Buffer List*`, in another window.
pub fn list_buffers(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let cur = ed.reg.current_buffer();
    let mut lines = vec![
        " MR Buffer                Size  File".to_string(),
        " -- ------                ----  ----".to_string(),
    ];
    for &bid in ed.reg.buffers() {
        let b = ed.reg.buffer(bid)?;
        if b.name == BUFFER_LIST {
            continue;
        }
        let line = format!(
            "{}{}{} {:<20} {:>6}  {}",
            if bid == cur { '.' } else { ' ' },
            if b.is_changed() { '*' } else { ' ' },
            if b.is_read_only() { '%' } else { ' ' },
            b.name,
            b.size(),
            b.file.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        );
        lines.push(line.trim_end().to_string());
    }

    let list = ed.reg.find_or_create(BUFFER_LIST)?;
    ed.reg.replace_text(list, &lines)?;
    let b = ed.reg.buffer_mut(list)?;
    b.flags.remove(BufFlags::CHANGED);
    b.flags.insert(BufFlags::READ_ONLY);

    let showing = ed.reg.windows_on(list).next();
    let wid = match showing {
        Some(w) => w,
        None => other_window(ed)?,
    };
    ed.reg.show_buffer(wid, list)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

impl Editor {
    /// Show `path` in the current window, reading it into a new buffer
    /// unless some buffer already visits it.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file exists but cannot be read.
    pub fn visit_file(&mut self, path: &Path) -> Result<()> {
        let wid = self.reg.current_window();
        let existing = self
            .reg
            .buffers()
            .iter()
            .copied()
            .find(|&b| self.reg.buffer(b).is_ok_and(|b| b.file.as_deref() == Some(path)));
        if let Some(bid) = existing {
            return self.reg.show_buffer(wid, bid);
        }

        let base = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let name = self.reg.unique_name(&base);
        let bid = self.reg.create_buffer(&name)?;
        let outcome = match self.reg.read_file(bid, path) {
            Ok(o) => o,
            Err(e) => {
                self.reg.kill_buffer(bid)?;
                return Err(e);
            }
        };
        self.reg.show_buffer(wid, bid)?;
        match outcome {
            ReadOutcome::Read(n) => {
                let b = self.reg.buffer(bid)?;
                let n = if b.len_of(b.last_line()) == 0 { n.saturating_sub(1) } else { n };
                self.message(&format!("[Read {n} line{}]", plural(n)));
            }
            ReadOutcome::NewFile => self.message("(New file)"),
        }
        Ok(())
    }

    /// Write buffer `bid` to `path` (its own file when `None`) and report it.
    fn save(&mut self, bid: BufferId, path: Option<&Path>) -> Result<()> {
        self.reg.write_file(bid, path)?;
        let file = self
            .reg
            .buffer(bid)?
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.message(&format!("Wrote {file}"));
        Ok(())
    }
}

pub fn find_file(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let name = ed.prompt("Find file: ", Complete::Nothing)?;
    if name.is_empty() {
        return Err(Error::user("No file name"));
    }
    ed.visit_file(&expand(&name))
}

pub fn save_buffer(ed: &mut Editor, arg: Arg) -> Result<()> {
    let bid = ed.reg.current_buffer();
    let b = ed.reg.buffer(bid)?;
    if b.file.is_none() {
        return write_file(ed, arg);
    }
    if !b.is_changed() {
        ed.message("(No changes need to be saved)");
        return Ok(());
    }
    ed.save(bid, None)
}

/// Write the buffer to a file read from the prompt, which becomes the
/// buffer's file. The buffer takes the file's name when that is free.
pub fn write_file(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let name = ed.prompt("Write file: ", Complete::Nothing)?;
    if name.is_empty() {
        return Err(Error::user("No file name"));
    }
    let path = expand(&name);
    let bid = ed.reg.current_buffer();
    ed.save(bid, Some(&path))?;
    if let Some(base) = path.file_name().map(|n| n.to_string_lossy().into_owned()) {
        if ed.reg.find_buffer(&base).is_none() {
            ed.reg.buffer_mut(bid)?.name = base;
        }
    }
    Ok(())
}

/// Offer to save each modified file buffer, then quit, asking once more if
/// unsaved changes remain.
pub fn save_buffers_kill(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let modified = |ed: &Editor| -> Vec<BufferId> {
        ed.reg
            .buffers()
            .iter()
            .copied()
            .filter(|&b| {
                ed.reg
                    .buffer(b)
                    .is_ok_and(|b| b.is_changed() && b.file.is_some())
            })
            .collect()
    };
    for bid in modified(ed) {
        let file = ed
            .reg
            .buffer(bid)?
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        if ed.confirm(&format!("Save file {file}?"))? {
            ed.save(bid, None)?;
        }
    }
    if modified(ed).is_empty() || ed.confirm("Modified buffers exist; really exit?")? {
        log::info!("exiting");
        ed.request_quit();
    }
    Ok(())
}

pub fn suspend(ed: &mut Editor, _arg: Arg) -> Result<()> {
    ed.suspend()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::editor::tests::{editor, keys, text, type_text};
    use crate::error::Status;
    use pretty_assertions::assert_eq;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mg_core_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn buffer_name(ed: &crate::editor::Editor) -> String {
        ed.reg.cur_buf().name.clone()
    }

    // ── Files ───────────────────────────────────────────────────────────

    #[test]
    fn find_file_reads_into_named_buffer() {
        let dir = scratch_dir("find_file");
        let path = dir.join("notes.txt");
        fs::write(&path, "alpha\nbeta\n").unwrap();
        let (mut ed, _) = editor(10, 40);
        let line = format!("find-file \"{}\"", path.display());
        assert_eq!(ed.execute_command_line(&line), Status::Continue);
        assert_eq!(buffer_name(&ed), "notes.txt");
        assert_eq!(text(&ed), "alpha\nbeta\n");
        assert_eq!(ed.echo.current(), b"[Read 2 lines]");

        // Visiting again reuses the buffer.
        let count = ed.reg.buffers().len();
        ed.execute_command_line(&line);
        assert_eq!(ed.reg.buffers().len(), count);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_new() {
        let dir = scratch_dir("new_file");
        let path = dir.join("fresh");
        let (mut ed, _) = editor(10, 40);
        ed.visit_file(&path).unwrap();
        assert_eq!(ed.echo.current(), b"(New file)");
        assert_eq!(text(&ed), "");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_round_trips_bytes() {
        let dir = scratch_dir("save");
        let path = dir.join("data");
        fs::write(&path, "one\ntwo").unwrap();
        let (mut ed, _) = editor(10, 40);
        ed.visit_file(&path).unwrap();
        type_text(&mut ed, ">");
        keys(&mut ed, "C-x C-s");
        assert_eq!(fs::read(&path).unwrap(), b">one\ntwo");
        assert!(!ed.reg.cur_buf().is_changed());
        keys(&mut ed, "C-x C-s");
        assert_eq!(ed.echo.current(), b"(No changes need to be saved)");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_file_names_the_buffer() {
        let dir = scratch_dir("write");
        let path = dir.join("out.txt");
        let (mut ed, _) = editor(10, 40);
        type_text(&mut ed, "hi");
        let line = format!("write-file \"{}\"", path.display());
        assert_eq!(ed.execute_command_line(&line), Status::Continue);
        assert_eq!(fs::read(&path).unwrap(), b"hi");
        assert_eq!(buffer_name(&ed), "out.txt");
        assert_eq!(ed.reg.cur_buf().file.as_deref(), Some(path.as_path()));
        let _ = fs::remove_dir_all(&dir);
    }

    // ── Buffers ─────────────────────────────────────────────────────────

    #[test]
    fn switch_and_kill_buffers() {
        let (mut ed, _) = editor(10, 40);
        type_text(&mut ed, "scratch text");
        assert_eq!(ed.execute_command_line("switch-to-buffer other"), Status::Continue);
        assert_eq!(buffer_name(&ed), "other");
        assert_eq!(text(&ed), "");
        // Empty reply picks the previous buffer.
        ed.execute_command_line(r#"switch-to-buffer """#);
        assert_eq!(buffer_name(&ed), "*scratch*");
        assert_eq!(text(&ed), "scratch text");
        ed.execute_command_line("kill-buffer other");
        assert!(ed.reg.find_buffer("other").is_none());
        assert_eq!(ed.execute_command_line("kill-buffer nope"), Status::Fail);
        assert_eq!(ed.echo.current(), b"No such buffer: nope");
    }

    #[test]
    fn list_buffers_pops_up_a_window() {
        let (mut ed, _) = editor(12, 50);
        type_text(&mut ed, "x");
        keys(&mut ed, "C-x C-b");
        assert_eq!(ed.reg.windows().len(), 2);
        assert_eq!(buffer_name(&ed), "*scratch*");
        let list = ed.reg.find_buffer("*Buffer List*").unwrap();
        let b = ed.reg.buffer(list).unwrap();
        assert!(b.is_read_only());
        let contents = String::from_utf8(b.contents()).unwrap();
        let rows: Vec<&str> = contents.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[2].starts_with(".*  *scratch*"));
        assert!(rows[2].ends_with(" 1"));
    }

    #[test]
    fn list_buffers_reuses_its_window() {
        let (mut ed, _) = editor(12, 50);
        keys(&mut ed, "C-x C-b");
        keys(&mut ed, "C-x C-b");
        assert_eq!(ed.reg.windows().len(), 2);
        let list = ed.reg.find_buffer("*Buffer List*").unwrap();
        assert_eq!(ed.reg.windows_on(list).count(), 1);
        assert_eq!(buffer_name(&ed), "*scratch*");
    }

    // ── Quitting ────────────────────────────────────────────────────────

    #[test]
    fn quit_asks_about_modified_files() {
        let dir = scratch_dir("quit");
        let path = dir.join("f");
        fs::write(&path, "x").unwrap();
        let (mut ed, _) = editor(10, 40);
        ed.visit_file(&path).unwrap();
        type_text(&mut ed, "y");
        assert_eq!(
            ed.execute_command_line("save-buffers-kill-emacs n n"),
            Status::Continue
        );
        assert!(!ed.quitting());
        ed.execute_command_line("save-buffers-kill-emacs y");
        assert!(ed.quitting());
        assert_eq!(fs::read(&path).unwrap(), b"yx");
        let _ = fs::remove_dir_all(&dir);
    }
}
