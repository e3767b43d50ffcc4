//! Extension commands: running commands by name, binding keys, numeric
//! arguments, startup files and options.

use mg_term::key::describe;

use crate::command::{Arg, CommandId};
use crate::editor::{Complete, Editor};
use crate::error::{Error, Result};
use crate::keymap::{Binding, KeymapId, Target};
use crate::mode::ModeId;
use crate::options::parse_set;

use super::expand;

/// Read a command name, completing over the command table.
fn prompt_command(ed: &mut Editor, label: &str) -> Result<CommandId> {
    let name = ed.prompt(label, Complete::Command)?;
    ed.lookup_function(&name)
        .ok_or_else(|| Error::user(format!("[No match] {name}")))
}

pub fn execute_extended_command(ed: &mut Editor, arg: Arg) -> Result<()> {
    let label = if arg.given {
        format!("{} M-x ", arg.n)
    } else {
        "M-x ".to_string()
    };
    let id = prompt_command(ed, &label)?;
    ed.this_keys.clear();
    ed.run_command(id, arg)
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Read a key sequence and a command, and bind them in `map`.
fn bind_in(ed: &mut Editor, map: KeymapId, label: &str) -> Result<()> {
    let keys = ed.prompt_keys(label)?;
    let id = prompt_command(ed, &format!("{label}{} to command: ", describe(&keys)))?;
    ed.keymaps.bind_keys(map, &keys, Target::Command(id))?;
    log::debug!("bound {} to {}", describe(&keys), ed.commands.name(id));
    Ok(())
}

pub fn global_set_key(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let map = ed.global_map();
    bind_in(ed, map, "Set key globally: ")
}

pub fn global_unset_key(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let keys = ed.prompt_keys("Unset key globally: ")?;
    let map = ed.global_map();
    ed.keymaps.bind_keys(map, &keys, Target::Unbind)
}

/// Bind in the keymap of the current buffer's topmost mode.
pub fn local_set_key(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let top = ed
        .reg
        .cur_buf()
        .modes
        .last()
        .copied()
        .unwrap_or(ModeId::FUNDAMENTAL);
    if top == ModeId::FUNDAMENTAL {
        return Err(Error::user("No local mode"));
    }
    let map = ed.modes.get(top)?.keymap;
    bind_in(ed, map, "Set key locally: ")
}

/// Bind a key in the keymap of a mode named at the prompt.
pub fn define_key(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let name = ed.prompt("Define key map: ", Complete::Nothing)?;
    let mode = ed
        .lookup_mode(&name)
        .ok_or_else(|| Error::user(format!("Unknown map {name}")))?;
    let map = ed.modes.get(mode)?.keymap;
    bind_in(ed, map, &format!("Define key in {name}: "))
}

pub fn describe_key_briefly(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let keys = ed.prompt_keys("Describe key briefly: ")?;
    let msg = match ed.lookup(&keys) {
        Binding::Command(id) => format!(
            "{} runs the command {}",
            describe(&keys),
            ed.commands.name(id)
        ),
        Binding::Prefix(_) | Binding::Unbound => format!("{} is not bound", describe(&keys)),
    };
    ed.message(&msg);
    Ok(())
}

// ---------------------------------------------------------------------------
// Numeric arguments
// ---------------------------------------------------------------------------

pub fn universal_argument(ed: &mut Editor, _arg: Arg) -> Result<()> {
    ed.read_argument(4, false, 1)
}

/// `M-0` .. `M-9`: start an argument with the typed digit.
pub fn digit_argument(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let d = ed.last_key().digit().unwrap_or(0);
    ed.read_argument(i32::from(d), true, 1)
}

pub fn negative_argument(ed: &mut Editor, _arg: Arg) -> Result<()> {
    ed.read_argument(1, false, -1)
}

pub fn keyboard_quit(_ed: &mut Editor, _arg: Arg) -> Result<()> {
    Err(Error::Aborted)
}

pub fn ring_bell(ed: &mut Editor, _arg: Arg) -> Result<()> {
    ed.beep();
    Ok(())
}

// ---------------------------------------------------------------------------
// Startup files and options
// ---------------------------------------------------------------------------

pub fn load(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let name = ed.prompt("Load file: ", Complete::Nothing)?;
    if name.is_empty() {
        return Err(Error::user("No file name"));
    }
    ed.load(&expand(&name))
}

/// `set` with vi-style arguments: `name`, `noname`, `name!`, `name?`,
/// `name=value`, `all`, or nothing for the changed options.
pub fn set(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let args = ed.prompt("Set: ", Complete::Nothing)?;
    let mut shown = Vec::new();
    for directive in parse_set(&args) {
        if let Some(text) = ed.options.apply(&directive)? {
            shown.push(text);
        }
    }
    ed.sync_options();
    if !shown.is_empty() {
        ed.message(&shown.join(" "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::editor::tests::{dot, editor, fill, keys, text};
    use crate::error::Status;
    use crate::keymap::Binding;
    use mg_term::Key;
    use pretty_assertions::assert_eq;

    // ── M-x ─────────────────────────────────────────────────────────────

    #[test]
    fn extended_command_with_completion() {
        let (mut ed, tty) = editor(10, 40);
        fill(&mut ed, &["one", "two"]);
        tty.push_keys(&[Key::ESC, Key::byte(b'x')]);
        tty.type_str("end-of-b\t\r");
        ed.run().unwrap();
        assert_eq!(dot(&ed), (2, 3));
    }

    #[test]
    fn extended_command_passes_argument() {
        let (mut ed, tty) = editor(10, 40);
        tty.push_keys(&mg_term::key::parse("C-u 3 M-x").unwrap());
        tty.type_str("insert\rab\r");
        ed.run().unwrap();
        assert_eq!(text(&ed), "ababab");
    }

    #[test]
    fn extended_command_unknown_name() {
        let (mut ed, _) = editor(10, 40);
        let status = ed.execute_command_line("execute-extended-command no-such");
        assert_eq!(status, Status::Fail);
        assert_eq!(ed.echo.current(), b"[No match] no-such");
    }

    // ── Binding ─────────────────────────────────────────────────────────

    #[test]
    fn describe_key() {
        let (mut ed, _) = editor(10, 40);
        ed.execute_command_line(r#"describe-key-briefly "C-x C-f""#);
        assert_eq!(ed.echo.current(), b"C-x C-f runs the command find-file");
        ed.execute_command_line(r"describe-key-briefly \^Xh");
        assert_eq!(ed.echo.current(), b"C-x h is not bound");
    }

    #[test]
    fn unset_global_key() {
        let (mut ed, _) = editor(10, 40);
        ed.execute_command_line("global-unset-key C-a");
        assert_eq!(ed.lookup(&[Key::ctrl(b'a')]), Binding::Unbound);
        assert_eq!(keys(&mut ed, "C-a"), vec![Status::Fail]);
    }

    #[test]
    fn local_binding_needs_a_mode() {
        let (mut ed, _) = editor(10, 40);
        let status = ed.execute_command_line("local-set-key C-a end-of-buffer");
        assert_eq!(status, Status::Fail);
        assert_eq!(ed.echo.current(), b"No local mode");

        ed.execute_command_line("overwrite-mode");
        let status = ed.execute_command_line("local-set-key C-a end-of-buffer");
        assert_eq!(status, Status::Continue);
        let eob = ed.lookup_function("end-of-buffer").unwrap();
        assert_eq!(ed.lookup(&[Key::ctrl(b'a')]), Binding::Command(eob));
        // The global binding is untouched.
        let bol = ed.lookup_function("beginning-of-line").unwrap();
        let global = ed.global_map();
        assert_eq!(
            ed.keymaps.lookup_seq(global, &[Key::ctrl(b'a')]),
            Binding::Command(bol)
        );
    }

    #[test]
    fn define_key_in_named_mode() {
        let (mut ed, _) = editor(10, 40);
        let status = ed.execute_command_line(r#"define-key notab "C-c t" end-of-line"#);
        assert_eq!(status, Status::Continue);
        let keys = [Key::ctrl(b'c'), Key::byte(b't')];
        assert_eq!(ed.lookup(&keys), Binding::Unbound);
        ed.execute_command_line("no-tab-mode");
        let eol = ed.lookup_function("end-of-line").unwrap();
        assert_eq!(ed.lookup(&keys), Binding::Command(eol));
        assert_eq!(
            ed.execute_command_line("define-key dired C-a end-of-line"),
            Status::Fail
        );
    }

    // ── Arguments and quitting ──────────────────────────────────────────

    #[test]
    fn meta_digits_start_an_argument() {
        let (mut ed, _) = editor(10, 40);
        keys(&mut ed, "M-2 M-5 q");
        // The second M- digit is not a digit key; it resolves as a command
        // that starts a new argument.
        assert_eq!(text(&ed), "qqqqq");
        keys(&mut ed, "M-1 2 w");
        assert_eq!(text(&ed).matches('w').count(), 12);
    }

    #[test]
    fn keyboard_quit_aborts() {
        let (mut ed, tty) = editor(10, 40);
        assert_eq!(keys(&mut ed, "C-g"), vec![Status::AbortScript]);
        assert_eq!(ed.echo.current(), b"Quit");
        assert_eq!(tty.stats().beeps, 1);
    }

    #[test]
    fn ring_bell_is_not_an_error() {
        let (mut ed, tty) = editor(10, 40);
        assert_eq!(ed.execute_command_line("ring-bell"), Status::Continue);
        assert_eq!(tty.stats().beeps, 1);
        assert!(ed.echo.current().is_empty());
    }

    // ── Options and files ───────────────────────────────────────────────

    #[test]
    fn set_options() {
        let (mut ed, _) = editor(10, 40);
        assert_eq!(ed.execute_command_line("set tab-width=4"), Status::Continue);
        assert_eq!(ed.options.tab_width, 4);
        ed.execute_command_line("set tab-width?");
        assert_eq!(ed.echo.current(), b"tab-width=4");
        assert_eq!(ed.execute_command_line("set bogus"), Status::Fail);
        assert_eq!(ed.echo.current(), b"Unknown option: bogus");
        ed.execute_command_line("set noundo");
        assert!(!ed.options.undo);
        assert!(!ed.reg.cur_buf().undo.is_enabled());
    }

    #[test]
    fn load_runs_a_file() {
        let dir = std::env::temp_dir().join("mg_core_extend_load");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("rc");
        std::fs::write(&path, "insert \"loaded\"\n").unwrap();
        let (mut ed, _) = editor(10, 40);
        let line = format!("load \"{}\"", path.display());
        assert_eq!(ed.execute_command_line(&line), Status::Continue);
        assert_eq!(text(&ed), "loaded");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
