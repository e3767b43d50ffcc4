//! Built-in commands and the default key bindings.
//!
//! Each submodule holds one family of commands as plain functions with the
//! [`CommandFn`](crate::command::CommandFn) signature. [`register`] puts
//! them all in the editor's command table and binds the default keys in
//! the global keymap.
//!
//! | Module      | Commands                                         |
//! |-------------|--------------------------------------------------|
//! | `motion`    | Character, word, line, page and buffer motion    |
//! | `edit`      | Insertion, deletion, kill and yank, undo         |
//! | `window`    | Splitting, resizing and switching windows        |
//! | `buffer`    | Buffers and files, quitting                      |
//! | `extend`    | M-x, key binding, numeric arguments, options     |
//! | `search`    | Forward and backward search, query replace       |
//! | `macros`    | Keyboard macros                                  |

mod buffer;
mod edit;
mod extend;
mod macros;
mod motion;
mod search;
mod window;

use std::path::{Path, PathBuf};

use mg_term::Key;

use crate::command::{CmdFlags, CommandFn};
use crate::editor::Editor;
use crate::error::{Error, Result};
use crate::keymap::Target;

const NONE: CmdFlags = CmdFlags::empty();

/// Name, function and dispatcher flags of every built-in command.
const COMMANDS: &[(&str, CommandFn, CmdFlags)] = &[
    // Motion
    ("forward-char", motion::forward_char, NONE),
    ("backward-char", motion::backward_char, NONE),
    ("forward-word", motion::forward_word, NONE),
    ("backward-word", motion::backward_word, NONE),
    ("next-line", motion::next_line, CmdFlags::GOAL),
    ("previous-line", motion::previous_line, CmdFlags::GOAL),
    ("beginning-of-line", motion::beginning_of_line, NONE),
    ("end-of-line", motion::end_of_line, NONE),
    ("beginning-of-buffer", motion::beginning_of_buffer, NONE),
    ("end-of-buffer", motion::end_of_buffer, NONE),
    ("scroll-up", motion::scroll_up, NONE),
    ("scroll-down", motion::scroll_down, NONE),
    ("goto-line", motion::goto_line, NONE),
    ("set-mark-command", motion::set_mark, NONE),
    ("exchange-point-and-mark", motion::exchange_point_and_mark, NONE),
    // Editing
    ("self-insert-command", edit::self_insert, CmdFlags::SELF_INSERT),
    ("insert", edit::insert, NONE),
    ("newline", edit::newline, NONE),
    ("open-line", edit::open_line, NONE),
    ("delete-char", edit::delete_char, NONE),
    ("delete-backward-char", edit::delete_backward_char, NONE),
    ("kill-line", edit::kill_line, CmdFlags::KILL),
    ("kill-region", edit::kill_region, CmdFlags::KILL),
    ("copy-region-as-kill", edit::copy_region_as_kill, CmdFlags::KILL),
    ("yank", edit::yank, NONE),
    ("transpose-chars", edit::transpose_chars, NONE),
    ("quoted-insert", edit::quoted_insert, NONE),
    ("space-to-tabstop", edit::space_to_tabstop, NONE),
    ("undo", edit::undo, CmdFlags::UNDO),
    ("overwrite-mode", edit::overwrite_mode, NONE),
    ("no-tab-mode", edit::no_tab_mode, NONE),
    // Windows
    ("split-window-vertically", window::split, NONE),
    ("delete-window", window::delete, NONE),
    ("delete-other-windows", window::delete_others, NONE),
    ("other-window", window::other, NONE),
    ("previous-window", window::previous, NONE),
    ("enlarge-window", window::enlarge, NONE),
    ("shrink-window", window::shrink, NONE),
    ("recenter", window::recenter, NONE),
    // Buffers and files
    ("switch-to-buffer", buffer::switch_to_buffer, NONE),
    ("kill-buffer", buffer::kill_buffer, NONE),
    ("list-buffers", buffer::list_buffers, NONE),
    ("find-file", buffer::find_file, NONE),
    ("save-buffer", buffer::save_buffer, NONE),
    ("write-file", buffer::write_file, NONE),
    ("save-buffers-kill-emacs", buffer::save_buffers_kill, NONE),
    ("suspend-emacs", buffer::suspend, NONE),
    // Extension
    ("execute-extended-command", extend::execute_extended_command, NONE),
    ("global-set-key", extend::global_set_key, NONE),
    ("global-unset-key", extend::global_unset_key, NONE),
    ("local-set-key", extend::local_set_key, NONE),
    ("define-key", extend::define_key, NONE),
    ("describe-key-briefly", extend::describe_key_briefly, NONE),
    ("universal-argument", extend::universal_argument, CmdFlags::ARGUMENT),
    ("digit-argument", extend::digit_argument, CmdFlags::ARGUMENT),
    ("negative-argument", extend::negative_argument, CmdFlags::ARGUMENT),
    ("keyboard-quit", extend::keyboard_quit, NONE),
    ("ring-bell", extend::ring_bell, NONE),
    ("load", extend::load, NONE),
    ("set", extend::set, NONE),
    // Search
    ("search-forward", search::search_forward, NONE),
    ("search-backward", search::search_backward, NONE),
    ("re-search-forward", search::re_search_forward, NONE),
    ("re-search-backward", search::re_search_backward, NONE),
    ("query-replace", search::query_replace, NONE),
    ("replace-string", search::replace_string, NONE),
    // Keyboard macros
    ("start-kbd-macro", macros::start, NONE),
    ("end-kbd-macro", macros::end, NONE),
    ("call-last-kbd-macro", macros::call, NONE),
];

/// Default global bindings, in key notation.
const BINDINGS: &[(&str, &str)] = &[
    ("C-SPC", "set-mark-command"),
    ("C-a", "beginning-of-line"),
    ("C-b", "backward-char"),
    ("C-d", "delete-char"),
    ("C-e", "end-of-line"),
    ("C-f", "forward-char"),
    ("C-g", "keyboard-quit"),
    ("C-h c", "describe-key-briefly"),
    ("TAB", "self-insert-command"),
    ("LFD", "newline"),
    ("C-k", "kill-line"),
    ("C-l", "recenter"),
    ("RET", "newline"),
    ("C-n", "next-line"),
    ("C-o", "open-line"),
    ("C-p", "previous-line"),
    ("C-q", "quoted-insert"),
    ("C-r", "search-backward"),
    ("C-s", "search-forward"),
    ("C-t", "transpose-chars"),
    ("C-u", "universal-argument"),
    ("C-v", "scroll-up"),
    ("C-w", "kill-region"),
    ("C-y", "yank"),
    ("C-z", "suspend-emacs"),
    ("C-_", "undo"),
    ("DEL", "delete-backward-char"),
    ("C-x C-b", "list-buffers"),
    ("C-x C-c", "save-buffers-kill-emacs"),
    ("C-x C-f", "find-file"),
    ("C-x C-s", "save-buffer"),
    ("C-x C-w", "write-file"),
    ("C-x C-x", "exchange-point-and-mark"),
    ("C-x C-z", "shrink-window"),
    ("C-x (", "start-kbd-macro"),
    ("C-x )", "end-kbd-macro"),
    ("C-x 0", "delete-window"),
    ("C-x 1", "delete-other-windows"),
    ("C-x 2", "split-window-vertically"),
    ("C-x ^", "enlarge-window"),
    ("C-x b", "switch-to-buffer"),
    ("C-x e", "call-last-kbd-macro"),
    ("C-x g", "goto-line"),
    ("C-x k", "kill-buffer"),
    ("C-x n", "other-window"),
    ("C-x o", "other-window"),
    ("C-x p", "previous-window"),
    ("C-x u", "undo"),
    ("M-%", "query-replace"),
    ("M--", "negative-argument"),
    ("M-<", "beginning-of-buffer"),
    ("M->", "end-of-buffer"),
    ("M-b", "backward-word"),
    ("M-f", "forward-word"),
    ("M-v", "scroll-down"),
    ("M-w", "copy-region-as-kill"),
    ("M-x", "execute-extended-command"),
    ("C-M-s", "re-search-forward"),
    ("C-M-r", "re-search-backward"),
    ("up", "previous-line"),
    ("down", "next-line"),
    ("left", "backward-char"),
    ("right", "forward-char"),
    ("home", "beginning-of-line"),
    ("end", "end-of-line"),
    ("prior", "scroll-down"),
    ("next", "scroll-up"),
    ("delete", "delete-char"),
];

/// Register every built-in command and install the default bindings.
///
/// # Errors
///
/// [`Error::Invariant`] if the tables disagree (a binding naming a command
/// that does not exist), [`Error::OutOfMemory`].
pub fn register(ed: &mut Editor) -> Result<()> {
    for &(name, func, flags) in COMMANDS {
        ed.commands.register(name, func, flags)?;
    }

    let global = ed.global_map();
    let bind = |ed: &mut Editor, keys: &[Key], name: &str| -> Result<()> {
        let id = ed
            .commands
            .lookup(name)
            .ok_or_else(|| Error::invariant(format!("binding to unknown command {name}")))?;
        ed.keymaps.bind_keys(global, keys, Target::Command(id))
    };

    for &(spec, name) in BINDINGS {
        let keys = mg_term::key::parse(spec)
            .ok_or_else(|| Error::invariant(format!("bad default key {spec}")))?;
        bind(ed, &keys, name)?;
    }
    for d in b'0'..=b'9' {
        bind(ed, &[Key::ESC, Key::byte(d)], "digit-argument")?;
    }
    for b in (0x20..=0x7e).chain(0x80..=0xff) {
        bind(ed, &[Key::byte(b)], "self-insert-command")?;
    }

    log::debug!(
        "registered {} commands, {} default bindings",
        ed.commands.len(),
        BINDINGS.len()
    );
    Ok(())
}

/// Expand a leading `~/` to the home directory.
pub(crate) fn expand(name: &str) -> PathBuf {
    if let Some(rest) = name.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(name)
}

/// Start and length of the region between the cursor and the mark.
pub(crate) fn region(ed: &Editor) -> Result<(crate::line::Pos, usize)> {
    let w = ed.reg.cur();
    let mark = w.mark.ok_or_else(|| Error::user("No mark set in this window"))?;
    let b = ed.reg.cur_buf();
    let (d, m) = (b.offset_of(w.dot)?, b.offset_of(mark)?);
    if d <= m {
        Ok((w.dot, m - d))
    } else {
        Ok((mark, d - m))
    }
}
