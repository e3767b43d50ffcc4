//! The editor: the read-dispatch-redisplay loop and everything it owns.
//!
//! One key is read, resolved through the current buffer's mode stack to a
//! command, the command runs to completion, and the screen is brought up to
//! date before the next key is read. Nothing here is global: tests build an
//! [`Editor`] over a [`mg_term::Headless`] terminal and drive it with keys.
//!
//! # Key resolution
//!
//! Each mode's keymap is consulted, topmost mode first. A command binding
//! ends the search. A prefix binding reads another key and starts the scan
//! over with the longer sequence. A key no mode binds is reported as
//! "... is not bound" with the bell.
//!
//! # Undo grouping
//!
//! An undo boundary is added to the current buffer before every command,
//! except between consecutive self-inserts (typing a word is one action)
//! and between consecutive undos.

use std::collections::VecDeque;
use std::io;

use mg_term::key::describe;
use mg_term::{CancelToken, Input, Key, Tty};

use crate::buffer::BufFlags;
use crate::command::{Arg, CmdFlags, CommandId, CommandTable, common_prefix};
use crate::display::{Display, UpdateStats};
use crate::echo::Echo;
use crate::error::{Error, Result, Status};
use crate::keymap::{Binding, KeymapId, Keymaps};
use crate::kill::KillBuffer;
use crate::mode::{ModeId, ModeTable};
use crate::options::Options;
use crate::registry::Registry;
use crate::search::SearchState;

/// What a prompt completes over when TAB is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complete {
    Nothing,
    Command,
    Buffer,
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// The whole editor state.
pub struct Editor {
    pub reg: Registry,
    pub keymaps: Keymaps,
    pub modes: ModeTable,
    pub commands: CommandTable,
    pub options: Options,
    pub display: Display,
    pub echo: Echo,
    pub kill: KillBuffer,
    tty: Box<dyn Tty>,
    cancel: CancelToken,

    /// The global keymap, owned by the fundamental mode.
    global: KeymapId,

    /// Keys to read before the terminal: macro replay and injected input.
    pending: VecDeque<Key>,

    /// Keys recorded while a keyboard macro is being defined.
    recording: Option<Vec<Key>>,

    /// The last keyboard macro defined.
    pub(crate) last_macro: Vec<Key>,

    /// A keyboard macro is being replayed.
    replaying: bool,

    /// Replies for prompts while a script line runs.
    script_args: Option<VecDeque<Vec<u8>>>,

    /// Keys that invoked the running command.
    pub(crate) this_keys: Vec<Key>,

    /// Flags of the running command; commands may add to them.
    this_flags: CmdFlags,

    /// Flags of the previous command.
    last_flags: CmdFlags,

    /// Goal column kept across vertical motions.
    pub(crate) goal: usize,

    /// Last search, for repeating it.
    pub(crate) search: SearchState,

    quit: bool,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("reg", &self.reg)
            .field("options", &self.options)
            .field("pending", &self.pending.len())
            .field("quit", &self.quit)
            .finish_non_exhaustive()
    }
}

impl Editor {
    /// An editor on `tty` with one `*scratch*` window, the built-in
    /// commands registered and the default bindings installed.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if the terminal is too small, [`Error::OutOfMemory`].
    pub fn new(tty: Box<dyn Tty>) -> Result<Self> {
        let size = tty.size();
        let reg = Registry::new(size.rows)?;
        let mut keymaps = Keymaps::new();
        let mut modes = ModeTable::new();
        let global = keymaps.create("fundamental")?;
        modes.add("fundamental", global, BufFlags::empty())?;
        let overwrite = keymaps.create("overwrite")?;
        modes.add("overwrite", overwrite, BufFlags::OVERWRITE)?;
        let notab = keymaps.create("notab")?;
        modes.add("notab", notab, BufFlags::NOTAB)?;

        let cancel = tty.cancel_token();
        let mut ed = Self {
            reg,
            keymaps,
            modes,
            commands: CommandTable::new(),
            options: Options::default(),
            display: Display::new(size),
            echo: Echo::new(),
            kill: KillBuffer::new(),
            tty,
            cancel,
            global,
            pending: VecDeque::new(),
            recording: None,
            last_macro: Vec::new(),
            replaying: false,
            script_args: None,
            this_keys: Vec::new(),
            this_flags: CmdFlags::empty(),
            last_flags: CmdFlags::empty(),
            goal: 0,
            search: SearchState::default(),
            quit: false,
        };
        crate::commands::register(&mut ed)?;
        log::debug!(
            "editor ready: {}x{}, {} commands",
            size.cols,
            size.rows,
            ed.commands.len()
        );
        Ok(ed)
    }

    /// The global keymap.
    #[must_use]
    pub const fn global_map(&self) -> KeymapId {
        self.global
    }

    /// The shared cancellation flag.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Stop with `Error::Aborted` if the user asked to cancel.
    ///
    /// # Errors
    ///
    /// [`Error::Aborted`] when the cancel token is set.
    pub fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_set() {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }

    /// Ask the run loop to finish after this command.
    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    #[must_use]
    pub const fn quitting(&self) -> bool {
        self.quit
    }

    /// Ring the bell.
    pub fn beep(&mut self) {
        self.tty.beep(self.options.visible_bell);
    }

    /// Show a message on the echo line.
    pub fn message(&mut self, text: &str) {
        self.echo.message(text);
    }

    /// Stop the editor process, redrawing everything on return.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the terminal cannot be restored.
    pub fn suspend(&mut self) -> Result<()> {
        self.tty.suspend()?;
        self.display.garbage();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Command flags
    // -----------------------------------------------------------------------

    /// Whether the previous command had `flag`.
    #[must_use]
    pub const fn last_was(&self, flag: CmdFlags) -> bool {
        self.last_flags.contains(flag)
    }

    /// Add `flag` to the running command, as seen by the next one.
    pub fn set_this(&mut self, flag: CmdFlags) {
        self.this_flags |= flag;
    }

    /// Keys that invoked the running command.
    #[must_use]
    pub fn this_keys(&self) -> &[Key] {
        &self.this_keys
    }

    /// The last key of the running command's sequence.
    #[must_use]
    pub fn last_key(&self) -> Key {
        self.this_keys.last().copied().unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Redisplay
    // -----------------------------------------------------------------------

    /// Bring the terminal up to date.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] if a window refers to a stale buffer.
    pub fn update(&mut self) -> Result<UpdateStats> {
        self.display.update(
            &mut self.reg,
            &self.modes,
            &mut self.echo,
            &self.options,
            self.tty.as_mut(),
        )
    }

    /// Update unless more input is already waiting.
    pub fn refresh(&mut self) {
        if !self.pending.is_empty() || self.tty.typeahead() {
            return;
        }
        if let Err(e) = self.update() {
            log::error!("redisplay failed: {e}");
        }
    }

    /// Adopt the terminal's current size.
    fn resize(&mut self) {
        let size = self.tty.size();
        log::debug!("resize to {}x{}", size.cols, size.rows);
        if let Err(e) = self.reg.resize_screen(size.rows) {
            log::warn!("resize: {e}");
        }
        self.display.resize(size);
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Queue keys to be read before any terminal input.
    pub fn push_input(&mut self, keys: &[Key]) {
        self.pending.extend(keys.iter().copied());
    }

    fn next_key(&mut self) -> io::Result<Key> {
        if let Some(key) = self.pending.pop_front() {
            return Ok(key);
        }
        loop {
            match self.tty.read_input()? {
                Input::Key(key) => {
                    if let Some(rec) = &mut self.recording {
                        rec.push(key);
                    }
                    return Ok(key);
                }
                Input::Resize => {
                    self.resize();
                    self.refresh();
                }
            }
        }
    }

    /// Read one key for a running command.
    ///
    /// # Errors
    ///
    /// [`Error::Aborted`] when input has ended, [`Error::Io`] on a read
    /// failure.
    pub fn get_key(&mut self) -> Result<Key> {
        self.next_key().map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::Aborted
            } else {
                Error::from(e)
            }
        })
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Resolve a key sequence starting with `first` to a command, reading
    /// more keys while the sequence is a prefix.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if no mode binds the sequence.
    pub fn resolve_keys(&mut self, first: Key) -> Result<CommandId> {
        let mut keys = vec![first];
        loop {
            match self.lookup(&keys) {
                Binding::Command(id) => {
                    if keys.len() > 1 {
                        self.echo.clear();
                    }
                    self.this_keys = keys;
                    return Ok(id);
                }
                Binding::Prefix(_) => {
                    self.echo.message(&format!("{}-", describe(&keys)));
                    self.refresh();
                    keys.push(self.get_key()?);
                }
                Binding::Unbound => {
                    return Err(Error::user(format!("{} is not bound", describe(&keys))));
                }
            }
        }
    }

    /// What `keys` means in the current buffer, topmost mode first.
    #[must_use]
    pub fn lookup(&self, keys: &[Key]) -> Binding {
        let buffer = self.reg.cur_buf();
        for map in self.modes.stack(buffer) {
            match self.keymaps.lookup_seq(map, keys) {
                Binding::Unbound => {}
                b => return b,
            }
        }
        Binding::Unbound
    }

    /// Run command `id` with `arg`, returning its raw result.
    ///
    /// # Errors
    ///
    /// Whatever the command returns.
    pub fn run_command(&mut self, id: CommandId, arg: Arg) -> Result<()> {
        let cmd = self.commands.get(id)?.clone();
        let chain = CmdFlags::SELF_INSERT | CmdFlags::UNDO;
        if !(cmd.flags & self.last_flags).intersects(chain) {
            let bid = self.reg.current_buffer();
            self.reg.undo_boundary(bid);
        }
        self.this_flags = cmd.flags;
        log::trace!("run {} {:?}", cmd.name, arg);
        let result = (cmd.func)(self, arg);
        if !cmd.flags.contains(CmdFlags::ARGUMENT) {
            self.last_flags = self.this_flags;
        }
        result
    }

    /// Run command `id`, reporting a failure on the echo line.
    pub fn execute(&mut self, id: CommandId, arg: Arg) -> Status {
        match self.run_command(id, arg) {
            Ok(()) => Status::Continue,
            Err(e) => self.report(e),
        }
    }

    /// Resolve and run the command for a key typed at the top level.
    pub fn dispatch(&mut self, key: Key) -> Status {
        self.cancel.take();
        match self.resolve_keys(key) {
            Ok(id) => self.execute(id, Arg::NONE),
            Err(e) => {
                self.last_flags = CmdFlags::empty();
                self.report(e)
            }
        }
    }

    /// Show an error, ring the bell and log it. Returns the status the
    /// error maps to.
    pub fn report(&mut self, e: Error) -> Status {
        match &e {
            Error::Invariant(_) => log::error!("{e}"),
            Error::OutOfMemory | Error::Io(_) => log::warn!("{e}"),
            Error::User(_) | Error::Aborted => log::debug!("{e}"),
        }
        self.echo.message(&e.to_string());
        self.beep();
        e.status()
    }

    /// Read the rest of a numeric argument that starts at `n`, then run the
    /// command it applies to. `digits` is whether `n` came from a typed
    /// digit; `sign` is -1 after a minus.
    ///
    /// # Errors
    ///
    /// Whatever the command returns, or an unbound-key error.
    pub fn read_argument(&mut self, mut n: i32, mut digits: bool, mut sign: i32) -> Result<()> {
        let key = loop {
            let key = self.get_key()?;
            if let Some(d) = key.digit() {
                n = if digits {
                    n.saturating_mul(10).saturating_add(i32::from(d))
                } else {
                    i32::from(d)
                };
                digits = true;
            } else if key == Key::byte(b'-') && !digits && sign > 0 {
                sign = -1;
                n = 1;
            } else if key == Key::ctrl(b'u') && !digits {
                n = n.saturating_mul(4);
            } else {
                break key;
            }
            self.echo.message(&format!("Arg: {}", sign * n));
            self.refresh();
        };
        self.echo.clear();
        let id = self.resolve_keys(key)?;
        self.run_command(id, Arg::count(sign * n))
    }

    /// The main loop: update, read a key, dispatch, until a command asks to
    /// quit or input ends.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if terminal input fails.
    pub fn run(&mut self) -> Result<()> {
        while !self.quit {
            self.refresh();
            let key = match self.next_key() {
                Ok(k) => k,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            self.echo.clear();
            self.dispatch(key);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Prompts
    // -----------------------------------------------------------------------

    /// Run `f` with `args` answering its prompts instead of the keyboard.
    pub fn with_script_args<T>(&mut self, args: Vec<Vec<u8>>, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.script_args.replace(args.into());
        let out = f(self);
        self.script_args = saved;
        out
    }

    fn script_reply(&mut self) -> Option<Result<Vec<u8>>> {
        let args = self.script_args.as_mut()?;
        Some(
            args.pop_front()
                .ok_or_else(|| Error::user("not enough arguments")),
        )
    }

    /// Ask for a line of text, returned as typed.
    ///
    /// # Errors
    ///
    /// [`Error::Aborted`] on C-g; [`Error::User`] when a script supplied
    /// too few arguments.
    pub fn prompt_bytes(&mut self, label: &str, complete: Complete) -> Result<Vec<u8>> {
        if let Some(reply) = self.script_reply() {
            return reply;
        }
        self.echo.open_prompt(label);
        let result = self.prompt_loop(complete);
        self.echo.close_prompt();
        result
    }

    /// Ask for a name: a command, buffer, file or option.
    ///
    /// # Errors
    ///
    /// As for [`prompt_bytes`](Self::prompt_bytes), and [`Error::User`]
    /// for a reply that is not UTF-8.
    pub fn prompt(&mut self, label: &str, complete: Complete) -> Result<String> {
        let reply = self.prompt_bytes(label, complete)?;
        String::from_utf8(reply).map_err(|_| Error::user("Name is not valid UTF-8"))
    }

    fn prompt_loop(&mut self, complete: Complete) -> Result<Vec<u8>> {
        loop {
            self.refresh();
            let key = self.get_key()?;
            match key {
                Key::RET | Key::LFD => {
                    let reply = self.echo.prompt().map(|p| p.input().to_vec());
                    return Ok(reply.unwrap_or_default());
                }
                k if k == Key::ctrl(b'g') => return Err(Error::Aborted),
                Key::DEL => {
                    if !self.echo.prompt_mut().is_some_and(|p| p.backspace()) {
                        self.beep();
                    }
                }
                k if k == Key::ctrl(b'h') => {
                    if !self.echo.prompt_mut().is_some_and(|p| p.backspace()) {
                        self.beep();
                    }
                }
                k if k == Key::ctrl(b'u') => {
                    if let Some(p) = self.echo.prompt_mut() {
                        p.clear();
                    }
                }
                k if k == Key::ctrl(b'q') => {
                    let quoted = self.get_key()?;
                    self.prompt_push(quoted);
                }
                Key::TAB if complete != Complete::Nothing => self.complete_prompt(complete),
                k => self.prompt_push(k),
            }
        }
    }

    fn prompt_push(&mut self, key: Key) {
        match key.as_byte() {
            Some(b) => {
                if let Some(p) = self.echo.prompt_mut() {
                    p.push(b);
                }
            }
            None => self.beep(),
        }
    }

    /// Candidates for completing `prefix`.
    #[must_use]
    pub fn completions(&self, prefix: &str, complete: Complete) -> Vec<String> {
        match complete {
            Complete::Nothing => Vec::new(),
            Complete::Command => self
                .commands
                .complete(prefix)
                .into_iter()
                .map(str::to_string)
                .collect(),
            Complete::Buffer => {
                let mut names: Vec<String> = self
                    .reg
                    .buffers()
                    .iter()
                    .filter_map(|&b| self.reg.buffer(b).ok())
                    .map(|b| b.name.clone())
                    .filter(|n| n.starts_with(prefix))
                    .collect();
                names.sort_unstable();
                names
            }
        }
    }

    fn complete_prompt(&mut self, complete: Complete) {
        let Some(Ok(input)) = self.echo.prompt().map(|p| String::from_utf8(p.input().to_vec()))
        else {
            self.beep();
            return;
        };
        let names = self.completions(&input, complete);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let common = common_prefix(&refs);
        if refs.is_empty() || (common.len() == input.len() && refs.len() > 1) {
            self.beep();
            return;
        }
        let text = common.to_string();
        if let Some(p) = self.echo.prompt_mut() {
            p.set_input(text.as_bytes());
        }
    }

    /// Ask a y/n question.
    ///
    /// # Errors
    ///
    /// [`Error::Aborted`] on C-g.
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        if let Some(reply) = self.script_reply() {
            let reply = reply?;
            return match reply.as_slice() {
                b"y" | b"yes" => Ok(true),
                b"n" | b"no" => Ok(false),
                _ => Err(Error::user(format!(
                    "Bad answer: {}",
                    String::from_utf8_lossy(&reply)
                ))),
            };
        }
        let label = format!("{question} (y or n) ");
        let answer = loop {
            self.echo.message(&label);
            self.refresh();
            match self.get_key()?.as_byte() {
                Some(b'y' | b'Y' | b' ') => break Ok(true),
                Some(b'n' | b'N' | 0x7f) => break Ok(false),
                Some(0x07) => break Err(Error::Aborted),
                _ => self.beep(),
            }
        };
        self.echo.clear();
        answer
    }

    /// Ask for a key sequence, reading keys until the sequence is no longer
    /// a prefix in the current buffer.
    ///
    /// # Errors
    ///
    /// [`Error::Aborted`] on end of input; [`Error::User`] for a script
    /// argument that does not parse as keys.
    pub fn prompt_keys(&mut self, label: &str) -> Result<Vec<Key>> {
        if let Some(reply) = self.script_reply() {
            let bytes = reply?;
            let keys = match std::str::from_utf8(&bytes) {
                Ok(text) => mg_term::key::parse(text),
                Err(_) => Some(bytes.iter().map(|&b| Key::byte(b)).collect()),
            };
            return keys.ok_or_else(|| {
                Error::user(format!(
                    "Bad key sequence: {}",
                    String::from_utf8_lossy(&bytes)
                ))
            });
        }
        let mut keys = Vec::new();
        loop {
            self.echo.message(&format!("{label}{}", describe(&keys)));
            self.refresh();
            keys.push(self.get_key()?);
            if !matches!(self.lookup(&keys), Binding::Prefix(_)) {
                self.echo.clear();
                return Ok(keys);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Keyboard macros
    // -----------------------------------------------------------------------

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    #[must_use]
    pub const fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Take the running command's keys back out of the recording.
    pub fn unrecord_this(&mut self) {
        if let Some(rec) = &mut self.recording {
            let n = self.this_keys.len().min(rec.len());
            rec.truncate(rec.len() - n);
        }
    }

    /// Begin recording keys.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if a macro is already being defined.
    pub fn start_recording(&mut self) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::user("Already defining kbd macro"));
        }
        self.recording = Some(Vec::new());
        Ok(())
    }

    /// Stop recording, dropping the keys of the command that ended it.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if no macro is being defined.
    pub fn end_recording(&mut self) -> Result<usize> {
        let mut keys = self
            .recording
            .take()
            .ok_or_else(|| Error::user("Not defining kbd macro"))?;
        let drop = self.this_keys.len().min(keys.len());
        keys.truncate(keys.len() - drop);
        let n = keys.len();
        self.last_macro = keys;
        Ok(n)
    }

    /// Feed `keys` through the dispatcher `times` times, stopping at the
    /// first failure or cancellation. Replays do not nest.
    ///
    /// # Errors
    ///
    /// [`Error::User`] during another replay, otherwise the first error a
    /// replayed command returns, or [`Error::Aborted`].
    pub fn replay(&mut self, keys: &[Key], times: usize) -> Result<()> {
        if self.replaying {
            return Err(Error::user("Not now"));
        }
        let saved = std::mem::take(&mut self.pending);
        self.replaying = true;
        let result = self.replay_inner(keys, times);
        self.replaying = false;
        self.pending = saved;
        result
    }

    fn replay_inner(&mut self, keys: &[Key], times: usize) -> Result<()> {
        for _ in 0..times {
            self.pending.extend(keys.iter().copied());
            while let Some(key) = self.pending.pop_front() {
                self.check_cancel()?;
                let id = self.resolve_keys(key)?;
                self.run_command(id, Arg::NONE)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Modes
    // -----------------------------------------------------------------------

    /// Turn mode `id` on or off in the current buffer (toggle with `None`).
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for an unknown mode.
    pub fn set_mode(&mut self, id: ModeId, on: Option<bool>) -> Result<bool> {
        let bid = self.reg.current_buffer();
        let buffer = self.reg.buffer_mut(bid)?;
        let now = self.modes.set(buffer, id, on)?;
        let showing: Vec<_> = self.reg.windows_on(bid).collect();
        for w in showing {
            self.reg.window_mut(w)?.flags |= crate::window::WinFlags::MODE;
        }
        Ok(now)
    }

    /// Apply the undo-related options to the registry and every buffer.
    pub fn sync_options(&mut self) {
        self.reg.set_undo_enabled(self.options.undo);
        self.reg.set_undo_pool(self.options.undo_pool);
        self.display.garbage();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mg_term::Headless;
    use pretty_assertions::assert_eq;

    /// An editor on a headless terminal, returned with a handle to it.
    pub(crate) fn editor(rows: u16, cols: u16) -> (Editor, Headless) {
        let tty = Headless::new(rows, cols);
        let ed = Editor::new(Box::new(tty.clone())).unwrap();
        (ed, tty)
    }

    /// Dispatch every key of `spec` (key notation) in order.
    pub(crate) fn keys(ed: &mut Editor, spec: &str) -> Vec<Status> {
        let keys = mg_term::key::parse(spec).unwrap();
        ed.push_input(&keys);
        let mut out = Vec::new();
        while let Some(k) = ed.pending.pop_front() {
            out.push(ed.dispatch(k));
        }
        out
    }

    /// Type literal text.
    pub(crate) fn type_text(ed: &mut Editor, text: &str) {
        for b in text.bytes() {
            ed.dispatch(Key::byte(b));
        }
    }

    pub(crate) fn text(ed: &Editor) -> String {
        String::from_utf8(ed.reg.cur_buf().contents()).unwrap()
    }

    /// Replace the current buffer's text; the cursor goes to the start.
    pub(crate) fn fill(ed: &mut Editor, lines: &[&str]) {
        let bid = ed.reg.current_buffer();
        ed.reg
            .replace_text(bid, lines.iter().map(|l| l.as_bytes()))
            .unwrap();
    }

    /// Cursor as (1-based line number, offset).
    pub(crate) fn dot(ed: &Editor) -> (usize, usize) {
        let d = ed.reg.cur().dot;
        (ed.reg.cur_buf().line_number(d.line).unwrap(), d.offset)
    }

    /// Put the cursor on 1-based `line` at `offset`.
    pub(crate) fn goto(ed: &mut Editor, line: usize, offset: usize) {
        let id = ed.reg.cur_buf().line_at(line);
        ed.reg.set_dot(crate::line::Pos::new(id, offset));
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    #[test]
    fn typing_inserts_text() {
        let (mut ed, _) = editor(10, 40);
        type_text(&mut ed, "hello");
        assert_eq!(text(&ed), "hello");
        assert!(ed.reg.cur_buf().is_changed());
    }

    #[test]
    fn prefix_keys_read_more() {
        let (mut ed, _) = editor(10, 40);
        type_text(&mut ed, "ab");
        let statuses = keys(&mut ed, "C-x h");
        // C-x h is unbound: one failure, reported once.
        assert_eq!(statuses, vec![Status::Fail]);
        assert_eq!(ed.echo.current(), b"C-x h is not bound");
    }

    #[test]
    fn unbound_key_rings_bell() {
        let (mut ed, tty) = editor(10, 40);
        let status = ed.dispatch(Key::function(5).unwrap());
        assert_eq!(status, Status::Fail);
        assert_eq!(ed.echo.current(), b"f5 is not bound");
        assert_eq!(tty.stats().beeps, 1);
    }

    #[test]
    fn upper_case_falls_back_to_lower() {
        let (mut ed, _) = editor(10, 40);
        type_text(&mut ed, "one two");
        keys(&mut ed, "C-a M-F");
        assert_eq!(ed.reg.cur().dot.offset, 3);
    }

    #[test]
    fn local_mode_shadows_global() {
        let (mut ed, _) = editor(10, 40);
        let overwrite = ed.modes.lookup("overwrite").unwrap();
        let map = ed.modes.get(overwrite).unwrap().keymap;
        let eob = ed.commands.lookup("end-of-buffer").unwrap();
        ed.keymaps
            .bind_keys(map, &[Key::ctrl(b'a')], crate::keymap::Target::Command(eob))
            .unwrap();
        type_text(&mut ed, "abc");
        keys(&mut ed, "C-a");
        assert_eq!(ed.reg.cur().dot.offset, 0);
        ed.set_mode(overwrite, Some(true)).unwrap();
        keys(&mut ed, "C-a");
        assert_eq!(ed.reg.cur().dot.offset, 3);
    }

    // ── Arguments ───────────────────────────────────────────────────────

    #[test]
    fn universal_argument_multiplies() {
        let (mut ed, _) = editor(10, 40);
        keys(&mut ed, "C-u x");
        assert_eq!(text(&ed), "xxxx");
        keys(&mut ed, "C-u C-u y");
        assert_eq!(text(&ed).len(), 4 + 16);
    }

    #[test]
    fn universal_argument_takes_digits() {
        let (mut ed, _) = editor(10, 40);
        keys(&mut ed, "C-u 1 2 z");
        assert_eq!(text(&ed), "z".repeat(12));
    }

    #[test]
    fn negative_argument_reverses_motion() {
        let (mut ed, _) = editor(10, 40);
        type_text(&mut ed, "abcdef");
        keys(&mut ed, "M-- 3 C-f");
        assert_eq!(ed.reg.cur().dot.offset, 3);
    }

    // ── Undo grouping ───────────────────────────────────────────────────

    #[test]
    fn typed_run_undoes_as_one() {
        let (mut ed, _) = editor(10, 40);
        type_text(&mut ed, "hello");
        keys(&mut ed, "RET");
        type_text(&mut ed, "world");
        keys(&mut ed, "C-_");
        assert_eq!(text(&ed), "hello\n");
        keys(&mut ed, "C-_");
        assert_eq!(text(&ed), "hello");
        keys(&mut ed, "C-_");
        assert_eq!(text(&ed), "");
        let status = keys(&mut ed, "C-_");
        assert_eq!(status, vec![Status::Fail]);
        assert_eq!(ed.echo.current(), b"No further undo information");
    }

    // ── Prompts ─────────────────────────────────────────────────────────

    #[test]
    fn prompt_edits_and_accepts() {
        let (mut ed, tty) = editor(10, 40);
        tty.type_str("abx");
        tty.push_keys(&[Key::DEL, Key::byte(b'c'), Key::RET]);
        assert_eq!(ed.prompt("Name: ", Complete::Nothing).unwrap(), "abc");
        assert!(ed.echo.prompt().is_none());
    }

    #[test]
    fn prompt_keeps_eight_bit_bytes() {
        let (mut ed, tty) = editor(10, 40);
        tty.push_keys(&[Key::byte(0xe9), Key::byte(b'x'), Key::RET]);
        assert_eq!(ed.prompt_bytes("Text: ", Complete::Nothing).unwrap(), b"\xe9x");
        tty.push_keys(&[Key::byte(0xe9), Key::RET]);
        assert_eq!(
            ed.prompt("Name: ", Complete::Nothing),
            Err(Error::user("Name is not valid UTF-8"))
        );
    }

    #[test]
    fn prompt_aborts_on_ctrl_g() {
        let (mut ed, tty) = editor(10, 40);
        tty.push_keys(&[Key::byte(b'a'), Key::ctrl(b'g')]);
        assert_eq!(ed.prompt("Name: ", Complete::Nothing), Err(Error::Aborted));
        assert!(ed.echo.prompt().is_none());
    }

    #[test]
    fn prompt_completes_command_names() {
        let (mut ed, tty) = editor(10, 40);
        tty.type_str("end-of-b");
        tty.push_keys(&[Key::TAB, Key::RET]);
        assert_eq!(ed.prompt("M-x ", Complete::Command).unwrap(), "end-of-buffer");
    }

    #[test]
    fn script_args_answer_prompts() {
        let (mut ed, _) = editor(10, 40);
        let got = ed.with_script_args(vec!["one".into()], |ed| {
            let a = ed.prompt("A: ", Complete::Nothing);
            let b = ed.prompt("B: ", Complete::Nothing);
            (a, b)
        });
        assert_eq!(got.0.unwrap(), "one");
        assert_eq!(got.1, Err(Error::user("not enough arguments")));
    }

    #[test]
    fn confirm_reads_y_or_n() {
        let (mut ed, tty) = editor(10, 40);
        tty.type_str("qy");
        assert!(ed.confirm("Really?").unwrap());
        assert_eq!(tty.stats().beeps, 1);
        tty.type_str("n");
        assert!(!ed.confirm("Really?").unwrap());
    }

    // ── Loop and redisplay ──────────────────────────────────────────────

    #[test]
    fn run_stops_at_end_of_input() {
        let (mut ed, tty) = editor(8, 40);
        tty.type_str("hi");
        ed.run().unwrap();
        assert_eq!(text(&ed), "hi");
        ed.update().unwrap();
        assert_eq!(tty.row_text(0), "hi");
        assert_eq!(tty.cursor(), (0, 2));
    }

    #[test]
    fn resize_rebuilds_layout() {
        let (mut ed, tty) = editor(10, 40);
        ed.update().unwrap();
        tty.resize(6, 30);
        tty.type_str("x");
        ed.run().unwrap();
        ed.update().unwrap();
        assert_eq!(ed.display.size(), mg_term::Size { cols: 30, rows: 6 });
        assert_eq!(ed.reg.cur().ntrows, 4);
        assert_eq!(tty.row_text(0), "x");
    }

    #[test]
    fn quit_command_ends_loop() {
        let (mut ed, tty) = editor(8, 40);
        tty.push_keys(&[Key::ctrl(b'x'), Key::ctrl(b'c'), Key::byte(b'z')]);
        ed.run().unwrap();
        assert!(ed.quitting());
        assert_eq!(tty.pending_input(), 1);
    }
}
