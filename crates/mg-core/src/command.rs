//! The command table: named functions keys are bound to.
//!
//! Every bindable operation is a [`Command`]: a name, a plain function
//! taking the editor and a numeric [`Arg`], and a few [`CmdFlags`] the
//! dispatcher consults between commands. Keymaps hold [`CommandId`]s, not
//! names, so lookup by key never touches strings.
//!
//! # Architecture
//!
//! The table is filled once at startup by [`crate::commands::register`].
//! Scripts and `execute-extended-command` reach commands by name through
//! [`CommandTable::lookup`]; the prompt completes over
//! [`CommandTable::complete`].

use bitflags::bitflags;

use crate::editor::Editor;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// CommandId / Arg
// ---------------------------------------------------------------------------

/// Index of a command in the [`CommandTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(pub usize);

/// Numeric argument passed to every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arg {
    /// The count; 1 when none was given.
    pub n: i32,
    /// Whether the user supplied a count.
    pub given: bool,
}

impl Arg {
    /// No count given.
    pub const NONE: Self = Self { n: 1, given: false };

    #[must_use]
    pub const fn count(n: i32) -> Self {
        Self { n, given: true }
    }

    /// The count as a repeat number; negative counts are 0.
    #[must_use]
    pub fn times(self) -> usize {
        usize::try_from(self.n).unwrap_or(0)
    }
}

impl Default for Arg {
    fn default() -> Self {
        Self::NONE
    }
}

bitflags! {
    /// How the dispatcher treats a command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CmdFlags: u8 {
        /// Kills append to the kill buffer when run back to back.
        const KILL = 1 << 0;
        /// Keeps the goal column of a previous vertical motion.
        const GOAL = 1 << 1;
        /// Inserts the typed key; consecutive runs share one undo action.
        const SELF_INSERT = 1 << 2;
        /// Builds a numeric argument; does not count as the last command.
        const ARGUMENT = 1 << 3;
        /// Undo commands chain: consecutive undos do not add boundaries.
        const UNDO = 1 << 4;
    }
}

/// Signature of every command.
pub type CommandFn = fn(&mut Editor, Arg) -> Result<()>;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A named, bindable function.
#[derive(Clone)]
pub struct Command {
    pub name: &'static str,
    pub func: CommandFn,
    pub flags: CmdFlags,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Every registered command.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: Vec<Command>,
}

impl CommandTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command, returning its id.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a duplicate name, [`Error::OutOfMemory`].
    pub fn register(
        &mut self,
        name: &'static str,
        func: CommandFn,
        flags: CmdFlags,
    ) -> Result<CommandId> {
        if self.lookup(name).is_some() {
            return Err(Error::invariant(format!("command {name} registered twice")));
        }
        self.commands.try_reserve(1)?;
        self.commands.push(Command { name, func, flags });
        Ok(CommandId(self.commands.len() - 1))
    }

    /// Command named `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<CommandId> {
        self.commands
            .iter()
            .position(|c| c.name == name)
            .map(CommandId)
    }

    /// Look up a command.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for an unknown id.
    pub fn get(&self, id: CommandId) -> Result<&Command> {
        self.commands
            .get(id.0)
            .ok_or_else(|| Error::invariant(format!("unknown command {}", id.0)))
    }

    /// Name of a command, or `"?"`.
    #[must_use]
    pub fn name(&self, id: CommandId) -> &'static str {
        self.commands.get(id.0).map_or("?", |c| c.name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Names starting with `prefix`, sorted.
    #[must_use]
    pub fn complete(&self, prefix: &str) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .commands
            .iter()
            .map(|c| c.name)
            .filter(|n| n.starts_with(prefix))
            .collect();
        names.sort_unstable();
        names
    }
}

/// Longest common prefix of `names`, used to extend a completion.
#[must_use]
pub fn common_prefix<'a>(names: &[&'a str]) -> &'a str {
    let Some((first, rest)) = names.split_first() else {
        return "";
    };
    let len = rest.iter().fold(first.len(), |len, n| {
        first
            .bytes()
            .zip(n.bytes())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count()
    });
    &first[..len]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &mut Editor, _: Arg) -> Result<()> {
        Ok(())
    }

    #[test]
    fn register_and_lookup() {
        let mut t = CommandTable::new();
        let a = t.register("forward-char", nop, CmdFlags::GOAL).unwrap();
        let b = t.register("forward-word", nop, CmdFlags::empty()).unwrap();
        assert_ne!(a, b);
        assert_eq!(t.lookup("forward-char"), Some(a));
        assert_eq!(t.name(b), "forward-word");
        assert!(t.get(a).unwrap().flags.contains(CmdFlags::GOAL));
        assert_eq!(t.lookup("nope"), None);
        assert!(t.register("forward-char", nop, CmdFlags::empty()).is_err());
    }

    #[test]
    fn completion_is_sorted_and_prefixed() {
        let mut t = CommandTable::new();
        for name in ["forward-word", "find-file", "forward-char", "yank"] {
            t.register(name, nop, CmdFlags::empty()).unwrap();
        }
        assert_eq!(t.complete("f"), vec!["find-file", "forward-char", "forward-word"]);
        assert_eq!(common_prefix(&t.complete("fo")), "forward-");
        assert_eq!(common_prefix(&[]), "");
        assert_eq!(common_prefix(&["yank"]), "yank");
    }

    #[test]
    fn arg_times_clamps_negative() {
        assert_eq!(Arg::NONE.times(), 1);
        assert_eq!(Arg::count(-3).times(), 0);
        assert_eq!(Arg::count(4).times(), 4);
    }
}
