//! # mg-core: the mg editor kernel
//!
//! Text storage, windows, redisplay, key dispatch and undo for a small
//! Emacs-style editor. The terminal itself lives in `mg-term`; everything
//! here talks to it through the [`mg_term::Tty`] trait, so the whole kernel
//! runs against a headless screen in tests.
//!
//! Storage:
//!
//! - **[`line`]**: lines and positions, the unit of text storage
//! - **[`buffer`]**: named rings of lines with flags and a mode stack
//! - **[`window`]**: tiled views onto buffers
//! - **[`registry`]**: every buffer and window, line-removal fixups
//! - **[`edit`]**: insertion, deletion and replacement with fixups
//! - **[`undo`]**: per-buffer undo log
//! - **[`kill`]**: the kill buffer
//! - **[`fileio`]**: reading and writing files line by line
//! - **[`search`]**: literal and regex search over a buffer
//!
//! Screen:
//!
//! - **[`display`]**: redisplay with minimal-cost line updates
//! - **[`echo`]**: messages and prompts on the bottom row
//!
//! Input and commands:
//!
//! - **[`keymap`]**: range-table keymaps with prefix maps
//! - **[`mode`]**: named keymaps stacked per buffer
//! - **[`command`]**: the command table and numeric arguments
//! - **[`commands`]**: built-in commands and default bindings
//! - **[`options`]**: the `set` command's options
//! - **[`script`]**: startup files and command lines
//! - **[`editor`]**: the editor and its read-dispatch-redisplay loop

pub mod buffer;
pub mod command;
pub mod commands;
pub mod display;
pub mod echo;
pub mod edit;
pub mod editor;
pub mod error;
pub mod fileio;
pub mod keymap;
pub mod kill;
pub mod line;
pub mod mode;
pub mod options;
pub mod registry;
pub mod script;
pub mod search;
pub mod undo;
pub mod window;

pub use command::{Arg, CmdFlags, CommandFn, CommandId};
pub use editor::Editor;
pub use error::{Error, Result, Status};
