// SPDX-License-Identifier: MIT
//
// mg-term: Terminal driver for the mg editor.
//
// Everything the editor core needs from a terminal and nothing more: raw
// mode, key input with escape-sequence decoding, a handful of output
// primitives (cursor addressing, erase, reverse video, hardware line
// insert/delete), and an in-memory `Headless` screen that stands in for
// the terminal in tests.
//
// Direct ANSI output and raw termios, no TUI framework. Output for one
// redisplay is collected in a buffer and leaves in a single write.

pub mod ansi;
pub mod ansi_tty;
pub mod headless;
pub mod input;
pub mod key;
pub mod output;
pub mod reader;
pub mod terminal;
pub mod tty;

pub use ansi_tty::AnsiTty;
pub use headless::{Headless, OpStats};
pub use key::Key;
pub use tty::{CancelToken, Caps, Color, Costs, Input, Size, Tty};
