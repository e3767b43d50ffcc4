//! Errors and command status.
//!
//! Every fallible kernel operation returns [`Result`]. Commands turn their
//! outcome into a [`Status`], which is what scripts and keyboard macros use
//! to decide whether to keep going.

use std::collections::TryReserveError;
use std::io;

/// Kernel error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Memory for a line, keymap or undo record could not be obtained.
    /// The operation was abandoned before touching any structure.
    #[error("Out of memory")]
    OutOfMemory,

    /// Something the user asked for cannot be done.
    #[error("{0}")]
    User(String),

    /// A structural invariant does not hold (stale line handle, damaged
    /// keymap, undo offset past the end of the buffer).
    #[error("Internal error: {0}")]
    Invariant(String),

    /// The user typed the quit key.
    #[error("Quit")]
    Aborted,

    /// File I/O failed.
    #[error("{0}")]
    Io(String),
}

impl Error {
    /// Shorthand for [`Error::User`].
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    /// Shorthand for [`Error::Invariant`].
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// How a failing command reports to its caller.
    ///
    /// Ordinary failures let a script continue with its next line; a quit
    /// or a broken invariant stops the whole script.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::OutOfMemory | Self::User(_) | Self::Io(_) => Status::Fail,
            Self::Invariant(_) | Self::Aborted => Status::AbortScript,
        }
    }
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Kernel result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of running one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The command succeeded.
    Continue,
    /// The command failed; a script moves on to its next line.
    Fail,
    /// The command failed badly enough that a running script or macro
    /// must stop.
    AbortScript,
}

impl Status {
    /// Status for a command result.
    #[must_use]
    pub const fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Continue,
            Err(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_fail_softly() {
        assert_eq!(Error::user("nope").status(), Status::Fail);
        assert_eq!(Error::OutOfMemory.status(), Status::Fail);
        assert_eq!(Error::Io("disk".into()).status(), Status::Fail);
    }

    #[test]
    fn quit_and_invariants_abort_scripts() {
        assert_eq!(Error::Aborted.status(), Status::AbortScript);
        assert_eq!(Error::invariant("lost mark").status(), Status::AbortScript);
    }

    #[test]
    fn messages() {
        assert_eq!(Error::Aborted.to_string(), "Quit");
        assert_eq!(Error::user("Mark not set").to_string(), "Mark not set");
        assert_eq!(
            Error::invariant("lost mark").to_string(),
            "Internal error: lost mark"
        );
    }

    #[test]
    fn status_of_result() {
        let ok: Result<()> = Ok(());
        assert_eq!(Status::of(&ok), Status::Continue);
        let err: Result<()> = Err(Error::Aborted);
        assert_eq!(Status::of(&err), Status::AbortScript);
    }

    #[test]
    fn reserve_failure_maps_to_out_of_memory() {
        let mut v: Vec<u8> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert_eq!(Error::from(err), Error::OutOfMemory);
    }
}
