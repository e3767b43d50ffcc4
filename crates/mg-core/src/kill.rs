//! The kill buffer.
//!
//! Killed text accumulates here until it is yanked back. Consecutive kill
//! commands extend the same entry: forward kills append, backward kills
//! prepend. Any other command in between starts a fresh entry the next
//! time something is killed.

use crate::error::Result;

/// Which end of the kill buffer new text joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillDir {
    Forward,
    Backward,
}

/// Holds the most recently killed text.
#[derive(Debug, Default)]
pub struct KillBuffer {
    text: Vec<u8>,
}

impl KillBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self { text: Vec::new() }
    }

    /// The killed text.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Forget the current entry.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Add killed text on the side given by `dir`.
    ///
    /// # Errors
    ///
    /// [`crate::Error::OutOfMemory`]; the buffer is unchanged.
    pub fn add(&mut self, bytes: &[u8], dir: KillDir) -> Result<()> {
        self.text.try_reserve(bytes.len())?;
        match dir {
            KillDir::Forward => self.text.extend_from_slice(bytes),
            KillDir::Backward => {
                self.text.splice(0..0, bytes.iter().copied());
            }
        }
        Ok(())
    }
}
