//! Modes: named keymaps stacked per buffer.
//!
//! Every buffer carries a stack of [`ModeId`]s. Fundamental mode (the
//! global keymap) is always at the bottom; minor modes such as overwrite
//! and no-tab sit on top of it. Key lookup walks the stack from the top,
//! so a mode's bindings shadow the ones beneath it.
//!
//! A mode may also own a buffer flag that is set while the mode is on.
//!
//! | Mode          | Flag        | Effect                               |
//! |---------------|-------------|--------------------------------------|
//! | `fundamental` | -           | Global bindings                      |
//! | `overwrite`   | `OVERWRITE` | Typed characters replace text        |
//! | `notab`       | `NOTAB`     | TAB inserts spaces to the next stop  |

use crate::buffer::{BufFlags, Buffer};
use crate::error::{Error, Result};
use crate::keymap::KeymapId;

// ---------------------------------------------------------------------------
// ModeId
// ---------------------------------------------------------------------------

/// Index of a mode in the [`ModeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeId(pub usize);

impl ModeId {
    /// The bottom of every buffer's stack.
    pub const FUNDAMENTAL: Self = Self(0);
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// A named keymap plus the buffer flag it controls.
#[derive(Debug, Clone)]
pub struct Mode {
    pub name: String,
    pub keymap: KeymapId,
    pub flag: BufFlags,
}

/// Every defined mode. Index 0 is fundamental mode.
#[derive(Debug, Default)]
pub struct ModeTable {
    modes: Vec<Mode>,
}

impl ModeTable {
    #[must_use]
    pub const fn new() -> Self {
        Self { modes: Vec::new() }
    }

    /// Define a mode. The first one defined becomes
    /// [`ModeId::FUNDAMENTAL`].
    ///
    /// # Errors
    ///
    /// [`Error::User`] if the name is taken, or [`Error::OutOfMemory`].
    pub fn add(&mut self, name: &str, keymap: KeymapId, flag: BufFlags) -> Result<ModeId> {
        if self.lookup(name).is_some() {
            return Err(Error::user(format!("Mode {name} already exists")));
        }
        self.modes.try_reserve(1)?;
        self.modes.push(Mode {
            name: name.to_string(),
            keymap,
            flag,
        });
        Ok(ModeId(self.modes.len() - 1))
    }

    /// Mode named `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ModeId> {
        self.modes.iter().position(|m| m.name == name).map(ModeId)
    }

    /// Look up a mode.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for an unknown id.
    pub fn get(&self, id: ModeId) -> Result<&Mode> {
        self.modes
            .get(id.0)
            .ok_or_else(|| Error::invariant(format!("unknown mode {}", id.0)))
    }

    /// Mode names, in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.iter().map(|m| m.name.as_str())
    }

    /// Turn a mode on or off in `buffer`: `Some(on)` sets it, `None`
    /// toggles. Fundamental mode cannot be removed. Returns whether the
    /// mode ended up on.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for an unknown id, [`Error::OutOfMemory`].
    pub fn set(&self, buffer: &mut Buffer, id: ModeId, on: Option<bool>) -> Result<bool> {
        let mode = self.get(id)?;
        if id == ModeId::FUNDAMENTAL {
            return Ok(true);
        }
        let active = buffer.modes.contains(&id);
        let want = on.unwrap_or(!active);
        if want && !active {
            buffer.modes.try_reserve(1)?;
            buffer.modes.push(id);
            buffer.flags |= mode.flag;
        } else if !want && active {
            buffer.modes.retain(|&m| m != id);
            buffer.flags.remove(mode.flag);
        }
        Ok(want)
    }

    /// Keymaps of the buffer's modes, topmost first.
    pub fn stack<'a>(&'a self, buffer: &'a Buffer) -> impl Iterator<Item = KeymapId> + 'a {
        buffer
            .modes
            .iter()
            .rev()
            .filter_map(|&id| self.modes.get(id.0).map(|m| m.keymap))
    }

    /// Minor mode names of a buffer, bottom to top, for the mode line.
    #[must_use]
    pub fn describe(&self, buffer: &Buffer) -> Vec<&str> {
        buffer
            .modes
            .iter()
            .filter_map(|&id| self.modes.get(id.0).map(|m| m.name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::Keymaps;

    fn table() -> (ModeTable, Keymaps) {
        let mut maps = Keymaps::new();
        let mut modes = ModeTable::new();
        let global = maps.create("fundamental").unwrap();
        let over = maps.create("overwrite").unwrap();
        modes.add("fundamental", global, BufFlags::empty()).unwrap();
        modes.add("overwrite", over, BufFlags::OVERWRITE).unwrap();
        (modes, maps)
    }

    #[test]
    fn first_mode_is_fundamental() {
        let (modes, _) = table();
        assert_eq!(modes.lookup("fundamental"), Some(ModeId::FUNDAMENTAL));
        assert_eq!(modes.lookup("overwrite"), Some(ModeId(1)));
        assert_eq!(modes.lookup("nope"), None);
    }

    #[test]
    fn duplicate_names_rejected() {
        let (mut modes, mut maps) = table();
        let m = maps.create("x").unwrap();
        assert!(modes.add("overwrite", m, BufFlags::empty()).is_err());
    }

    #[test]
    fn toggle_pushes_and_pops_with_flag() {
        let (modes, _) = table();
        let mut buffer = Buffer::new("b", 4).unwrap();
        let over = ModeId(1);
        assert!(modes.set(&mut buffer, over, None).unwrap());
        assert_eq!(buffer.modes, vec![ModeId::FUNDAMENTAL, over]);
        assert!(buffer.flags.contains(BufFlags::OVERWRITE));
        assert_eq!(modes.describe(&buffer), vec!["fundamental", "overwrite"]);

        assert!(!modes.set(&mut buffer, over, None).unwrap());
        assert_eq!(buffer.modes, vec![ModeId::FUNDAMENTAL]);
        assert!(!buffer.flags.contains(BufFlags::OVERWRITE));
    }

    #[test]
    fn stack_is_topmost_first() {
        let (modes, _) = table();
        let mut buffer = Buffer::new("b", 4).unwrap();
        modes.set(&mut buffer, ModeId(1), Some(true)).unwrap();
        let maps: Vec<KeymapId> = modes.stack(&buffer).collect();
        assert_eq!(maps[0], modes.get(ModeId(1)).unwrap().keymap);
        assert_eq!(maps[1], modes.get(ModeId::FUNDAMENTAL).unwrap().keymap);
    }

    #[test]
    fn fundamental_cannot_be_removed() {
        let (modes, _) = table();
        let mut buffer = Buffer::new("b", 4).unwrap();
        assert!(modes.set(&mut buffer, ModeId::FUNDAMENTAL, Some(false)).unwrap());
        assert_eq!(buffer.modes, vec![ModeId::FUNDAMENTAL]);
    }
}
