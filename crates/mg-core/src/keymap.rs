//! Keymaps: sorted range tables with nested prefix maps.
//!
//! A [`Keymap`] is an ordered list of non-overlapping [`KeymapElement`]s.
//! Each element covers an inclusive key range `[base, num]` with one
//! [`Func`] per key. A key bound to [`Func::Prefix`] descends into the
//! element's nested map; an element carries at most one nested map, so at
//! most one of its keys is a prefix.
//!
//! Maps live in the [`Keymaps`] arena and refer to their nested maps by
//! [`KeymapId`], so growing one map's element list never disturbs another
//! map's reference to it.
//!
//! Rebinding prefers to keep tables compact: a key close to an existing
//! element (within [`MAPELEDEF`] keys) extends that element instead of
//! starting a new one, with the gap filled by [`Func::Unbound`].

use mg_term::Key;
use slotmap::{SlotMap, new_key_type};

use crate::command::CommandId;
use crate::error::{Error, Result};

new_key_type! {
    /// Handle to a keymap in the arena.
    pub struct KeymapId;
}

/// Largest gap an element is stretched across to absorb a new key.
pub const MAPELEDEF: u16 = 4;

/// What a single key slot does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Command(CommandId),
    /// Descend into the element's nested map.
    Prefix,
    /// Fall back to the map's default.
    Unbound,
}

/// A contiguous key range and its bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeymapElement {
    pub base: Key,
    /// Last key of the range, inclusive.
    pub num: Key,
    pub funcs: Vec<Func>,
    pub prefix: Option<KeymapId>,
}

impl KeymapElement {
    #[inline]
    const fn contains(&self, key: Key) -> bool {
        self.base.0 <= key.0 && key.0 <= self.num.0
    }

    #[inline]
    const fn slot(&self, key: Key) -> usize {
        (key.0 - self.base.0) as usize
    }

    fn single(key: Key, func: Func, prefix: Option<KeymapId>) -> Result<Self> {
        let mut funcs = Vec::new();
        funcs.try_reserve_exact(1)?;
        funcs.push(func);
        Ok(Self {
            base: key,
            num: key,
            funcs,
            prefix,
        })
    }
}

/// A named key table.
#[derive(Debug, Clone)]
pub struct Keymap {
    pub name: String,
    pub elements: Vec<KeymapElement>,
    /// Used for keys no element covers and for unbound slots.
    pub default: Func,
}

/// Result of looking up a key or key sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Command(CommandId),
    /// More keys are needed; they are looked up in this map.
    Prefix(KeymapId),
    Unbound,
}

/// What [`Keymaps::rebind`] binds a key to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Command(CommandId),
    /// A prefix into an existing map, or a fresh one when `None`.
    Prefix(Option<KeymapId>),
    Unbind,
}

/// Arena of every keymap.
#[derive(Debug, Default)]
pub struct Keymaps {
    maps: SlotMap<KeymapId, Keymap>,
    /// Element allocations still to refuse.
    #[cfg(test)]
    refusals: usize,
}

impl Keymaps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`].
    pub fn create(&mut self, name: &str) -> Result<KeymapId> {
        let mut owned = String::new();
        owned.try_reserve_exact(name.len())?;
        owned.push_str(name);
        Ok(self.maps.insert(Keymap {
            name: owned,
            elements: Vec::new(),
            default: Func::Unbound,
        }))
    }

    /// Look up a map.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a stale handle.
    pub fn get(&self, id: KeymapId) -> Result<&Keymap> {
        self.maps
            .get(id)
            .ok_or_else(|| Error::invariant("stale keymap handle"))
    }

    fn get_mut(&mut self, id: KeymapId) -> Result<&mut Keymap> {
        self.maps
            .get_mut(id)
            .ok_or_else(|| Error::invariant("stale keymap handle"))
    }

    /// Map named `name`, if any.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<KeymapId> {
        self.maps
            .iter()
            .find(|(_, m)| m.name == name)
            .map(|(id, _)| id)
    }

    /// Set the binding for keys no element covers.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] for a stale handle.
    pub fn set_default(&mut self, id: KeymapId, func: Func) -> Result<()> {
        self.get_mut(id)?.default = func;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Binding of a single key in `map`. Never fails: a stale map or an
    /// uncovered key is [`Binding::Unbound`].
    #[must_use]
    pub fn resolve(&self, map: KeymapId, key: Key) -> Binding {
        let Some(m) = self.maps.get(map) else {
            return Binding::Unbound;
        };
        let idx = m.elements.partition_point(|e| e.num.0 < key.0);
        let func = match m.elements.get(idx) {
            Some(e) if e.contains(key) => match e.funcs[e.slot(key)] {
                Func::Prefix => {
                    return e.prefix.map_or(Binding::Unbound, Binding::Prefix);
                }
                Func::Unbound => m.default,
                f => f,
            },
            _ => m.default,
        };
        match func {
            Func::Command(c) => Binding::Command(c),
            Func::Prefix | Func::Unbound => Binding::Unbound,
        }
    }

    /// Binding of a key sequence starting at `map`. A sequence that runs
    /// past a command, or stops inside a prefix, resolves to what it
    /// reaches. An unbound final upper-case key is retried in lower case.
    #[must_use]
    pub fn lookup_seq(&self, map: KeymapId, keys: &[Key]) -> Binding {
        let mut cur = map;
        for (i, &key) in keys.iter().enumerate() {
            let last = i + 1 == keys.len();
            let mut binding = self.resolve(cur, key);
            if binding == Binding::Unbound && last && key.is_upper() {
                binding = self.resolve(cur, key.to_lower());
            }
            match binding {
                Binding::Prefix(next) if !last => cur = next,
                Binding::Command(_) | Binding::Unbound if !last => return Binding::Unbound,
                b => return b,
            }
        }
        Binding::Prefix(cur)
    }

    // -----------------------------------------------------------------------
    // Rebinding
    // -----------------------------------------------------------------------

    /// Bind `key` in `map`. Returns the nested map when binding a prefix.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] (bindings unchanged) or [`Error::Invariant`]
    /// for a stale handle.
    pub fn rebind(&mut self, map: KeymapId, key: Key, target: Target) -> Result<Option<KeymapId>> {
        let idx = {
            let m = self.get(map)?;
            m.elements.partition_point(|e| e.num.0 < key.0)
        };
        let hit = self.maps[map]
            .elements
            .get(idx)
            .is_some_and(|e| e.contains(key));
        if hit {
            self.rebind_in_place(map, idx, key, target)
        } else {
            self.rebind_new(map, idx, key, target)
        }
    }

    /// Key already covered by element `idx`.
    fn rebind_in_place(
        &mut self,
        map: KeymapId,
        idx: usize,
        key: Key,
        target: Target,
    ) -> Result<Option<KeymapId>> {
        let (slot, current, prefix) = {
            let e = &self.maps[map].elements[idx];
            let slot = e.slot(key);
            (slot, e.funcs[slot], e.prefix)
        };

        match target {
            Target::Command(c) => {
                if current == Func::Command(c) {
                    return Ok(None);
                }
                let e = &mut self.maps[map].elements[idx];
                if current == Func::Prefix {
                    e.prefix = None;
                }
                e.funcs[slot] = Func::Command(c);
                Ok(None)
            }
            Target::Unbind => {
                let e = &mut self.maps[map].elements[idx];
                if current == Func::Prefix {
                    e.prefix = None;
                }
                e.funcs[slot] = Func::Unbound;
                Ok(None)
            }
            Target::Prefix(want) => {
                if current == Func::Prefix {
                    let Some(have) = prefix else {
                        return Err(Error::invariant("prefix slot without a nested map"));
                    };
                    if want.is_none_or(|w| w == have) {
                        return Ok(Some(have));
                    }
                    if let Some(w) = want {
                        self.get(w)?;
                    }
                    self.maps[map].elements[idx].prefix = want;
                    return Ok(want);
                }
                let (nested, created) = self.prefix_target(map, want)?;
                if prefix.is_some() {
                    let split = self.split_element(map, idx, key);
                    if split.is_err() && created {
                        self.maps.remove(nested);
                    }
                    split?;
                    let at = idx + usize::from(key.0 > self.maps[map].elements[idx].num.0);
                    let e = &mut self.maps[map].elements[at];
                    e.funcs[0] = Func::Prefix;
                    e.prefix = Some(nested);
                } else {
                    let e = &mut self.maps[map].elements[idx];
                    e.funcs[slot] = Func::Prefix;
                    e.prefix = Some(nested);
                }
                Ok(Some(nested))
            }
        }
    }

    /// Split element `idx` so that `key` sits alone in its own element,
    /// leaving up to three pieces. The piece holding the old prefix keeps
    /// the nested map.
    fn split_element(&mut self, map: KeymapId, idx: usize, key: Key) -> Result<()> {
        self.refused()?;
        let e = self.maps[map].elements[idx].clone();
        let slot = e.slot(key);
        let mut pieces = Vec::new();
        pieces.try_reserve_exact(3)?;

        let owner = |funcs: &[Func]| {
            if funcs.contains(&Func::Prefix) {
                e.prefix
            } else {
                None
            }
        };
        if slot > 0 {
            let funcs = e.funcs[..slot].to_vec();
            pieces.push(KeymapElement {
                base: e.base,
                num: Key(key.0 - 1),
                prefix: owner(&funcs),
                funcs,
            });
        }
        pieces.push(KeymapElement::single(key, e.funcs[slot], None)?);
        if key.0 < e.num.0 {
            let funcs = e.funcs[slot + 1..].to_vec();
            pieces.push(KeymapElement {
                base: Key(key.0 + 1),
                num: e.num,
                prefix: owner(&funcs),
                funcs,
            });
        }

        let elements = &mut self.maps[map].elements;
        elements.try_reserve(pieces.len())?;
        elements.splice(idx..=idx, pieces);
        Ok(())
    }

    /// Key not covered by any element; `idx` is where it would go.
    fn rebind_new(
        &mut self,
        map: KeymapId,
        idx: usize,
        key: Key,
        target: Target,
    ) -> Result<Option<KeymapId>> {
        let (func, nested, created) = match target {
            Target::Unbind => return Ok(None),
            Target::Command(c) => (Func::Command(c), None, false),
            Target::Prefix(want) => {
                let (nested, created) = self.prefix_target(map, want)?;
                (Func::Prefix, Some(nested), created)
            }
        };
        let placed = self.place(map, idx, key, func, nested);
        if let (Err(_), Some(n), true) = (&placed, nested, created) {
            self.maps.remove(n);
        }
        placed.map(|()| nested)
    }

    /// The map a new prefix binding in `map` leads to: `want` once checked,
    /// or a fresh map. The flag is set when the map was created here.
    fn prefix_target(
        &mut self,
        map: KeymapId,
        want: Option<KeymapId>,
    ) -> Result<(KeymapId, bool)> {
        if let Some(w) = want {
            self.get(w)?;
            return Ok((w, false));
        }
        let name = format!("{}-prefix", self.maps[map].name);
        Ok((self.create(&name)?, true))
    }

    /// Store `func` for the unbound `key`, widening a neighbour within
    /// reach or inserting a new element at `idx`.
    fn place(
        &mut self,
        map: KeymapId,
        idx: usize,
        key: Key,
        func: Func,
        nested: Option<KeymapId>,
    ) -> Result<()> {
        self.refused()?;
        let elements = &mut self.maps[map].elements;
        let fits = |e: &KeymapElement| nested.is_none() || e.prefix.is_none();

        if idx > 0 {
            let prev = &mut elements[idx - 1];
            if key.0 - prev.num.0 <= MAPELEDEF && fits(&*prev) {
                let gap = usize::from(key.0 - prev.num.0 - 1);
                prev.funcs.try_reserve(gap + 1)?;
                prev.funcs.extend(std::iter::repeat_n(Func::Unbound, gap));
                prev.funcs.push(func);
                prev.num = key;
                if nested.is_some() {
                    prev.prefix = nested;
                }
                return Ok(());
            }
        }
        if let Some(next) = elements.get_mut(idx) {
            if next.base.0 - key.0 <= MAPELEDEF && fits(&*next) {
                let gap = usize::from(next.base.0 - key.0 - 1);
                next.funcs.try_reserve(gap + 1)?;
                next.funcs.splice(
                    0..0,
                    std::iter::once(func).chain(std::iter::repeat_n(Func::Unbound, gap)),
                );
                next.base = key;
                if nested.is_some() {
                    next.prefix = nested;
                }
                return Ok(());
            }
        }
        elements.try_reserve(1)?;
        elements.insert(idx, KeymapElement::single(key, func, nested)?);
        Ok(())
    }

    #[cfg(test)]
    fn refused(&mut self) -> Result<()> {
        if self.refusals == 0 {
            return Ok(());
        }
        self.refusals -= 1;
        Err(Error::OutOfMemory)
    }

    #[cfg(not(test))]
    #[allow(clippy::unused_self)]
    const fn refused(&mut self) -> Result<()> {
        Ok(())
    }

    /// Bind a whole key sequence, creating nested maps along the way.
    ///
    /// # Errors
    ///
    /// As for [`rebind`](Self::rebind), plus [`Error::User`] for an empty
    /// sequence.
    pub fn bind_keys(&mut self, map: KeymapId, keys: &[Key], target: Target) -> Result<()> {
        let Some((&last, prefix)) = keys.split_last() else {
            return Err(Error::user("Empty key sequence"));
        };
        let mut cur = map;
        for &key in prefix {
            cur = match self.resolve(cur, key) {
                Binding::Prefix(next) => next,
                _ => self
                    .rebind(cur, key, Target::Prefix(None))?
                    .ok_or_else(|| Error::invariant("prefix bind returned no map"))?,
            };
        }
        self.rebind(cur, last, target)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Verify that `map`'s elements are sorted, non-overlapping and
    /// internally consistent.
    ///
    /// # Errors
    ///
    /// [`Error::Invariant`] describing the first problem found.
    pub fn check(&self, map: KeymapId) -> Result<()> {
        let m = self.get(map)?;
        let damaged = |what: &str| Error::invariant(format!("damaged keymap {}: {what}", m.name));
        let mut prev: Option<Key> = None;
        for e in &m.elements {
            if e.base.0 > e.num.0 {
                return Err(damaged("inverted range"));
            }
            if prev.is_some_and(|p| p.0 >= e.base.0) {
                return Err(damaged("elements overlap or are out of order"));
            }
            if e.funcs.len() != usize::from(e.num.0 - e.base.0) + 1 {
                return Err(damaged("range does not match bindings"));
            }
            let prefixes = e.funcs.iter().filter(|&&f| f == Func::Prefix).count();
            if prefixes > 1 || (prefixes == 1) != e.prefix.is_some() {
                return Err(damaged("prefix slot without a nested map"));
            }
            if let Some(p) = e.prefix {
                self.get(p)?;
            }
            prev = Some(e.num);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const A: CommandId = CommandId(1);
    const B: CommandId = CommandId(2);
    const C: CommandId = CommandId(3);

    fn setup() -> (Keymaps, KeymapId) {
        let mut maps = Keymaps::new();
        let m = maps.create("global").unwrap();
        (maps, m)
    }

    fn ranges(maps: &Keymaps, m: KeymapId) -> Vec<(u16, u16)> {
        maps.get(m)
            .unwrap()
            .elements
            .iter()
            .map(|e| (e.base.0, e.num.0))
            .collect()
    }

    // ── Resolution ──────────────────────────────────────────────────────

    #[test]
    fn bind_then_resolve() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key::ctrl(b'f'), Target::Command(A)).unwrap();
        assert_eq!(maps.resolve(m, Key::ctrl(b'f')), Binding::Command(A));
        assert_eq!(maps.resolve(m, Key::ctrl(b'b')), Binding::Unbound);
        maps.check(m).unwrap();
    }

    #[test]
    fn default_covers_unbound_keys() {
        let (mut maps, m) = setup();
        maps.set_default(m, Func::Command(C)).unwrap();
        maps.rebind(m, Key(10), Target::Command(A)).unwrap();
        maps.rebind(m, Key(13), Target::Command(B)).unwrap();
        assert_eq!(maps.resolve(m, Key(11)), Binding::Command(C));
        assert_eq!(maps.resolve(m, Key(200)), Binding::Command(C));
    }

    #[test]
    fn lookup_folds_final_upper_case_key() {
        let (mut maps, m) = setup();
        maps.bind_keys(m, &[Key::ctrl(b'x'), Key::byte(b'o')], Target::Command(A))
            .unwrap();
        assert_eq!(
            maps.lookup_seq(m, &[Key::ctrl(b'x'), Key::byte(b'O')]),
            Binding::Command(A)
        );
        assert!(matches!(
            maps.lookup_seq(m, &[Key::ctrl(b'x')]),
            Binding::Prefix(_)
        ));
        assert_eq!(
            maps.lookup_seq(m, &[Key::ctrl(b'x'), Key::byte(b'o'), Key::byte(b'o')]),
            Binding::Unbound
        );
    }

    // ── Rebind cases ────────────────────────────────────────────────────

    #[test]
    fn identical_rebind_is_noop() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key(50), Target::Command(A)).unwrap();
        let before = maps.get(m).unwrap().elements.clone();
        maps.rebind(m, Key(50), Target::Command(A)).unwrap();
        assert_eq!(maps.get(m).unwrap().elements, before);
    }

    #[test]
    fn overwrite_replaces_slot() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key(50), Target::Command(A)).unwrap();
        maps.rebind(m, Key(50), Target::Command(B)).unwrap();
        assert_eq!(maps.resolve(m, Key(50)), Binding::Command(B));
        assert_eq!(ranges(&maps, m), vec![(50, 50)]);
    }

    #[test]
    fn nearby_keys_extend_elements() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key(50), Target::Command(A)).unwrap();
        maps.rebind(m, Key(53), Target::Command(B)).unwrap();
        assert_eq!(ranges(&maps, m), vec![(50, 53)]);
        assert_eq!(maps.resolve(m, Key(51)), Binding::Unbound);
        maps.rebind(m, Key(47), Target::Command(C)).unwrap();
        assert_eq!(ranges(&maps, m), vec![(47, 53)]);
        assert_eq!(maps.resolve(m, Key(47)), Binding::Command(C));
        assert_eq!(maps.resolve(m, Key(53)), Binding::Command(B));
        maps.check(m).unwrap();
    }

    #[test]
    fn distant_keys_get_new_elements() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key(50), Target::Command(A)).unwrap();
        maps.rebind(m, Key(10), Target::Command(B)).unwrap();
        maps.rebind(m, Key(90), Target::Command(C)).unwrap();
        assert_eq!(ranges(&maps, m), vec![(10, 10), (50, 50), (90, 90)]);
        maps.check(m).unwrap();
    }

    #[test]
    fn second_prefix_in_element_splits_it() {
        let (mut maps, m) = setup();
        for k in 20..=24 {
            maps.rebind(m, Key(k), Target::Command(A)).unwrap();
        }
        let first = maps.rebind(m, Key(21), Target::Prefix(None)).unwrap().unwrap();
        let second = maps.rebind(m, Key(23), Target::Prefix(None)).unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(ranges(&maps, m), vec![(20, 22), (23, 23), (24, 24)]);
        assert_eq!(maps.resolve(m, Key(21)), Binding::Prefix(first));
        assert_eq!(maps.resolve(m, Key(23)), Binding::Prefix(second));
        assert_eq!(maps.resolve(m, Key(24)), Binding::Command(A));
        maps.check(m).unwrap();
    }

    #[test]
    fn prefix_does_not_extend_element_with_prefix() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key(30), Target::Prefix(None)).unwrap();
        maps.rebind(m, Key(31), Target::Prefix(None)).unwrap();
        assert_eq!(ranges(&maps, m), vec![(30, 30), (31, 31)]);
        maps.check(m).unwrap();
    }

    #[test]
    fn prefix_round_trip() {
        let (mut maps, m) = setup();
        let x = Key::ctrl(b'x');
        maps.bind_keys(m, &[x, Key::ctrl(b'f')], Target::Command(A)).unwrap();
        maps.bind_keys(m, &[x, Key::byte(b'4'), Key::byte(b'f')], Target::Command(B))
            .unwrap();
        assert_eq!(maps.lookup_seq(m, &[x, Key::ctrl(b'f')]), Binding::Command(A));
        assert_eq!(
            maps.lookup_seq(m, &[x, Key::byte(b'4'), Key::byte(b'f')]),
            Binding::Command(B)
        );
        maps.rebind(m, x, Target::Command(C)).unwrap();
        assert_eq!(maps.resolve(m, x), Binding::Command(C));
        maps.check(m).unwrap();
    }

    #[test]
    fn unbind_falls_back_to_default() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key(5), Target::Command(A)).unwrap();
        maps.rebind(m, Key(5), Target::Unbind).unwrap();
        assert_eq!(maps.resolve(m, Key(5)), Binding::Unbound);
        maps.rebind(m, Key(99), Target::Unbind).unwrap();
        assert_eq!(ranges(&maps, m), vec![(5, 5)]);
    }

    #[test]
    fn many_rebinds_stay_sorted() {
        let (mut maps, m) = setup();
        let mut k: u16 = 7;
        for i in 0..200u16 {
            k = (k * 31 + 17) % 300;
            let target = match i % 5 {
                0 => Target::Prefix(None),
                1 => Target::Unbind,
                _ => Target::Command(CommandId(usize::from(i))),
            };
            maps.rebind(m, Key(k), target).unwrap();
            maps.check(m).unwrap();
        }
    }

    #[test]
    fn check_detects_overlap() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key(5), Target::Command(A)).unwrap();
        maps.rebind(m, Key(50), Target::Command(A)).unwrap();
        maps.get_mut(m).unwrap().elements[1].base = Key(5);
        assert!(matches!(maps.check(m), Err(Error::Invariant(_))));
    }

    // ── Failures ────────────────────────────────────────────────────────

    #[test]
    fn failed_split_leaves_no_orphan_map() {
        let (mut maps, m) = setup();
        maps.rebind(m, Key(10), Target::Prefix(None)).unwrap();
        maps.rebind(m, Key(11), Target::Command(A)).unwrap();
        assert_eq!(ranges(&maps, m), vec![(10, 11)]);
        let before = maps.maps.len();

        maps.refusals = 1;
        let r = maps.rebind(m, Key(11), Target::Prefix(None));
        assert_eq!(r, Err(Error::OutOfMemory));
        assert_eq!(maps.maps.len(), before);
        assert_eq!(maps.resolve(m, Key(11)), Binding::Command(A));
        maps.check(m).unwrap();
    }

    #[test]
    fn failed_insert_leaves_no_orphan_map() {
        let (mut maps, m) = setup();
        let before = maps.maps.len();
        maps.refusals = 1;
        assert_eq!(
            maps.rebind(m, Key(40), Target::Prefix(None)),
            Err(Error::OutOfMemory)
        );
        assert_eq!(maps.maps.len(), before);
        assert_eq!(maps.resolve(m, Key(40)), Binding::Unbound);
        assert!(ranges(&maps, m).is_empty());
    }

    #[test]
    fn prefix_cannot_be_pointed_at_a_stale_map() {
        let (mut maps, m) = setup();
        let have = maps.rebind(m, Key(10), Target::Prefix(None)).unwrap().unwrap();
        let gone = maps.create("gone").unwrap();
        maps.maps.remove(gone);

        let r = maps.rebind(m, Key(10), Target::Prefix(Some(gone)));
        assert!(matches!(r, Err(Error::Invariant(_))));
        assert_eq!(maps.resolve(m, Key(10)), Binding::Prefix(have));
        maps.check(m).unwrap();
    }
}
