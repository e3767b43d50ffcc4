//! Undo log: per-buffer record of edits.
//!
//! Every change to a buffer's text is logged as an [`UndoRecord`] holding
//! an *absolute* buffer offset, never a line handle: lines are split,
//! joined and freed long before an undo runs, but an offset from the start
//! of the buffer stays meaningful as long as later edits are undone first.
//!
//! [`UndoKind::Boundary`] records separate user actions. Undoing one
//! action pops every record back to the previous boundary.
//!
//! Typing and repeated deletion produce long runs of tiny edits, so new
//! records merge into the previous one when they continue it. Discarded
//! records go back to a small free pool and are reused, storage included.
//!
//! The log never makes an edit fail. If a record cannot be allocated,
//! the oldest whole actions are evicted to make room. An action is never
//! evicted in part: when only the current action is left, it is forgotten
//! along with the record, so undo never replays half of one.
//!
//! Replay itself lives on the registry (it needs to edit text and fix up
//! windows); the log exposes [`UndoLog::pop_action`] and a suspension flag
//! that keeps replay from logging its own edits.

use std::collections::VecDeque;

/// What an undo record undoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    /// `size` bytes were inserted at `offset`.
    Insert,
    /// `content` was deleted at `offset`.
    Delete,
    /// `content` at `offset` was replaced by `size` new bytes.
    Change,
    /// Separates user actions.
    Boundary,
}

/// One logged edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    pub kind: UndoKind,
    pub offset: usize,
    pub size: usize,
    pub content: Vec<u8>,
}

/// Default capacity of the record free pool.
pub const DEFAULT_POOL: usize = 32;

/// A buffer's undo log.
#[derive(Debug)]
pub struct UndoLog {
    records: VecDeque<UndoRecord>,
    pool: Vec<UndoRecord>,
    pool_cap: usize,
    suspended: bool,
    enabled: bool,
    /// Allocations still to refuse.
    #[cfg(test)]
    refusals: usize,
}

impl UndoLog {
    /// An empty, enabled log whose free pool holds at most `pool_cap`
    /// records.
    #[must_use]
    pub const fn new(pool_cap: usize) -> Self {
        Self {
            records: VecDeque::new(),
            pool: Vec::new(),
            pool_cap,
            suspended: false,
            enabled: true,
            #[cfg(test)]
            refusals: 0,
        }
    }

    /// Turn logging on or off. Turning it off discards the log.
    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
        if !on {
            self.clear();
        }
    }

    /// Set the free pool capacity, trimming the pool if needed.
    pub fn set_pool_cap(&mut self, cap: usize) {
        self.pool_cap = cap;
        self.pool.truncate(cap);
    }

    /// Suspend or resume logging, returning the previous state.
    pub fn set_suspended(&mut self, on: bool) -> bool {
        std::mem::replace(&mut self.suspended, on)
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    const fn active(&self) -> bool {
        self.enabled && !self.suspended
    }

    /// Number of records, boundaries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in logging order (oldest first).
    pub fn records(&self) -> impl Iterator<Item = &UndoRecord> {
        self.records.iter()
    }

    /// Whether anything other than boundaries is left to undo.
    #[must_use]
    pub fn has_action(&self) -> bool {
        self.records.iter().any(|r| r.kind != UndoKind::Boundary)
    }

    /// Records currently held by the free pool.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        while let Some(r) = self.records.pop_front() {
            self.recycle(r);
        }
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Close the current user action. Consecutive boundaries collapse.
    pub fn add_boundary(&mut self) {
        if !self.active() {
            return;
        }
        match self.records.back() {
            None => {}
            Some(last) if last.kind == UndoKind::Boundary => {}
            Some(_) => self.push(UndoKind::Boundary, 0, 0, &[]),
        }
    }

    /// Log an insertion of `size` bytes at `offset`.
    pub fn add_insert(&mut self, offset: usize, size: usize) {
        if !self.active() || size == 0 {
            return;
        }
        if let Some(last) = self.records.back_mut() {
            if last.kind == UndoKind::Insert && last.offset + last.size == offset {
                last.size += size;
                return;
            }
        }
        self.push(UndoKind::Insert, offset, size, &[]);
    }

    /// Log a deletion of `bytes` at `offset`. Call before deleting.
    ///
    /// Forward deletion at a fixed offset appends to the previous record;
    /// backward deletion ending where the previous one began prepends.
    pub fn add_delete(&mut self, offset: usize, bytes: &[u8]) {
        if !self.active() || bytes.is_empty() {
            return;
        }
        if self.merge_delete(offset, bytes) {
            return;
        }
        self.push(UndoKind::Delete, offset, bytes.len(), bytes);
    }

    fn merge_delete(&mut self, offset: usize, bytes: &[u8]) -> bool {
        let Some(last) = self.records.back() else {
            return false;
        };
        if last.kind != UndoKind::Delete {
            return false;
        }
        let forward = last.offset == offset;
        let backward = offset + bytes.len() == last.offset;
        if !forward && !backward {
            return false;
        }
        if self.refused() {
            return false;
        }
        let Some(last) = self.records.back_mut() else {
            return false;
        };
        if last.content.try_reserve(bytes.len()).is_err() {
            return false;
        }
        if forward {
            last.content.extend_from_slice(bytes);
        } else {
            last.content.splice(0..0, bytes.iter().copied());
            last.offset = offset;
        }
        last.size += bytes.len();
        true
    }

    /// Log a replacement of `old` at `offset` by `size` new bytes.
    pub fn add_change(&mut self, offset: usize, size: usize, old: &[u8]) {
        if !self.active() {
            return;
        }
        self.push(UndoKind::Change, offset, size, old);
    }

    fn push(&mut self, kind: UndoKind, offset: usize, size: usize, content: &[u8]) {
        let mut record = self.pool.pop().unwrap_or_else(|| UndoRecord {
            kind,
            offset,
            size,
            content: Vec::new(),
        });
        record.content.clear();
        loop {
            let room = !self.refused()
                && record.content.try_reserve(content.len()).is_ok()
                && self.records.try_reserve(1).is_ok();
            if room {
                break;
            }
            if !self.evict_oldest_action() {
                log::warn!(
                    "undo: no memory for {} saved bytes, current action forgotten",
                    content.len()
                );
                self.clear();
                self.recycle(record);
                return;
            }
        }
        record.kind = kind;
        record.offset = offset;
        record.size = size;
        record.content.extend_from_slice(content);
        self.records.push_back(record);
    }

    /// Drop every record up to and including the first boundary. `false`
    /// when no boundary is left, that is, only the current action remains.
    fn evict_oldest_action(&mut self) -> bool {
        let Some(end) = self.records.iter().position(|r| r.kind == UndoKind::Boundary) else {
            return false;
        };
        log::warn!("undo: evicting oldest action ({end} records) to make room");
        for _ in 0..=end {
            if let Some(r) = self.records.pop_front() {
                self.recycle(r);
            }
        }
        true
    }

    #[cfg(test)]
    fn refused(&mut self) -> bool {
        let refuse = self.refusals > 0;
        self.refusals = self.refusals.saturating_sub(1);
        refuse
    }

    #[cfg(not(test))]
    #[allow(clippy::unused_self)]
    const fn refused(&mut self) -> bool {
        false
    }

    fn recycle(&mut self, mut record: UndoRecord) {
        if self.pool.len() < self.pool_cap {
            record.content.clear();
            self.pool.push(record);
        }
    }

    // -----------------------------------------------------------------------
    // Replay support
    // -----------------------------------------------------------------------

    /// Remove and return the most recent user action, newest record first.
    /// Empty when nothing is left to undo.
    pub fn pop_action(&mut self) -> Vec<UndoRecord> {
        while self
            .records
            .back()
            .is_some_and(|r| r.kind == UndoKind::Boundary)
        {
            if let Some(b) = self.records.pop_back() {
                self.recycle(b);
            }
        }
        let mut action = Vec::new();
        while let Some(r) = self.records.pop_back() {
            if r.kind == UndoKind::Boundary {
                self.records.push_back(r);
                break;
            }
            action.push(r);
        }
        action
    }

    /// Return replayed records to the free pool.
    pub fn release(&mut self, records: Vec<UndoRecord>) {
        for r in records {
            self.recycle(r);
        }
    }
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(DEFAULT_POOL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(log: &UndoLog) -> Vec<UndoKind> {
        log.records().map(|r| r.kind).collect()
    }

    // ── Merging ─────────────────────────────────────────────────────────

    #[test]
    fn contiguous_inserts_merge() {
        let mut log = UndoLog::default();
        for i in 0..5 {
            log.add_insert(10 + i, 1);
        }
        assert_eq!(log.len(), 1);
        let r = log.records().next().unwrap();
        assert_eq!((r.offset, r.size), (10, 5));
    }

    #[test]
    fn non_contiguous_inserts_do_not_merge() {
        let mut log = UndoLog::default();
        log.add_insert(0, 1);
        log.add_insert(5, 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn forward_deletes_append() {
        let mut log = UndoLog::default();
        log.add_delete(3, b"a");
        log.add_delete(3, b"b");
        let r = log.records().next().unwrap();
        assert_eq!(r.content, b"ab");
        assert_eq!((r.offset, r.size), (3, 2));
    }

    #[test]
    fn backward_deletes_prepend() {
        let mut log = UndoLog::default();
        log.add_delete(5, b"c");
        log.add_delete(4, b"b");
        log.add_delete(3, b"a");
        assert_eq!(log.len(), 1);
        let r = log.records().next().unwrap();
        assert_eq!(r.content, b"abc");
        assert_eq!(r.offset, 3);
    }

    #[test]
    fn boundary_stops_merging() {
        let mut log = UndoLog::default();
        log.add_insert(0, 1);
        log.add_boundary();
        log.add_insert(1, 1);
        assert_eq!(
            kinds(&log),
            vec![UndoKind::Insert, UndoKind::Boundary, UndoKind::Insert]
        );
    }

    #[test]
    fn boundaries_collapse() {
        let mut log = UndoLog::default();
        log.add_boundary();
        assert!(log.is_empty());
        log.add_insert(0, 1);
        log.add_boundary();
        log.add_boundary();
        assert_eq!(log.len(), 2);
    }

    // ── Suspension ──────────────────────────────────────────────────────

    #[test]
    fn suspended_log_records_nothing() {
        let mut log = UndoLog::default();
        assert!(!log.set_suspended(true));
        log.add_insert(0, 3);
        log.add_delete(0, b"x");
        log.add_change(0, 1, b"y");
        assert!(log.is_empty());
        assert!(log.set_suspended(false));
        log.add_insert(0, 3);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn disabling_discards() {
        let mut log = UndoLog::default();
        log.add_insert(0, 3);
        log.set_enabled(false);
        assert!(log.is_empty());
        log.add_insert(0, 3);
        assert!(log.is_empty());
    }

    // ── Popping ─────────────────────────────────────────────────────────

    #[test]
    fn pop_action_stops_at_boundary() {
        let mut log = UndoLog::default();
        log.add_insert(0, 1);
        log.add_boundary();
        log.add_delete(0, b"x");
        log.add_insert(9, 2);
        log.add_boundary();

        let action = log.pop_action();
        assert_eq!(
            action.iter().map(|r| r.kind).collect::<Vec<_>>(),
            vec![UndoKind::Insert, UndoKind::Delete]
        );
        log.release(action);

        let action = log.pop_action();
        assert_eq!(action.len(), 1);
        assert_eq!(action[0].kind, UndoKind::Insert);
        log.release(action);

        assert!(log.pop_action().is_empty());
        assert!(!log.has_action());
    }

    // ── Low memory ──────────────────────────────────────────────────────

    #[test]
    fn failed_allocation_evicts_oldest_actions() {
        let mut log = UndoLog::default();
        log.add_delete(0, b"first");
        log.add_boundary();
        log.add_delete(0, b"second");
        log.add_boundary();
        log.add_insert(0, 4);

        log.refusals = 2;
        log.add_delete(9, b"third");
        // The first failure evicts "first", the second "second".
        assert_eq!(kinds(&log), vec![UndoKind::Insert, UndoKind::Delete]);
        let action = log.pop_action();
        assert_eq!(action[0].content, b"third");
        assert_eq!(action[1].kind, UndoKind::Insert);
        assert!(log.is_empty());
    }

    #[test]
    fn eviction_spares_newer_actions() {
        let mut log = UndoLog::default();
        log.add_insert(0, 1);
        log.add_boundary();
        log.add_insert(5, 1);
        log.add_boundary();

        log.refusals = 1;
        log.add_change(0, 2, b"ab");
        assert_eq!(
            kinds(&log),
            vec![UndoKind::Insert, UndoKind::Boundary, UndoKind::Change]
        );
        assert_eq!(log.records().next().unwrap().offset, 5);
    }

    #[test]
    fn current_action_is_never_split() {
        let mut log = UndoLog::default();
        log.add_insert(0, 3);
        log.add_delete(8, b"xy");

        log.refusals = 1;
        log.add_delete(20, b"z");
        assert!(log.is_empty());
        assert!(log.pop_action().is_empty());
        // Logging resumes with the next edit.
        log.add_insert(0, 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn failed_merge_falls_back_to_new_record() {
        let mut log = UndoLog::default();
        log.add_delete(3, b"a");
        log.refusals = 1;
        log.add_delete(3, b"b");
        let contents: Vec<_> = log.records().map(|r| r.content.clone()).collect();
        assert_eq!(contents, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    // ── Pool ────────────────────────────────────────────────────────────

    #[test]
    fn pool_is_capped_and_reused() {
        let mut log = UndoLog::new(2);
        for i in 0..5 {
            log.add_insert(i * 10, 1);
        }
        log.clear();
        assert_eq!(log.pooled(), 2);
        log.add_delete(0, b"abc");
        assert_eq!(log.pooled(), 1);
        assert_eq!(log.records().next().unwrap().content, b"abc");
    }

    #[test]
    fn released_records_respect_pool_cap() {
        let mut log = UndoLog::new(3);
        for i in 0..4 {
            log.add_delete(i * 10, b"x");
        }
        let action = log.pop_action();
        assert_eq!(action.len(), 4);
        log.release(action);
        assert_eq!(log.pooled(), 3);

        log.set_pool_cap(1);
        assert_eq!(log.pooled(), 1);
        log.set_pool_cap(0);
        log.add_insert(0, 1);
        log.clear();
        assert_eq!(log.pooled(), 0);
    }
}
