//! Search: finding text in a buffer.
//!
//! Provides forward and backward search over a buffer's lines, either for a
//! literal string or for a regular expression. Matches never span lines.
//! A literal pattern with no upper-case letters matches without regard to
//! case; one with any upper-case letter matches exactly.
//!
//! Searches run line by line and poll the [`CancelToken`] between lines, so
//! a search through a long buffer stops promptly on C-g.
//!
//! # Search flow
//!
//! 1. A search command prompts for a pattern (the previous one is the
//!    default) and builds a [`Pattern`]
//! 2. [`search_forward`] / [`search_backward`] return the first [`Match`]
//!    past the cursor
//! 3. The pattern and direction are kept in a [`SearchState`] for repeats

use mg_term::CancelToken;
use regex::bytes::Regex;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::line::Pos;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Search direction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// The opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// What to look for.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal { bytes: Vec<u8>, fold: bool },
    Regex(Regex),
}

impl Pattern {
    /// A literal pattern; lower-case patterns ignore case.
    #[must_use]
    pub fn literal(pat: impl AsRef<[u8]>) -> Self {
        let bytes = pat.as_ref().to_vec();
        let fold = !bytes.iter().any(u8::is_ascii_uppercase);
        Self::Literal { bytes, fold }
    }

    /// A regular expression pattern. The expression itself must be UTF-8;
    /// it may still match any bytes.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if the expression does not compile.
    pub fn regex(pat: impl AsRef<[u8]>) -> Result<Self> {
        let text = std::str::from_utf8(pat.as_ref())
            .map_err(|_| Error::user("Bad regexp: not valid UTF-8"))?;
        Regex::new(text)
            .map(Self::Regex)
            .map_err(|e| Error::user(format!("Bad regexp: {e}")))
    }

    /// First match in `text` starting at or after `from`, as a byte range.
    fn find_in(&self, text: &[u8], from: usize) -> Option<(usize, usize)> {
        if from > text.len() {
            return None;
        }
        match self {
            Self::Literal { bytes, fold } => {
                let last = text.len().checked_sub(bytes.len())?;
                (from..=last)
                    .find(|&i| same(&text[i..i + bytes.len()], bytes, *fold))
                    .map(|i| (i, i + bytes.len()))
            }
            Self::Regex(re) => re.find_at(text, from).map(|m| (m.start(), m.end())),
        }
    }

    /// Last match in `text` starting before `before`.
    fn rfind_in(&self, text: &[u8], before: usize) -> Option<(usize, usize)> {
        match self {
            Self::Literal { bytes, fold } => {
                let last = text.len().checked_sub(bytes.len())?;
                (0..=last.min(before.checked_sub(1)?))
                    .rev()
                    .find(|&i| same(&text[i..i + bytes.len()], bytes, *fold))
                    .map(|i| (i, i + bytes.len()))
            }
            Self::Regex(re) => re
                .find_iter(text)
                .take_while(|m| m.start() < before)
                .last()
                .map(|m| (m.start(), m.end())),
        }
    }
}

fn same(a: &[u8], b: &[u8], fold: bool) -> bool {
    if fold {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

// ---------------------------------------------------------------------------
// Match / SearchState
// ---------------------------------------------------------------------------

/// A match: where it starts and where it ends, on the same line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub start: Pos,
    pub end: Pos,
}

impl Match {
    /// Length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end.offset == self.start.offset
    }
}

/// The last search, kept for repeating it.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub pattern: Vec<u8>,
    pub direction: Direction,
    pub regex: bool,
}

impl SearchState {
    /// Compile the remembered pattern.
    ///
    /// # Errors
    ///
    /// [`Error::User`] if there is no previous pattern or it does not
    /// compile.
    pub fn compile(&self) -> Result<Pattern> {
        if self.pattern.is_empty() {
            return Err(Error::user("No previous search"));
        }
        if self.regex {
            Pattern::regex(&self.pattern)
        } else {
            Ok(Pattern::literal(&self.pattern))
        }
    }
}

// ---------------------------------------------------------------------------
// Searching
// ---------------------------------------------------------------------------

/// First match at or after `from`. An empty match exactly at `from` is
/// skipped so repeated searches make progress.
///
/// # Errors
///
/// [`Error::Aborted`] if `cancel` is raised between lines.
pub fn search_forward(
    buf: &Buffer,
    from: Pos,
    pat: &Pattern,
    cancel: &CancelToken,
) -> Result<Option<Match>> {
    let mut line = from.line;
    let mut offset = from.offset;
    while !buf.is_header(line) {
        let text = buf.text(line);
        let mut found = pat.find_in(text, offset);
        if let Some((s, e)) = found {
            if s == e && line == from.line && s == from.offset {
                found = pat.find_in(text, offset + 1);
            }
        }
        if let Some((s, e)) = found {
            return Ok(Some(Match {
                start: Pos::new(line, s),
                end: Pos::new(line, e),
            }));
        }
        if cancel.is_set() {
            return Err(Error::Aborted);
        }
        line = buf.next(line);
        offset = 0;
    }
    Ok(None)
}

/// Last match starting before `from`.
///
/// # Errors
///
/// [`Error::Aborted`] if `cancel` is raised between lines.
pub fn search_backward(
    buf: &Buffer,
    from: Pos,
    pat: &Pattern,
    cancel: &CancelToken,
) -> Result<Option<Match>> {
    let mut line = from.line;
    let mut before = from.offset;
    while !buf.is_header(line) {
        let text = buf.text(line);
        if let Some((s, e)) = pat.rfind_in(text, before) {
            return Ok(Some(Match {
                start: Pos::new(line, s),
                end: Pos::new(line, e),
            }));
        }
        if cancel.is_set() {
            return Err(Error::Aborted);
        }
        line = buf.prev(line);
        before = buf.len_of(line) + 1;
    }
    Ok(None)
}

/// Search in `direction`.
///
/// # Errors
///
/// As for [`search_forward`].
pub fn search(
    buf: &Buffer,
    from: Pos,
    pat: &Pattern,
    direction: Direction,
    cancel: &CancelToken,
) -> Result<Option<Match>> {
    match direction {
        Direction::Forward => search_forward(buf, from, pat, cancel),
        Direction::Backward => search_backward(buf, from, pat, cancel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;

    fn registry_with(lines: &[&str]) -> Registry {
        let mut reg = Registry::new(24).unwrap();
        let bid = reg.current_buffer();
        reg.replace_text(bid, lines.iter().map(|s| s.as_bytes())).unwrap();
        reg
    }

    fn at(reg: &Registry, line: usize, offset: usize) -> Pos {
        Pos::new(reg.cur_buf().line_at(line), offset)
    }

    fn fwd(reg: &Registry, from: Pos, pat: &Pattern) -> Option<(usize, usize, usize)> {
        let b = reg.cur_buf();
        search_forward(b, from, pat, &CancelToken::new())
            .unwrap()
            .map(|m| (b.line_number(m.start.line).unwrap(), m.start.offset, m.end.offset))
    }

    fn back(reg: &Registry, from: Pos, pat: &Pattern) -> Option<(usize, usize, usize)> {
        let b = reg.cur_buf();
        search_backward(b, from, pat, &CancelToken::new())
            .unwrap()
            .map(|m| (b.line_number(m.start.line).unwrap(), m.start.offset, m.end.offset))
    }

    // ── Direction ───────────────────────────────────────────────────────

    #[test]
    fn direction_opposite() {
        assert_eq!(Direction::Forward.opposite(), Direction::Backward);
        assert_eq!(Direction::Backward.opposite(), Direction::Forward);
    }

    // ── Forward ─────────────────────────────────────────────────────────

    #[test]
    fn forward_finds_on_later_line() {
        let reg = registry_with(&["alpha", "beta gamma", "delta"]);
        let p = Pattern::literal("gamma");
        assert_eq!(fwd(&reg, at(&reg, 1, 0), &p), Some((2, 5, 10)));
    }

    #[test]
    fn forward_starts_at_cursor() {
        let reg = registry_with(&["abab"]);
        let p = Pattern::literal("ab");
        assert_eq!(fwd(&reg, at(&reg, 1, 0), &p), Some((1, 0, 2)));
        assert_eq!(fwd(&reg, at(&reg, 1, 1), &p), Some((1, 2, 4)));
        assert_eq!(fwd(&reg, at(&reg, 1, 3), &p), None);
    }

    #[test]
    fn lower_case_pattern_folds() {
        let reg = registry_with(&["Hello World"]);
        assert_eq!(fwd(&reg, at(&reg, 1, 0), &Pattern::literal("world")), Some((1, 6, 11)));
        assert_eq!(fwd(&reg, at(&reg, 1, 0), &Pattern::literal("WORLD")), None);
    }

    #[test]
    fn regex_matches_per_line() {
        let reg = registry_with(&["x = 10;", "y = 200;"]);
        let p = Pattern::regex(r"[0-9]{3}").unwrap();
        assert_eq!(fwd(&reg, at(&reg, 1, 0), &p), Some((2, 4, 7)));
        assert!(Pattern::regex("(").is_err());
    }

    #[test]
    fn empty_match_at_cursor_is_skipped() {
        let reg = registry_with(&["abc"]);
        let p = Pattern::regex("x*").unwrap();
        assert_eq!(fwd(&reg, at(&reg, 1, 1), &p), Some((1, 2, 2)));
    }

    // ── Backward ────────────────────────────────────────────────────────

    #[test]
    fn backward_finds_before_cursor() {
        let reg = registry_with(&["one two one", "three"]);
        let p = Pattern::literal("one");
        assert_eq!(back(&reg, at(&reg, 1, 11), &p), Some((1, 8, 11)));
        assert_eq!(back(&reg, at(&reg, 1, 8), &p), Some((1, 0, 3)));
        assert_eq!(back(&reg, at(&reg, 1, 0), &p), None);
        assert_eq!(back(&reg, at(&reg, 2, 2), &p), Some((1, 8, 11)));
    }

    #[test]
    fn backward_regex() {
        let reg = registry_with(&["a1 b2 c3"]);
        let p = Pattern::regex("[a-z][0-9]").unwrap();
        assert_eq!(back(&reg, at(&reg, 1, 6), &p), Some((1, 3, 5)));
    }

    // ── Cancellation ────────────────────────────────────────────────────

    #[test]
    fn cancel_stops_multi_line_search() {
        let reg = registry_with(&["a", "b", "c", "needle"]);
        let token = CancelToken::new();
        token.set();
        let b = reg.cur_buf();
        let r = search_forward(b, b.start(), &Pattern::literal("needle"), &token);
        assert_eq!(r, Err(Error::Aborted));
    }

    #[test]
    fn patterns_hold_raw_bytes() {
        let mut reg = Registry::new(24).unwrap();
        let bid = reg.current_buffer();
        reg.replace_text(bid, [&b"caf\xe9 \xc9"[..]]).unwrap();
        let p = Pattern::literal(b"\xe9");
        assert_eq!(fwd(&reg, at(&reg, 1, 0), &p), Some((1, 3, 4)));
        // Case folding is ASCII only.
        assert_eq!(fwd(&reg, at(&reg, 1, 4), &p), None);
        let re = Pattern::regex(r"(?-u)\xc9").unwrap();
        assert_eq!(fwd(&reg, at(&reg, 1, 0), &re), Some((1, 5, 6)));
        assert!(Pattern::regex(b"\xff").is_err());
    }

    #[test]
    fn state_requires_pattern() {
        let state = SearchState::default();
        assert_eq!(state.compile().unwrap_err(), Error::user("No previous search"));
    }
}
