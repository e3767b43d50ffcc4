//! Editor options and the `set` command.
//!
//! Provides parsed `set` directives, option name validation and the
//! [`Options`] value table the rest of the kernel reads.
//!
//! # Supported syntax
//!
//! | Syntax           | Effect                        |
//! |------------------|-------------------------------|
//! | `set option`     | Enable boolean / show numeric |
//! | `set nooption`   | Disable boolean               |
//! | `set option!`    | Toggle boolean                |
//! | `set option?`    | Query current value           |
//! | `set option=N`   | Assign numeric value          |
//! | `set`            | Show changed options          |
//! | `set all`        | Show all options              |
//!
//! # Option names
//!
//! | Full name             | Abbrev | Type    | Default |
//! |-----------------------|--------|---------|---------|
//! | `tab-width`           | `tw`   | integer | 8       |
//! | `visible-bell`        | `vb`   | bool    | false   |
//! | `undo`                | `ud`   | bool    | true    |
//! | `line-number`         | `lnu`  | bool    | true    |
//! | `insert-delete-lines` | `idl`  | bool    | true    |
//! | `undo-pool`           | `up`   | integer | 32      |

use crate::error::{Error, Result};
use crate::undo::DEFAULT_POOL;

/// What one word of a `set` line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetDirective {
    On(String),
    Off(String),
    Toggle(String),
    Query(String),
    Assign(String, String),
    /// Bare `set`.
    ShowChanged,
    /// `set all`.
    ShowAll,
}

impl SetDirective {
    /// Classify one word. Names are not checked here except to decide
    /// whether a leading `no` negates a boolean; `apply` reports unknown
    /// names.
    #[must_use]
    pub fn parse(word: &str) -> Self {
        if word == "all" {
            return Self::ShowAll;
        }
        if let Some((name, value)) = word.split_once('=') {
            return Self::Assign(name.into(), value.into());
        }
        match word.as_bytes().last() {
            Some(b'?') => return Self::Query(word[..word.len() - 1].into()),
            Some(b'!') => return Self::Toggle(word[..word.len() - 1].into()),
            _ => {}
        }
        match Opt::from_name(word) {
            Some(opt) if !opt.is_bool() => Self::Query(word.into()),
            Some(_) => Self::On(word.into()),
            None => match word.strip_prefix("no") {
                Some(rest) if Opt::from_name(rest).is_some_and(Opt::is_bool) => {
                    Self::Off(rest.into())
                }
                _ => Self::On(word.into()),
            },
        }
    }
}

/// One known option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opt {
    TabWidth,
    VisibleBell,
    Undo,
    LineNumber,
    InsertDeleteLines,
    UndoPool,
}

impl Opt {
    pub const ALL: [Self; 6] = [
        Self::TabWidth,
        Self::VisibleBell,
        Self::Undo,
        Self::LineNumber,
        Self::InsertDeleteLines,
        Self::UndoPool,
    ];

    /// Option for a full name or abbreviation.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|o| o.name() == name || o.abbrev() == name)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TabWidth => "tab-width",
            Self::VisibleBell => "visible-bell",
            Self::Undo => "undo",
            Self::LineNumber => "line-number",
            Self::InsertDeleteLines => "insert-delete-lines",
            Self::UndoPool => "undo-pool",
        }
    }

    #[must_use]
    pub const fn abbrev(self) -> &'static str {
        match self {
            Self::TabWidth => "tw",
            Self::VisibleBell => "vb",
            Self::Undo => "ud",
            Self::LineNumber => "lnu",
            Self::InsertDeleteLines => "idl",
            Self::UndoPool => "up",
        }
    }

    #[must_use]
    pub const fn is_bool(self) -> bool {
        !matches!(self, Self::TabWidth | Self::UndoPool)
    }
}

/// Directives for a whole `set` line; an empty line shows what changed.
#[must_use]
pub fn parse_set(line: &str) -> Vec<SetDirective> {
    let words: Vec<_> = line.split_whitespace().map(SetDirective::parse).collect();
    if words.is_empty() {
        vec![SetDirective::ShowChanged]
    } else {
        words
    }
}

fn flag(name: &str, on: bool) -> String {
    if on { name.to_string() } else { format!("no{name}") }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// Current option values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub tab_width: usize,
    pub visible_bell: bool,
    pub undo: bool,
    pub line_number: bool,
    pub insert_delete_lines: bool,
    pub undo_pool: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tab_width: 8,
            visible_bell: false,
            undo: true,
            line_number: true,
            insert_delete_lines: true,
            undo_pool: DEFAULT_POOL,
        }
    }
}

impl Options {
    fn bool_mut(&mut self, opt: Opt) -> Option<&mut bool> {
        match opt {
            Opt::VisibleBell => Some(&mut self.visible_bell),
            Opt::Undo => Some(&mut self.undo),
            Opt::LineNumber => Some(&mut self.line_number),
            Opt::InsertDeleteLines => Some(&mut self.insert_delete_lines),
            Opt::TabWidth | Opt::UndoPool => None,
        }
    }

    /// Display form of one option: `name`, `noname` or `name=N`.
    #[must_use]
    pub fn show(&self, opt: Opt) -> String {
        let name = opt.name();
        match opt {
            Opt::TabWidth => format!("{name}={}", self.tab_width),
            Opt::UndoPool => format!("{name}={}", self.undo_pool),
            Opt::VisibleBell => flag(name, self.visible_bell),
            Opt::Undo => flag(name, self.undo),
            Opt::LineNumber => flag(name, self.line_number),
            Opt::InsertDeleteLines => flag(name, self.insert_delete_lines),
        }
    }

    /// Options whose value differs from the default.
    #[must_use]
    pub fn changed(&self) -> Vec<Opt> {
        let defaults = Self::default();
        Opt::ALL
            .into_iter()
            .filter(|&o| self.show(o) != defaults.show(o))
            .collect()
    }

    /// Apply one directive. Returns the text to show, if any.
    ///
    /// # Errors
    ///
    /// [`Error::User`] for unknown options, type mismatches and values out
    /// of range; the options are unchanged.
    pub fn apply(&mut self, directive: &SetDirective) -> Result<Option<String>> {
        let lookup = |name: &str| {
            Opt::from_name(name).ok_or_else(|| Error::user(format!("Unknown option: {name}")))
        };
        let not_bool = |o: Opt| Error::user(format!("Not a boolean option: {}", o.name()));

        match directive {
            SetDirective::ShowAll => Ok(Some(self.list(&Opt::ALL))),
            SetDirective::ShowChanged => Ok(Some(self.list(&self.changed()))),
            SetDirective::Query(name) => Ok(Some(self.show(lookup(name)?))),
            SetDirective::On(name) | SetDirective::Off(name) | SetDirective::Toggle(name) => {
                let opt = lookup(name)?;
                let slot = self.bool_mut(opt).ok_or_else(|| not_bool(opt))?;
                *slot = match directive {
                    SetDirective::On(_) => true,
                    SetDirective::Off(_) => false,
                    _ => !*slot,
                };
                Ok(None)
            }
            SetDirective::Assign(name, value) => {
                let opt = lookup(name)?;
                let n: usize = value
                    .parse()
                    .map_err(|_| Error::user(format!("Bad value for {}: {value}", opt.name())))?;
                match opt {
                    Opt::TabWidth if (1..=32).contains(&n) => self.tab_width = n,
                    Opt::TabWidth => {
                        return Err(Error::user("tab-width must be between 1 and 32"));
                    }
                    Opt::UndoPool => self.undo_pool = n,
                    _ => {
                        let slot = self.bool_mut(opt).ok_or_else(|| not_bool(opt))?;
                        *slot = n != 0;
                    }
                }
                Ok(None)
            }
        }
    }

    fn list(&self, opts: &[Opt]) -> String {
        opts.iter()
            .map(|&o| self.show(o))
            .collect::<Vec<_>>()
            .join("  ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(o: &mut Options, word: &str) -> Result<Option<String>> {
        o.apply(&SetDirective::parse(word))
    }

    // ── Parsing ─────────────────────────────────────────────────────────

    #[test]
    fn words_classify_by_suffix_and_prefix() {
        use SetDirective::{Assign, Off, On, Query, Toggle};
        let cases = [
            ("vb", On("vb".into())),
            ("noline-number", Off("line-number".into())),
            ("noidl", Off("idl".into())),
            ("vb!", Toggle("vb".into())),
            ("lnu?", Query("lnu".into())),
            ("tab-width=4", Assign("tab-width".into(), "4".into())),
            ("up", Query("up".into())),
            ("nosuch", On("nosuch".into())),
            ("notw", On("notw".into())),
        ];
        for (word, want) in cases {
            assert_eq!(SetDirective::parse(word), want, "{word}");
        }
    }

    #[test]
    fn whole_lines() {
        assert_eq!(parse_set("  "), vec![SetDirective::ShowChanged]);
        assert_eq!(parse_set("all"), vec![SetDirective::ShowAll]);
        assert_eq!(
            parse_set("vb tw=2"),
            vec![
                SetDirective::On("vb".into()),
                SetDirective::Assign("tw".into(), "2".into())
            ]
        );
    }

    #[test]
    fn every_option_answers_to_both_names() {
        for opt in Opt::ALL {
            assert_eq!(Opt::from_name(opt.name()), Some(opt));
            assert_eq!(Opt::from_name(opt.abbrev()), Some(opt));
        }
        assert_eq!(Opt::from_name("mber"), None);
    }

    // ── Applying ────────────────────────────────────────────────────────

    #[test]
    fn booleans_switch_and_toggle() {
        let mut o = Options::default();
        set(&mut o, "vb").unwrap();
        set(&mut o, "noundo").unwrap();
        set(&mut o, "idl!").unwrap();
        assert!(o.visible_bell);
        assert!(!o.undo);
        assert!(!o.insert_delete_lines);
        set(&mut o, "lnu=0").unwrap();
        assert!(!o.line_number);
    }

    #[test]
    fn bad_numbers_leave_value_alone() {
        let mut o = Options::default();
        set(&mut o, "tw=4").unwrap();
        assert!(set(&mut o, "tw=0").is_err());
        assert!(set(&mut o, "tw=33").is_err());
        assert!(set(&mut o, "tw=four").is_err());
        assert_eq!(o.tab_width, 4);
        set(&mut o, "up=5").unwrap();
        assert_eq!(o.undo_pool, 5);
    }

    #[test]
    fn type_mismatch_and_unknown_names() {
        let mut o = Options::default();
        assert_eq!(
            set(&mut o, "tw!"),
            Err(Error::user("Not a boolean option: tab-width"))
        );
        assert_eq!(
            set(&mut o, "foobar"),
            Err(Error::user("Unknown option: foobar"))
        );
        assert_eq!(o, Options::default());
    }

    #[test]
    fn listing_shows_changes_only() {
        let mut o = Options::default();
        assert_eq!(o.apply(&SetDirective::ShowChanged).unwrap(), Some(String::new()));
        set(&mut o, "vb").unwrap();
        set(&mut o, "tw=4").unwrap();
        assert_eq!(
            o.apply(&SetDirective::ShowChanged).unwrap(),
            Some("tab-width=4  visible-bell".to_string())
        );
        assert_eq!(set(&mut o, "ud?").unwrap(), Some("undo".to_string()));
        set(&mut o, "noundo").unwrap();
        assert_eq!(set(&mut o, "ud?").unwrap(), Some("noundo".to_string()));
    }
}
