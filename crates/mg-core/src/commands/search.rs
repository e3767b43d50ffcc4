//! Search and replace commands.
//!
//! Searches prompt for a pattern, offering the previous one as the default
//! (an empty reply repeats it). A forward search leaves the cursor after
//! the match, a backward search at its start. Searches do not wrap.

use crate::command::Arg;
use crate::editor::{Complete, Editor};
use crate::error::{Error, Result};
use crate::search::{self as find, Direction, SearchState};

/// Pattern text for the echo line.
fn shown(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

// ---------------------------------------------------------------------------
// Searching
// ---------------------------------------------------------------------------

/// Prompt for a pattern and remember it with `direction`.
fn read_pattern(ed: &mut Editor, label: &str, direction: Direction, regex: bool) -> Result<()> {
    let prompt = if ed.search.pattern.is_empty() {
        format!("{label}: ")
    } else {
        format!("{label} [{}]: ", shown(&ed.search.pattern))
    };
    let reply = ed.prompt_bytes(&prompt, Complete::Nothing)?;
    if !reply.is_empty() {
        ed.search.pattern = reply;
    }
    ed.search.direction = direction;
    ed.search.regex = regex;
    Ok(())
}

fn run_search(ed: &mut Editor, label: &str, direction: Direction, regex: bool) -> Result<()> {
    read_pattern(ed, label, direction, regex)?;
    let pat = ed.search.compile()?;
    let dot = ed.reg.cur().dot;
    let found = find::search(ed.reg.cur_buf(), dot, &pat, direction, ed.cancel_token())?;
    let m = found.ok_or_else(|| {
        Error::user(format!("Search failed: \"{}\"", shown(&ed.search.pattern)))
    })?;
    ed.reg.set_dot(match direction {
        Direction::Forward => m.end,
        Direction::Backward => m.start,
    });
    Ok(())
}

pub fn search_forward(ed: &mut Editor, _arg: Arg) -> Result<()> {
    run_search(ed, "Search", Direction::Forward, false)
}

pub fn search_backward(ed: &mut Editor, _arg: Arg) -> Result<()> {
    run_search(ed, "Reverse search", Direction::Backward, false)
}

pub fn re_search_forward(ed: &mut Editor, _arg: Arg) -> Result<()> {
    run_search(ed, "RE Search", Direction::Forward, true)
}

pub fn re_search_backward(ed: &mut Editor, _arg: Arg) -> Result<()> {
    run_search(ed, "RE Reverse search", Direction::Backward, true)
}

// ---------------------------------------------------------------------------
// Replacing
// ---------------------------------------------------------------------------

/// Answer to a query-replace question.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Reply {
    Replace,
    Skip,
    /// Replace this and every later match without asking.
    All,
    /// Replace this one and stop.
    Last,
    Quit,
}

fn ask(ed: &mut Editor, question: &str) -> Result<Reply> {
    loop {
        ed.message(question);
        ed.refresh();
        match ed.get_key()?.as_byte() {
            Some(b'y' | b' ') => return Ok(Reply::Replace),
            Some(b'n' | 0x7f) => return Ok(Reply::Skip),
            Some(b'!') => return Ok(Reply::All),
            Some(b'.') => return Ok(Reply::Last),
            Some(b'q' | b'\r' | 0x1b) => return Ok(Reply::Quit),
            Some(0x07) => return Err(Error::Aborted),
            _ => ed.beep(),
        }
    }
}

/// Read the text to replace and its replacement.
fn read_replacement(ed: &mut Editor, label: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let from = ed.prompt_bytes(&format!("{label}: "), Complete::Nothing)?;
    if from.is_empty() {
        return Err(Error::user("Nothing to replace"));
    }
    let to = ed.prompt_bytes(&format!("{label} {} with: ", shown(&from)), Complete::Nothing)?;
    ed.search = SearchState {
        pattern: from.clone(),
        direction: Direction::Forward,
        regex: false,
    };
    Ok((from, to))
}

/// Replace matches of `from` after the cursor, asking about each one when
/// `query` is set. Case is carried over from the matched text when neither
/// string has capitals. Returns the number of replacements.
fn replace_matches(ed: &mut Editor, from: &[u8], to: &[u8], mut query: bool) -> Result<usize> {
    let pat = find::Pattern::literal(from);
    let case_adjust = !from.iter().chain(to).any(u8::is_ascii_uppercase);
    let question = format!("Query replacing {} with {}:", shown(from), shown(to));
    let bid = ed.reg.current_buffer();
    let mut at = ed.reg.cur().dot;
    let mut count = 0;

    loop {
        ed.check_cancel()?;
        let found = find::search_forward(ed.reg.cur_buf(), at, &pat, ed.cancel_token())?;
        let Some(m) = found else {
            break;
        };
        ed.reg.set_dot(m.end);
        let reply = if query { ask(ed, &question)? } else { Reply::Replace };
        match reply {
            Reply::Quit => break,
            Reply::Skip => {
                at = m.end;
                continue;
            }
            Reply::All => query = false,
            Reply::Replace | Reply::Last => {}
        }
        let end = ed.reg.replace(bid, m.start, m.len(), to, case_adjust)?;
        ed.reg.cur_mut().dot = end;
        at = end;
        count += 1;
        if reply == Reply::Last {
            break;
        }
    }
    log::debug!("replaced {count} of {:?}", shown(from));
    ed.message(&format!("Replaced {count} occurrence{}", plural(count)));
    Ok(count)
}

pub fn query_replace(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let (from, to) = read_replacement(ed, "Query replace")?;
    replace_matches(ed, &from, &to, true)?;
    Ok(())
}

pub fn replace_string(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let (from, to) = read_replacement(ed, "Replace string")?;
    replace_matches(ed, &from, &to, false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::editor::tests::{dot, editor, fill, keys, text};
    use crate::error::Status;
    use pretty_assertions::assert_eq;

    fn queue(ed: &mut crate::editor::Editor, spec: &str) {
        ed.push_input(&mg_term::key::parse(spec).unwrap());
    }

    // ── Searching ───────────────────────────────────────────────────────

    #[test]
    fn search_forward_repeats_previous_pattern() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["alpha beta", "gamma beta"]);
        assert_eq!(ed.execute_command_line("search-forward beta"), Status::Continue);
        assert_eq!(dot(&ed), (1, 10));
        ed.execute_command_line(r#"search-forward """#);
        assert_eq!(dot(&ed), (2, 10));
        assert_eq!(ed.execute_command_line(r#"search-forward """#), Status::Fail);
        assert_eq!(ed.echo.current(), b"Search failed: \"beta\"");
        assert_eq!(dot(&ed), (2, 10));
    }

    #[test]
    fn search_backward_lands_on_match_start() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["alpha beta", "gamma beta"]);
        keys(&mut ed, "M->");
        ed.execute_command_line("search-backward alpha");
        assert_eq!(dot(&ed), (1, 0));
    }

    #[test]
    fn regex_search() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["x 12 y 345"]);
        ed.execute_command_line(r#"re-search-forward "[0-9]+""#);
        assert_eq!(dot(&ed), (1, 4));
        ed.execute_command_line(r#"re-search-forward """#);
        assert_eq!(dot(&ed), (1, 10));
        assert_eq!(ed.execute_command_line(r#"re-search-forward "(""#), Status::Fail);
    }

    // ── Replacing ───────────────────────────────────────────────────────

    #[test]
    fn replace_string_adjusts_case() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["foo Foo FOO food"]);
        assert_eq!(ed.execute_command_line("replace-string foo bar"), Status::Continue);
        assert_eq!(text(&ed), "bar Bar BAR bard");
        assert_eq!(ed.echo.current(), b"Replaced 4 occurrences");
        keys(&mut ed, "C-_");
        assert_eq!(text(&ed), "foo Foo FOO food");
    }

    #[test]
    fn capitals_in_pattern_match_exactly() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["foo Foo"]);
        ed.execute_command_line("replace-string Foo x");
        assert_eq!(text(&ed), "foo x");
        assert_eq!(ed.echo.current(), b"Replaced 1 occurrence");
    }

    #[test]
    fn query_replace_answers() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["a a a a"]);
        queue(&mut ed, "y n !");
        assert_eq!(ed.execute_command_line("query-replace a b"), Status::Continue);
        assert_eq!(text(&ed), "b a b b");
        assert_eq!(ed.echo.current(), b"Replaced 3 occurrences");
    }

    #[test]
    fn query_replace_dot_and_quit() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["a a a"]);
        queue(&mut ed, "n .");
        ed.execute_command_line("query-replace a b");
        assert_eq!(text(&ed), "a b a");
        assert_eq!(dot(&ed), (1, 3));

        fill(&mut ed, &["a a a"]);
        queue(&mut ed, "y q");
        ed.execute_command_line("query-replace a c");
        assert_eq!(text(&ed), "c a a");
    }

    #[test]
    fn query_replace_abort_keeps_earlier_replacements() {
        let (mut ed, _) = editor(10, 40);
        fill(&mut ed, &["a a"]);
        queue(&mut ed, "y C-g");
        assert_eq!(ed.execute_command_line("query-replace a b"), Status::AbortScript);
        assert_eq!(text(&ed), "b a");
    }

    #[test]
    fn bad_answer_beeps_and_asks_again() {
        let (mut ed, tty) = editor(10, 40);
        fill(&mut ed, &["a"]);
        queue(&mut ed, "x y");
        ed.execute_command_line("query-replace a b");
        assert_eq!(text(&ed), "b");
        assert_eq!(tty.stats().beeps, 1);
    }
}
