//! Keyboard macro commands.

use crate::command::Arg;
use crate::editor::Editor;
use crate::error::{Error, Result};

pub fn start(ed: &mut Editor, _arg: Arg) -> Result<()> {
    ed.start_recording()?;
    ed.message("Defining kbd macro...");
    Ok(())
}

pub fn end(ed: &mut Editor, _arg: Arg) -> Result<()> {
    let n = ed.end_recording()?;
    log::debug!("kbd macro defined: {n} keys");
    ed.message("Keyboard macro defined");
    Ok(())
}

/// Replay the last macro `n` times. Refused while a macro is being
/// defined or replayed; the refused keys are not recorded.
pub fn call(ed: &mut Editor, arg: Arg) -> Result<()> {
    if ed.is_recording() || ed.is_replaying() {
        ed.unrecord_this();
        return Err(Error::user("Not now"));
    }
    if ed.last_macro.is_empty() {
        return Err(Error::user("No kbd macro defined"));
    }
    let keys = ed.last_macro.clone();
    ed.replay(&keys, arg.times())
}

#[cfg(test)]
mod tests {
    use crate::editor::tests::{editor, text};
    use crate::error::Status;
    use mg_term::Key;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_and_replay() {
        let (mut ed, tty) = editor(10, 40);
        tty.push_keys(&mg_term::key::parse("C-x ( a b C-x ) C-x e C-u 2 C-x e").unwrap());
        ed.run().unwrap();
        assert_eq!(text(&ed), "abababab");
        assert_eq!(ed.last_macro, vec![Key::byte(b'a'), Key::byte(b'b')]);
    }

    #[test]
    fn macro_cannot_call_itself() {
        let (mut ed, tty) = editor(10, 40);
        tty.push_keys(&mg_term::key::parse("C-x ( a C-x e C-x ) C-x e").unwrap());
        ed.run().unwrap();
        assert_eq!(ed.last_macro, vec![Key::byte(b'a')]);
        assert_eq!(text(&ed), "aa");
    }

    #[test]
    fn replay_refuses_to_nest() {
        let (mut ed, _) = editor(10, 40);
        ed.last_macro = mg_term::key::parse("b C-x e").unwrap();
        assert_eq!(ed.execute_command_line("call-last-kbd-macro"), Status::Fail);
        assert_eq!(ed.echo.current(), b"Not now");
        assert_eq!(text(&ed), "b");
        assert!(!ed.is_replaying());
    }

    #[test]
    fn calling_without_macro_fails() {
        let (mut ed, _) = editor(10, 40);
        assert_eq!(ed.execute_command_line("call-last-kbd-macro"), Status::Fail);
        assert_eq!(ed.echo.current(), b"No kbd macro defined");
        assert_eq!(ed.execute_command_line("end-kbd-macro"), Status::Fail);
        assert_eq!(ed.echo.current(), b"Not defining kbd macro");
    }

    #[test]
    fn replay_stops_at_first_failure() {
        let (mut ed, tty) = editor(10, 40);
        tty.push_keys(&mg_term::key::parse("x C-x ( C-f C-x )").unwrap());
        ed.run().unwrap();
        // C-f at the end of the buffer fails while recording; the macro
        // still holds it.
        assert_eq!(ed.last_macro, vec![Key::ctrl(b'f')]);
        assert_eq!(ed.execute_command_line("3 call-last-kbd-macro"), Status::Fail);
        assert_eq!(ed.echo.current(), b"End of buffer");
    }
}
