//! Window commands.

use crate::command::Arg;
use crate::editor::Editor;
use crate::error::{Error, Result};

pub fn split(ed: &mut Editor, _arg: Arg) -> Result<()> {
    ed.reg.split_window()?;
    Ok(())
}

pub fn delete(ed: &mut Editor, _arg: Arg) -> Result<()> {
    if ed.reg.windows().len() == 1 {
        return Err(Error::user("Only one window"));
    }
    let cur = ed.reg.current_window();
    ed.reg.delete_window(cur)
}

pub fn delete_others(ed: &mut Editor, _arg: Arg) -> Result<()> {
    ed.reg.delete_other_windows();
    Ok(())
}

/// Select the `n`th next window (previous for negative `n`).
pub fn other(ed: &mut Editor, arg: Arg) -> Result<()> {
    for _ in 0..arg.n.unsigned_abs() {
        if arg.n > 0 {
            ed.reg.next_window();
        } else {
            ed.reg.previous_window();
        }
    }
    Ok(())
}

pub fn previous(ed: &mut Editor, arg: Arg) -> Result<()> {
    other(
        ed,
        Arg {
            n: arg.n.saturating_neg(),
            given: arg.given,
        },
    )
}

pub fn enlarge(ed: &mut Editor, arg: Arg) -> Result<()> {
    ed.reg.enlarge_window(arg.n)
}

pub fn shrink(ed: &mut Editor, arg: Arg) -> Result<()> {
    ed.reg.shrink_window(arg.n)
}

/// Without an argument, center the cursor line and redraw the whole
/// screen. With one, put the cursor line on that window row (counting from
/// the bottom when negative).
pub fn recenter(ed: &mut Editor, arg: Arg) -> Result<()> {
    if arg.given {
        ed.reg.recenter(arg.n);
    } else {
        ed.reg.recenter(0);
        ed.display.garbage();
    }
    Ok(())
}
