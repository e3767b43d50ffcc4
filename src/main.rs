// SPDX-License-Identifier: MIT
//
// mg: a small Emacs-style terminal editor.
//
// This binary wires the two crates together:
//
//   mg-term → raw terminal, key decoding, ANSI output
//   mg-core → buffers, windows, redisplay, keymaps, commands, undo
//
// Startup order: parse arguments, install the log file (if any), open the
// terminal, run the startup file, visit the files named on the command
// line, run the `-f` command, then hand control to the editor loop.
// Errors that happen before the terminal is open go to stderr; after
// that they land on the echo line like any other command failure.

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use log::LevelFilter;
use mg_core::{Arg, Editor};
use mg_term::AnsiTty;

// ─── Command line ───────────────────────────────────────────────────────────

const USAGE: &str = "usage: mg [-n] [-u file] [-f command] [--log file] [-v] [+line] [file ...]";

/// A file to visit, with the line to start on.
#[derive(Debug, PartialEq, Eq)]
struct Visit {
    path: PathBuf,
    line: Option<i32>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    /// Skip the startup file.
    no_startup: bool,
    /// Startup file given with `-u`.
    startup: Option<PathBuf>,
    /// Command run after the files are visited.
    command: Option<String>,
    log_file: Option<PathBuf>,
    verbose: u8,
    files: Vec<Visit>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut args = args.into_iter();
    let mut line = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-n" => opts.no_startup = true,
            "-u" => opts.startup = Some(args.next().ok_or("-u needs a file")?.into()),
            "-f" => opts.command = Some(args.next().ok_or("-f needs a command")?),
            "--log" => opts.log_file = Some(args.next().ok_or("--log needs a file")?.into()),
            "--" => {
                for rest in args.by_ref() {
                    opts.files.push(Visit {
                        path: rest.into(),
                        line: line.take(),
                    });
                }
            }
            s if s.starts_with("-v") && s[1..].bytes().all(|b| b == b'v') => {
                opts.verbose = opts.verbose.saturating_add(u8::try_from(s.len() - 1).unwrap_or(u8::MAX));
            }
            s if s.starts_with('+') => {
                let n = s[1..].parse().map_err(|_| format!("bad line number: {s}"))?;
                line = Some(n);
            }
            s if s.starts_with('-') && s.len() > 1 => return Err(format!("unknown option: {s}")),
            _ => opts.files.push(Visit {
                path: arg.into(),
                line: line.take(),
            }),
        }
    }
    Ok(opts)
}

// ─── Logging ────────────────────────────────────────────────────────────────

/// Send log records to `path`. Nothing is logged without a file: the
/// terminal belongs to the editor.
fn init_logging(path: &Path, verbose: u8) -> Result<(), fern::InitError> {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {}: {}",
                record.level(),
                record.target(),
                message
            ));
        })
        .level(level)
        .chain(fern::log_file(path)?)
        .apply()?;
    Ok(())
}

// ─── Startup ────────────────────────────────────────────────────────────────

/// The startup file: `-u`, else `$MGINIT`, else `~/.mg` if it exists.
fn startup_file(opts: &Options) -> Option<PathBuf> {
    if opts.no_startup {
        return None;
    }
    if let Some(path) = &opts.startup {
        return Some(path.clone());
    }
    if let Some(path) = env::var_os("MGINIT") {
        return Some(PathBuf::from(path));
    }
    let home = env::var_os("HOME")?;
    let path = Path::new(&home).join(".mg");
    path.exists().then_some(path)
}

fn start(ed: &mut Editor, opts: &Options) {
    if let Some(path) = startup_file(opts) {
        if let Err(e) = ed.load(&path) {
            ed.report(e);
        }
    }

    let goto = ed.lookup_function("goto-line");
    for visit in &opts.files {
        if let Err(e) = ed.visit_file(&visit.path) {
            ed.report(e);
            continue;
        }
        if let (Some(n), Some(id)) = (visit.line, goto) {
            ed.execute(id, Arg::count(n));
        }
    }

    if let Some(cmd) = &opts.command {
        ed.execute_command_line(cmd);
    }
}

fn run(opts: &Options) -> Result<(), String> {
    let tty = AnsiTty::open().map_err(|e| format!("failed to initialize terminal: {e}"))?;
    let mut ed = Editor::new(Box::new(tty)).map_err(|e| e.to_string())?;
    start(&mut ed, opts);
    ed.run().map_err(|e| e.to_string())?;
    log::info!("exiting");
    Ok(())
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() {
    let opts = parse_args(env::args().skip(1)).unwrap_or_else(|e| {
        eprintln!("mg: {e}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let log_file = opts
        .log_file
        .clone()
        .or_else(|| env::var_os("MG_LOG").map(PathBuf::from));
    if let Some(path) = log_file {
        if let Err(e) = init_logging(&path, opts.verbose) {
            eprintln!("mg: {}: {e}", path.display());
            process::exit(1);
        }
    }
    log::info!("mg {} starting", env!("CARGO_PKG_VERSION"));

    // The editor owns the terminal; it is restored before this prints.
    if let Err(e) = run(&opts) {
        eprintln!("mg: {e}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
