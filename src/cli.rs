//! CLI argument parsing.
//!
//! Defines the Command enum and parse_args() for the three entry points:
//! index, watch, serve.

use anyhow::Result;
use std::path::PathBuf;

pub fn print_usage() {
    eprintln!("vibegraph - structural code-intelligence engine");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  vibegraph index <DIR> [--db <FILE>] [--exclude <GLOB>]...");
    eprintln!("  vibegraph watch --root <DIR> [--db <FILE>] [--debounce-ms <N>]");
    eprintln!("  vibegraph serve [--root <DIR>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  index    Re-index a directory into the project graph");
    eprintln!("  watch    Watch a directory and re-index on changes");
    eprintln!("  serve    Run the stdio tool server");
    eprintln!();
    eprintln!("Index arguments:");
    eprintln!("  <DIR>               Directory to index");
    eprintln!("  --db <FILE>         Database path (default: <DIR>/vibegraph_context/vibegraph.db)");
    eprintln!("  --exclude <GLOB>    Extra exclude pattern (repeatable)");
    eprintln!();
    eprintln!("Watch arguments:");
    eprintln!("  --root <DIR>        Directory to watch recursively");
    eprintln!("  --db <FILE>         Database path (default: <DIR>/vibegraph_context/vibegraph.db)");
    eprintln!("  --debounce-ms <N>   Debounce window in milliseconds (default: 250)");
    eprintln!();
    eprintln!("Serve arguments:");
    eprintln!("  --root <DIR>        Project root (default: current directory)");
}

#[derive(Debug)]
pub enum Command {
    Index {
        root: PathBuf,
        db_path: Option<PathBuf>,
        exclude_patterns: Vec<String>,
    },
    Watch {
        root: PathBuf,
        db_path: Option<PathBuf>,
        debounce_ms: u64,
    },
    Serve {
        root: PathBuf,
    },
}

pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        anyhow::bail!("missing command");
    };

    match command.as_str() {
        "index" => {
            let mut root = None;
            let mut db_path = None;
            let mut exclude_patterns = Vec::new();
            let mut it = args[1..].iter();
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--db" => {
                        db_path = Some(PathBuf::from(expect_value(&mut it, "--db")?));
                    }
                    "--exclude" => {
                        exclude_patterns.push(expect_value(&mut it, "--exclude")?);
                    }
                    other if !other.starts_with("--") && root.is_none() => {
                        root = Some(PathBuf::from(other));
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }
            let root = root.ok_or_else(|| anyhow::anyhow!("index requires a directory"))?;
            Ok(Command::Index {
                root,
                db_path,
                exclude_patterns,
            })
        }
        "watch" => {
            let mut root = None;
            let mut db_path = None;
            let mut debounce_ms = 250;
            let mut it = args[1..].iter();
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--root" => root = Some(PathBuf::from(expect_value(&mut it, "--root")?)),
                    "--db" => db_path = Some(PathBuf::from(expect_value(&mut it, "--db")?)),
                    "--debounce-ms" => {
                        debounce_ms = expect_value(&mut it, "--debounce-ms")?
                            .parse()
                            .map_err(|_| anyhow::anyhow!("--debounce-ms expects a number"))?;
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }
            let root = root.ok_or_else(|| anyhow::anyhow!("watch requires --root"))?;
            Ok(Command::Watch {
                root,
                db_path,
                debounce_ms,
            })
        }
        "serve" => {
            let mut root = PathBuf::from(".");
            let mut it = args[1..].iter();
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--root" => root = PathBuf::from(expect_value(&mut it, "--root")?),
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }
            Ok(Command::Serve { root })
        }
        other => anyhow::bail!("unknown command: {other}"),
    }
}

fn expect_value(it: &mut std::slice::Iter<'_, String>, flag: &str) -> Result<String> {
    it.next()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("{flag} expects a value"))
}
