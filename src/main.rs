//! vibegraph CLI - structural code-intelligence engine
//!
//! Usage: vibegraph <command> [arguments]

mod cli;

use anyhow::Result;
use std::process::ExitCode;
use std::sync::Arc;

use cli::{parse_args, print_usage, Command};
use vibegraph::events::ChangeNotifier;
use vibegraph::graph::GraphStore;
use vibegraph::indexer::{default_db_path, run_indexer, Indexer};
use vibegraph::mcp::McpServer;
use vibegraph::watcher::WatcherConfig;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "--help" || args[0] == "-h" {
        print_usage();
        return ExitCode::FAILURE;
    }

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Index {
            root,
            db_path,
            exclude_patterns,
        } => {
            let db_path = match db_path {
                Some(path) => path,
                None => default_db_path(&root)?,
            };
            let store = Arc::new(GraphStore::open(&db_path)?);
            let notifier = Arc::new(ChangeNotifier::new());
            let mut indexer =
                Indexer::new(&root, store, notifier)?.with_excludes(exclude_patterns);
            let report = indexer.reindex_all()?;
            println!(
                "Indexed {} files: {} nodes, {} edges ({} diagnostics)",
                report.files_indexed,
                report.nodes,
                report.edges,
                report.diagnostics.len()
            );
            for diagnostic in &report.diagnostics {
                tracing::warn!(path = %diagnostic.path, "{}", diagnostic.message);
            }
            Ok(())
        }
        Command::Watch {
            root,
            db_path,
            debounce_ms,
        } => {
            let db_path = match db_path {
                Some(path) => path,
                None => default_db_path(&root)?,
            };
            // Baseline scan first, then block on the watch loop
            let store = Arc::new(GraphStore::open(&db_path)?);
            let notifier = Arc::new(ChangeNotifier::new());
            let mut indexer = Indexer::new(&root, store, notifier)?;
            indexer.reindex_all()?;
            drop(indexer);

            run_indexer(root, db_path, WatcherConfig { debounce_ms })
        }
        Command::Serve { root } => {
            let server = McpServer::new(&root)?;
            server.run()?;
            Ok(())
        }
    }
}
