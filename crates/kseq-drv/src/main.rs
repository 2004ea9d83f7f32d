//! kseqc - Compile compose files and inspect the result.
//!
//! The compiler driver: resolves a compose file (explicit path, or the
//! `XCOMPOSEFILE`/locale lookup), compiles it, reports every diagnostic to
//! stderr, and optionally dumps the compiled sequences back out in
//! compose-file syntax.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kseq_par::ComposeTable;
use kseq_state::{ComposeState, FeedResult, Status};
use kseq_util::keysym::{self, NO_SYMBOL};
use kseq_util::Handler;

/// Compile a compose file and inspect the result.
///
/// Exits 0 when compilation succeeds (warnings included), 1 when it fails.
#[derive(Parser, Debug)]
#[command(name = "kseqc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile compose files and inspect the result", long_about = None)]
struct Cli {
    /// Compose file to compile; defaults to the locale's file, honoring
    /// XCOMPOSEFILE
    file: Option<PathBuf>,

    /// Locale used for %L expansion and the locale-driven lookup
    #[arg(short, long, default_value = "C", env = "KSEQ_LOCALE")]
    locale: String,

    /// Print every compiled sequence in compose-file syntax
    #[arg(short, long)]
    dump: bool,

    /// Feed a comma-separated list of keysym names to a fresh session and
    /// print the match state after each one
    #[arg(short, long, value_name = "NAMES")]
    feed: Option<String>,

    /// Suppress the summary line
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::try_from_env("KSEQ_LOG")
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let handler = Handler::new();
    let result = match &cli.file {
        Some(path) => ComposeTable::from_path(&handler, path, &cli.locale),
        None => ComposeTable::from_locale(&handler, &cli.locale),
    };

    for diagnostic in handler.diagnostics() {
        eprintln!("{}", diagnostic);
    }

    let table = result.context("compilation failed")?;

    if !cli.quiet {
        eprintln!(
            "compiled {} sequences into {} nodes, {} bytes of strings",
            table.sequence_count(),
            table.node_count(),
            table.utf8_len()
        );
    }

    if cli.dump {
        let stdout = io::stdout().lock();
        dump(&table, stdout).context("writing dump")?;
    }

    if let Some(names) = &cli.feed {
        feed(&Arc::new(table), names)?;
    }

    Ok(())
}

/// Writes every sequence in compose-file syntax, one per line.
fn dump<W: Write>(table: &ComposeTable, mut out: W) -> io::Result<()> {
    for entry in table.iter() {
        writeln!(out, "{}", entry)?;
    }
    Ok(())
}

/// Feeds a comma-separated list of keysym names to a fresh session,
/// printing the feed result, status and pending result after each one.
fn feed(table: &Arc<ComposeTable>, names: &str) -> anyhow::Result<()> {
    let mut state = ComposeState::new(table.clone());
    for name in names.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let sym = keysym::from_name(name);
        anyhow::ensure!(sym != NO_SYMBOL, "unknown keysym name \"{}\"", name);

        let result = state.feed(sym);
        println!(
            "{}: {} {} \"{}\" {}",
            name,
            feed_result_string(result),
            status_string(state.status()),
            state.utf8(),
            state.one_sym()
        );
    }
    Ok(())
}

fn status_string(status: Status) -> &'static str {
    match status {
        Status::Nothing => "nothing",
        Status::Composing => "composing",
        Status::Composed => "composed",
        Status::Cancelled => "cancelled",
    }
}

fn feed_result_string(result: FeedResult) -> &'static str {
    match result {
        FeedResult::Ignored => "ignored",
        FeedResult::Accepted => "accepted",
    }
}
