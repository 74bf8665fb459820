//! The `filecabinet` binary.
//!
//! `filecabinet serve` starts the HTTP endpoint on the configured address.
//! Without arguments, statements are read from standard input, one per line,
//! and their results printed as tab separated rows.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, RwLock};

use tracing::{error, info};

use filecabinet::construct::RecordStore;
use filecabinet::engine::{Engine, QueryResult};
use filecabinet::instrument::{LoggingStore, TimingStore};
use filecabinet::persist::open_store;
use filecabinet::server;
use filecabinet::settings::Settings;
use filecabinet::Result;

fn print_result(out: &mut impl Write, result: &QueryResult) -> io::Result<()> {
    if !result.columns.is_empty() {
        writeln!(out, "{}", result.columns.join("\t"))?;
        for row in &result.rows {
            writeln!(out, "{}", row.join("\t"))?;
        }
        writeln!(out, "({} row(s))", result.rows.len())
    } else if result.ids.is_empty() {
        writeln!(out, "{} record(s) affected", result.affected)
    } else {
        let ids: Vec<String> = result.ids.iter().map(|id| format!("#{id}")).collect();
        writeln!(out, "{} record(s) affected: {}", result.affected, ids.join(", "))
    }
}

fn run_stdin(store: &mut dyn RecordStore, engine: &Engine) -> Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        let statement = line.trim();
        if statement.is_empty() || statement.starts_with("--") {
            continue;
        }
        match engine.execute(store, statement) {
            Ok(result) => print_result(&mut out, &result)?,
            Err(e) => writeln!(out, "error: {e}")?,
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let settings = Settings::load()?;
    info!(storage = ?settings.storage, rules = %settings.rules, "settings loaded");
    let store = open_store(&settings.persistence_mode(), settings.cabinet_config()?)?;
    let mut store: Box<dyn RecordStore + Send + Sync> = Box::new(TimingStore::new(LoggingStore::new(store)));
    let engine = Engine::new();

    match std::env::args().nth(1).as_deref() {
        Some("serve") => {
            let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
            let shared = Arc::new(RwLock::new(store));
            runtime.block_on(server::serve(&settings.bind, shared, Arc::new(engine)))
        }
        None => run_stdin(store.as_mut(), &engine),
        Some(other) => {
            error!(argument = other, "unknown argument, expected 'serve' or none");
            Err(filecabinet::CabinetError::Config(format!("unknown argument '{other}'")))
        }
    }
}
