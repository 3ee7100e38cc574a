//! liga-migrate: one-shot copy of the local store into the remote backend,
//! plus outbox replay and a line-oriented command loop.
//!
//! Usage:
//!   liga-migrate migrate --db liga.db --env-file .env --batch-size 100
//!   liga-migrate flush-outbox --db liga.db
//!   liga-migrate ipc --db liga.db

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use liga_core::{
    clock::{Clock, SystemClock},
    command::LeagueCommand,
    config::LigaConfig,
    league::League,
    model::{Club, Match, Player, Tournament},
    remote::{PostgrestClient, RemoteBackend},
    store::LocalStore,
    sync::{BackoffPolicy, Outbox, SyncEntity},
};
use std::io::{self, BufRead, Write};

/// Liga Master maintenance tool
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Common {
    /// Local SQLite database
    #[arg(long)]
    db: Option<String>,

    /// Env file with LIGA_REMOTE_URL, LIGA_REMOTE_ANON_KEY and optionally LIGA_REMOTE_SERVICE_KEY
    #[arg(long)]
    env_file: Option<String>,

    /// JSON config file; env vars still override it
    #[arg(long)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upsert every local collection into the remote tables, then compare counts
    Migrate {
        #[command(flatten)]
        common: Common,

        /// Rows per upsert request
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
    },
    /// Replay remote writes that failed earlier
    FlushOutbox {
        #[command(flatten)]
        common: Common,
    },
    /// Read JSON commands from stdin, one per line, and print each outcome
    Ipc {
        #[command(flatten)]
        common: Common,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Migrate { common, batch_size } => {
            let config = load_config(&common)?;
            let remote = connect(&config)?;
            let store = LocalStore::open(&config.db_path)?;
            run_migration(&store, &remote, batch_size.max(1))
        }
        Command::FlushOutbox { common } => {
            let config = load_config(&common)?;
            let remote = connect(&config)?;
            let store = LocalStore::open(&config.db_path)?;
            let outbox = Outbox::new(&store, BackoffPolicy::from_settings(&config.sync));
            let report = outbox.flush(&remote, SystemClock.now())?;
            println!(
                "outbox: {} replayed, {} deferred, {} failed, {} still pending",
                report.replayed,
                report.deferred,
                report.failed,
                store.outbox_len()?
            );
            Ok(())
        }
        Command::Ipc { common } => {
            let config = load_config(&common)?;
            let mut league = League::open(config)?;
            league.load()?;
            run_ipc_loop(&mut league)
        }
    }
}

fn load_config(common: &Common) -> Result<LigaConfig> {
    match &common.env_file {
        Some(path) => {
            dotenv::from_filename(path).with_context(|| format!("Cannot read env file {path}"))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    let mut config = match &common.config {
        Some(path) => LigaConfig::load(path)?,
        None => LigaConfig::default(),
    };
    config.apply_env();
    if let Some(db) = &common.db {
        config.db_path = db.clone();
    }
    Ok(config)
}

fn connect(config: &LigaConfig) -> Result<PostgrestClient> {
    let remote = config
        .remote
        .as_ref()
        .context("LIGA_REMOTE_URL and LIGA_REMOTE_ANON_KEY must be set")?;
    let client = PostgrestClient::new(remote)?;
    // Service key bypasses row-level policies.
    Ok(match std::env::var("LIGA_REMOTE_SERVICE_KEY") {
        Ok(key) if !key.trim().is_empty() => client.with_access_token(key),
        _ => client,
    })
}

// ── migrate ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TableReport {
    table:          &'static str,
    local:          usize,
    uploaded:       usize,
    failed_batches: usize,
}

fn run_migration(store: &LocalStore, remote: &dyn RemoteBackend, batch_size: usize) -> Result<()> {
    println!("Liga Master: migrating {} to remote", store.path().unwrap_or(":memory:"));
    println!("  batch size: {batch_size}");
    println!();

    let reports = [
        migrate_collection::<Club>(store, remote, batch_size)?,
        migrate_collection::<Player>(store, remote, batch_size)?,
        migrate_collection::<Tournament>(store, remote, batch_size)?,
        migrate_collection::<Match>(store, remote, batch_size)?,
    ];

    println!();
    println!("Verification");
    let mut mismatches = 0;
    for report in &reports {
        let remote_count = remote.count(report.table)?;
        let status = if remote_count as usize >= report.local { "ok" } else { "MISMATCH" };
        if status != "ok" {
            mismatches += 1;
        }
        println!(
            "  {:<12} local {:>6}  uploaded {:>6}  remote {:>6}  failed batches {:>3}  {status}",
            report.table, report.local, report.uploaded, remote_count, report.failed_batches
        );
    }

    if mismatches > 0 {
        anyhow::bail!("{mismatches} table(s) have fewer remote rows than local rows");
    }
    Ok(())
}

/// Upsert one collection in batches. A failed batch is reported and
/// skipped; the count check afterwards shows the gap.
fn migrate_collection<T: SyncEntity>(
    store: &LocalStore,
    remote: &dyn RemoteBackend,
    batch_size: usize,
) -> Result<TableReport> {
    let Some(table) = T::REMOTE_TABLE else {
        anyhow::bail!("{} has no remote table", T::COLLECTION.name());
    };
    let items: Vec<T> = store.get_all(T::COLLECTION)?;
    let rows = items
        .iter()
        .filter(|item| !item.id().trim().is_empty())
        .map(T::to_remote_row)
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = TableReport {
        table,
        local: rows.len(),
        ..TableReport::default()
    };
    let batches = rows.len().div_ceil(batch_size);
    for (i, chunk) in rows.chunks(batch_size).enumerate() {
        match remote.upsert(table, chunk) {
            Ok(()) => {
                report.uploaded += chunk.len();
                println!("  {table}: batch {}/{batches} ({} rows)", i + 1, chunk.len());
            }
            Err(e) => {
                report.failed_batches += 1;
                log::error!("{table}: batch {}/{batches} failed: {e}", i + 1);
            }
        }
    }
    if batches == 0 {
        println!("  {table}: nothing to upload");
    }
    Ok(report)
}

// ── ipc ────────────────────────────────────────────────────────

fn run_ipc_loop(league: &mut League) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<LeagueCommand>(&buffer) {
            Ok(cmd) => match league.execute(cmd) {
                Ok(outcome) => serde_json::to_value(&outcome)?,
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}
