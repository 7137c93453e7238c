use std::io::BufRead;

use clap::Parser;
use tracing::{info, warn};

use kt_contracts::{EntrantInput, RawDetection};
use kt_engine::engine::RaceEngine;
use kt_ingest::{Normalizer, SourceRouter};

mod config;

use config::EngineConfig;

#[derive(Parser)]
#[command(name = "kt-server")]
#[command(about = "Real-time race-timing core: ingest, engine, journal and results")]
struct Args {
    /// Path to the merged JSON configuration document.
    #[arg(long, default_value = "kt-server.json")]
    config: String,

    /// Race id to load at boot.
    #[arg(long, default_value_t = 1)]
    race_id: i64,

    /// Race type / mode name, used to look up `modes.<name>` in config.
    #[arg(long, default_value = "sprint")]
    race_type: String,

    /// Read normalized detections as newline-delimited JSON from this
    /// file instead of stdin.
    #[arg(long)]
    ingest_file: Option<String>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = EngineConfig::load(&args.config)?;

    let pool = kt_storage::db::create_pool(&cfg.persistence.sqlite_path).await?;
    if cfg.persistence.enabled {
        kt_storage::db::run_migrations(&pool).await?;
    }

    let router = SourceRouter::new(
        cfg.pits.receivers.pit_in.clone(),
        cfg.pits.receivers.pit_out.clone(),
    );
    let engine = RaceEngine::new(router.clone(), cfg.features.pit_timing, cfg.features.auto_provisional);

    let (handle, journal_rx, checkpoint_rx) = kt_engine::spawn(engine, 256);

    if cfg.persistence.enabled {
        let journal = kt_storage::Journal::new(pool.clone(), cfg.persistence.batch_max);
        let batch_ms = cfg.persistence.batch_ms;
        tokio::spawn(async move {
            kt_storage::run_writer(journal, journal_rx, checkpoint_rx, batch_ms).await;
        });
    }

    let entrants: Vec<EntrantInput> = load_entrants(&pool).await?;
    let mode = cfg.mode_config(&args.race_type);
    handle
        .load(args.race_id, args.race_type.clone(), entrants, mode, None, now_ms())
        .await?;

    info!(race_id = args.race_id, race_type = %args.race_type, "race loaded");

    run_ingest_loop(&handle, &router, args.ingest_file.as_deref()).await?;

    Ok(())
}

async fn load_entrants(pool: &sqlx::SqlitePool) -> anyhow::Result<Vec<EntrantInput>> {
    let rows: Vec<kt_storage::models::EntrantRow> = sqlx::query_as(
        "SELECT entrant_id, number, name, tag, enabled, status, organization, spoken_name, color, logo, updated_at FROM entrants",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| EntrantInput {
            entrant_id: r.entrant_id,
            number: r.number,
            name: r.name,
            tag: r.tag,
            enabled: Some(r.enabled),
            status: Some(r.status),
        })
        .collect())
}

/// Abstract decoder front door: the real decoder-wire-format parsers are
/// out of scope (§1), so this reads already-decoded detections as
/// newline-delimited JSON from a file or stdin, standing in for whatever
/// process owns the serial/TCP/UDP decoder connections.
async fn run_ingest_loop(
    handle: &kt_engine::EngineHandle,
    router: &SourceRouter,
    ingest_file: Option<&str>,
) -> anyhow::Result<()> {
    let mut normalizer = Normalizer::default();

    let reader: Box<dyn BufRead> = match ingest_file {
        Some(path) => Box::new(std::io::BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawDetection = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "skipping malformed detection line");
                continue;
            }
        };

        let pass = match normalizer.normalize(&raw) {
            Ok(pass) => pass,
            Err(reason) => {
                warn!(?reason, tag = %raw.tag_raw, "detection rejected before reaching the engine");
                continue;
            }
        };
        let pass = router.route(pass);

        let outcome = handle.ingest_pass(pass, now_ms()).await;
        if !outcome.lap_added {
            if let Some(reason) = outcome.reason {
                tracing::debug!(?reason, entrant_id = ?outcome.entrant_id, "pass accepted, no lap credited");
            }
        }
    }

    handle.snapshot(now_ms()).await;
    Ok(())
}
