//! Score Protocol - one-off scoring and report export
//!
//! Scores the named protocols against each other (or every configured
//! protocol with `--all`) and writes JSON/CSV reports.
//!
//! Usage:
//!   cargo run --bin score_protocol -- chainlink uniswap
//!   cargo run --bin score_protocol -- --all --format csv --out reports
//!   cargo run --bin score_protocol -- --all --save
//!
//! Options:
//!   --all              Score every protocol in the configuration
//!   --out <dir>        Report directory (default: HOW3_REPORT_DIR or scores)
//!   --format <fmt>     json | csv | both (default: both)
//!   --config <path>    Protocol configuration (default: HOW3_CONFIG_PATH)
//!   --data <dir>       Source data root (default: HOW3_DATA_DIR)
//!   --save             Also persist records to the configured report store

use dotenv::dotenv;
use how3::config::RuntimeConfig;
use how3::scoring::{ConfigStore, JsonDirectorySource, ScoringEngine, SourceAdapter};
use how3::store::export::{export_run, ReportFormat};
use how3::store::{JsonReportStore, ReportStore, SqliteReportStore, StoreBackend};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str = "Usage: score_protocol [--all | <protocol>...] [--out <dir>] \
                     [--format json|csv|both] [--config <path>] [--data <dir>] [--save]";

/// Command-line configuration for a one-off scoring run
struct ScoreProtocolArgs {
    protocols: Vec<String>,
    all: bool,
    out_dir: PathBuf,
    format: ReportFormat,
    save: bool,
    runtime: RuntimeConfig,
}

impl ScoreProtocolArgs {
    fn from_env_and_args() -> Result<Self, Box<dyn std::error::Error>> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut runtime = RuntimeConfig::from_env();

        let mut protocols = Vec::new();
        let mut all = false;
        let mut save = false;
        let mut out_dir = None;
        let mut format = ReportFormat::Both;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("Missing value for {}. {}", flag, USAGE))
            };

            match arg.as_str() {
                "--all" => all = true,
                "--save" => save = true,
                "--out" => out_dir = Some(PathBuf::from(value("--out")?)),
                "--format" => format = value("--format")?.parse()?,
                "--config" => runtime.config_path = value("--config")?,
                "--data" => runtime.data_dir = value("--data")?,
                "-h" | "--help" => return Err(USAGE.into()),
                flag if flag.starts_with("--") => {
                    return Err(format!("Unknown option {}. {}", flag, USAGE).into())
                }
                id => protocols.push(id.to_lowercase()),
            }
        }

        if !all && protocols.is_empty() {
            protocols = runtime.protocols.clone();
        }
        if !all && protocols.is_empty() {
            return Err(format!("No protocols given. {}", USAGE).into());
        }

        let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(&runtime.report_dir));

        Ok(Self {
            protocols,
            all,
            out_dir,
            format,
            save,
            runtime,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = ScoreProtocolArgs::from_env_and_args()?;

    let config = Arc::new(ConfigStore::load(&args.runtime.config_path)?);

    for id in &args.protocols {
        if !config.contains(id) {
            warn!("⚠️  {} is not configured, scoring with built-in defaults", id);
        }
    }

    let source: Arc<dyn SourceAdapter> = Arc::new(JsonDirectorySource::new(&args.runtime.data_dir));
    let engine = ScoringEngine::new(config, source);

    let report = if args.all {
        engine.score_configured().await
    } else {
        engine.score_all(&args.protocols).await
    };

    export_run(&args.out_dir, &report, args.format)?;

    if args.save && !report.records.is_empty() {
        let store: Box<dyn ReportStore> = match args.runtime.store_backend {
            StoreBackend::Sqlite => Box::new(SqliteReportStore::open(
                &args.runtime.db_path,
                &args.runtime.schema_dir,
            )?),
            StoreBackend::Json => Box::new(JsonReportStore::new(&args.runtime.report_dir)?),
        };
        for record in &report.records {
            match store.save(record).await {
                Ok(()) => info!("💾 Saved {} to {}", record.protocol_id, store.backend_type()),
                Err(e) => error!("❌ Failed to save {}: {}", record.protocol_id, e),
            }
        }
    }

    println!();
    println!("{:<14} {:>8} {:>8} {:>8} {:>8} {:>8}", "protocol", "EQS", "UGS", "FVS", "SS", "How3");
    for record in &report.records {
        println!(
            "{:<14} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            record.protocol_id, record.eqs, record.ugs, record.fvs, record.ss, record.how3_score
        );
    }
    for failure in &report.failures {
        println!("{:<14} failed: {}", failure.protocol_id, failure.error);
    }

    if report.records.is_empty() {
        return Err("No protocol could be scored".into());
    }
    Ok(())
}
