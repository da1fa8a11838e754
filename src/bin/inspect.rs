//! pagewal Inspect Binary
//!
//! Replays a WAL directory read-only and prints what recovery would see.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use pagewal::env::{FileProvider, LocalFileProvider};
use pagewal::wal::{scan_log_files, LogFileStage, LogFilenameSet, RecordKind, WALStoreReader};
use pagewal::RecoveryMode;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Tolerate,
    Absolute,
    PointInTime,
    Skip,
}

impl From<Mode> for RecoveryMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Tolerate => RecoveryMode::TolerateCorruptedTailRecords,
            Mode::Absolute => RecoveryMode::AbsoluteConsistency,
            Mode::PointInTime => RecoveryMode::PointInTimeRecovery,
            Mode::Skip => RecoveryMode::SkipAnyCorruptedRecords,
        }
    }
}

/// pagewal WAL inspector
#[derive(Parser, Debug)]
#[command(name = "pagewal-inspect")]
#[command(about = "Replay a page directory WAL without modifying it")]
#[command(version)]
struct Args {
    /// Volume root (repeat for multi-volume layouts)
    #[arg(short, long = "volume", required = true)]
    volumes: Vec<PathBuf>,

    /// WAL subdirectory name under each volume
    #[arg(short, long, default_value = "wal")]
    wal_dir: String,

    /// Recovery mode to replay under
    #[arg(short, long, value_enum, default_value = "tolerate")]
    mode: Mode,

    /// Print every record instead of just the summary
    #[arg(long)]
    records: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,pagewal=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mode = RecoveryMode::from(args.mode);
    let provider: Arc<dyn FileProvider> = Arc::new(LocalFileProvider::new());

    let found = match scan_log_files(provider.as_ref(), &args.volumes, &args.wal_dir) {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("Failed to list WAL files: {}", e);
            std::process::exit(1);
        }
    };

    let mut logs = LogFilenameSet::new();
    for file in found {
        match file.stage {
            LogFileStage::Normal => {
                logs.insert(file);
            }
            LogFileStage::Temporary => {
                println!("interrupted checkpoint (ignored): {}", file.path().display());
            }
        }
    }

    println!("pagewal-inspect v{}: {} log file(s), mode {}", pagewal::VERSION, logs.len(), mode);

    let mut reader = WALStoreReader::new(provider, logs, mode);
    let files: Vec<_> = reader.remaining_files().cloned().collect();
    for file in &files {
        println!("  {}", file.path().display());
    }

    let mut failed = false;
    for item in reader.by_ref() {
        match item {
            Ok(record) => {
                if args.records {
                    let kind = match record.kind {
                        RecordKind::Edit => "edit".to_string(),
                        RecordKind::Snapshot { base_log_num } => {
                            format!("snapshot(base={})", base_log_num)
                        }
                    };
                    let version = record
                        .version
                        .map(|v| format!("{}.{}", v.sequence, v.epoch))
                        .unwrap_or_else(|| "-".to_string());
                    println!("{:<20} version={:<12} ops={}", kind, version, record.edit.len());
                }
            }
            Err(e) => {
                println!("replay failed: {}", e);
                failed = true;
            }
        }
    }

    let report = reader.report();
    println!("files read:        {}", report.files_read);
    println!("files skipped:     {}", report.files_skipped);
    println!("files discarded:   {}", report.files_discarded);
    println!("records recovered: {}", report.records_recovered);
    println!("records skipped:   {}", report.records_skipped);
    println!("truncated tails:   {}", report.truncated_tails);
    if let Some(pos) = report.stopped_at {
        println!("stopped at:        log {}_{} offset {}", pos.log_num, pos.level_num, pos.offset);
    }
    if let Some(pos) = report.last_position {
        println!("last record:       log {}_{} offset {}", pos.log_num, pos.level_num, pos.offset);
    }

    if failed {
        std::process::exit(1);
    }
}
