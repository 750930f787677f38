//! ErrorLog - record log inspection tool
//!
//! Reads a framed record log (`proto.log`) directly, newest records first,
//! without going through a running service.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use errorlog_core::{ServiceFilter, StoredRecord};
use errorlog_logging::{ErrorLogSubscriberBuilder, LogConfig};
use errorlog_server::format::format_listing;
use errorlog_storage::{RecordLog, count_blocks, history_from};

#[derive(Parser)]
#[command(
    name = "errorlog",
    about = "Inspect error-log record files",
    version
)]
struct Cli {
    /// Log level for diagnostics on stderr
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the most recent matching records, newest first
    Tail {
        /// Record log file
        #[arg(short, long)]
        file: PathBuf,

        /// Comma-separated service name substrings (case-insensitive)
        #[arg(short, long, default_value = "")]
        service: String,

        /// Maximum number of records to print
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,
    },

    /// Count blocks and matching records in a record log
    Count {
        /// Record log file
        #[arg(short, long)]
        file: PathBuf,

        /// Comma-separated service name substrings (case-insensitive)
        #[arg(short, long, default_value = "")]
        service: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = ErrorLogSubscriberBuilder::new()
        .with_config(LogConfig::cli(&cli.log_level))
        .init();

    match cli.command {
        Commands::Tail {
            file,
            service,
            count,
        } => {
            let filter = ServiceFilter::parse(&service);
            let records = tail(&file, filter, count).await?;
            let mut out = std::io::stdout().lock();
            for record in &records {
                out.write_all(format_listing(record).as_bytes())?;
            }
        }
        Commands::Count { file, service } => {
            let filter = ServiceFilter::parse(&service);
            let mut reader = RecordLog::open_reader_at(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let (total, matching) = count_blocks(&mut reader, &filter).await?;
            println!("blocks: {}, matching: {}", total, matching);
        }
    }

    Ok(())
}

/// Up to `max` records matching `filter`, newest first
async fn tail(path: &Path, filter: ServiceFilter, max: usize) -> anyhow::Result<Vec<StoredRecord>> {
    info!(path = %path.display(), services = ?filter.services(), max, "Reading record log");
    let reader = RecordLog::open_reader_at(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let records = history_from(reader, filter, max).await?;
    debug!(matched = records.len(), "Scan finished");
    Ok(records)
}
