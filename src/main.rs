use anyhow::{Context, Result, anyhow};
use clap::Parser;
use pulse_etl::config::{LoaderConfig, SinkKind};
use pulse_etl::loader::{LoadOptions, load};
use pulse_etl::models::Table;
use pulse_etl::source::{Router, discover_json_files};
use pulse_etl::storage::{LocalTableSink, MemorySink, MinioSink, OutputFormat, RowSink};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "pulse-etl")]
#[command(about = "Load a PhonePe Pulse data tree into flat tables")]
struct Cli {
    /// TOML config file, layered under PULSE__* environment variables
    #[arg(short, long)]
    config: Option<String>,

    /// Dataset root containing data/; overrides source.repo_path
    #[arg(short, long)]
    repo_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let args = Cli::parse();
    let mut config = LoaderConfig::load(args.config.as_deref())
        .context("Failed to load loader configuration")?;
    if let Some(repo_path) = args.repo_path {
        config.source.repo_path = repo_path;
    }

    tracing_subscriber::fmt()
        .with_max_level(config.logging.max_level()?)
        .init();

    info!("🚀 Starting PhonePe Pulse loader");
    info!("Source repository: {}", config.source.repo_path.display());

    let data_dir = config.data_dir();
    if !data_dir.is_dir() {
        error!("❌ No data/ folder under {}", config.source.repo_path.display());
        return Err(anyhow!("data folder not found: {}", data_dir.display()));
    }

    let files = discover_json_files(&config.source.repo_path);
    if files.total() == 0 {
        warn!("⚠️ No JSON files found under {}", data_dir.display());
    }

    let router = Router::new(config.source.default_country.clone())?;
    let options = LoadOptions {
        batch_size: config.load.batch_size,
    };
    let mut sink = build_sink(&config).await?;

    let report = tokio::task::spawn_blocking(move || load(&files, &router, sink.as_mut(), &options))
        .await
        .context("Load task failed to complete")??;

    info!("\n=== Load Summary ===");
    for table in Table::ALL {
        info!("  {:<24} {:>10}", table.name(), report.rows_for(table));
    }
    info!(
        "📁 Files: {} seen, {} loaded, {} empty, {} skipped, {} unrouted ({} read as Latin-1)",
        report.files_seen,
        report.files_loaded,
        report.files_empty,
        report.files_skipped,
        report.files_unrouted,
        report.latin1_fallbacks
    );
    info!("📊 Total approx rows inserted: {}", report.rows_inserted);

    if report.rows_inserted > 0 {
        info!("🎉 Load completed successfully!");
    } else {
        warn!("⚠️ Load finished without writing any rows");
    }

    Ok(())
}

async fn build_sink(config: &LoaderConfig) -> Result<Box<dyn RowSink + Send>> {
    let output_dir = config.sink.output_dir.clone();

    let sink: Box<dyn RowSink + Send> = match config.sink.kind {
        SinkKind::Memory => Box::new(MemorySink::new()),
        SinkKind::Parquet => Box::new(LocalTableSink::new(output_dir, OutputFormat::Parquet)?),
        SinkKind::Csv => Box::new(LocalTableSink::new(output_dir, OutputFormat::Csv)?),
        SinkKind::Ndjson => Box::new(LocalTableSink::new(output_dir, OutputFormat::Ndjson)?),
        SinkKind::Minio => {
            let mut minio_config = config.minio.clone();
            minio_config
                .load_credentials()
                .context("Failed to load MinIO credentials")?;

            info!(
                "Loaded MinIO configuration: {}@{}",
                minio_config.endpoint, minio_config.bucket_name
            );

            let sink = MinioSink::from_config(&minio_config, &config.sink.prefix)
                .context("Failed to initialize MinIO storage")?;
            sink.ensure_bucket().await?;
            Box::new(sink)
        }
    };

    info!("Writing rows to {}", sink.describe());
    Ok(sink)
}
