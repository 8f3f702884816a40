use anyhow::{Context, Result};
use clap::Parser;
use pulse_etl::config::LoaderConfig;
use pulse_etl::models::Table;
use pulse_etl::storage::{read_table, top_states_by_amount, transaction_totals};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "table_status")]
#[command(about = "Row counts and transaction summaries for the loaded tables")]
struct Cli {
    #[arg(short, long)]
    config: Option<String>,

    /// Read this directory instead of sink.output_dir
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let output_dir = match cli.output_dir {
        Some(dir) => dir,
        None => LoaderConfig::load(cli.config.as_deref())?.sink.output_dir,
    };

    println!("=== TABLE STATUS: {} ===\n", output_dir.display());

    let mut transactions = None;
    for table in Table::ALL {
        let snapshot = read_table(&output_dir, table)
            .with_context(|| format!("Failed to read table {}", table))?;

        if snapshot.is_present() {
            println!(
                "  ✅ {:<24} {:>10} rows ({} files)",
                table.name(),
                snapshot.rows(),
                snapshot.files
            );
        } else {
            println!("  ⚪ {:<24} {:>10}", table.name(), "absent");
        }

        if table == Table::AggregatedTransaction {
            transactions = snapshot.frame;
        }
    }

    match transactions {
        Some(frame) if frame.height() > 0 => {
            println!("\nAggregated transaction totals:");
            println!("{}", transaction_totals(&frame)?);

            println!("\nTop 10 states by transaction amount:");
            println!("{}", top_states_by_amount(&frame, 10)?);
        }
        _ => println!("\nNo aggregated_transaction rows to summarize."),
    }

    Ok(())
}
