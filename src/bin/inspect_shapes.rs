use anyhow::{Result, anyhow};
use clap::Parser;
use pulse_etl::models::{Category, Kind};
use pulse_etl::processor::ShapeKind;
use pulse_etl::source::{NO_MATCH, UNREADABLE, discover_json_files, shape_census};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inspect_shapes")]
#[command(about = "Count which known layout each source document matches")]
struct Cli {
    /// Dataset root containing data/
    repo_path: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let repo_path = Cli::parse().repo_path;

    if !repo_path.join("data").is_dir() {
        return Err(anyhow!("data folder not found under {}", repo_path.display()));
    }

    let files = discover_json_files(&repo_path);
    let census = shape_census(&files);

    println!("=== SHAPE CENSUS: {} ({} files) ===", repo_path.display(), files.total());

    for category in Category::ALL {
        for kind in Kind::ALL {
            let Some(shapes) = census.groups.get(&(category, kind)) else {
                continue;
            };
            let total: usize = shapes.values().sum();
            println!("\n{}/{} ({} documents)", category, kind, total);

            for shape in ShapeKind::candidates(category, kind) {
                println!(
                    "  {:<20} {:>8}",
                    shape.name(),
                    census.count(category, kind, shape.name())
                );
            }
            for label in [NO_MATCH, UNREADABLE] {
                let count = census.count(category, kind, label);
                if count > 0 {
                    println!("  {:<20} {:>8}", label, count);
                }
            }
        }
    }

    if census.unrouted > 0 {
        println!("\n{} files matched no category/kind", census.unrouted);
    }

    Ok(())
}
