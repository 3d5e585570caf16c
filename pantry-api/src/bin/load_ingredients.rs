//! Ingredient Import Tool
//!
//! Loads a two-column (name, measurement unit) CSV with a header row into
//! the `ingredients` table. Connection settings come from `PANTRY_DB_*`.
//!
//! Usage:
//!   cargo run -p pantry-api --bin pantry-load-ingredients -- data/ingredients.csv

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pantry_api::{DbConfig, PgStore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file with `name,measurement_unit` rows
    path: PathBuf,

    /// Create missing tables before importing
    #[arg(long)]
    apply_schema: bool,
}

fn read_rows(path: &PathBuf) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed row {}", index + 2))?;
        match (record.get(0), record.get(1), record.len()) {
            (Some(name), Some(unit), 2) if !name.trim().is_empty() => {
                rows.push((name.trim().to_string(), unit.trim().to_string()));
            }
            _ => bail!("row {} must have exactly a name and a unit", index + 2),
        }
    }
    Ok(rows)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    if !args.path.is_file() {
        bail!("file {} not found", args.path.display());
    }

    let rows = read_rows(&args.path)?;
    info!(path = %args.path.display(), rows = rows.len(), "Parsed ingredient file");

    let store = PgStore::from_config(&DbConfig::from_env())?;
    if args.apply_schema {
        store.apply_schema().await?;
        info!("Schema applied");
    }

    let written = store.insert_ingredients(&rows).await?;
    info!(written, "Ingredients imported");
    Ok(())
}
