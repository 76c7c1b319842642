//! # Floor Plan Seeder
//!
//! Populates a development database with a dining room.
//!
//! ## Usage
//! ```bash
//! # 24 tables (default) in the database named by bistro.toml
//! cargo run -p bistro-db --bin seed
//!
//! # Custom table count
//! cargo run -p bistro-db --bin seed -- --tables 40
//!
//! # Specify database path
//! cargo run -p bistro-db --bin seed -- --db ./data/bistro.db
//! ```
//!
//! Tables are numbered from 1 and dealt round-robin over the sections below,
//! each section with its own seat count.

use std::env;
use std::path::PathBuf;

use bistro_core::query::TableFilter;
use bistro_db::{Database, PosConfig, TableService};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Dining sections and their default seat counts
const SECTIONS: &[(&str, i64)] = &[
    ("Main", 4),
    ("Window", 2),
    ("Terrace", 4),
    ("Bar", 2),
    ("Private Room", 8),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut count: i64 = 24;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tables" | "-t" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(24);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bistro POS Floor Plan Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --tables <N>   Number of tables to create (default: 24)");
                println!("  -d, --db <PATH>    Database file path (default: from bistro.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = PosConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    let db = Database::new(config.db_config()).await?;
    let tables = TableService::new(db.pool().clone(), config.thresholds());

    let existing = tables.list(&TableFilter::default().include_inactive()).await?;
    if !existing.is_empty() {
        warn!(
            tables = existing.len(),
            "Floor plan already seeded; delete the database file to regenerate"
        );
        return Ok(());
    }

    let start = std::time::Instant::now();
    for number in 1..=count {
        let (section, seats) = SECTIONS[(number as usize - 1) % SECTIONS.len()];
        tables.create_table(number, seats, section).await?;
    }

    info!(
        tables = count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        tax_bps = config.tax_rate().bps(),
        "Floor plan seeded"
    );
    println!("✓ Seeded {} tables into {}", count, config.database.path.display());

    Ok(())
}

/// RUST_LOG overrides the default `info,bistro=debug,sqlx=warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bistro=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
