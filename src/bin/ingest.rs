//! Load the seed CSV files into the SurrealDB store.
//!
//! Usage:
//!   ./target/release/ingest [--data-dir raw-data] [--db data/ops.db] [--batch-size 1000]

use anyhow::Result;
use clap::Parser;
use ops_dashboard::config::StoreArgs;
use ops_dashboard::db::Store;
use ops_dashboard::seed;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Load cities, hubs, drivers, orders and deliveries into the store")]
struct Args {
    /// Directory holding cities.csv, hubs.csv, drivers.csv, orders.csv and deliveries.csv
    #[arg(long, default_value = "raw-data")]
    data_dir: PathBuf,

    #[command(flatten)]
    store: StoreArgs,

    /// Rows per INSERT statement
    #[arg(long, default_value = "1000")]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let args = Args::parse();
    let db_path = args.store.path();

    info!("Connecting to SurrealDB at {}", db_path);
    let store = Store::open(&db_path).await?;

    info!("Initializing schema...");
    store.init_schema().await?;

    let summary = seed::load_directory(&store, &args.data_dir, args.batch_size).await?;

    println!("\n{}", "=".repeat(60));
    println!("Ingestion complete!");
    println!("{}", "=".repeat(60));
    println!("  Cities:      {}", summary.cities);
    println!("  Hubs:        {}", summary.hubs);
    println!("  Drivers:     {}", summary.drivers);
    println!("  Orders:      {}", summary.orders);
    println!("  Deliveries:  {}", summary.deliveries);
    println!("  Skipped:     {}", summary.skipped);

    if let Some((first, last)) = store.date_bounds().await? {
        println!("  Order dates: {} .. {}", first, last);
    }

    store.close();
    Ok(())
}
