//! REST API Server for the operations dashboard
//!
//! Usage:
//!   ./target/release/api_server [options]
//!
//! Options:
//!   --port PORT             Port to listen on (default: 8080)
//!   --db PATH               Path to SurrealDB database (default: data/ops.db)
//!   --distance-bands LIST   Default band boundaries in metres (default: 2000,5000)
//!
//! REST endpoints (all but health take ?start=&end=&cities=&hubs=):
//!   GET /api/v1/health                         - Health check
//!   GET /api/v1/report                         - Full KPI report
//!   GET /api/v1/drivers                        - Driver performance table
//!   GET /api/v1/export/records.csv             - Joined order/delivery rows
//!   GET /api/v1/export/order_metrics.csv       - Cancellations by city and hub
//!   GET /api/v1/export/driver_metrics.csv      - Driver metrics
//!   GET /api/v1/export/revenue_metrics.csv     - Revenue by city and hub

use anyhow::Result;
use clap::Parser;
use ops_dashboard::api::{create_router, DashboardService};
use ops_dashboard::config::{parse_bands, StoreArgs};
use ops_dashboard::db::Store;
use ops_dashboard::metrics::DistanceBands;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Serve the operations dashboard over REST")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "OPS_PORT", default_value = "8080")]
    port: u16,

    #[command(flatten)]
    store: StoreArgs,

    /// Default distance band boundaries in metres, comma separated
    #[arg(long, default_value = "2000,5000", value_parser = parse_bands)]
    distance_bands: DistanceBands,
}

fn print_banner(port: u16, db_path: &str) {
    println!("============================================================");
    println!("         OPERATIONS DASHBOARD API SERVER");
    println!("============================================================");
    println!();
    println!("  Port:     {}", port);
    println!("  Database: {}", db_path);
    println!("  REST:     http://localhost:{}/api/v1/", port);
    println!();
    println!("REST Endpoints:");
    println!("  GET /api/v1/health                     Health check");
    println!("  GET /api/v1/report                     KPI report");
    println!("  GET /api/v1/drivers                    Driver table");
    println!("  GET /api/v1/export/records.csv         Record set");
    println!("  GET /api/v1/export/order_metrics.csv   Order metrics");
    println!("  GET /api/v1/export/driver_metrics.csv  Driver metrics");
    println!("  GET /api/v1/export/revenue_metrics.csv Revenue metrics");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();
    let db_path = args.store.path();

    print_banner(args.port, &db_path);

    let store = Store::open(&db_path).await?;
    let service = Arc::new(DashboardService::new(store, args.distance_bands));

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let app = create_router(service);
    tracing::info!("Starting REST server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
