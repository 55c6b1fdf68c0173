//! Operations dashboard report
//!
//! Fetches orders and deliveries for a date range and location selection,
//! then prints the headline KPIs, breakdowns and driver table.
//!
//! Usage:
//!   ./target/release/ops_dashboard [options]
//!
//! Options:
//!   --db PATH               Path to SurrealDB database (default: data/ops.db)
//!   --start DATE            First order date (default: earliest in store)
//!   --end DATE              Last order date (default: latest in store)
//!   --city NAME             Restrict to a city (repeatable)
//!   --hub NAME              Restrict to a hub (repeatable)
//!   --distance-bands LIST   Band boundaries in metres (default: 2000,5000)
//!   --json                  Print the report as JSON instead of tables
//!   --export-dir DIR        Also write the CSV downloads into DIR

use anyhow::Result;
use clap::Parser;
use ops_dashboard::api::DashboardService;
use ops_dashboard::config::{FilterArgs, StoreArgs};
use ops_dashboard::db::Store;
use ops_dashboard::export;
use ops_dashboard::metrics::{KpiReport, KpiSummary};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ops_dashboard")]
#[command(about = "E-commerce operations KPI report")]
struct Args {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    filter: FilterArgs,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write records.csv and the metric tables into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

fn print_header(title: &str) {
    println!("\n{}", "═".repeat(80));
    println!("  {}", title);
    println!("{}\n", "═".repeat(80));
}

fn print_section(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(70));
}

fn minutes(value: Option<f64>) -> String {
    value.map_or_else(|| "no data".to_string(), |m| format!("{:.1} min", m))
}

fn print_summary(summary: &KpiSummary) {
    println!("  Total Orders:         {:>12}", summary.total_orders);
    println!("  Cancelled Orders:     {:>12}", summary.cancelled_orders);
    println!("  Cancellation Rate:    {:>11.2}%", summary.cancellation_rate * 100.0);
    println!("  Total Revenue:        {:>12.2}", summary.total_revenue);
    println!("  Avg Order Value:      {:>12.2}", summary.average_order_value);
    println!("  Deliveries:           {:>12}", summary.deliveries);
    println!("  Driver Failure Rate:  {:>11.2}%", summary.driver_failure_rate * 100.0);
    println!("  Avg Delivery Time:    {:>12}", minutes(summary.average_delivery_minutes));
}

fn print_report(report: &KpiReport) {
    print_header(&format!(
        "OPERATIONS REPORT  {} .. {}",
        report.range.start, report.range.end
    ));
    if !report.filters.is_empty() {
        let cities: Vec<&str> = report.filters.cities.iter().map(String::as_str).collect();
        let hubs: Vec<&str> = report.filters.hubs.iter().map(String::as_str).collect();
        println!("  Cities: {}", if cities.is_empty() { "all".to_string() } else { cities.join(", ") });
        println!("  Hubs:   {}", if hubs.is_empty() { "all".to_string() } else { hubs.join(", ") });
    }

    print_section("Headline KPIs");
    print_summary(&report.summary);

    if report.summary.total_orders == 0 {
        println!("\n  No orders match this selection.");
        return;
    }

    print_section("Orders by City");
    println!(
        "  {:24} {:>8} {:>10} {:>12} {:>10}",
        "City", "Orders", "Cancel%", "Revenue", "AOV"
    );
    println!("  {}", "─".repeat(68));
    for entry in report.by_city.iter() {
        println!(
            "  {:24} {:>8} {:>9.2}% {:>12.2} {:>10.2}",
            entry.key,
            entry.orders,
            entry.value.cancellation_rate * 100.0,
            entry.value.total_revenue,
            entry.value.average_order_value
        );
    }

    print_section("Orders by City and Hub");
    println!(
        "  {:20} {:24} {:>8} {:>10} {:>12}",
        "City", "Hub", "Orders", "Cancel%", "Revenue"
    );
    println!("  {}", "─".repeat(78));
    for entry in report.by_city_hub.iter() {
        println!(
            "  {:20} {:24} {:>8} {:>9.2}% {:>12.2}",
            entry.key.0,
            entry.key.1,
            entry.orders,
            entry.value.cancellation_rate * 100.0,
            entry.value.total_revenue
        );
    }

    print_section("Driver Performance (top 15 by deliveries)");
    println!(
        "  {:12} {:20} {:>10} {:>10} {:>12} {:>12}",
        "Driver", "Name", "Deliveries", "Fail%", "Avg Dist m", "Avg Time"
    );
    println!("  {}", "─".repeat(80));
    for driver in report.drivers.iter().take(15) {
        println!(
            "  {:12} {:20} {:>10} {:>9.2}% {:>12} {:>12}",
            driver.driver_id,
            driver.driver_name.as_deref().unwrap_or("-"),
            driver.deliveries,
            driver.failure_rate * 100.0,
            driver
                .avg_distance_meters
                .map_or_else(|| "no data".to_string(), |m| format!("{:.0}", m)),
            minutes(driver.avg_delivery_minutes)
        );
    }

    print_section("Delivery Performance by Distance");
    println!("  {:16} {:>10} {:>10} {:>10}", "Band", "Deliveries", "Failures", "Fail%");
    println!("  {}", "─".repeat(50));
    for band in &report.distance {
        println!(
            "  {:16} {:>10} {:>10} {:>9.2}%",
            band.band.label,
            band.deliveries,
            band.failures,
            band.failure_rate * 100.0
        );
    }

    print_section("Daily Orders");
    println!("  {:12} {:>8} {:>10} {:>12}", "Date", "Orders", "Cancelled", "Revenue");
    println!("  {}", "─".repeat(46));
    for point in &report.daily {
        println!(
            "  {:12} {:>8} {:>10} {:>12.2}",
            point.date.to_string(),
            point.orders,
            point.cancelled_orders,
            point.revenue
        );
    }

    if !report.warnings.is_empty() || report.rejected_rows > 0 {
        print_section("Data Quality");
        for w in &report.warnings {
            println!("  {:?}: {} rows skipped (missing {:?})", w.kpi, w.count, w.field);
        }
        if report.rejected_rows > 0 {
            println!("  {} rows rejected at load", report.rejected_rows);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let store = Store::open(&args.store.path()).await?;
    let service = DashboardService::new(store, args.filter.distance_bands.clone());

    let bounds = service.store().date_bounds().await?;
    let Some(range) = args.filter.range(bounds) else {
        warn!("Store has no orders; pass --start and --end or run ingest first");
        println!("No data available.");
        service.close();
        return Ok(());
    };

    let (set, report) = service.report(&range, &args.filter.filters(), None).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(dir) = &args.export_dir {
        let written = export::export_dir(dir, &set, &report)?;
        info!("Wrote {} files to {}", written.len(), dir.display());
    }

    service.close();
    Ok(())
}
