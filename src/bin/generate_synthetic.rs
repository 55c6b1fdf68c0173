//! Synthetic seed data generator
//!
//! Writes cities.csv, hubs.csv, drivers.csv, orders.csv and deliveries.csv
//! for a handful of cities, with a small share of cancelled orders, failed
//! deliveries and null fields so the dashboard's data quality paths get
//! exercised.
//!
//! Usage:
//!   cargo run --release --bin generate_synthetic -- [OPTIONS]
//!
//! Options:
//!   --orders <N>          Number of orders (default: 5000)
//!   --start <DATE>        First order date (default: 2021-01-01)
//!   --end <DATE>          Last order date (default: 2021-04-30)
//!   --seed <N>            Random seed for reproducibility (optional)
//!   --output-dir <PATH>   Output directory (default: raw-data)

use anyhow::{ensure, Result};
use chrono::{Duration, NaiveDate, NaiveTime};
use clap::Parser;
use csv::Writer;
use ops_dashboard::models::{
    CityCsv, DeliveryCsv, DriverCsv, HubCsv, OrderCsv, TIMESTAMP_FORMAT,
};
use ops_dashboard::seed::{CITIES_CSV, DELIVERIES_CSV, DRIVERS_CSV, HUBS_CSV, ORDERS_CSV};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Synthetic data generator for the operations dashboard
#[derive(Parser, Debug)]
#[command(name = "generate_synthetic")]
#[command(about = "Generate synthetic orders and deliveries")]
struct Args {
    /// Number of orders to generate
    #[arg(long, default_value = "5000")]
    orders: usize,

    /// First order date
    #[arg(long, default_value = "2021-01-01")]
    start: NaiveDate,

    /// Last order date
    #[arg(long, default_value = "2021-04-30")]
    end: NaiveDate,

    /// Probability an order is cancelled (0.0 - 1.0)
    #[arg(long, default_value = "0.05")]
    cancel_rate: f64,

    /// Probability a delivery fails (0.0 - 1.0)
    #[arg(long, default_value = "0.03")]
    failure_rate: f64,

    /// Probability a nullable field is left empty (0.0 - 1.0)
    #[arg(long, default_value = "0.01")]
    null_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Output directory
    #[arg(long, default_value = "raw-data")]
    output_dir: PathBuf,
}

const CITIES: &[(&str, &[&str])] = &[
    ("SAO PAULO", &["AVENIDA SHOPPING", "PAULISTA SHOPPING", "SAMPA SHOPPING"]),
    ("RIO DE JANEIRO", &["GOLDEN SHOPPING", "COPACABANA SHOPPING", "NORTE SHOPPING"]),
    ("CURITIBA", &["SMALL SHOPPING", "HOTMILK SHOPPING"]),
    ("PORTO ALEGRE", &["BEACH SHOPPING", "RIVER SHOPPING"]),
];

const FIRST_NAMES: &[&str] = &[
    "Ana", "Bruno", "Carla", "Diego", "Eduarda", "Felipe", "Gabriela", "Hugo", "Isabela", "João",
    "Larissa", "Marcos", "Natália", "Otávio", "Paula", "Rafael",
];
const LAST_NAMES: &[&str] = &["Silva", "Santos", "Oliveira", "Souza", "Lima", "Pereira", "Costa", "Almeida"];

const DRIVERS_PER_HUB: usize = 6;
const PAYMENT_STATUSES: &[&str] = &["PAID", "PAID", "PAID", "PENDING"];

fn write_csv<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> Result<()> {
    let path = dir.join(name);
    let mut writer = Writer::from_path(&path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    println!("  Wrote {:>7} rows to {}", rows.len(), path.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    ensure!(args.start <= args.end, "--start must not be after --end");
    for (name, p) in [
        ("--cancel-rate", args.cancel_rate),
        ("--failure-rate", args.failure_rate),
        ("--null-rate", args.null_rate),
    ] {
        ensure!((0.0..=1.0).contains(&p), "{} must be between 0 and 1", name);
    }

    let mut rng: StdRng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    println!("{}", "=".repeat(60));
    println!("Generating synthetic dashboard data");
    println!("{}", "=".repeat(60));

    let mut cities = Vec::new();
    let mut hubs = Vec::new();
    let mut drivers = Vec::new();
    for (c, (city_name, hub_names)) in CITIES.iter().enumerate() {
        let city_id = (c + 1).to_string();
        cities.push(CityCsv {
            city_id: city_id.clone(),
            city_name: city_name.to_string(),
        });
        for hub_name in hub_names.iter() {
            let hub_id = (hubs.len() + 1).to_string();
            for _ in 0..DRIVERS_PER_HUB {
                let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Driver");
                let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("");
                drivers.push(DriverCsv {
                    driver_id: (drivers.len() + 1).to_string(),
                    driver_name: format!("{} {}", first, last),
                    hub_id: Some(hub_id.clone()),
                });
            }
            hubs.push(HubCsv {
                hub_id,
                hub_name: hub_name.to_string(),
                city_id: city_id.clone(),
            });
        }
    }

    let days = (args.end - args.start).num_days();
    let mut orders = Vec::with_capacity(args.orders);
    let mut deliveries = Vec::with_capacity(args.orders);

    for i in 0..args.orders {
        let order_id = format!("{}", 68_000_000 + i);
        let hub_index = rng.gen_range(0..hubs.len());
        let hub_id = hubs[hub_index].hub_id.clone();

        let date = args.start + Duration::days(rng.gen_range(0..=days));
        let time = NaiveTime::from_num_seconds_from_midnight_opt(rng.gen_range(8 * 3600..23 * 3600), 0)
            .unwrap_or_default();
        let created = date.and_time(time);

        let cancelled = rng.gen_bool(args.cancel_rate);
        let amount = (!rng.gen_bool(args.null_rate))
            .then(|| (rng.gen_range(15.0..450.0_f64) * 100.0).round() / 100.0);

        orders.push(OrderCsv {
            order_id: order_id.clone(),
            hub_id: hub_id.clone(),
            order_status: if cancelled { "CANCELED" } else { "FINISHED" }.to_string(),
            order_amount: amount,
            payment_status: Some(
                if cancelled {
                    "REFUNDED"
                } else {
                    PAYMENT_STATUSES.choose(&mut rng).copied().unwrap_or("PAID")
                }
                .to_string(),
            ),
            order_moment_created: created.format(TIMESTAMP_FORMAT).to_string(),
        });

        if cancelled {
            continue;
        }

        let driver = drivers
            .iter()
            .filter(|d| d.hub_id.as_deref() == Some(hub_id.as_str()))
            .choose(&mut rng)
            .map(|d| d.driver_id.clone());
        let driver_id = if rng.gen_bool(args.null_rate) { None } else { driver };

        let distance: f64 = rng.gen_range(300.0..9_000.0);
        let failed = rng.gen_bool(args.failure_rate);
        let collected = created + Duration::minutes(rng.gen_range(10..45));
        // longer trips take longer, plus traffic noise
        let travel = (distance / 250.0) as i64 + rng.gen_range(5..30);
        let delivered = (!failed && !rng.gen_bool(args.null_rate))
            .then(|| (collected + Duration::minutes(travel)).format(TIMESTAMP_FORMAT).to_string());

        deliveries.push(DeliveryCsv {
            delivery_id: format!("{}", 2_170_000 + deliveries.len()),
            delivery_order_id: order_id,
            driver_id,
            delivery_distance_meters: (!rng.gen_bool(args.null_rate)).then_some(distance.round()),
            delivery_status: if failed { "CANCELLED" } else { "DELIVERED" }.to_string(),
            order_moment_collected: Some(collected.format(TIMESTAMP_FORMAT).to_string()),
            order_moment_delivered: delivered,
        });
    }

    fs::create_dir_all(&args.output_dir)?;
    write_csv(&args.output_dir, CITIES_CSV, &cities)?;
    write_csv(&args.output_dir, HUBS_CSV, &hubs)?;
    write_csv(&args.output_dir, DRIVERS_CSV, &drivers)?;
    write_csv(&args.output_dir, ORDERS_CSV, &orders)?;
    write_csv(&args.output_dir, DELIVERIES_CSV, &deliveries)?;

    println!("{}", "=".repeat(60));
    println!("Done. Load it with: cargo run --release --bin ingest -- --data-dir {}", args.output_dir.display());
    Ok(())
}
