//! Seed loading: reads the five source CSV files from a directory and
//! inserts them into the store.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{info, warn};

use crate::db::Store;
use crate::models::{
    City, CityCsv, DeliveryCsv, DeliveryRow, Driver, DriverCsv, Hub, HubCsv, OrderCsv, OrderRow,
};

pub const CITIES_CSV: &str = "cities.csv";
pub const HUBS_CSV: &str = "hubs.csv";
pub const DRIVERS_CSV: &str = "drivers.csv";
pub const ORDERS_CSV: &str = "orders.csv";
pub const DELIVERIES_CSV: &str = "deliveries.csv";

const MAX_LOGGED_ERRORS: usize = 5;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub cities: usize,
    pub hubs: usize,
    pub drivers: usize,
    pub orders: usize,
    pub deliveries: usize,
    /// Lines that failed to parse or convert and were skipped.
    pub skipped: usize,
}

fn read_csv<T: DeserializeOwned>(path: &Path, skipped: &mut usize) -> Result<Vec<T>> {
    info!("Reading CSV from {:?}", path);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                if *skipped < MAX_LOGGED_ERRORS {
                    warn!("Skipping line {} of {}: {}", i + 2, path.display(), e);
                }
                *skipped += 1;
            }
        }
    }
    Ok(rows)
}

fn convert_orders(rows: Vec<OrderCsv>, skipped: &mut usize) -> Vec<OrderRow> {
    rows.iter()
        .filter_map(|row| match row.to_row() {
            Ok(order) => Some(order),
            Err(e) => {
                if *skipped < MAX_LOGGED_ERRORS {
                    warn!("Skipping order: {:#}", e);
                }
                *skipped += 1;
                None
            }
        })
        .collect()
}

/// Load every seed file in `dir`. The schema must already be initialized.
pub async fn load_directory(store: &Store, dir: &Path, batch_size: usize) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    let mut skipped = 0;

    let cities: Vec<City> = read_csv::<CityCsv>(&dir.join(CITIES_CSV), &mut skipped)?
        .into_iter()
        .map(City::from)
        .collect();
    let hubs: Vec<Hub> = read_csv::<HubCsv>(&dir.join(HUBS_CSV), &mut skipped)?
        .into_iter()
        .map(Hub::from)
        .collect();
    let drivers: Vec<Driver> = read_csv::<DriverCsv>(&dir.join(DRIVERS_CSV), &mut skipped)?
        .into_iter()
        .map(Driver::from)
        .collect();
    let orders = convert_orders(read_csv(&dir.join(ORDERS_CSV), &mut skipped)?, &mut skipped);
    let deliveries: Vec<DeliveryRow> = read_csv::<DeliveryCsv>(&dir.join(DELIVERIES_CSV), &mut skipped)?
        .iter()
        .map(DeliveryCsv::to_row)
        .collect();

    info!("Inserting cities...");
    summary.cities = store.insert_cities(cities, batch_size).await?;
    info!("Inserting hubs...");
    summary.hubs = store.insert_hubs(hubs, batch_size).await?;
    info!("Inserting drivers...");
    summary.drivers = store.insert_drivers(drivers, batch_size).await?;
    info!("Inserting orders...");
    summary.orders = store.insert_orders(orders, batch_size).await?;
    info!("Inserting deliveries...");
    summary.deliveries = store.insert_deliveries(deliveries, batch_size).await?;
    summary.skipped = skipped;

    if skipped > MAX_LOGGED_ERRORS {
        warn!("{} more lines skipped", skipped - MAX_LOGGED_ERRORS);
    }
    info!(
        cities = summary.cities,
        hubs = summary.hubs,
        drivers = summary.drivers,
        orders = summary.orders,
        deliveries = summary.deliveries,
        skipped = summary.skipped,
        "Seed load complete"
    );
    Ok(summary)
}
