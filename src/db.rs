//! SurrealDB-backed data store adapter.
//!
//! The store is opened explicitly and handed to whoever needs it; there is no
//! process-wide connection. Reads type every row at this boundary, so the
//! aggregator only ever sees [`Record`]s.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;
use tracing::{debug, info, warn};

use crate::error::{DashboardError, Result};
use crate::models::{
    City, Delivery, DeliveryOutcome, DeliveryRow, Driver, Hub, Order, OrderRow, OrderStatus,
    PaymentStatus, Record, RecordSet, DATE_FORMAT, TIMESTAMP_FORMAT,
};
use crate::query::{DateRange, LocationFilter};

pub type DbConn = Surreal<Db>;

const NAMESPACE: &str = "ops";
const DATABASE: &str = "ecommerce";

/// Read-mostly handle on the orders database.
pub struct Store {
    db: DbConn,
}

/// Hub name and city name, resolved from the hub and city tables.
struct Location {
    hub: String,
    city: String,
}

impl Store {
    /// Open a RocksDB-backed store at `path`.
    pub async fn open(path: &str) -> Result<Self> {
        let db = Surreal::new::<RocksDb>(path)
            .await
            .map_err(DashboardError::unavailable("opening the database"))?;
        info!(path, "Opened store");
        Self::select_namespace(db).await
    }

    /// In-memory store, used by tests and throwaway runs.
    pub async fn memory() -> Result<Self> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(DashboardError::unavailable("opening the in-memory database"))?;
        Self::select_namespace(db).await
    }

    async fn select_namespace(db: DbConn) -> Result<Self> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(DashboardError::unavailable("selecting the namespace"))?;
        Ok(Self { db })
    }

    /// Release the underlying connection.
    pub fn close(self) {
        debug!("Closing store");
        drop(self.db);
    }

    /// Define tables and indexes. Safe to run against an existing database.
    pub async fn init_schema(&self) -> Result<()> {
        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS cities SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_city_id ON cities FIELDS city_id UNIQUE;

                DEFINE TABLE IF NOT EXISTS hubs SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_hub_id ON hubs FIELDS hub_id UNIQUE;

                DEFINE TABLE IF NOT EXISTS drivers SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_driver_id ON drivers FIELDS driver_id UNIQUE;

                DEFINE TABLE IF NOT EXISTS orders SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_order_id ON orders FIELDS order_id UNIQUE;
                DEFINE INDEX IF NOT EXISTS idx_order_date ON orders FIELDS order_date;
                DEFINE INDEX IF NOT EXISTS idx_order_hub ON orders FIELDS hub_id;

                DEFINE TABLE IF NOT EXISTS deliveries SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_delivery_id ON deliveries FIELDS delivery_id UNIQUE;
                DEFINE INDEX IF NOT EXISTS idx_delivery_order ON deliveries FIELDS order_id;
                "#,
            )
            .await
            .map_err(DashboardError::unavailable("defining the schema"))?
            .check()
            .map_err(DashboardError::unavailable("defining the schema"))?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Seeding (bootstrap only, not part of the read path)
    // ------------------------------------------------------------------------

    async fn insert_rows<T>(&self, table: &'static str, rows: Vec<T>, batch_size: usize) -> Result<usize>
    where
        T: Serialize + Clone + 'static,
    {
        let total = rows.len();
        for batch in rows.chunks(batch_size.max(1)) {
            self.db
                .query(format!("INSERT INTO {} $rows", table))
                .bind(("rows", batch.to_vec()))
                .await
                .map_err(DashboardError::unavailable("inserting rows"))?
                .check()
                .map_err(DashboardError::unavailable("inserting rows"))?;
            debug!(table, batch = batch.len(), "Inserted batch");
        }
        Ok(total)
    }

    pub async fn insert_cities(&self, rows: Vec<City>, batch_size: usize) -> Result<usize> {
        self.insert_rows("cities", rows, batch_size).await
    }

    pub async fn insert_hubs(&self, rows: Vec<Hub>, batch_size: usize) -> Result<usize> {
        self.insert_rows("hubs", rows, batch_size).await
    }

    pub async fn insert_drivers(&self, rows: Vec<Driver>, batch_size: usize) -> Result<usize> {
        self.insert_rows("drivers", rows, batch_size).await
    }

    pub async fn insert_orders(&self, rows: Vec<OrderRow>, batch_size: usize) -> Result<usize> {
        self.insert_rows("orders", rows, batch_size).await
    }

    pub async fn insert_deliveries(&self, rows: Vec<DeliveryRow>, batch_size: usize) -> Result<usize> {
        self.insert_rows("deliveries", rows, batch_size).await
    }

    // ------------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------------

    /// Earliest and latest order dates, `None` for an empty store.
    pub async fn date_bounds(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let mut response = self
            .db
            .query("SELECT VALUE order_date FROM orders ORDER BY order_date ASC LIMIT 1")
            .query("SELECT VALUE order_date FROM orders ORDER BY order_date DESC LIMIT 1")
            .await
            .map_err(DashboardError::unavailable("reading date bounds"))?;
        let first: Vec<String> = response
            .take(0)
            .map_err(DashboardError::unavailable("reading date bounds"))?;
        let last: Vec<String> = response
            .take(1)
            .map_err(DashboardError::unavailable("reading date bounds"))?;

        let parse = |v: Option<&String>| v.and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok());
        Ok(parse(first.first()).zip(parse(last.first())))
    }

    async fn locations(&self) -> Result<HashMap<String, Location>> {
        let mut response = self
            .db
            .query("SELECT city_id, city_name FROM cities")
            .query("SELECT hub_id, hub_name, city_id FROM hubs")
            .await
            .map_err(DashboardError::unavailable("reading hubs and cities"))?;
        let cities: Vec<City> = response
            .take(0)
            .map_err(DashboardError::unavailable("reading cities"))?;
        let hubs: Vec<Hub> = response
            .take(1)
            .map_err(DashboardError::unavailable("reading hubs"))?;

        let city_names: HashMap<String, String> =
            cities.into_iter().map(|c| (c.city_id, c.city_name)).collect();

        let mut locations = HashMap::with_capacity(hubs.len());
        for hub in hubs {
            match city_names.get(&hub.city_id) {
                Some(city) => {
                    locations.insert(
                        hub.hub_id,
                        Location {
                            hub: hub.hub_name,
                            city: city.clone(),
                        },
                    );
                }
                None => warn!(hub_id = %hub.hub_id, city_id = %hub.city_id, "Hub references unknown city"),
            }
        }
        Ok(locations)
    }

    async fn driver_names(&self, ids: Vec<String>) -> Result<HashMap<String, String>> {
        let drivers: Vec<Driver> = self
            .db
            .query("SELECT driver_id, driver_name, hub_id FROM drivers WHERE driver_id INSIDE $ids")
            .bind(("ids", ids))
            .await
            .map_err(DashboardError::unavailable("reading drivers"))?
            .take(0)
            .map_err(DashboardError::unavailable("reading drivers"))?;
        Ok(drivers.into_iter().map(|d| (d.driver_id, d.driver_name)).collect())
    }

    /// Orders placed within `range` (inclusive) at a matching city/hub, each
    /// joined with its delivery if it has one.
    pub async fn fetch(&self, range: &DateRange, filters: &LocationFilter) -> Result<RecordSet> {
        range.validate()?;

        let locations = self.locations().await?;
        let hub_ids: Vec<String> = locations
            .iter()
            .filter(|(_, loc)| filters.matches(&loc.city, &loc.hub))
            .map(|(id, _)| id.clone())
            .collect();

        let mut set = RecordSet::empty(*range, filters.clone());
        if !filters.is_empty() && hub_ids.is_empty() {
            debug!(?filters, "No hub matches the location filter");
            return Ok(set);
        }

        let mut sql = String::from(
            "SELECT order_id, hub_id, status, amount, payment_status, placed_at, order_date \
             FROM orders WHERE order_date >= $start AND order_date <= $end",
        );
        if !filters.is_empty() {
            sql.push_str(" AND hub_id INSIDE $hub_ids");
        }
        sql.push_str(" ORDER BY order_id ASC");

        let mut order_rows: Vec<OrderRow> = self
            .db
            .query(sql)
            .bind(("start", range.start.format(DATE_FORMAT).to_string()))
            .bind(("end", range.end.format(DATE_FORMAT).to_string()))
            .bind(("hub_ids", hub_ids))
            .await
            .map_err(DashboardError::unavailable("querying orders"))?
            .take(0)
            .map_err(DashboardError::unavailable("querying orders"))?;
        order_rows.sort_by(|a, b| a.order_id.cmp(&b.order_id));

        let mut orders = Vec::with_capacity(order_rows.len());
        for row in order_rows {
            match type_order(row, &locations) {
                Ok(order) => orders.push(order),
                Err(reason) => {
                    warn!(%reason, "Rejected order row");
                    set.rejected += 1;
                }
            }
        }

        if orders.is_empty() {
            info!(start = %range.start, end = %range.end, rejected = set.rejected, "Fetched empty record set");
            return Ok(set);
        }

        let order_ids: Vec<String> = orders.iter().map(|o| o.order_id.clone()).collect();
        let mut delivery_rows: Vec<DeliveryRow> = self
            .db
            .query(
                "SELECT delivery_id, order_id, driver_id, distance_meters, duration_minutes, status \
                 FROM deliveries WHERE order_id INSIDE $order_ids",
            )
            .bind(("order_ids", order_ids))
            .await
            .map_err(DashboardError::unavailable("querying deliveries"))?
            .take(0)
            .map_err(DashboardError::unavailable("querying deliveries"))?;
        delivery_rows.sort_by(|a, b| a.delivery_id.cmp(&b.delivery_id));

        // one delivery per order: the lowest delivery id wins
        let mut deliveries: BTreeMap<String, DeliveryRow> = BTreeMap::new();
        for row in delivery_rows {
            if deliveries.contains_key(&row.order_id) {
                warn!(delivery_id = %row.delivery_id, order_id = %row.order_id, "Rejected duplicate delivery");
                set.rejected += 1;
                continue;
            }
            deliveries.insert(row.order_id.clone(), row);
        }

        let mut driver_ids: Vec<String> = deliveries
            .values()
            .filter_map(|d| d.driver_id.clone())
            .collect();
        driver_ids.sort();
        driver_ids.dedup();
        let names = self.driver_names(driver_ids).await?;

        set.records = orders
            .into_iter()
            .map(|order| {
                let delivery = deliveries
                    .remove(&order.order_id)
                    .map(|row| type_delivery(row, &names));
                Record { order, delivery }
            })
            .collect();

        info!(
            start = %range.start,
            end = %range.end,
            records = set.records.len(),
            rejected = set.rejected,
            "Fetched record set"
        );
        Ok(set)
    }
}

/// Negative measurements break the model's invariants and are treated as missing.
fn non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn type_order(row: OrderRow, locations: &HashMap<String, Location>) -> std::result::Result<Order, String> {
    let status = OrderStatus::parse(&row.status)
        .ok_or_else(|| format!("order {}: unknown status {:?}", row.order_id, row.status))?;
    let placed_at = NaiveDateTime::parse_from_str(&row.placed_at, TIMESTAMP_FORMAT)
        .map_err(|e| format!("order {}: bad timestamp {:?}: {}", row.order_id, row.placed_at, e))?;
    let location = locations
        .get(&row.hub_id)
        .ok_or_else(|| format!("order {}: unknown hub {:?}", row.order_id, row.hub_id))?;

    Ok(Order {
        placed_at,
        status,
        city: location.city.clone(),
        hub: location.hub.clone(),
        amount: non_negative(row.amount),
        payment_status: row.payment_status.as_deref().and_then(PaymentStatus::parse),
        order_id: row.order_id,
    })
}

fn type_delivery(row: DeliveryRow, names: &HashMap<String, String>) -> Delivery {
    Delivery {
        driver_name: row.driver_id.as_ref().and_then(|id| names.get(id).cloned()),
        outcome: DeliveryOutcome::from(row.status.as_str()),
        distance_meters: non_negative(row.distance_meters),
        duration_minutes: non_negative(row.duration_minutes),
        driver_id: row.driver_id,
        delivery_id: row.delivery_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order_row(id: &str, hub: &str, status: &str, amount: Option<f64>, placed_at: &str) -> OrderRow {
        OrderRow {
            order_id: id.to_string(),
            hub_id: hub.to_string(),
            status: status.to_string(),
            amount,
            payment_status: Some("PAID".to_string()),
            placed_at: placed_at.to_string(),
            order_date: placed_at[..10].to_string(),
        }
    }

    fn delivery_row(id: &str, order: &str, driver: Option<&str>, minutes: Option<f64>, status: &str) -> DeliveryRow {
        DeliveryRow {
            delivery_id: id.to_string(),
            order_id: order.to_string(),
            driver_id: driver.map(str::to_string),
            distance_meters: Some(2500.0),
            duration_minutes: minutes,
            status: status.to_string(),
        }
    }

    async fn seeded() -> Store {
        let store = Store::memory().await.unwrap();
        store.init_schema().await.unwrap();
        store
            .insert_cities(
                vec![
                    City { city_id: "1".into(), city_name: "CURITIBA".into() },
                    City { city_id: "2".into(), city_name: "RIO DE JANEIRO".into() },
                ],
                10,
            )
            .await
            .unwrap();
        store
            .insert_hubs(
                vec![
                    Hub { hub_id: "10".into(), hub_name: "GOLDEN SHOPPING".into(), city_id: "1".into() },
                    Hub { hub_id: "20".into(), hub_name: "COPA SHOPPING".into(), city_id: "2".into() },
                ],
                10,
            )
            .await
            .unwrap();
        store
            .insert_drivers(
                vec![Driver { driver_id: "d1".into(), driver_name: "Ana".into(), hub_id: Some("10".into()) }],
                10,
            )
            .await
            .unwrap();
        store
            .insert_orders(
                vec![
                    order_row("o1", "10", "DELIVERED", Some(100.0), "2021-01-01 09:00:00"),
                    order_row("o2", "10", "CANCELLED", Some(0.0), "2021-01-15 12:30:00"),
                    order_row("o3", "20", "DELIVERED", Some(200.0), "2021-01-31 23:59:59"),
                    order_row("o4", "20", "DELIVERED", Some(50.0), "2021-02-01 00:00:00"),
                    order_row("o5", "20", "LOST", Some(10.0), "2021-01-20 10:00:00"),
                    order_row("o6", "10", "PLACED", Some(-5.0), "2021-01-21 10:00:00"),
                ],
                2,
            )
            .await
            .unwrap();
        store
            .insert_deliveries(
                vec![
                    delivery_row("x1", "o1", Some("d1"), Some(35.0), "DELIVERED"),
                    delivery_row("x3", "o3", None, None, "DELIVERED"),
                    delivery_row("x9", "o3", Some("d1"), Some(10.0), "DELIVERED"),
                ],
                10,
            )
            .await
            .unwrap();
        store
    }

    fn january() -> DateRange {
        DateRange::new(date(2021, 1, 1), date(2021, 1, 31)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_inclusive_range_and_join() {
        let store = seeded().await;
        let set = store.fetch(&january(), &LocationFilter::default()).await.unwrap();

        let ids: Vec<&str> = set.records.iter().map(|r| r.order.order_id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o2", "o3", "o6"]);

        let o1 = &set.records[0];
        assert_eq!(o1.order.city, "CURITIBA");
        assert_eq!(o1.order.hub, "GOLDEN SHOPPING");
        assert_eq!(o1.order.payment_status, Some(PaymentStatus::Paid));
        let delivery = o1.delivery.as_ref().unwrap();
        assert_eq!(delivery.driver_name.as_deref(), Some("Ana"));
        assert_eq!(delivery.duration_minutes, Some(35.0));

        // cancelled order has no delivery but stays in the set
        assert!(set.records[1].delivery.is_none());
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_rows() {
        let store = seeded().await;
        let set = store.fetch(&january(), &LocationFilter::default()).await.unwrap();

        // o5 has an unknown status, x9 duplicates o3's delivery
        assert_eq!(set.rejected, 2);
        let o3 = set.records.iter().find(|r| r.order.order_id == "o3").unwrap();
        assert_eq!(o3.delivery.as_ref().map(|d| d.delivery_id.as_str()), Some("x3"));

        let o6 = set.records.iter().find(|r| r.order.order_id == "o6").unwrap();
        assert_eq!(o6.order.amount, None);
    }

    #[tokio::test]
    async fn test_fetch_location_filters() {
        let store = seeded().await;

        let rio = LocationFilter::new(["RIO DE JANEIRO"], Vec::<String>::new());
        let set = store.fetch(&january(), &rio).await.unwrap();
        assert!(set.records.iter().all(|r| r.order.city == "RIO DE JANEIRO"));
        assert_eq!(set.len(), 1);

        let mismatch = LocationFilter::new(["RIO DE JANEIRO"], ["GOLDEN SHOPPING"]);
        assert!(store.fetch(&january(), &mismatch).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_empty_range_is_not_an_error() {
        let store = seeded().await;
        let range = DateRange::new(date(2030, 1, 1), date(2030, 12, 31)).unwrap();
        let set = store.fetch(&range, &LocationFilter::default()).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(set.rejected, 0);
    }

    #[tokio::test]
    async fn test_open_unreachable_path_is_data_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().join("db");
        let err = match Store::open(&path.to_string_lossy()).await {
            Ok(_) => panic!("opened a store beneath a regular file"),
            Err(e) => e,
        };
        assert!(matches!(err, DashboardError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_inverted_range() {
        let store = Store::memory().await.unwrap();
        let range = DateRange {
            start: date(2021, 4, 30),
            end: date(2021, 1, 1),
        };
        let err = store.fetch(&range, &LocationFilter::default()).await.unwrap_err();
        assert!(matches!(err, DashboardError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn test_date_bounds() {
        let store = seeded().await;
        assert_eq!(
            store.date_bounds().await.unwrap(),
            Some((date(2021, 1, 1), date(2021, 2, 1)))
        );

        let empty = Store::memory().await.unwrap();
        assert_eq!(empty.date_bounds().await.unwrap(), None);
        empty.close();
    }
}
