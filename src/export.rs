//! Flat-file exports: the joined record set plus the three downloadable
//! metric tables (orders, drivers, revenue).

use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::metrics::KpiReport;
use crate::models::{RecordSet, TIMESTAMP_FORMAT};

pub const RECORDS_FILE: &str = "records.csv";
pub const ORDER_METRICS_FILE: &str = "order_metrics.csv";
pub const DRIVER_METRICS_FILE: &str = "driver_metrics.csv";
pub const REVENUE_METRICS_FILE: &str = "revenue_metrics.csv";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One Order+Delivery row, same columns as the record set.
#[derive(Debug, Serialize)]
pub struct ExportRow<'a> {
    pub order_id: &'a str,
    pub placed_at: String,
    pub status: &'static str,
    pub city: &'a str,
    pub hub: &'a str,
    pub amount: Option<f64>,
    pub payment_status: Option<&'static str>,
    pub delivery_id: Option<&'a str>,
    pub driver_id: Option<&'a str>,
    pub driver_name: Option<&'a str>,
    pub distance_meters: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub delivery_outcome: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct OrderMetricsRow<'a> {
    pub city: &'a str,
    pub hub: &'a str,
    pub total_orders: usize,
    pub cancelled_orders: usize,
    pub cancelled_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct DriverMetricsRow<'a> {
    pub driver_id: &'a str,
    pub driver_name: Option<&'a str>,
    pub total_deliveries: usize,
    pub avg_delivery_distance: Option<f64>,
    pub delivery_failure_count: usize,
    pub delivery_fail_rate_percent: f64,
    pub avg_delivery_time_mins: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RevenueMetricsRow<'a> {
    pub city: &'a str,
    pub hub: &'a str,
    pub total_orders: usize,
    pub total_revenue: f64,
    pub avg_order_value: f64,
}

pub fn record_rows(set: &RecordSet) -> impl Iterator<Item = ExportRow<'_>> {
    set.records.iter().map(|r| {
        let delivery = r.delivery.as_ref();
        ExportRow {
            order_id: &r.order.order_id,
            placed_at: r.order.placed_at.format(TIMESTAMP_FORMAT).to_string(),
            status: r.order.status.as_str(),
            city: &r.order.city,
            hub: &r.order.hub,
            amount: r.order.amount,
            payment_status: r.order.payment_status.map(|p| p.as_str()),
            delivery_id: delivery.map(|d| d.delivery_id.as_str()),
            driver_id: delivery.and_then(|d| d.driver_id.as_deref()),
            driver_name: delivery.and_then(|d| d.driver_name.as_deref()),
            distance_meters: delivery.and_then(|d| d.distance_meters),
            duration_minutes: delivery.and_then(|d| d.duration_minutes),
            delivery_outcome: delivery.map(|d| d.outcome.as_str()),
        }
    })
}

pub fn order_metrics_rows(report: &KpiReport) -> impl Iterator<Item = OrderMetricsRow<'_>> {
    report.by_city_hub.iter().map(|e| OrderMetricsRow {
        city: &e.key.0,
        hub: &e.key.1,
        total_orders: e.value.total_orders,
        cancelled_orders: e.value.cancelled_orders,
        cancelled_percent: round2(e.value.cancellation_rate * 100.0),
    })
}

pub fn driver_metrics_rows(report: &KpiReport) -> impl Iterator<Item = DriverMetricsRow<'_>> {
    report.drivers.iter().map(|d| DriverMetricsRow {
        driver_id: &d.driver_id,
        driver_name: d.driver_name.as_deref(),
        total_deliveries: d.deliveries,
        avg_delivery_distance: d.avg_distance_meters.map(round2),
        delivery_failure_count: d.failures,
        delivery_fail_rate_percent: round2(d.failure_rate * 100.0),
        avg_delivery_time_mins: d.avg_delivery_minutes.map(round2),
    })
}

pub fn revenue_metrics_rows(report: &KpiReport) -> impl Iterator<Item = RevenueMetricsRow<'_>> {
    report.by_city_hub.iter().map(|e| RevenueMetricsRow {
        city: &e.key.0,
        hub: &e.key.1,
        total_orders: e.value.revenue_orders,
        total_revenue: round2(e.value.total_revenue),
        avg_order_value: round2(e.value.average_order_value),
    })
}

/// Serialize `rows` as CSV with a header line. An empty table still gets its
/// header when `header` is supplied.
pub fn write_csv<W, R>(writer: W, header: &[&str], rows: impl IntoIterator<Item = R>) -> csv::Result<W>
where
    W: io::Write,
    R: Serialize,
{
    let mut rows = rows.into_iter().peekable();
    let mut out: Writer<W> = WriterBuilder::new()
        .has_headers(rows.peek().is_some())
        .from_writer(writer);
    if rows.peek().is_none() {
        out.write_record(header)?;
    }
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    out.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

pub const RECORD_HEADER: &[&str] = &[
    "order_id",
    "placed_at",
    "status",
    "city",
    "hub",
    "amount",
    "payment_status",
    "delivery_id",
    "driver_id",
    "driver_name",
    "distance_meters",
    "duration_minutes",
    "delivery_outcome",
];
pub const ORDER_METRICS_HEADER: &[&str] =
    &["city", "hub", "total_orders", "cancelled_orders", "cancelled_percent"];
pub const DRIVER_METRICS_HEADER: &[&str] = &[
    "driver_id",
    "driver_name",
    "total_deliveries",
    "avg_delivery_distance",
    "delivery_failure_count",
    "delivery_fail_rate_percent",
    "avg_delivery_time_mins",
];
pub const REVENUE_METRICS_HEADER: &[&str] =
    &["city", "hub", "total_orders", "total_revenue", "avg_order_value"];

pub fn records_csv(set: &RecordSet) -> csv::Result<Vec<u8>> {
    write_csv(Vec::new(), RECORD_HEADER, record_rows(set))
}

pub fn order_metrics_csv(report: &KpiReport) -> csv::Result<Vec<u8>> {
    write_csv(Vec::new(), ORDER_METRICS_HEADER, order_metrics_rows(report))
}

pub fn driver_metrics_csv(report: &KpiReport) -> csv::Result<Vec<u8>> {
    write_csv(Vec::new(), DRIVER_METRICS_HEADER, driver_metrics_rows(report))
}

pub fn revenue_metrics_csv(report: &KpiReport) -> csv::Result<Vec<u8>> {
    write_csv(Vec::new(), REVENUE_METRICS_HEADER, revenue_metrics_rows(report))
}

/// Write all four files into `dir`, creating it if needed.
pub fn export_dir(dir: &Path, set: &RecordSet, report: &KpiReport) -> csv::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let files = [
        (RECORDS_FILE, records_csv(set)?),
        (ORDER_METRICS_FILE, order_metrics_csv(report)?),
        (DRIVER_METRICS_FILE, driver_metrics_csv(report)?),
        (REVENUE_METRICS_FILE, revenue_metrics_csv(report)?),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let path = dir.join(name);
        fs::write(&path, bytes)?;
        info!(path = %path.display(), "Wrote export");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::{delivered, order};
    use crate::metrics::DistanceBands;
    use crate::models::{DeliveryOutcome, OrderStatus};
    use crate::query::{DateRange, LocationFilter};
    use chrono::NaiveDate;

    fn sample_set() -> RecordSet {
        RecordSet {
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
            )
            .unwrap(),
            filters: LocationFilter::default(),
            records: vec![
                delivered(
                    order("1", "CURITIBA", "GOLDEN", OrderStatus::Delivered, Some(10.0)),
                    Some("d1"),
                    Some(1234.567),
                    Some(22.222),
                    DeliveryOutcome::Success,
                ),
                order("2", "CURITIBA", "GOLDEN", OrderStatus::Cancelled, Some(5.0)),
                order("3", "CURITIBA", "GOLDEN", OrderStatus::Delivered, Some(20.0)),
            ],
            rejected: 0,
        }
    }

    fn lines(bytes: Vec<u8>) -> Vec<String> {
        String::from_utf8(bytes).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn test_records_csv_one_row_per_order() {
        let out = lines(records_csv(&sample_set()).unwrap());
        assert_eq!(out[0], RECORD_HEADER.join(","));
        assert_eq!(out.len(), 4);
        assert_eq!(
            out[1],
            "1,2021-01-01 12:00:00,DELIVERED,CURITIBA,GOLDEN,10.0,,d-1,d1,Driver d1,1234.567,22.222,DELIVERED"
        );
        assert!(out[2].starts_with("2,2021-01-01 12:00:00,CANCELLED,"));
    }

    #[test]
    fn test_metric_tables_are_rounded() {
        let set = sample_set();
        let report = KpiReport::build(&set, &DistanceBands::default());

        let orders = lines(order_metrics_csv(&report).unwrap());
        assert_eq!(orders[1], "CURITIBA,GOLDEN,3,1,33.33");

        let drivers = lines(driver_metrics_csv(&report).unwrap());
        assert_eq!(drivers[1], "d1,Driver d1,1,1234.57,0,0.0,22.22");

        let revenue = lines(revenue_metrics_csv(&report).unwrap());
        assert_eq!(revenue[1], "CURITIBA,GOLDEN,2,30.0,15.0");
    }

    #[test]
    fn test_empty_tables_keep_header() {
        let mut set = sample_set();
        set.records.clear();
        let report = KpiReport::build(&set, &DistanceBands::default());
        assert_eq!(lines(driver_metrics_csv(&report).unwrap()), vec![DRIVER_METRICS_HEADER.join(",")]);
        assert_eq!(lines(records_csv(&set).unwrap()), vec![RECORD_HEADER.join(",")]);
    }

    #[test]
    fn test_export_dir_writes_four_files() {
        let dir = tempfile::tempdir().unwrap();
        let set = sample_set();
        let report = KpiReport::build(&set, &DistanceBands::default());
        let written = export_dir(&dir.path().join("out"), &set, &report).unwrap();
        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|p| p.exists()));
    }
}
