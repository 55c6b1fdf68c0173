use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::query::{DateRange, LocationFilter};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Closed status sets
// ============================================================================

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Cancelled,
    Delivered,
    Failed,
}

impl OrderStatus {
    /// Parse a store status string. `FINISHED` and `CANCELED` are the legacy
    /// spellings used by the source dataset.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLACED" => Some(OrderStatus::Placed),
            "CANCELLED" | "CANCELED" => Some(OrderStatus::Cancelled),
            "DELIVERED" | "FINISHED" => Some(OrderStatus::Delivered),
            "FAILED" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAID" => Some(PaymentStatus::Paid),
            "PENDING" => Some(PaymentStatus::Pending),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

/// Delivery outcome. Anything other than `DELIVERED` counts as a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Success,
    Failure,
}

impl From<&str> for DeliveryOutcome {
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("DELIVERED") {
            DeliveryOutcome::Success
        } else {
            DeliveryOutcome::Failure
        }
    }
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Success => "DELIVERED",
            DeliveryOutcome::Failure => "FAILED",
        }
    }
}

// ============================================================================
// Stored rows (shape of the SurrealDB tables)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub city_id: String,
    pub city_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub hub_id: String,
    pub hub_name: String,
    pub city_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub driver_id: String,
    pub driver_name: String,
    pub hub_id: Option<String>,
}

/// Order row as stored. Status and timestamps stay untyped until the adapter
/// boundary so one bad row cannot fail a whole query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRow {
    pub order_id: String,
    pub hub_id: String,
    pub status: String,
    pub amount: Option<f64>,
    pub payment_status: Option<String>,
    pub placed_at: String,
    pub order_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRow {
    pub delivery_id: String,
    pub order_id: String,
    pub driver_id: Option<String>,
    pub distance_meters: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub status: String,
}

// ============================================================================
// Typed records (what the aggregator consumes)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub placed_at: NaiveDateTime,
    pub status: OrderStatus,
    pub city: String,
    pub hub: String,
    pub amount: Option<f64>,
    pub payment_status: Option<PaymentStatus>,
}

impl Order {
    pub fn placed_on(&self) -> NaiveDate {
        self.placed_at.date()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub delivery_id: String,
    pub driver_id: Option<String>,
    pub driver_name: Option<String>,
    pub distance_meters: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub outcome: DeliveryOutcome,
}

impl Delivery {
    pub fn is_success(&self) -> bool {
        self.outcome == DeliveryOutcome::Success
    }
}

/// One Order joined with its (at most one) Delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub order: Order,
    pub delivery: Option<Delivery>,
}

impl Record {
    pub fn city(&self) -> &str {
        &self.order.city
    }

    pub fn hub(&self) -> &str {
        &self.order.hub
    }
}

/// Result of a single adapter query.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSet {
    pub range: DateRange,
    pub filters: LocationFilter,
    pub records: Vec<Record>,
    /// Rows dropped at the adapter boundary because a required field could not be typed
    pub rejected: usize,
}

impl RecordSet {
    pub fn empty(range: DateRange, filters: LocationFilter) -> Self {
        Self {
            range,
            filters,
            records: Vec::new(),
            rejected: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Seed CSV files
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityCsv {
    pub city_id: String,
    pub city_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubCsv {
    pub hub_id: String,
    pub hub_name: String,
    pub city_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverCsv {
    pub driver_id: String,
    pub driver_name: String,
    pub hub_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCsv {
    pub order_id: String,
    pub hub_id: String,
    pub order_status: String,
    pub order_amount: Option<f64>,
    pub payment_status: Option<String>,
    pub order_moment_created: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCsv {
    pub delivery_id: String,
    pub delivery_order_id: String,
    pub driver_id: Option<String>,
    pub delivery_distance_meters: Option<f64>,
    pub delivery_status: String,
    pub order_moment_collected: Option<String>,
    pub order_moment_delivered: Option<String>,
}

impl From<CityCsv> for City {
    fn from(c: CityCsv) -> Self {
        City {
            city_id: c.city_id,
            city_name: c.city_name,
        }
    }
}

impl From<HubCsv> for Hub {
    fn from(h: HubCsv) -> Self {
        Hub {
            hub_id: h.hub_id,
            hub_name: h.hub_name,
            city_id: h.city_id,
        }
    }
}

impl From<DriverCsv> for Driver {
    fn from(d: DriverCsv) -> Self {
        Driver {
            driver_id: d.driver_id,
            driver_name: d.driver_name,
            hub_id: d.hub_id.filter(|h| !h.is_empty()),
        }
    }
}

impl OrderCsv {
    pub fn to_row(&self) -> anyhow::Result<OrderRow> {
        let placed_at = NaiveDateTime::parse_from_str(self.order_moment_created.trim(), TIMESTAMP_FORMAT)
            .with_context(|| format!("order {}: bad timestamp {:?}", self.order_id, self.order_moment_created))?;
        let Some(status) = OrderStatus::parse(&self.order_status) else {
            bail!("order {}: unknown status {:?}", self.order_id, self.order_status);
        };

        Ok(OrderRow {
            order_id: self.order_id.clone(),
            hub_id: self.hub_id.clone(),
            status: status.as_str().to_string(),
            amount: self.order_amount,
            payment_status: self.payment_status.clone().filter(|p| !p.is_empty()),
            placed_at: placed_at.format(TIMESTAMP_FORMAT).to_string(),
            order_date: placed_at.format(DATE_FORMAT).to_string(),
        })
    }
}

impl DeliveryCsv {
    /// Collected-to-delivered interval in minutes. Missing, unparsable or
    /// negative intervals yield `None`.
    pub fn duration_minutes(&self) -> Option<f64> {
        let parse = |s: &Option<String>| {
            s.as_deref()
                .and_then(|v| NaiveDateTime::parse_from_str(v.trim(), TIMESTAMP_FORMAT).ok())
        };
        let collected = parse(&self.order_moment_collected)?;
        let delivered = parse(&self.order_moment_delivered)?;
        let minutes = (delivered - collected).num_seconds() as f64 / 60.0;
        (minutes >= 0.0).then_some(minutes)
    }

    pub fn to_row(&self) -> DeliveryRow {
        DeliveryRow {
            delivery_id: self.delivery_id.clone(),
            order_id: self.delivery_order_id.clone(),
            driver_id: self.driver_id.clone().filter(|d| !d.is_empty()),
            distance_meters: self.delivery_distance_meters,
            duration_minutes: self.duration_minutes(),
            status: DeliveryOutcome::from(self.delivery_status.as_str()).as_str().to_string(),
        }
    }
}
