//! Metrics aggregation over a fetched [`RecordSet`](crate::models::RecordSet).
//!
//! Every function here is pure: same records in, same numbers out. Rates
//! short-circuit division by zero to `0.0`, and rows with a missing field are
//! skipped by the KPI that needs that field and reported as a
//! [`DataQualityWarning`] instead of failing the computation.

pub mod breakdown;
pub mod distance;
pub mod drivers;
pub mod kpi;
pub mod report;
pub mod series;

use serde::Serialize;

pub use breakdown::{
    breakdown, by_city, by_city_hub, by_hub, measured_breakdown, Breakdown, GroupEntry,
};
pub use distance::{distance_performance, BandPerformance, DistanceBand, DistanceBands};
pub use drivers::{driver_performance, DriverPerformance};
pub use kpi::KpiSummary;
pub use report::KpiReport;
pub use series::{daily_series, DailyPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kpi {
    TotalRevenue,
    AverageOrderValue,
    AverageDeliveryTime,
    DriverFailureRate,
    DistancePerformance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Amount,
    Duration,
    Driver,
    Distance,
}

/// Rows left out of one KPI because `field` was null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityWarning {
    pub kpi: Kpi,
    pub field: Field,
    pub count: usize,
}

/// A KPI value plus the data quality warnings raised while computing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measured<T> {
    pub value: T,
    pub warnings: Vec<DataQualityWarning>,
}

impl<T> Measured<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn warn_if(mut self, kpi: Kpi, field: Field, count: usize) -> Self {
        if count > 0 {
            self.warnings.push(DataQualityWarning { kpi, field, count });
        }
        self
    }

    pub fn warning(&self, kpi: Kpi) -> Option<&DataQualityWarning> {
        self.warnings.iter().find(|w| w.kpi == kpi)
    }

    pub fn into_parts(self) -> (T, Vec<DataQualityWarning>) {
        (self.value, self.warnings)
    }
}

pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
