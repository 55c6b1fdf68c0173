use serde::Serialize;
use std::collections::BTreeMap;

use super::{mean, ratio, Field, Kpi, Measured};
use crate::models::Record;

/// Per-driver delivery performance. Failure rate is the primary figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverPerformance {
    pub driver_id: String,
    pub driver_name: Option<String>,
    pub deliveries: usize,
    pub failures: usize,
    pub failure_rate: f64,
    pub avg_distance_meters: Option<f64>,
    pub avg_delivery_minutes: Option<f64>,
}

#[derive(Default)]
struct DriverTally<'a> {
    name: Option<&'a str>,
    deliveries: usize,
    failures: usize,
    distances: Vec<f64>,
    durations: Vec<f64>,
}

/// Failure rate per driver. Only drivers with at least one delivery appear;
/// deliveries without a driver are excluded and reported.
pub fn driver_performance<'a>(
    records: impl IntoIterator<Item = &'a Record>,
) -> Measured<Vec<DriverPerformance>> {
    let mut tallies: BTreeMap<&'a str, DriverTally<'a>> = BTreeMap::new();
    let mut unassigned = 0;

    for delivery in records.into_iter().filter_map(|r| r.delivery.as_ref()) {
        let Some(driver_id) = delivery.driver_id.as_deref() else {
            unassigned += 1;
            continue;
        };
        let tally = tallies.entry(driver_id).or_default();
        tally.name = tally.name.or(delivery.driver_name.as_deref());
        tally.deliveries += 1;
        if !delivery.is_success() {
            tally.failures += 1;
        }
        if let Some(distance) = delivery.distance_meters {
            tally.distances.push(distance);
        }
        if let (true, Some(minutes)) = (delivery.is_success(), delivery.duration_minutes) {
            tally.durations.push(minutes);
        }
    }

    let mut drivers: Vec<DriverPerformance> = tallies
        .into_iter()
        .map(|(driver_id, t)| DriverPerformance {
            driver_id: driver_id.to_string(),
            driver_name: t.name.map(str::to_string),
            deliveries: t.deliveries,
            failures: t.failures,
            failure_rate: ratio(t.failures, t.deliveries),
            avg_distance_meters: mean(&t.distances),
            avg_delivery_minutes: mean(&t.durations),
        })
        .collect();
    drivers.sort_by(|a, b| b.deliveries.cmp(&a.deliveries));

    Measured::new(drivers).warn_if(Kpi::DriverFailureRate, Field::Driver, unassigned)
}
