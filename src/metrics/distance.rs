use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::{ratio, Field, Kpi, Measured};
use crate::error::{DashboardError, Result};
use crate::models::Record;

pub const DEFAULT_BOUNDARIES: [f64; 2] = [2_000.0, 5_000.0];

/// Ascending distance boundaries in metres. `n` boundaries give `n + 1`
/// bands; a distance equal to a boundary falls into the upper band.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceBands {
    boundaries: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceBand {
    pub label: String,
    pub min_meters: f64,
    pub max_meters: Option<f64>,
}

impl Default for DistanceBands {
    fn default() -> Self {
        Self {
            boundaries: DEFAULT_BOUNDARIES.to_vec(),
        }
    }
}

impl DistanceBands {
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if let Some(bad) = boundaries.iter().find(|b| !b.is_finite() || **b <= 0.0) {
            return Err(DashboardError::InvalidDistanceBands(format!(
                "boundary {} must be a positive number of metres",
                bad
            )));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DashboardError::InvalidDistanceBands(
                "boundaries must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { boundaries })
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn band_index(&self, meters: f64) -> usize {
        self.boundaries.partition_point(|b| *b <= meters)
    }

    pub fn bands(&self) -> Vec<DistanceBand> {
        let count = self.boundaries.len() + 1;
        (0..count)
            .map(|i| {
                let min_meters = if i == 0 { 0.0 } else { self.boundaries[i - 1] };
                let max_meters = self.boundaries.get(i).copied();
                DistanceBand {
                    label: self.label(i, min_meters, max_meters),
                    min_meters,
                    max_meters,
                }
            })
            .collect()
    }

    fn label(&self, index: usize, min: f64, max: Option<f64>) -> String {
        if self.boundaries.len() == 2 {
            return ["short", "medium", "long"][index].to_string();
        }
        match (index, max) {
            (_, None) if self.boundaries.is_empty() => "all".to_string(),
            (0, Some(max)) => format!("<{}m", max),
            (_, Some(max)) => format!("{}-{}m", min, max),
            (_, None) => format!(">={}m", min),
        }
    }
}

impl FromStr for DistanceBands {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        let boundaries = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<f64>().map_err(|_| {
                    DashboardError::InvalidDistanceBands(format!("{:?} is not a number", p))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Self::new(boundaries)
    }
}

impl fmt::Display for DistanceBands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.boundaries.iter().map(|b| b.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandPerformance {
    #[serde(flatten)]
    pub band: DistanceBand,
    pub deliveries: usize,
    pub failures: usize,
    pub failure_rate: f64,
}

/// Delivery failure rate per distance band, ascending by distance. Bands with
/// no deliveries are left out.
pub fn distance_performance<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    bands: &DistanceBands,
) -> Measured<Vec<BandPerformance>> {
    let mut counts = vec![(0usize, 0usize); bands.boundaries.len() + 1];
    let mut missing = 0;

    for delivery in records.into_iter().filter_map(|r| r.delivery.as_ref()) {
        let Some(meters) = delivery.distance_meters else {
            missing += 1;
            continue;
        };
        let slot = &mut counts[bands.band_index(meters)];
        slot.0 += 1;
        if !delivery.is_success() {
            slot.1 += 1;
        }
    }

    let rows = bands
        .bands()
        .into_iter()
        .zip(counts)
        .filter(|(_, (deliveries, _))| *deliveries > 0)
        .map(|(band, (deliveries, failures))| BandPerformance {
            band,
            deliveries,
            failures,
            failure_rate: ratio(failures, deliveries),
        })
        .collect();

    Measured::new(rows).warn_if(Kpi::DistancePerformance, Field::Distance, missing)
}
