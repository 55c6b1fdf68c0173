//! Query inputs for the data store adapter: an inclusive date range and
//! optional city/hub selections.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{DashboardError, Result};

/// Inclusive `[start, end]` range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(DashboardError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// City and hub selections, matched by name. An empty selection matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationFilter {
    pub cities: BTreeSet<String>,
    pub hubs: BTreeSet<String>,
}

impl LocationFilter {
    pub fn new<C, H>(cities: C, hubs: H) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        H: IntoIterator,
        H::Item: Into<String>,
    {
        Self {
            cities: cities.into_iter().map(Into::into).collect(),
            hubs: hubs.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse comma-separated selections, as sent by the REST layer.
    pub fn from_csv_lists(cities: Option<&str>, hubs: Option<&str>) -> Self {
        let split = |s: Option<&str>| -> BTreeSet<String> {
            s.map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
        };
        Self {
            cities: split(cities),
            hubs: split(hubs),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty() && self.hubs.is_empty()
    }

    pub fn matches(&self, city: &str, hub: &str) -> bool {
        (self.cities.is_empty() || self.cities.contains(city))
            && (self.hubs.is_empty() || self.hubs.contains(hub))
    }
}
