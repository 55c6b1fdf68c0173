//! Shared business logic for the dashboard surfaces
//!
//! Used by the CLI report and the REST handlers. Nothing is cached: every
//! call fetches a fresh record set and recomputes from it.

use std::time::Instant;
use tracing::info;

use crate::db::Store;
use crate::error::Result;
use crate::metrics::{DistanceBands, KpiReport};
use crate::models::RecordSet;
use crate::query::{DateRange, LocationFilter};

pub struct DashboardService {
    store: Store,
    bands: DistanceBands,
}

impl DashboardService {
    pub fn new(store: Store, bands: DistanceBands) -> Self {
        Self { store, bands }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn distance_bands(&self) -> &DistanceBands {
        &self.bands
    }

    pub async fn records(&self, range: &DateRange, filters: &LocationFilter) -> Result<RecordSet> {
        self.store.fetch(range, filters).await
    }

    /// Fetch and aggregate, using the configured distance bands unless
    /// `bands` overrides them.
    pub async fn report(
        &self,
        range: &DateRange,
        filters: &LocationFilter,
        bands: Option<&DistanceBands>,
    ) -> Result<(RecordSet, KpiReport)> {
        let started = Instant::now();
        let set = self.records(range, filters).await?;
        let report = KpiReport::build(&set, bands.unwrap_or(&self.bands));
        info!(
            records = set.len(),
            warnings = report.warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built KPI report"
        );
        Ok((set, report))
    }

    pub fn close(self) {
        self.store.close();
    }
}
