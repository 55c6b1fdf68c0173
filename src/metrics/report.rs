use serde::Serialize;

use super::{
    daily_series, distance_performance, driver_performance, measured_breakdown, BandPerformance,
    Breakdown, DailyPoint, DataQualityWarning, DistanceBands, DriverPerformance, KpiSummary,
};
use crate::models::{Record, RecordSet};
use crate::query::{DateRange, LocationFilter};

/// Everything the presentation layer shows for one filter selection.
///
/// `warnings` covers the whole selection; each breakdown entry also carries
/// the warnings raised within its own group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    pub range: DateRange,
    pub filters: LocationFilter,
    pub summary: KpiSummary,
    pub drivers: Vec<DriverPerformance>,
    pub distance: Vec<BandPerformance>,
    pub by_city: Breakdown<String, KpiSummary>,
    pub by_hub: Breakdown<String, KpiSummary>,
    pub by_city_hub: Breakdown<(String, String), KpiSummary>,
    pub daily: Vec<DailyPoint>,
    pub warnings: Vec<DataQualityWarning>,
    pub rejected_rows: usize,
}

impl KpiReport {
    pub fn build(set: &RecordSet, bands: &DistanceBands) -> Self {
        let records = &set.records;
        let summary_of = |group: &[&Record]| KpiSummary::compute(group.iter().copied());

        let (summary, mut warnings) = KpiSummary::compute(records).into_parts();
        let (drivers, driver_warnings) = driver_performance(records).into_parts();
        let (distance, distance_warnings) = distance_performance(records, bands).into_parts();
        warnings.extend(driver_warnings);
        warnings.extend(distance_warnings);

        KpiReport {
            range: set.range,
            filters: set.filters.clone(),
            summary,
            drivers,
            distance,
            by_city: measured_breakdown(records, |r| r.city().to_string(), summary_of),
            by_hub: measured_breakdown(records, |r| r.hub().to_string(), summary_of),
            by_city_hub: measured_breakdown(
                records,
                |r| (r.city().to_string(), r.hub().to_string()),
                summary_of,
            ),
            daily: daily_series(records),
            warnings,
            rejected_rows: set.rejected,
        }
    }
}
