//! Command-line configuration shared by the binaries.

use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;

use crate::metrics::DistanceBands;
use crate::query::{DateRange, LocationFilter};

pub const DEFAULT_DB_PATH: &str = "data/ops.db";

pub fn parse_bands(s: &str) -> Result<DistanceBands, String> {
    s.parse().map_err(|e: crate::error::DashboardError| e.to_string())
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Database path
    #[arg(long = "db", env = "OPS_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,
}

impl StoreArgs {
    pub fn path(&self) -> String {
        self.db_path.to_string_lossy().into_owned()
    }
}

/// Date range, location and distance band selection.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// First order date to include (YYYY-MM-DD). Defaults to the earliest order.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last order date to include (YYYY-MM-DD). Defaults to the latest order.
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Restrict to a city (repeatable)
    #[arg(long = "city")]
    pub cities: Vec<String>,

    /// Restrict to a hub (repeatable)
    #[arg(long = "hub")]
    pub hubs: Vec<String>,

    /// Distance band boundaries in metres, comma separated
    #[arg(long, default_value = "2000,5000", value_parser = parse_bands)]
    pub distance_bands: DistanceBands,
}

impl FilterArgs {
    pub fn filters(&self) -> LocationFilter {
        LocationFilter::new(self.cities.iter().cloned(), self.hubs.iter().cloned())
    }

    /// Fill missing ends of the range from the store's bounds. The range is
    /// not validated here; the adapter rejects an inverted one.
    pub fn range(&self, bounds: Option<(NaiveDate, NaiveDate)>) -> Option<DateRange> {
        let start = self.start.or(bounds.map(|b| b.0))?;
        let end = self.end.or(bounds.map(|b| b.1))?;
        Some(DateRange { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        filter: FilterArgs,
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "ops",
            "--db",
            "/tmp/x.db",
            "--start",
            "2021-01-01",
            "--end",
            "2021-04-30",
            "--city",
            "CURITIBA",
            "--city",
            "RIO DE JANEIRO",
            "--hub",
            "GOLDEN SHOPPING",
            "--distance-bands",
            "1000,3000,9000",
        ])
        .unwrap();

        assert_eq!(cli.store.path(), "/tmp/x.db");
        assert_eq!(cli.filter.filters().cities.len(), 2);
        assert_eq!(cli.filter.distance_bands.boundaries(), &[1000.0, 3000.0, 9000.0]);
        assert_eq!(
            cli.filter.range(None),
            Some(DateRange { start: date(2021, 1, 1), end: date(2021, 4, 30) })
        );
    }

    #[test]
    fn test_range_defaults_from_bounds() {
        let cli = Cli::try_parse_from(["ops", "--end", "2021-02-01"]).unwrap();
        assert_eq!(cli.filter.distance_bands, DistanceBands::default());
        assert_eq!(cli.filter.range(None), None);
        assert_eq!(
            cli.filter.range(Some((date(2021, 1, 1), date(2021, 4, 30)))),
            Some(DateRange { start: date(2021, 1, 1), end: date(2021, 2, 1) })
        );
    }

    #[test]
    fn test_bad_bands_are_rejected() {
        assert!(Cli::try_parse_from(["ops", "--distance-bands", "5000,100"]).is_err());
    }
}
