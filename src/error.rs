use chrono::NaiveDate;

// ============================================================================
// Dashboard Errors
// ============================================================================

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Data store unavailable while {context}: {source}")]
    DataUnavailable {
        context: &'static str,
        #[source]
        source: surrealdb::Error,
    },

    #[error("Invalid distance bands: {0}")]
    InvalidDistanceBands(String),
}

impl DashboardError {
    pub(crate) fn unavailable(context: &'static str) -> impl FnOnce(surrealdb::Error) -> Self {
        move |source| DashboardError::DataUnavailable { context, source }
    }
}
