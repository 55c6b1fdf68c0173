//! REST API handlers for the operations dashboard
//!
//! These handlers use the shared DashboardService.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::service::DashboardService;
use crate::error::DashboardError;
use crate::export;
use crate::metrics::{DistanceBands, DriverPerformance, KpiReport};
use crate::query::{DateRange, LocationFilter};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct DriverResponse {
    pub driver_id: String,
    pub driver_name: Option<String>,
    pub deliveries: usize,
    pub failures: usize,
    pub failure_rate: f64,
    pub avg_distance_meters: Option<f64>,
    pub avg_delivery_minutes: Option<f64>,
}

impl From<DriverPerformance> for DriverResponse {
    fn from(d: DriverPerformance) -> Self {
        Self {
            driver_id: d.driver_id,
            driver_name: d.driver_name,
            deliveries: d.deliveries,
            failures: d.failures,
            failure_rate: (d.failure_rate * 10000.0).round() / 10000.0,
            avg_distance_meters: d.avg_distance_meters.map(|m| (m * 100.0).round() / 100.0),
            avg_delivery_minutes: d.avg_delivery_minutes.map(|m| (m * 100.0).round() / 100.0),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: DashboardError) -> ApiError {
    let status = match &e {
        DashboardError::InvalidRange { .. } | DashboardError::InvalidDistanceBands(_) => StatusCode::BAD_REQUEST,
        DashboardError::DataUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    warn!(%status, error = %e, "Request failed");
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize)]
pub struct ReportQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Comma-separated city names
    pub cities: Option<String>,
    /// Comma-separated hub names
    pub hubs: Option<String>,
    /// Comma-separated distance boundaries in metres
    pub distance_bands: Option<String>,
}

impl ReportQuery {
    fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }

    fn filters(&self) -> LocationFilter {
        LocationFilter::from_csv_lists(self.cities.as_deref(), self.hubs.as_deref())
    }

    fn bands(&self) -> Result<Option<DistanceBands>, DashboardError> {
        self.distance_bands.as_deref().map(str::parse).transpose()
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<DashboardService>;

/// GET /api/v1/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/v1/report
pub async fn get_report(
    State(service): State<AppState>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<KpiReport>, ApiError> {
    let bands = params.bands().map_err(error_response)?;
    let (_, report) = service
        .report(&params.range(), &params.filters(), bands.as_ref())
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}

/// GET /api/v1/drivers
pub async fn get_drivers(
    State(service): State<AppState>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<Vec<DriverResponse>>, ApiError> {
    let bands = params.bands().map_err(error_response)?;
    let (_, report) = service
        .report(&params.range(), &params.filters(), bands.as_ref())
        .await
        .map_err(error_response)?;
    Ok(Json(report.drivers.into_iter().map(DriverResponse::from).collect()))
}

/// GET /api/v1/export/:file
pub async fn get_export(
    State(service): State<AppState>,
    Path(file): Path<String>,
    Query(params): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let bands = params.bands().map_err(error_response)?;
    let (set, report) = service
        .report(&params.range(), &params.filters(), bands.as_ref())
        .await
        .map_err(error_response)?;

    let body = match file.as_str() {
        export::RECORDS_FILE => export::records_csv(&set),
        export::ORDER_METRICS_FILE => export::order_metrics_csv(&report),
        export::DRIVER_METRICS_FILE => export::driver_metrics_csv(&report),
        export::REVENUE_METRICS_FILE => export::revenue_metrics_csv(&report),
        _ => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Unknown export '{}'", file),
                }),
            ))
        }
    }
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: e.to_string() }),
        )
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file)),
        ],
        body,
    ))
}
