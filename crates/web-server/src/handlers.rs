use crate::{error::AppError, AppState};
use analytics::{
    composition_changes, composition_weights, performance_series, summarize, CompositionChange,
    IndexSummary, PerformancePoint, WeightedConstituent,
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct CompositionQuery {
    pub date: Option<NaiveDate>,
}

/// One snapshot date with its weighted constituents.
#[derive(Debug, Serialize)]
pub struct CompositionView {
    pub date: NaiveDate,
    pub constituents: Vec<WeightedConstituent>,
}

/// # GET /api/health
pub async fn health() -> &'static str {
    "OK"
}

/// # GET /api/performance
/// Daily returns in storage order with the compounded series alongside.
pub async fn get_performance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PerformancePoint>>, AppError> {
    let records = state.db_repo.performance_history().await?;
    Ok(Json(performance_series(&records)))
}

/// # GET /api/summary
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Result<Json<IndexSummary>, AppError> {
    let records = state.db_repo.performance_history().await?;
    let entries = state.db_repo.all_composition().await?;
    Ok(Json(summarize(&records, &entries)))
}

/// # GET /api/composition/dates
pub async fn get_composition_dates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NaiveDate>>, AppError> {
    Ok(Json(state.db_repo.composition_dates().await?))
}

/// # GET /api/composition?date=YYYY-MM-DD
/// Without `date`, the most recent snapshot is returned.
pub async fn get_composition(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompositionQuery>,
) -> Result<Json<CompositionView>, AppError> {
    let date = match query.date {
        Some(date) => date,
        None => state
            .db_repo
            .latest_composition_date()
            .await?
            .ok_or_else(|| AppError::NotFound("No composition snapshot has been stored yet".to_string()))?,
    };

    let entries = state.db_repo.composition_for_date(date).await?;
    if entries.is_empty() {
        return Err(AppError::NotFound(format!("No composition snapshot for {date}")));
    }

    Ok(Json(CompositionView { date, constituents: composition_weights(&entries) }))
}

/// # GET /api/composition-changes
pub async fn get_composition_changes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CompositionChange>>, AppError> {
    let entries = state.db_repo.all_composition().await?;
    Ok(Json(composition_changes(&entries)))
}
