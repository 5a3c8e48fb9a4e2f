use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use openmes_core::{ListResult, ServiceError};

use crate::model::{LedgerEntry, LedgerFilter, MovementType, NewMovement, StockLevel};
use crate::service::MrpService;

use super::{SvcState, list_params};

pub fn router(svc: Arc<MrpService>) -> Router {
    Router::new()
        .route("/stock", get(summary))
        .route("/stock/movements", get(list_movements).post(record_movement))
        .route("/stock/{product_id}", get(on_hand))
        .with_state(svc)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovementQuery {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    movement_type: Option<MovementType>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

async fn summary(State(svc): State<SvcState>) -> Result<Json<Vec<StockLevel>>, ServiceError> {
    Ok(Json(svc.stock_summary()?))
}

async fn on_hand(
    State(svc): State<SvcState>,
    Path(product_id): Path<String>,
) -> Result<Json<StockLevel>, ServiceError> {
    Ok(Json(svc.on_hand(&product_id)?))
}

async fn record_movement(
    State(svc): State<SvcState>,
    Json(req): Json<NewMovement>,
) -> Result<Json<LedgerEntry>, ServiceError> {
    Ok(Json(svc.record_movement(req)?))
}

async fn list_movements(
    State(svc): State<SvcState>,
    Query(query): Query<MovementQuery>,
) -> Result<Json<ListResult<LedgerEntry>>, ServiceError> {
    let filter = LedgerFilter {
        product_id: query.product_id,
        movement_type: query.movement_type,
        reference: query.reference,
    };
    let params = list_params(query.limit, query.offset);
    Ok(Json(svc.list_entries(&filter, &params)?))
}
