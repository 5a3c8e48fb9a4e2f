use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use openmes_core::{ListResult, ServiceError};

use crate::model::{Bom, BomInput, ScaledBom};
use crate::service::MrpService;

use super::{SvcState, list_params};

pub fn router(svc: Arc<MrpService>) -> Router {
    Router::new()
        .route("/boms", post(create_bom).get(list_boms))
        .route("/boms/{id}", get(get_bom).put(update_bom).delete(delete_bom))
        .route("/boms/{id}/@scale", get(scale))
        .with_state(svc)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BomQuery {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ScaleQuery {
    quantity: f64,
}

async fn create_bom(
    State(svc): State<SvcState>,
    Json(req): Json<BomInput>,
) -> Result<Json<Bom>, ServiceError> {
    Ok(Json(svc.create_bom(req)?))
}

async fn list_boms(
    State(svc): State<SvcState>,
    Query(query): Query<BomQuery>,
) -> Result<Json<ListResult<Bom>>, ServiceError> {
    let params = list_params(query.limit, query.offset);
    Ok(Json(svc.list_boms(query.product_id.as_deref(), &params)?))
}

async fn get_bom(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<Bom>, ServiceError> {
    Ok(Json(svc.get_bom(&id)?))
}

async fn update_bom(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
    Json(req): Json<BomInput>,
) -> Result<Json<Bom>, ServiceError> {
    Ok(Json(svc.update_bom(&id, req)?))
}

async fn delete_bom(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_bom(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// GET /boms/{id}/@scale?quantity=
// ---------------------------------------------------------------------------

async fn scale(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
    Query(query): Query<ScaleQuery>,
) -> Result<Json<ScaledBom>, ServiceError> {
    Ok(Json(svc.preview_bom_scaling(&id, query.quantity)?))
}
