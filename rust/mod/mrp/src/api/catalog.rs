//! Reference data: products and work centers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use openmes_core::{ListResult, ServiceError};

use crate::model::{CreateProductInput, CreateWorkCenterInput, Product, WorkCenter};
use crate::service::MrpService;

use super::{Page, SvcState};

pub fn router(svc: Arc<MrpService>) -> Router {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route("/products/{id}", get(get_product).patch(update_product))
        .route("/work-centers", post(create_work_center).get(list_work_centers))
        .route("/work-centers/{id}", get(get_work_center))
        .with_state(svc)
}

// ── Products ──

async fn create_product(
    State(svc): State<SvcState>,
    Json(req): Json<CreateProductInput>,
) -> Result<Json<Product>, ServiceError> {
    Ok(Json(svc.create_product(req)?))
}

async fn list_products(
    State(svc): State<SvcState>,
    Query(page): Query<Page>,
) -> Result<Json<ListResult<Product>>, ServiceError> {
    Ok(Json(svc.list_products(&page.params())?))
}

async fn get_product(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ServiceError> {
    Ok(Json(svc.get_product(&id)?))
}

async fn update_product(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Product>, ServiceError> {
    Ok(Json(svc.update_product(&id, patch)?))
}

// ── Work centers ──

async fn create_work_center(
    State(svc): State<SvcState>,
    Json(req): Json<CreateWorkCenterInput>,
) -> Result<Json<WorkCenter>, ServiceError> {
    Ok(Json(svc.create_work_center(req)?))
}

async fn list_work_centers(
    State(svc): State<SvcState>,
    Query(page): Query<Page>,
) -> Result<Json<ListResult<WorkCenter>>, ServiceError> {
    Ok(Json(svc.list_work_centers(&page.params())?))
}

async fn get_work_center(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<WorkCenter>, ServiceError> {
    Ok(Json(svc.get_work_center(&id)?))
}
