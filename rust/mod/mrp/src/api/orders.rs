use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use openmes_core::{ListResult, ServiceError};

use crate::model::{
    ComponentAvailability, CreateOrderFromBomInput, CreateOrderInput, ManufacturingOrder,
    MoStatus, OrderAction, OrderCost, OrderFilter, OrderProgress, OrderSnapshot, OrderTransition,
    Reservation, WorkOrder,
};
use crate::service::MrpService;

use super::{SvcState, list_params};

pub fn router(svc: Arc<MrpService>) -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/@from-bom", post(create_from_bom))
        .route("/orders/@late", get(list_late))
        .route(
            "/orders/{id}",
            get(get_order).patch(update_order).delete(delete_order),
        )
        .route("/orders/{id}/@confirm", post(confirm))
        .route("/orders/{id}/@start", post(start))
        .route("/orders/{id}/@complete", post(complete))
        .route("/orders/{id}/@cancel", post(cancel))
        .route("/orders/{id}/@reserve", post(reserve))
        .route("/orders/{id}/@attach-bom", post(attach_bom))
        .route("/orders/{id}/@generate-work-orders", post(generate_work_orders))
        .route("/orders/{id}/@cost", get(cost))
        .route("/orders/{id}/@availability", get(availability))
        .route("/orders/{id}/@progress", get(progress))
        .with_state(svc)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderQuery {
    #[serde(default)]
    status: Option<MoStatus>,
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LateQuery {
    #[serde(default)]
    created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachBomRequest {
    bom_id: String,
}

// ---------------------------------------------------------------------------
// POST /orders, POST /orders/@from-bom
// ---------------------------------------------------------------------------

async fn create_order(
    State(svc): State<SvcState>,
    Json(req): Json<CreateOrderInput>,
) -> Result<Json<ManufacturingOrder>, ServiceError> {
    Ok(Json(svc.create_order(req)?))
}

async fn create_from_bom(
    State(svc): State<SvcState>,
    Json(req): Json<CreateOrderFromBomInput>,
) -> Result<Json<ManufacturingOrder>, ServiceError> {
    Ok(Json(svc.create_order_from_bom(req)?))
}

// ---------------------------------------------------------------------------
// GET /orders, GET /orders/@late
// ---------------------------------------------------------------------------

async fn list_orders(
    State(svc): State<SvcState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<ListResult<ManufacturingOrder>>, ServiceError> {
    let filter = OrderFilter {
        status: query.status,
        product_id: query.product_id,
        created_by: query.created_by,
    };
    let params = list_params(query.limit, query.offset);
    Ok(Json(svc.list_orders(&filter, &params)?))
}

async fn list_late(
    State(svc): State<SvcState>,
    Query(query): Query<LateQuery>,
) -> Result<Json<Vec<ManufacturingOrder>>, ServiceError> {
    Ok(Json(svc.list_late(query.created_by.as_deref())?))
}

// ---------------------------------------------------------------------------
// GET | PATCH | DELETE /orders/{id}
// ---------------------------------------------------------------------------

async fn get_order(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<OrderSnapshot>, ServiceError> {
    Ok(Json(svc.order_snapshot(&id)?))
}

async fn update_order(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<ManufacturingOrder>, ServiceError> {
    Ok(Json(svc.update_order(&id, patch)?))
}

async fn delete_order(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_order(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// POST /orders/{id}/@confirm | @start | @complete | @cancel
// ---------------------------------------------------------------------------

fn transition(
    svc: &MrpService,
    id: &str,
    action: OrderAction,
) -> Result<Json<OrderTransition>, ServiceError> {
    Ok(Json(svc.transition_order(id, action)?))
}

async fn confirm(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<OrderTransition>, ServiceError> {
    transition(&svc, &id, OrderAction::Confirm)
}

async fn start(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<OrderTransition>, ServiceError> {
    transition(&svc, &id, OrderAction::Start)
}

async fn complete(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<OrderTransition>, ServiceError> {
    transition(&svc, &id, OrderAction::Complete)
}

async fn cancel(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<OrderTransition>, ServiceError> {
    transition(&svc, &id, OrderAction::Cancel)
}

// ---------------------------------------------------------------------------
// Reservation, BOM and work orders
// ---------------------------------------------------------------------------

async fn reserve(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, ServiceError> {
    Ok(Json(svc.reserve_components(&id)?))
}

async fn attach_bom(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
    Json(req): Json<AttachBomRequest>,
) -> Result<Json<ManufacturingOrder>, ServiceError> {
    Ok(Json(svc.attach_bom(&id, &req.bom_id)?))
}

async fn generate_work_orders(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkOrder>>, ServiceError> {
    Ok(Json(svc.generate_missing(&id)?))
}

// ---------------------------------------------------------------------------
// Derived reads
// ---------------------------------------------------------------------------

async fn cost(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<OrderCost>, ServiceError> {
    Ok(Json(svc.order_cost(&id)?))
}

async fn availability(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ComponentAvailability>>, ServiceError> {
    Ok(Json(svc.components_availability(&id)?))
}

async fn progress(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<OrderProgress>, ServiceError> {
    Ok(Json(svc.order_progress(&id)?))
}
