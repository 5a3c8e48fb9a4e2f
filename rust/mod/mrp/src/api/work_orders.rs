use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use openmes_core::{ListResult, ServiceError};

use crate::model::{WoStatus, WorkOrder, WorkOrderAction, WorkOrderFilter, WorkOrderTransition};
use crate::service::MrpService;

use super::{SvcState, list_params};

pub fn router(svc: Arc<MrpService>) -> Router {
    Router::new()
        .route("/work-orders", get(list_work_orders))
        .route("/work-orders/{id}", get(get_work_order).patch(update_work_order))
        .route("/work-orders/{id}/@assign", post(assign))
        .route("/work-orders/{id}/@start", post(start))
        .route("/work-orders/{id}/@pause", post(pause))
        .route("/work-orders/{id}/@resume", post(resume))
        .route("/work-orders/{id}/@complete", post(complete))
        .route("/work-orders/{id}/@cancel", post(cancel))
        .with_state(svc)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkOrderQuery {
    #[serde(default)]
    mo_id: Option<String>,
    #[serde(default)]
    status: Option<WoStatus>,
    #[serde(default)]
    work_center_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest {
    #[serde(default)]
    assignee: Option<String>,
}

async fn list_work_orders(
    State(svc): State<SvcState>,
    Query(query): Query<WorkOrderQuery>,
) -> Result<Json<ListResult<WorkOrder>>, ServiceError> {
    let filter = WorkOrderFilter {
        mo_id: query.mo_id,
        status: query.status,
        work_center_id: query.work_center_id,
    };
    let params = list_params(query.limit, query.offset);
    Ok(Json(svc.list_work_orders(&filter, &params)?))
}

async fn get_work_order(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrder>, ServiceError> {
    Ok(Json(svc.get_work_order(&id)?))
}

async fn update_work_order(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<WorkOrder>, ServiceError> {
    Ok(Json(svc.update_work_order(&id, patch)?))
}

async fn assign(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<WorkOrder>, ServiceError> {
    Ok(Json(svc.assign_work_order(&id, req.assignee)?))
}

// ---------------------------------------------------------------------------
// POST /work-orders/{id}/@start | @pause | @resume | @complete | @cancel
// ---------------------------------------------------------------------------

fn transition(
    svc: &MrpService,
    id: &str,
    action: WorkOrderAction,
) -> Result<Json<WorkOrderTransition>, ServiceError> {
    Ok(Json(svc.transition_work_order(id, action)?))
}

async fn start(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrderTransition>, ServiceError> {
    transition(&svc, &id, WorkOrderAction::Start)
}

async fn pause(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrderTransition>, ServiceError> {
    transition(&svc, &id, WorkOrderAction::Pause)
}

async fn resume(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrderTransition>, ServiceError> {
    transition(&svc, &id, WorkOrderAction::Resume)
}

async fn complete(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrderTransition>, ServiceError> {
    transition(&svc, &id, WorkOrderAction::Complete)
}

async fn cancel(
    State(svc): State<SvcState>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrderTransition>, ServiceError> {
    transition(&svc, &id, WorkOrderAction::Cancel)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::testing::{api, app};

    #[tokio::test]
    async fn work_order_transitions_over_http() {
        let (router, _svc) = app();
        let (_, wc) = api(
            &router,
            "POST",
            "/work-centers",
            Some(json!({"name": "Saw", "costPerHour": 40})),
        )
        .await;
        let (_, p) = api(&router, "POST", "/products", Some(json!({"name": "Shelf"}))).await;
        let (_, bom) = api(
            &router,
            "POST",
            "/boms",
            Some(json!({"productId": p["id"], "name": "Shelf", "outputQuantity": 1})),
        )
        .await;
        let (_, mo) = api(
            &router,
            "POST",
            "/orders/@from-bom",
            Some(json!({"bomId": bom["id"], "quantity": 1})),
        )
        .await;
        let mo_id = mo["id"].as_str().unwrap();

        let (_, list) = api(&router, "GET", &format!("/work-orders?moId={mo_id}"), None).await;
        assert_eq!(list["total"], 1);
        assert_eq!(list["items"][0]["operationName"], "Operation 1 - Saw");
        assert_eq!(list["items"][0]["workCenterId"], wc["id"]);
        let wo = list["items"][0]["id"].as_str().unwrap().to_string();

        let (status, err) = api(&router, "POST", &format!("/work-orders/{wo}/@pause"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "INVALID_TRANSITION");

        let (status, t) = api(&router, "POST", &format!("/work-orders/{wo}/@start"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(t["workOrder"]["status"], "in_progress");
        assert_eq!(t["progress"]["inProgress"], 1);

        let (_, a) = api(
            &router,
            "POST",
            &format!("/work-orders/{wo}/@assign"),
            Some(json!({"assignee": "kim"})),
        )
        .await;
        assert_eq!(a["assignedTo"], "kim");

        let (_, t) = api(&router, "POST", &format!("/work-orders/{wo}/@complete"), None).await;
        assert_eq!(t["workOrder"]["status"], "done");
        assert_eq!(t["progress"]["done"], 1);

        let (_, running) = api(&router, "GET", "/work-orders?status=in_progress", None).await;
        assert_eq!(running["total"], 0);
    }
}
