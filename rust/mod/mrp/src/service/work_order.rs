use chrono::Utc;
use tracing::info;

use openmes_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use openmes_sql::{Executor, Value};

use crate::model::{
    Bom, ManufacturingOrder, OrderProgress, WoStatus, WorkCenter, WorkOrder, WorkOrderAction,
    WorkOrderFilter, WorkOrderTransition,
};

use super::bom::scale_for_quantity;
use super::records::{
    apply_patch, find_record, get_record, insert_record, list_records, query_records, storage,
    update_record,
};
use super::schema::{BOMS, ORDERS, WORK_CENTERS, WORK_ORDERS};
use super::work_center::first_work_centers;
use super::{MrpService, commit, require_non_negative, require_text};

/// Number of work centers the zero-operation fallback spreads over.
const FALLBACK_CENTERS: usize = 3;

/// Fields a plain update may not touch; they move only through transitions.
const PROTECTED: &[&str] = &[
    "moId",
    "operationId",
    "sequence",
    "status",
    "startedAt",
    "endedAt",
    "realDurationMins",
];

impl MrpService {
    // ── Work order ──

    pub fn list_work_orders(
        &self,
        filter: &WorkOrderFilter,
        params: &ListParams,
    ) -> Result<ListResult<WorkOrder>, ServiceError> {
        let mut f: Vec<(&str, Value)> = Vec::new();
        if let Some(ref mo) = filter.mo_id {
            f.push(("mo_id", Value::Text(mo.clone())));
        }
        if let Some(status) = filter.status {
            f.push(("status", Value::Text(status.as_str().into())));
        }
        if let Some(ref wc) = filter.work_center_id {
            f.push(("work_center_id", Value::Text(wc.clone())));
        }
        list_records(
            self.sql.as_ref(),
            WORK_ORDERS,
            &f,
            "mo_id ASC, sequence ASC, rowid ASC",
            params.clamped_limit(),
            params.offset,
        )
    }

    pub fn get_work_order(&self, id: &str) -> Result<WorkOrder, ServiceError> {
        get_record(self.sql.as_ref(), WORK_ORDERS, id)
    }

    /// Merge-patch the descriptive fields of a work order.
    pub fn update_work_order(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<WorkOrder, ServiceError> {
        let tx = self.begin()?;
        let current: WorkOrder = get_record(&*tx, WORK_ORDERS, id)?;
        let updated: WorkOrder = apply_patch(&current, patch, PROTECTED)?;
        require_text("operationName", &updated.operation_name)?;
        require_non_negative("expectedDurationMins", updated.expected_duration_mins)?;
        if let Some(ref wc) = updated.work_center_id {
            let center: Option<WorkCenter> = find_record(&*tx, WORK_CENTERS, wc)?;
            if center.is_none() {
                return Err(ServiceError::NotFound(format!("work center {wc} does not exist")));
            }
        }
        save_work_order(&*tx, &updated)?;
        commit(tx)?;
        Ok(updated)
    }

    /// Set or clear the operator of a work order.
    pub fn assign_work_order(
        &self,
        id: &str,
        assignee: Option<String>,
    ) -> Result<WorkOrder, ServiceError> {
        let tx = self.begin()?;
        let mut wo: WorkOrder = get_record(&*tx, WORK_ORDERS, id)?;
        wo.assigned_to = assignee;
        wo.update_at = Some(now_rfc3339());
        save_work_order(&*tx, &wo)?;
        commit(tx)?;
        info!(
            "work order {} assigned to {}",
            wo.id,
            wo.assigned_to.as_deref().unwrap_or("nobody")
        );
        Ok(wo)
    }

    /// Apply `action` and return the row with its order's fresh progress.
    ///
    /// A refused transition returns `InvalidTransition` and writes nothing.
    pub fn transition_work_order(
        &self,
        id: &str,
        action: WorkOrderAction,
    ) -> Result<WorkOrderTransition, ServiceError> {
        let tx = self.begin()?;
        let mut wo: WorkOrder = get_record(&*tx, WORK_ORDERS, id)?;
        let from = wo.status;

        action.apply(&mut wo, Utc::now())?;
        wo.update_at = Some(now_rfc3339());
        save_work_order(&*tx, &wo)?;

        let progress = order_progress_in(&*tx, &wo.mo_id)?;
        commit(tx)?;

        info!(
            "work order {} ({}) {from} -> {} [{}/{} done]",
            wo.id, wo.operation_name, wo.status, progress.done, progress.total
        );
        Ok(WorkOrderTransition { work_order: wo, progress })
    }

    pub fn start_work_order(&self, id: &str) -> Result<WorkOrderTransition, ServiceError> {
        self.transition_work_order(id, WorkOrderAction::Start)
    }

    pub fn pause_work_order(&self, id: &str) -> Result<WorkOrderTransition, ServiceError> {
        self.transition_work_order(id, WorkOrderAction::Pause)
    }

    pub fn resume_work_order(&self, id: &str) -> Result<WorkOrderTransition, ServiceError> {
        self.transition_work_order(id, WorkOrderAction::Resume)
    }

    pub fn complete_work_order(&self, id: &str) -> Result<WorkOrderTransition, ServiceError> {
        self.transition_work_order(id, WorkOrderAction::Complete)
    }

    pub fn cancel_work_order(&self, id: &str) -> Result<WorkOrderTransition, ServiceError> {
        self.transition_work_order(id, WorkOrderAction::Cancel)
    }

    /// Insert a work order for every BOM operation the order does not have
    /// yet. Returns only the new rows.
    pub fn generate_missing(&self, mo_id: &str) -> Result<Vec<WorkOrder>, ServiceError> {
        let tx = self.begin()?;
        let order: ManufacturingOrder = get_record(&*tx, ORDERS, mo_id)?;
        if order.status.is_terminal() {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {}, no work orders can be added",
                order.reference, order.status
            )));
        }
        let Some(ref bom_id) = order.bom_id else {
            return Err(ServiceError::Validation(format!(
                "order {} has no BOM to generate work orders from",
                order.reference
            )));
        };
        let bom: Bom = get_record(&*tx, BOMS, bom_id)?;
        let created = seed_work_orders(&*tx, &order, &bom)?;
        commit(tx)?;

        if !created.is_empty() {
            info!("generated {} work order(s) for order {}", created.len(), order.reference);
        }
        Ok(created)
    }

    /// Work order counts of one order, read from committed rows.
    pub fn order_progress(&self, mo_id: &str) -> Result<OrderProgress, ServiceError> {
        let db = self.sql.as_ref();
        let _order: ManufacturingOrder = get_record(db, ORDERS, mo_id)?;
        order_progress_in(db, mo_id)
    }
}

/// Work orders of one order in execution order.
pub(crate) fn work_orders_of<E: Executor + ?Sized>(
    db: &E,
    mo_id: &str,
) -> Result<Vec<WorkOrder>, ServiceError> {
    query_records(
        db,
        "SELECT data FROM work_orders WHERE mo_id = ?1 ORDER BY sequence ASC, rowid ASC",
        &[Value::Text(mo_id.to_string())],
    )
}

/// Remove an order's not-yet-started work orders. Returns how many went.
pub(crate) fn drop_pending_work_orders<E: Executor + ?Sized>(
    db: &E,
    mo_id: &str,
) -> Result<u64, ServiceError> {
    db.exec(
        "DELETE FROM work_orders WHERE mo_id = ?1 AND status = ?2",
        &[
            Value::Text(mo_id.to_string()),
            Value::Text(WoStatus::Pending.as_str().to_string()),
        ],
    )
    .map_err(storage)
}

pub(crate) fn order_progress_in<E: Executor + ?Sized>(
    db: &E,
    mo_id: &str,
) -> Result<OrderProgress, ServiceError> {
    let rows = db
        .query(
            "SELECT status, COUNT(*) AS cnt FROM work_orders WHERE mo_id = ?1 GROUP BY status",
            &[Value::Text(mo_id.to_string())],
        )
        .map_err(storage)?;

    let mut progress = OrderProgress {
        order_id: mo_id.to_string(),
        ..Default::default()
    };
    for row in &rows {
        let n = row.get_i64("cnt").unwrap_or(0) as usize;
        progress.total += n;
        match row.get_str("status").and_then(WoStatus::parse) {
            Some(WoStatus::Pending) => progress.pending += n,
            Some(WoStatus::InProgress) => progress.in_progress += n,
            Some(WoStatus::Paused) => progress.paused += n,
            Some(WoStatus::Done) => progress.done += n,
            Some(WoStatus::Cancelled) => progress.cancelled += n,
            None => {}
        }
    }
    Ok(progress)
}

/// Create the work orders `bom` implies for `order` that are not present.
///
/// Rows generated from an operation are matched by operation id. Rows
/// without one (entered before ids existed) match by name. A BOM with no
/// operations gets the fallback steps, once.
pub(crate) fn seed_work_orders<E: Executor + ?Sized>(
    db: &E,
    order: &ManufacturingOrder,
    bom: &Bom,
) -> Result<Vec<WorkOrder>, ServiceError> {
    let existing = work_orders_of(db, &order.id)?;

    if bom.operations.is_empty() {
        if !existing.is_empty() {
            return Ok(Vec::new());
        }
        return fallback_work_orders(db, &order.id);
    }

    let scaled = scale_for_quantity(bom, order.quantity)?;
    let mut created = Vec::new();
    for op in scaled.operations {
        let present = existing.iter().any(|wo| match wo.operation_id {
            Some(ref id) => *id == op.id,
            None => wo.operation_name == op.name,
        });
        if present {
            continue;
        }
        let wo = new_work_order(
            &order.id,
            Some(op.id),
            op.name,
            op.work_center_id,
            op.sequence,
            op.duration_mins,
        );
        insert_work_order(db, &wo)?;
        created.push(wo);
    }
    Ok(created)
}

fn fallback_work_orders<E: Executor + ?Sized>(
    db: &E,
    mo_id: &str,
) -> Result<Vec<WorkOrder>, ServiceError> {
    let centers = first_work_centers(db, FALLBACK_CENTERS)?;
    let rows: Vec<WorkOrder> = if centers.is_empty() {
        vec![new_work_order(mo_id, None, "Operation 1 - Assembly".into(), None, 1, 0.0)]
    } else {
        centers
            .into_iter()
            .enumerate()
            .map(|(i, wc)| {
                let n = i as u32 + 1;
                new_work_order(
                    mo_id,
                    None,
                    format!("Operation {n} - {}", wc.name),
                    Some(wc.id),
                    n,
                    0.0,
                )
            })
            .collect()
    };
    for wo in &rows {
        insert_work_order(db, wo)?;
    }
    Ok(rows)
}

fn new_work_order(
    mo_id: &str,
    operation_id: Option<String>,
    operation_name: String,
    work_center_id: Option<String>,
    sequence: u32,
    expected_duration_mins: f64,
) -> WorkOrder {
    let now = now_rfc3339();
    WorkOrder {
        id: new_id(),
        mo_id: mo_id.to_string(),
        operation_id,
        operation_name,
        work_center_id,
        sequence,
        expected_duration_mins,
        assigned_to: None,
        status: WoStatus::Pending,
        started_at: None,
        ended_at: None,
        real_duration_mins: None,
        create_at: Some(now.clone()),
        update_at: Some(now),
    }
}

fn wo_indexes(wo: &WorkOrder) -> [(&'static str, Value); 7] {
    [
        ("mo_id", Value::Text(wo.mo_id.clone())),
        ("operation_id", Value::opt_text(wo.operation_id.as_deref())),
        ("work_center_id", Value::opt_text(wo.work_center_id.as_deref())),
        ("status", Value::Text(wo.status.as_str().into())),
        ("sequence", Value::Integer(wo.sequence as i64)),
        ("create_at", Value::opt_text(wo.create_at.as_deref())),
        ("update_at", Value::opt_text(wo.update_at.as_deref())),
    ]
}

fn insert_work_order<E: Executor + ?Sized>(db: &E, wo: &WorkOrder) -> Result<(), ServiceError> {
    insert_record(db, WORK_ORDERS, &wo.id, wo, &wo_indexes(wo))
}

fn save_work_order<E: Executor + ?Sized>(db: &E, wo: &WorkOrder) -> Result<(), ServiceError> {
    update_record(db, WORK_ORDERS, &wo.id, wo, &wo_indexes(wo))
}
