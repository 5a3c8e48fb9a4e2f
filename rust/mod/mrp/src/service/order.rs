use chrono::Utc;
use tracing::{debug, info};

use openmes_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use openmes_sql::{Executor, Value};

use crate::model::{
    Bom, CreateOrderFromBomInput, CreateOrderInput, LaborCostLine, ManufacturingOrder,
    MaterialCostLine, MoStatus, OrderAction, OrderCost, OrderFilter, OrderPlan, OrderSnapshot,
    OrderTransition, Product, ScaledBom, WorkCenter, parse_instant, round_qty,
};

use super::bom::scale_for_quantity;
use super::hooks::OrderEvent;
use super::records::{
    apply_patch, delete_record, find_record, get_record, insert_record, list_records,
    next_sequence, query_records, storage,
};
use super::schema::{BOMS, ORDERS, PRODUCTS, WORK_CENTERS};
use super::work_order::{
    drop_pending_work_orders, order_progress_in, seed_work_orders, work_orders_of,
};
use super::{MrpService, commit, require_positive};

const ORDER_SEQUENCE: &str = "manufacturing_order";

/// Fields that only move through dedicated operations.
const PROTECTED: &[&str] = &["reference", "status", "bomId", "reservedAt"];

impl MrpService {
    // ── Manufacturing order ──

    /// Create a draft order for a product, optionally pinned to a BOM.
    pub fn create_order(&self, input: CreateOrderInput) -> Result<ManufacturingOrder, ServiceError> {
        require_positive("quantity", input.quantity)?;
        validate_plan(&input.plan)?;

        let tx = self.begin()?;
        let _product: Product = get_record(&*tx, PRODUCTS, &input.product_id)?;
        let bom = match input.bom_id {
            Some(ref bom_id) => {
                let bom: Bom = get_record(&*tx, BOMS, bom_id)?;
                ensure_bom_matches(&bom, &input.product_id)?;
                Some(bom)
            }
            None => None,
        };

        let order = insert_order(&*tx, input.product_id, input.quantity, bom.as_ref(), input.plan)?;
        commit(tx)?;

        info!("created order {} ({} x {})", order.reference, order.quantity, order.product_id);
        Ok(order)
    }

    /// Create a draft order from a BOM; the product is the BOM's.
    pub fn create_order_from_bom(
        &self,
        input: CreateOrderFromBomInput,
    ) -> Result<ManufacturingOrder, ServiceError> {
        require_positive("quantity", input.quantity)?;
        validate_plan(&input.plan)?;

        let tx = self.begin()?;
        let bom: Bom = get_record(&*tx, BOMS, &input.bom_id)?;
        let _product: Product = get_record(&*tx, PRODUCTS, &bom.product_id)?;
        let order = insert_order(&*tx, bom.product_id.clone(), input.quantity, Some(&bom), input.plan)?;
        commit(tx)?;

        info!(
            "created order {} from BOM {} ({} x {})",
            order.reference, bom.name, order.quantity, order.product_id
        );
        Ok(order)
    }

    pub fn get_order(&self, id: &str) -> Result<ManufacturingOrder, ServiceError> {
        get_record(self.sql.as_ref(), ORDERS, id)
    }

    /// Order plus progress, lateness and deletability.
    pub fn order_snapshot(&self, id: &str) -> Result<OrderSnapshot, ServiceError> {
        let db = self.sql.as_ref();
        let order: ManufacturingOrder = get_record(db, ORDERS, id)?;
        let progress = order_progress_in(db, id)?;
        Ok(OrderSnapshot {
            late: order.is_late(Utc::now()),
            deletable: order.status.is_deletable(),
            progress,
            order,
        })
    }

    /// Orders, newest first.
    pub fn list_orders(
        &self,
        filter: &OrderFilter,
        params: &ListParams,
    ) -> Result<ListResult<ManufacturingOrder>, ServiceError> {
        let mut f: Vec<(&str, Value)> = Vec::new();
        if let Some(status) = filter.status {
            f.push(("status", Value::Text(status.as_str().into())));
        }
        if let Some(ref p) = filter.product_id {
            f.push(("product_id", Value::Text(p.clone())));
        }
        if let Some(ref c) = filter.created_by {
            f.push(("created_by", Value::Text(c.clone())));
        }
        list_records(
            self.sql.as_ref(),
            ORDERS,
            &f,
            "create_at DESC, rowid DESC",
            params.clamped_limit(),
            params.offset,
        )
    }

    /// Open orders whose end date has passed, earliest deadline first.
    pub fn list_late(&self, created_by: Option<&str>) -> Result<Vec<ManufacturingOrder>, ServiceError> {
        let mut sql = String::from(
            "SELECT data FROM manufacturing_orders \
             WHERE status NOT IN ('done', 'cancelled') AND end_date IS NOT NULL",
        );
        let mut args = Vec::new();
        if let Some(c) = created_by {
            sql.push_str(" AND created_by = ?1");
            args.push(Value::Text(c.to_string()));
        }
        sql.push_str(" ORDER BY end_date ASC, rowid ASC");

        let now = Utc::now();
        let open: Vec<ManufacturingOrder> = query_records(self.sql.as_ref(), &sql, &args)?;
        Ok(open.into_iter().filter(|o| o.is_late(now)).collect())
    }

    /// Merge-patch an order. Quantity and product change only in draft;
    /// finished or cancelled orders are frozen.
    pub fn update_order(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<ManufacturingOrder, ServiceError> {
        let tx = self.begin()?;
        let current: ManufacturingOrder = get_record(&*tx, ORDERS, id)?;
        if current.status.is_terminal() {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {} and cannot be edited",
                current.reference, current.status
            )));
        }

        let updated: ManufacturingOrder = apply_patch(&current, patch, PROTECTED)?;
        require_positive("quantity", updated.quantity)?;
        validate_dates(updated.start_date.as_deref(), updated.end_date.as_deref())?;

        let quantity_changed = updated.quantity != current.quantity;
        let product_changed = updated.product_id != current.product_id;
        if (quantity_changed || product_changed) && current.status != MoStatus::Draft {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {}, quantity and product are fixed",
                current.reference, current.status
            )));
        }
        if product_changed {
            let _product: Product = get_record(&*tx, PRODUCTS, &updated.product_id)?;
            if let Some(ref bom_id) = updated.bom_id {
                let bom: Bom = get_record(&*tx, BOMS, bom_id)?;
                ensure_bom_matches(&bom, &updated.product_id)?;
            }
        }

        save_order(&*tx, &updated)?;
        commit(tx)?;
        Ok(updated)
    }

    /// Move an order through its lifecycle, then run the post-commit hooks.
    ///
    /// The status write is a compare-and-swap on the status read in the
    /// same transaction, so of two racing callers only one succeeds. Hook
    /// failures come back as warnings; the transition stays committed.
    pub fn transition_order(
        &self,
        id: &str,
        action: OrderAction,
    ) -> Result<OrderTransition, ServiceError> {
        let tx = self.begin()?;
        let mut order: ManufacturingOrder = get_record(&*tx, ORDERS, id)?;
        let from = order.status;
        let to = from.apply(action).ok_or_else(|| {
            ServiceError::InvalidTransition(format!(
                "order {} cannot {} from {from}",
                order.reference,
                action.as_str()
            ))
        })?;

        order.status = to;
        order.update_at = Some(now_rfc3339());
        if !swap_status(&*tx, &order, from)? {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} changed status concurrently",
                order.reference
            )));
        }
        commit(tx)?;
        info!("order {} {from} -> {to}", order.reference);

        let event = match action {
            OrderAction::Confirm => OrderEvent::Confirmed,
            OrderAction::Start => OrderEvent::Started,
            OrderAction::Complete => OrderEvent::Completed,
            OrderAction::Cancel => OrderEvent::Cancelled,
        };
        let warnings = self.run_hooks(event, &order);

        // Hooks may have written to the order (e.g. reservation time).
        let order = self.get_order(id)?;
        Ok(OrderTransition { order, warnings })
    }

    pub fn confirm_order(&self, id: &str) -> Result<OrderTransition, ServiceError> {
        self.transition_order(id, OrderAction::Confirm)
    }

    pub fn start_order(&self, id: &str) -> Result<OrderTransition, ServiceError> {
        self.transition_order(id, OrderAction::Start)
    }

    pub fn complete_order(&self, id: &str) -> Result<OrderTransition, ServiceError> {
        self.transition_order(id, OrderAction::Complete)
    }

    pub fn cancel_order(&self, id: &str) -> Result<OrderTransition, ServiceError> {
        self.transition_order(id, OrderAction::Cancel)
    }

    pub fn is_deletable(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(self.get_order(id)?.status.is_deletable())
    }

    /// Delete a draft or cancelled order. Its work orders are kept.
    pub fn delete_order(&self, id: &str) -> Result<(), ServiceError> {
        let tx = self.begin()?;
        let order: ManufacturingOrder = get_record(&*tx, ORDERS, id)?;
        if !order.status.is_deletable() {
            return Err(ServiceError::Conflict(format!(
                "order {} is {} and cannot be deleted",
                order.reference, order.status
            )));
        }
        delete_record(&*tx, ORDERS, id)?;
        commit(tx)?;
        info!("deleted order {}", order.reference);
        Ok(())
    }

    /// Pin a BOM to a draft order and create its missing work orders.
    ///
    /// Switching to a different BOM first drops the pending work orders the
    /// previous routing produced.
    pub fn attach_bom(&self, id: &str, bom_id: &str) -> Result<ManufacturingOrder, ServiceError> {
        let tx = self.begin()?;
        let mut order: ManufacturingOrder = get_record(&*tx, ORDERS, id)?;
        if order.status != MoStatus::Draft {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {}, a BOM can only be attached in draft",
                order.reference, order.status
            )));
        }
        let bom: Bom = get_record(&*tx, BOMS, bom_id)?;
        ensure_bom_matches(&bom, &order.product_id)?;

        if order.bom_id.as_deref() != Some(bom.id.as_str()) {
            let dropped = drop_pending_work_orders(&*tx, &order.id)?;
            if dropped > 0 {
                debug!("order {}: dropped {dropped} pending work orders", order.reference);
            }
        }

        order.bom_id = Some(bom.id.clone());
        order.update_at = Some(now_rfc3339());
        save_order(&*tx, &order)?;
        let created = seed_work_orders(&*tx, &order, &bom)?;
        commit(tx)?;

        info!(
            "attached BOM {} to order {} ({} new work orders)",
            bom.name,
            order.reference,
            created.len()
        );
        Ok(order)
    }

    /// Labor from recorded work order durations plus materials at the
    /// order's quantity, valued at current unit costs.
    pub fn order_cost(&self, id: &str) -> Result<OrderCost, ServiceError> {
        let db = self.sql.as_ref();
        let order: ManufacturingOrder = get_record(db, ORDERS, id)?;

        let mut labor = Vec::new();
        for wo in work_orders_of(db, id)? {
            let Some(mins) = wo.real_duration_mins else {
                continue;
            };
            let rate = match wo.work_center_id {
                Some(ref wc) => {
                    let center: Option<WorkCenter> = find_record(db, WORK_CENTERS, wc)?;
                    center.map_or(0.0, |c| c.cost_per_hour)
                }
                None => 0.0,
            };
            let mins = mins as f64;
            labor.push(LaborCostLine {
                work_order_id: wo.id,
                operation_name: wo.operation_name,
                real_duration_mins: mins,
                cost_per_hour: rate,
                cost: round_qty(mins / 60.0 * rate),
            });
        }

        let mut materials = Vec::new();
        if let Some(ref bom_id) = order.bom_id {
            let bom: Bom = get_record(db, BOMS, bom_id)?;
            for c in scale_for_quantity(&bom, order.quantity)?.components {
                let product: Option<Product> = find_record(db, PRODUCTS, &c.product_id)?;
                let unit_cost = product.map_or(0.0, |p| p.unit_cost);
                materials.push(MaterialCostLine {
                    cost: round_qty(c.required_qty * unit_cost),
                    product_id: c.product_id,
                    required_qty: c.required_qty,
                    unit_cost,
                });
            }
        }

        let labor_cost = round_qty(labor.iter().map(|l| l.cost).sum());
        let material_cost = round_qty(materials.iter().map(|m| m.cost).sum());
        Ok(OrderCost {
            order_id: order.id,
            labor,
            materials,
            labor_cost,
            material_cost,
            total_cost: round_qty(labor_cost + material_cost),
        })
    }

    /// What a BOM would need for `quantity` units. Read-only.
    pub fn preview_bom_scaling(&self, bom_id: &str, quantity: f64) -> Result<ScaledBom, ServiceError> {
        self.scale_preview(bom_id, quantity)
    }
}

fn insert_order<E: Executor + ?Sized>(
    db: &E,
    product_id: String,
    quantity: f64,
    bom: Option<&Bom>,
    plan: OrderPlan,
) -> Result<ManufacturingOrder, ServiceError> {
    let seq = next_sequence(db, ORDER_SEQUENCE)?;
    let now = now_rfc3339();
    let order = ManufacturingOrder {
        id: new_id(),
        reference: format!("MO-{seq:05}"),
        product_id,
        bom_id: bom.map(|b| b.id.clone()),
        quantity,
        status: MoStatus::Draft,
        start_date: plan.start_date,
        end_date: plan.end_date,
        assignee: plan.assignee,
        created_by: plan.created_by,
        reserved_at: None,
        create_at: Some(now.clone()),
        update_at: Some(now),
    };

    let mut indexes = order_indexes(&order);
    indexes.push(("reference", Value::Text(order.reference.clone())));
    indexes.push(("create_at", Value::opt_text(order.create_at.as_deref())));
    insert_record(db, ORDERS, &order.id, &order, &indexes)?;

    if let Some(bom) = bom {
        seed_work_orders(db, &order, bom)?;
    }
    Ok(order)
}

fn order_indexes(order: &ManufacturingOrder) -> Vec<(&'static str, Value)> {
    vec![
        ("product_id", Value::Text(order.product_id.clone())),
        ("bom_id", Value::opt_text(order.bom_id.as_deref())),
        ("status", Value::Text(order.status.as_str().into())),
        ("created_by", Value::opt_text(order.created_by.as_deref())),
        ("end_date", Value::opt_text(order.end_date.as_deref())),
        ("update_at", Value::opt_text(order.update_at.as_deref())),
    ]
}

/// Write an order back unconditionally.
pub(crate) fn save_order<E: Executor + ?Sized>(
    db: &E,
    order: &ManufacturingOrder,
) -> Result<(), ServiceError> {
    super::records::update_record(db, ORDERS, &order.id, order, &order_indexes(order))
}

/// Write `order` only if its stored status is still `expected`.
fn swap_status<E: Executor + ?Sized>(
    db: &E,
    order: &ManufacturingOrder,
    expected: MoStatus,
) -> Result<bool, ServiceError> {
    let json = serde_json::to_string(order).map_err(|e| ServiceError::Internal(e.to_string()))?;
    let affected = db
        .exec(
            "UPDATE manufacturing_orders SET data = ?1, status = ?2, update_at = ?3 \
             WHERE id = ?4 AND status = ?5",
            &[
                Value::Text(json),
                Value::Text(order.status.as_str().into()),
                Value::opt_text(order.update_at.as_deref()),
                Value::Text(order.id.clone()),
                Value::Text(expected.as_str().into()),
            ],
        )
        .map_err(storage)?;
    Ok(affected == 1)
}

fn ensure_bom_matches(bom: &Bom, product_id: &str) -> Result<(), ServiceError> {
    if bom.product_id != product_id {
        return Err(ServiceError::Referential(format!(
            "BOM {} produces {}, not {product_id}",
            bom.id, bom.product_id
        )));
    }
    Ok(())
}

fn validate_plan(plan: &OrderPlan) -> Result<(), ServiceError> {
    validate_dates(plan.start_date.as_deref(), plan.end_date.as_deref())
}

fn validate_dates(start: Option<&str>, end: Option<&str>) -> Result<(), ServiceError> {
    let parse = |field: &str, v: Option<&str>| match v {
        None => Ok(None),
        Some(s) => parse_instant(s)
            .map(Some)
            .ok_or_else(|| ServiceError::Validation(format!("{field} is not a date: {s}"))),
    };
    let start = parse("startDate", start)?;
    let end = parse("endDate", end)?;
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(ServiceError::Validation("endDate is before startDate".into()));
        }
    }
    Ok(())
}
