use tracing::info;

use openmes_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use openmes_sql::{Executor, Value};

use crate::model::{
    Bom, BomInput, BomOperation, Product, ScaledBom, ScaledComponent, ScaledOperation, WorkCenter,
    round_qty,
};

use super::records::{
    delete_record, find_record, get_record, insert_record, list_records, storage, update_record,
};
use super::schema::{BOMS, PRODUCTS, WORK_CENTERS};
use super::{MrpService, commit, require_non_negative, require_positive, require_text};

/// Resolve `bom` for `target` units of output.
///
/// Each component needs `qty_per_unit * target / output_quantity`, rounded to
/// four places. Operations come back by ascending sequence, ties kept in
/// their BOM order.
pub fn scale_for_quantity(bom: &Bom, target: f64) -> Result<ScaledBom, ServiceError> {
    require_positive("quantity", target)?;
    if !bom.output_quantity.is_finite() || bom.output_quantity <= 0.0 {
        return Err(ServiceError::Validation(format!(
            "BOM {} has non-positive output quantity",
            bom.id
        )));
    }
    let factor = target / bom.output_quantity;

    let components = bom
        .components
        .iter()
        .map(|c| ScaledComponent {
            product_id: c.product_id.clone(),
            per_output_qty: c.qty_per_unit,
            required_qty: round_qty(c.qty_per_unit * factor),
            uom: c.uom.clone(),
        })
        .collect();

    let mut operations: Vec<ScaledOperation> = bom
        .operations
        .iter()
        .map(|op| ScaledOperation {
            id: op.id.clone(),
            name: op.name.clone(),
            sequence: op.sequence,
            work_center_id: op.work_center_id.clone(),
            duration_mins: op.duration_mins,
        })
        .collect();
    operations.sort_by_key(|op| op.sequence);

    Ok(ScaledBom {
        bom_id: bom.id.clone(),
        target_quantity: target,
        components,
        operations,
    })
}

impl MrpService {
    // ── BOM ──

    pub fn create_bom(&self, input: BomInput) -> Result<Bom, ServiceError> {
        let tx = self.begin()?;
        validate_bom_input(&*tx, &input)?;

        let id = new_id();
        let now = now_rfc3339();
        let operations = input
            .operations
            .into_iter()
            .map(|op| BomOperation {
                id: new_id(),
                name: op.name,
                work_center_id: op.work_center_id,
                sequence: op.sequence,
                duration_mins: op.duration_mins,
            })
            .collect();
        let record = Bom {
            id: id.clone(),
            product_id: input.product_id,
            name: input.name,
            output_quantity: input.output_quantity,
            components: input.components,
            operations,
            create_at: Some(now.clone()),
            update_at: Some(now.clone()),
        };

        insert_record(&*tx, BOMS, &id, &record, &[
            ("product_id", Value::Text(record.product_id.clone())),
            ("name", Value::Text(record.name.clone())),
            ("create_at", Value::Text(now.clone())),
            ("update_at", Value::Text(now)),
        ])?;
        commit(tx)?;

        info!("created BOM {} ({}) for product {}", record.name, id, record.product_id);
        Ok(record)
    }

    pub fn get_bom(&self, id: &str) -> Result<Bom, ServiceError> {
        get_record(self.sql.as_ref(), BOMS, id)
    }

    pub fn list_boms(
        &self,
        product_id: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<Bom>, ServiceError> {
        let mut f: Vec<(&str, Value)> = Vec::new();
        if let Some(p) = product_id {
            f.push(("product_id", Value::Text(p.to_string())));
        }
        list_records(
            self.sql.as_ref(),
            BOMS,
            &f,
            "create_at DESC, rowid DESC",
            params.clamped_limit(),
            params.offset,
        )
    }

    /// Replace a BOM's label, output, components and operations.
    ///
    /// Operations whose name matches an existing one keep its id, so work
    /// orders already generated from them stay linked.
    pub fn update_bom(&self, id: &str, input: BomInput) -> Result<Bom, ServiceError> {
        let tx = self.begin()?;
        let current: Bom = get_record(&*tx, BOMS, id)?;
        ensure_unlocked(&*tx, id)?;
        validate_bom_input(&*tx, &input)?;
        if input.product_id != current.product_id {
            ensure_product_unpinned(&*tx, id)?;
        }

        let mut unclaimed = current.operations.clone();
        let operations = input
            .operations
            .into_iter()
            .map(|op| {
                let id = match unclaimed.iter().position(|o| o.name == op.name) {
                    Some(i) => unclaimed.remove(i).id,
                    None => new_id(),
                };
                BomOperation {
                    id,
                    name: op.name,
                    work_center_id: op.work_center_id,
                    sequence: op.sequence,
                    duration_mins: op.duration_mins,
                }
            })
            .collect();

        let updated = Bom {
            id: current.id.clone(),
            product_id: input.product_id,
            name: input.name,
            output_quantity: input.output_quantity,
            components: input.components,
            operations,
            create_at: current.create_at,
            update_at: Some(now_rfc3339()),
        };

        update_record(&*tx, BOMS, id, &updated, &[
            ("product_id", Value::Text(updated.product_id.clone())),
            ("name", Value::Text(updated.name.clone())),
            ("update_at", Value::opt_text(updated.update_at.as_deref())),
        ])?;
        commit(tx)?;

        info!("updated BOM {}", id);
        Ok(updated)
    }

    pub fn delete_bom(&self, id: &str) -> Result<(), ServiceError> {
        let tx = self.begin()?;
        ensure_unlocked(&*tx, id)?;
        delete_record(&*tx, BOMS, id)?;
        commit(tx)?;
        info!("deleted BOM {}", id);
        Ok(())
    }

    /// Scale a stored BOM without writing anything.
    pub fn scale_preview(&self, bom_id: &str, quantity: f64) -> Result<ScaledBom, ServiceError> {
        let bom = self.get_bom(bom_id)?;
        scale_for_quantity(&bom, quantity)
    }
}

/// A BOM used by a confirmed, running or finished order is frozen.
fn ensure_unlocked<E: Executor + ?Sized>(db: &E, bom_id: &str) -> Result<(), ServiceError> {
    let rows = db
        .query(
            "SELECT COUNT(*) AS cnt FROM manufacturing_orders \
             WHERE bom_id = ?1 AND status IN ('confirmed', 'in_progress', 'done')",
            &[Value::Text(bom_id.to_string())],
        )
        .map_err(storage)?;
    let users = rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0);
    if users > 0 {
        return Err(ServiceError::Conflict(format!(
            "BOM {bom_id} is referenced by {users} active or finished order(s)"
        )));
    }
    Ok(())
}

/// An order's BOM must keep producing the order's product.
fn ensure_product_unpinned<E: Executor + ?Sized>(db: &E, bom_id: &str) -> Result<(), ServiceError> {
    let rows = db
        .query(
            "SELECT COUNT(*) AS cnt FROM manufacturing_orders \
             WHERE bom_id = ?1 AND status != 'cancelled'",
            &[Value::Text(bom_id.to_string())],
        )
        .map_err(storage)?;
    let users = rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0);
    if users > 0 {
        return Err(ServiceError::Referential(format!(
            "BOM {bom_id} is used by {users} order(s) and cannot change product"
        )));
    }
    Ok(())
}

fn validate_bom_input<E: Executor + ?Sized>(db: &E, input: &BomInput) -> Result<(), ServiceError> {
    require_text("name", &input.name)?;
    require_positive("outputQuantity", input.output_quantity)?;

    let product: Option<Product> = find_record(db, PRODUCTS, &input.product_id)?;
    if product.is_none() {
        return Err(ServiceError::NotFound(format!(
            "BOM product {} does not exist",
            input.product_id
        )));
    }

    for c in &input.components {
        require_positive("qtyPerUnit", c.qty_per_unit)?;
        if c.product_id == input.product_id {
            return Err(ServiceError::Validation(format!(
                "product {} cannot be a component of itself",
                c.product_id
            )));
        }
        let component: Option<Product> = find_record(db, PRODUCTS, &c.product_id)?;
        if component.is_none() {
            return Err(ServiceError::NotFound(format!(
                "component product {} does not exist",
                c.product_id
            )));
        }
    }

    for op in &input.operations {
        require_text("operation name", &op.name)?;
        require_non_negative("durationMins", op.duration_mins)?;
        if op.sequence == 0 {
            return Err(ServiceError::Validation(format!(
                "operation '{}' needs a positive sequence",
                op.name
            )));
        }
        if let Some(ref wc) = op.work_center_id {
            let center: Option<WorkCenter> = find_record(db, WORK_CENTERS, wc)?;
            if center.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "work center {wc} does not exist"
                )));
            }
        }
    }
    Ok(())
}
