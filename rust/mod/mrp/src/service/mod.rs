pub mod hooks;
pub mod schema;

mod availability;
mod bom;
mod ledger;
mod order;
mod product;
mod records;
mod work_center;
mod work_order;

use std::sync::Arc;

use openmes_core::ServiceError;
use openmes_sql::{SQLStore, Transaction};

pub use bom::scale_for_quantity;
pub use hooks::{
    LogNotifier, Notifier, NotifyOnComplete, OrderEvent, OrderHook, ReserveOnConfirm,
    default_hooks,
};

use records::storage;

/// Manufacturing service. Owns the store handle and the order hooks.
pub struct MrpService {
    pub(crate) sql: Arc<dyn SQLStore>,
    hooks: Vec<Arc<dyn OrderHook>>,
}

impl MrpService {
    /// Create the service with the default hooks, migrating the schema first.
    pub fn new(sql: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        Self::with_hooks(sql, default_hooks())
    }

    /// Create the service with an explicit hook list (may be empty).
    pub fn with_hooks(
        sql: Arc<dyn SQLStore>,
        hooks: Vec<Arc<dyn OrderHook>>,
    ) -> Result<Self, ServiceError> {
        schema::migrate(sql.as_ref())?;
        Ok(Self { sql, hooks })
    }

    /// Access the underlying store.
    pub fn store(&self) -> &Arc<dyn SQLStore> {
        &self.sql
    }

    pub(crate) fn begin(&self) -> Result<Box<dyn Transaction + '_>, ServiceError> {
        self.sql.begin().map_err(storage)
    }
}

pub(crate) fn commit(tx: Box<dyn Transaction + '_>) -> Result<(), ServiceError> {
    tx.commit().map_err(storage)
}

/// Reject NaN, infinities and non-positive values.
pub(crate) fn require_positive(field: &str, v: f64) -> Result<(), ServiceError> {
    if !v.is_finite() || v <= 0.0 {
        return Err(ServiceError::Validation(format!(
            "{field} must be a positive number, got {v}"
        )));
    }
    Ok(())
}

/// Reject NaN, infinities and negative values.
pub(crate) fn require_non_negative(field: &str, v: f64) -> Result<(), ServiceError> {
    if !v.is_finite() || v < 0.0 {
        return Err(ServiceError::Validation(format!(
            "{field} must be zero or more, got {v}"
        )));
    }
    Ok(())
}

pub(crate) fn require_text(field: &str, v: &str) -> Result<(), ServiceError> {
    if v.trim().is_empty() {
        return Err(ServiceError::Validation(format!("missing '{field}'")));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use openmes_sql::SqliteStore;

    use super::*;
    use crate::model::{BomComponent, BomInput, BomOperationInput, CreateProductInput, ProductCategory};

    pub fn service() -> MrpService {
        let db = Arc::new(SqliteStore::open_in_memory().unwrap());
        MrpService::new(db).unwrap()
    }

    pub fn product(svc: &MrpService, name: &str, unit_cost: f64) -> String {
        svc.create_product(CreateProductInput {
            name: name.into(),
            uom: "pcs".into(),
            unit_cost,
            category: ProductCategory::RawMaterial,
            is_component: true,
        })
        .unwrap()
        .id
    }

    pub fn op(name: &str, sequence: u32) -> BomOperationInput {
        BomOperationInput {
            name: name.into(),
            work_center_id: None,
            sequence,
            duration_mins: 10.0,
        }
    }

    pub fn component(product_id: &str, qty_per_unit: f64) -> BomComponent {
        BomComponent {
            product_id: product_id.into(),
            qty_per_unit,
            uom: "pcs".into(),
        }
    }

    pub fn bom_input(
        product_id: &str,
        output_quantity: f64,
        components: Vec<BomComponent>,
        operations: Vec<BomOperationInput>,
    ) -> BomInput {
        BomInput {
            product_id: product_id.into(),
            name: "test bom".into(),
            output_quantity,
            components,
            operations,
        }
    }
}
