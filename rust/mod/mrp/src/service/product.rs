use openmes_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use openmes_sql::Value;

use crate::model::{CreateProductInput, Product};

use super::records::{apply_patch, get_record, insert_record, list_records, update_record};
use super::schema::PRODUCTS;
use super::{MrpService, require_non_negative, require_text};

impl MrpService {
    // ── Product ──

    pub fn create_product(&self, input: CreateProductInput) -> Result<Product, ServiceError> {
        require_text("name", &input.name)?;
        require_text("uom", &input.uom)?;
        require_non_negative("unitCost", input.unit_cost)?;

        let id = new_id();
        let now = now_rfc3339();
        let record = Product {
            id: id.clone(),
            name: input.name,
            uom: input.uom,
            unit_cost: input.unit_cost,
            category: input.category,
            is_component: input.is_component,
            create_at: Some(now.clone()),
            update_at: Some(now.clone()),
        };

        insert_record(self.sql.as_ref(), PRODUCTS, &id, &record, &[
            ("name", Value::Text(record.name.clone())),
            ("category", Value::Text(record.category.as_str().into())),
            ("create_at", Value::Text(now.clone())),
            ("update_at", Value::Text(now)),
        ])?;

        Ok(record)
    }

    pub fn get_product(&self, id: &str) -> Result<Product, ServiceError> {
        get_record(self.sql.as_ref(), PRODUCTS, id)
    }

    pub fn list_products(&self, params: &ListParams) -> Result<ListResult<Product>, ServiceError> {
        list_records(
            self.sql.as_ref(),
            PRODUCTS,
            &[],
            "name ASC, rowid ASC",
            params.clamped_limit(),
            params.offset,
        )
    }

    /// Merge-patch a product. Used to correct names or set a unit cost by hand.
    pub fn update_product(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Product, ServiceError> {
        let current: Product = self.get_product(id)?;
        let updated: Product = apply_patch(&current, patch, &[])?;
        require_text("name", &updated.name)?;
        require_non_negative("unitCost", updated.unit_cost)?;

        update_record(self.sql.as_ref(), PRODUCTS, id, &updated, &[
            ("name", Value::Text(updated.name.clone())),
            ("category", Value::Text(updated.category.as_str().into())),
            ("update_at", Value::opt_text(updated.update_at.as_deref())),
        ])?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ProductCategory;
    use crate::service::testing::service;

    use super::*;

    fn input(name: &str) -> CreateProductInput {
        CreateProductInput {
            name: name.into(),
            uom: "kg".into(),
            unit_cost: 2.5,
            category: ProductCategory::RawMaterial,
            is_component: true,
        }
    }

    #[test]
    fn create_get_list() {
        let svc = service();
        let b = svc.create_product(input("Bolt")).unwrap();
        svc.create_product(input("Axle")).unwrap();

        assert_eq!(svc.get_product(&b.id).unwrap(), b);

        let all = svc.list_products(&ListParams::default()).unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].name, "Axle");
    }

    #[test]
    fn rejects_bad_input() {
        let svc = service();
        assert!(matches!(
            svc.create_product(input("  ")),
            Err(ServiceError::Validation(_))
        ));
        let mut neg = input("Bolt");
        neg.unit_cost = -1.0;
        assert!(matches!(svc.create_product(neg), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn update_keeps_identity() {
        let svc = service();
        let p = svc.create_product(input("Bolt")).unwrap();
        let updated = svc
            .update_product(&p.id, serde_json::json!({"id": "x", "unitCost": 4.0}))
            .unwrap();
        assert_eq!(updated.id, p.id);
        assert_eq!(updated.unit_cost, 4.0);
        assert_eq!(updated.create_at, p.create_at);

        let bad = svc.update_product(&p.id, serde_json::json!({"unitCost": -3}));
        assert!(matches!(bad, Err(ServiceError::Validation(_))));
        assert!(matches!(
            svc.update_product("nope", serde_json::json!({})),
            Err(ServiceError::NotFound(_))
        ));
    }
}
