use serde::{Deserialize, Serialize};

/// Product category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    #[default]
    RawMaterial,
    Finished,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawMaterial => "raw_material",
            Self::Finished => "finished",
        }
    }
}

/// Product: anything that can be stocked, consumed or produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: String,

    pub name: String,

    /// Unit of measure (e.g. "pcs", "kg").
    #[serde(default = "default_uom")]
    pub uom: String,

    /// Last posted unit cost. Ledger movements may overwrite it.
    #[serde(default)]
    pub unit_cost: f64,

    #[serde(default)]
    pub category: ProductCategory,

    /// Whether the product may appear as a BOM component.
    #[serde(default)]
    pub is_component: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

pub(crate) fn default_uom() -> String {
    "pcs".to_string()
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    pub name: String,
    #[serde(default = "default_uom")]
    pub uom: String,
    #[serde(default)]
    pub unit_cost: f64,
    #[serde(default)]
    pub category: ProductCategory,
    #[serde(default)]
    pub is_component: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_defaults_from_minimal_json() {
        let p: Product = serde_json::from_str(r#"{"name":"Steel sheet"}"#).unwrap();
        assert_eq!(p.uom, "pcs");
        assert_eq!(p.unit_cost, 0.0);
        assert_eq!(p.category, ProductCategory::RawMaterial);
        assert!(!p.is_component);
    }

    #[test]
    fn category_wire_names() {
        assert_eq!(serde_json::to_string(&ProductCategory::RawMaterial).unwrap(), "\"raw_material\"");
        assert_eq!(ProductCategory::Finished.as_str(), "finished");
    }
}
