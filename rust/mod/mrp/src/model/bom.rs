use serde::{Deserialize, Serialize};

use super::product::default_uom;

/// Decimal places kept on every scaled quantity.
pub const QTY_DECIMALS: i32 = 4;

/// Round a quantity to [`QTY_DECIMALS`] places.
///
/// Used for BOM previews, reservations and cost lines alike so a quoted
/// requirement is exactly what gets posted.
pub fn round_qty(v: f64) -> f64 {
    let factor = 10f64.powi(QTY_DECIMALS);
    (v * factor).round() / factor
}

/// One component line of a BOM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BomComponent {
    pub product_id: String,

    /// Quantity required per one unit of BOM output.
    pub qty_per_unit: f64,

    #[serde(default = "default_uom")]
    pub uom: String,
}

/// One routing step of a BOM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BomOperation {
    /// Stable id, referenced by generated work orders.
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_center_id: Option<String>,

    /// Execution order. Gaps and duplicates are allowed.
    pub sequence: u32,

    /// Expected duration in minutes.
    #[serde(default)]
    pub duration_mins: f64,
}

/// Bill of Materials: the recipe for `output_quantity` units of a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bom {
    #[serde(default)]
    pub id: String,

    /// Product this BOM produces.
    pub product_id: String,

    /// Name / version label (e.g. "Chair v2").
    pub name: String,

    /// Batch size the recipe produces.
    pub output_quantity: f64,

    #[serde(default)]
    pub components: Vec<BomComponent>,

    #[serde(default)]
    pub operations: Vec<BomOperation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

/// Input for creating or replacing a BOM.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomInput {
    pub product_id: String,
    pub name: String,
    pub output_quantity: f64,
    #[serde(default)]
    pub components: Vec<BomComponent>,
    #[serde(default)]
    pub operations: Vec<BomOperationInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomOperationInput {
    pub name: String,
    #[serde(default)]
    pub work_center_id: Option<String>,
    pub sequence: u32,
    #[serde(default)]
    pub duration_mins: f64,
}

// ---------------------------------------------------------------------------
// Scaled view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScaledComponent {
    pub product_id: String,
    pub per_output_qty: f64,
    pub required_qty: f64,
    pub uom: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScaledOperation {
    pub id: String,
    pub name: String,
    pub sequence: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_center_id: Option<String>,
    pub duration_mins: f64,
}

/// A BOM resolved for a concrete target quantity.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScaledBom {
    pub bom_id: String,
    pub target_quantity: f64,
    pub components: Vec<ScaledComponent>,
    pub operations: Vec<ScaledOperation>,
}
