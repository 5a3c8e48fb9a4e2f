use serde::{Deserialize, Serialize};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            _ => None,
        }
    }
}

/// One append-only row of the stock ledger.
///
/// All fields map directly to SQL columns; on-hand quantities are always
/// aggregated from these rows on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub product_id: String,
    pub movement_type: MovementType,
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Unit cost posted with this movement, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
    pub create_at: String,
}

/// Command to append a movement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMovement {
    pub product_id: String,
    pub movement_type: MovementType,
    pub quantity: f64,
    #[serde(default)]
    pub reference: Option<String>,
    /// Overwrites the product's unit cost (last value wins).
    #[serde(default)]
    pub unit_cost: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerFilter {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub movement_type: Option<MovementType>,
    /// Substring match on the movement reference.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Stock position of one product, derived from the ledger.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub product_id: String,
    pub product_name: String,
    pub uom: String,
    pub incoming: f64,
    pub outgoing: f64,
    pub on_hand: f64,
    /// Equal to `on_hand`; reservations are posted as outgoing movements.
    pub free_to_use: f64,
    pub unit_cost: f64,
    pub total_value: f64,
}

/// Outgoing postings made for one manufacturing order.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub order_id: String,
    pub reference: String,
    pub entries: Vec<LedgerEntry>,
}
