use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parse_instant;

// ---------------------------------------------------------------------------
// MoStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a manufacturing order.
///
/// ```text
/// draft → confirmed → in_progress → done
///   └────────┴────────────┴──→ cancelled
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoStatus {
    #[default]
    Draft,
    Confirmed,
    InProgress,
    Done,
    Cancelled,
}

impl MoStatus {
    pub const ALL: [MoStatus; 5] = [
        Self::Draft,
        Self::Confirmed,
        Self::InProgress,
        Self::Done,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "confirmed" => Some(Self::Confirmed),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Only orders that never ran, or were abandoned, may be deleted.
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Draft | Self::Cancelled)
    }

    /// Target state of `action` from this state, or `None` when refused.
    pub fn apply(self, action: OrderAction) -> Option<MoStatus> {
        use MoStatus::*;
        match (action, self) {
            (OrderAction::Confirm, Draft) => Some(Confirmed),
            (OrderAction::Start, Confirmed | InProgress) => Some(InProgress),
            (OrderAction::Complete, InProgress) => Some(Done),
            (OrderAction::Cancel, Draft | Confirmed | InProgress) => Some(Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for MoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-driven transitions of a manufacturing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Confirm,
    Start,
    Complete,
    Cancel,
}

impl OrderAction {
    pub const ALL: [OrderAction; 4] = [Self::Confirm, Self::Start, Self::Complete, Self::Cancel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

// ---------------------------------------------------------------------------
// ManufacturingOrder
// ---------------------------------------------------------------------------

/// A production request for `quantity` units of a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturingOrder {
    #[serde(default)]
    pub id: String,

    /// Display code, e.g. "MO-00042".
    #[serde(default)]
    pub reference: String,

    pub product_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bom_id: Option<String>,

    pub quantity: f64,

    #[serde(default)]
    pub status: MoStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    /// When component reservation was posted to the ledger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

impl ManufacturingOrder {
    /// Past its end date and still open. Computed at query time, never stored.
    pub fn is_late(&self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.end_date
            .as_deref()
            .and_then(parse_instant)
            .is_some_and(|end| end < now)
    }
}

// ---------------------------------------------------------------------------
// Command inputs
// ---------------------------------------------------------------------------

/// Planning fields shared by both creation paths.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlan {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    pub product_id: String,
    pub quantity: f64,
    #[serde(default)]
    pub bom_id: Option<String>,
    #[serde(flatten)]
    pub plan: OrderPlan,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderFromBomInput {
    pub bom_id: String,
    pub quantity: f64,
    #[serde(flatten)]
    pub plan: OrderPlan,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    #[serde(default)]
    pub status: Option<MoStatus>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Work order counts for one manufacturing order, read from committed rows.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderProgress {
    pub order_id: String,
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub paused: usize,
    pub done: usize,
    pub cancelled: usize,
}

impl OrderProgress {
    /// Every non-cancelled work order is done (vacuously false when empty).
    pub fn all_done(&self) -> bool {
        self.total > 0 && self.done + self.cancelled == self.total && self.done > 0
    }
}

/// Order plus its derived state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub order: ManufacturingOrder,
    pub progress: OrderProgress,
    pub late: bool,
    pub deletable: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAvailability {
    pub product_id: String,
    pub required_qty: f64,
    pub on_hand: f64,
    pub shortfall: f64,
    pub sufficient: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaborCostLine {
    pub work_order_id: String,
    pub operation_name: String,
    pub real_duration_mins: f64,
    pub cost_per_hour: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialCostLine {
    pub product_id: String,
    pub required_qty: f64,
    pub unit_cost: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderCost {
    pub order_id: String,
    pub labor: Vec<LaborCostLine>,
    pub materials: Vec<MaterialCostLine>,
    pub labor_cost: f64,
    pub material_cost: f64,
    pub total_cost: f64,
}

/// A failed post-commit hook. The transition itself has committed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookWarning {
    pub hook: String,
    pub code: String,
    pub message: String,
}

/// Result of an order transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTransition {
    pub order: ManufacturingOrder,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<HookWarning>,
}
