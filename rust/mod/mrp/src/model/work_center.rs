use serde::{Deserialize, Serialize};

/// Work center: a station operations run on, priced per hour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkCenter {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub cost_per_hour: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkCenterInput {
    pub name: String,
    #[serde(default)]
    pub cost_per_hour: f64,
}
