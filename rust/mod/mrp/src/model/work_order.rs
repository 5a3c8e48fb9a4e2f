use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use openmes_core::ServiceError;

use super::parse_instant;

/// Lifecycle state of a work order.
///
/// ```text
/// pending → in_progress ⇄ paused
///              └──────────┴──→ done
/// (any non-terminal) ──────────→ cancelled
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WoStatus {
    #[default]
    Pending,
    InProgress,
    Paused,
    Done,
    Cancelled,
}

impl WoStatus {
    pub const ALL: [WoStatus; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Paused,
        Self::Done,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "paused" => Some(Self::Paused),
            "done" => Some(Self::Done),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl std::fmt::Display for WoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation of a manufacturing order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    #[serde(default)]
    pub id: String,

    pub mo_id: String,

    /// BOM operation this row was generated from. `None` for fallback steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    pub operation_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_center_id: Option<String>,

    #[serde(default)]
    pub sequence: u32,

    #[serde(default)]
    pub expected_duration_mins: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    #[serde(default)]
    pub status: WoStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,

    /// Wall-clock minutes from first start to completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_duration_mins: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

impl WorkOrder {
    fn refuse(&self, op: &str) -> ServiceError {
        ServiceError::InvalidTransition(format!(
            "work order {} cannot {op} from {}",
            self.id, self.status
        ))
    }

    /// pending|paused → in_progress. Keeps the first `started_at`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if !matches!(self.status, WoStatus::Pending | WoStatus::Paused) {
            return Err(self.refuse("start"));
        }
        self.status = WoStatus::InProgress;
        if self.started_at.is_none() {
            self.started_at = Some(now.to_rfc3339());
        }
        Ok(())
    }

    /// Same guard and effect as [`WorkOrder::start`].
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.start(now)
    }

    /// in_progress → paused.
    pub fn pause(&mut self) -> Result<(), ServiceError> {
        if self.status != WoStatus::InProgress {
            return Err(self.refuse("pause"));
        }
        self.status = WoStatus::Paused;
        Ok(())
    }

    /// in_progress|paused → done, measuring from the original start.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if !matches!(self.status, WoStatus::InProgress | WoStatus::Paused) {
            return Err(self.refuse("complete"));
        }
        self.status = WoStatus::Done;
        self.ended_at = Some(now.to_rfc3339());
        if let Some(started) = self.started_at.as_deref().and_then(parse_instant) {
            let secs = (now - started).num_seconds().max(0);
            self.real_duration_mins = Some((secs as f64 / 60.0).round() as i64);
        }
        Ok(())
    }

    /// Any non-terminal state → cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.status.is_terminal() {
            return Err(self.refuse("cancel"));
        }
        self.status = WoStatus::Cancelled;
        self.ended_at = Some(now.to_rfc3339());
        Ok(())
    }
}

/// Operator-driven work order transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOrderAction {
    Start,
    Pause,
    Resume,
    Complete,
    Cancel,
}

impl WorkOrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }

    /// Apply to `wo` at instant `now`.
    pub fn apply(self, wo: &mut WorkOrder, now: DateTime<Utc>) -> Result<(), ServiceError> {
        match self {
            Self::Start => wo.start(now),
            Self::Pause => wo.pause(),
            Self::Resume => wo.resume(now),
            Self::Complete => wo.complete(now),
            Self::Cancel => wo.cancel(now),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderFilter {
    #[serde(default)]
    pub mo_id: Option<String>,
    #[serde(default)]
    pub status: Option<WoStatus>,
    #[serde(default)]
    pub work_center_id: Option<String>,
}

/// Result of a work order transition, with the owning order's fresh progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderTransition {
    pub work_order: WorkOrder,
    pub progress: super::OrderProgress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn wo() -> WorkOrder {
        WorkOrder {
            id: "wo1".into(),
            mo_id: "mo1".into(),
            operation_id: None,
            operation_name: "Cut".into(),
            work_center_id: None,
            sequence: 1,
            expected_duration_mins: 30.0,
            assigned_to: None,
            status: WoStatus::Pending,
            started_at: None,
            ended_at: None,
            real_duration_mins: None,
            create_at: None,
            update_at: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
    }

    #[test]
    fn resume_after_pause_keeps_original_start() {
        let mut w = wo();
        w.start(t0()).unwrap();
        let first = w.started_at.clone();

        w.pause().unwrap();
        w.start(t0() + Duration::minutes(20)).unwrap();
        assert_eq!(w.started_at, first);
        assert_eq!(w.status, WoStatus::InProgress);

        w.complete(t0() + Duration::minutes(45)).unwrap();
        assert_eq!(w.status, WoStatus::Done);
        assert_eq!(w.real_duration_mins, Some(45));
        assert!(w.ended_at.is_some());
    }

    #[test]
    fn complete_from_paused() {
        let mut w = wo();
        w.start(t0()).unwrap();
        w.pause().unwrap();
        w.complete(t0() + Duration::seconds(90 * 60 + 20)).unwrap();
        assert_eq!(w.real_duration_mins, Some(90));
    }

    #[test]
    fn complete_without_start_time_leaves_duration_unset() {
        let mut w = wo();
        w.status = WoStatus::InProgress;
        w.complete(t0()).unwrap();
        assert_eq!(w.status, WoStatus::Done);
        assert!(w.real_duration_mins.is_none());
    }

    #[test]
    fn refused_transitions_leave_row_untouched() {
        let mut w = wo();
        let before = w.clone();
        assert!(matches!(w.pause(), Err(ServiceError::InvalidTransition(_))));
        assert!(matches!(w.complete(t0()), Err(ServiceError::InvalidTransition(_))));
        assert_eq!(w, before);

        w.start(t0()).unwrap();
        w.complete(t0()).unwrap();
        let done = w.clone();
        for action in [
            WorkOrderAction::Start,
            WorkOrderAction::Pause,
            WorkOrderAction::Resume,
            WorkOrderAction::Complete,
            WorkOrderAction::Cancel,
        ] {
            assert!(action.apply(&mut w, t0()).is_err(), "{} on done", action.as_str());
        }
        assert_eq!(w, done);
    }

    #[test]
    fn cancel_from_any_open_state() {
        for status in [WoStatus::Pending, WoStatus::InProgress, WoStatus::Paused] {
            let mut w = wo();
            w.status = status;
            w.cancel(t0()).unwrap();
            assert_eq!(w.status, WoStatus::Cancelled);
        }
        let mut w = wo();
        w.status = WoStatus::Cancelled;
        assert!(w.cancel(t0()).is_err());
    }

    #[test]
    fn status_wire_roundtrip() {
        for s in WoStatus::ALL {
            let json = serde_json::to_string(&s).unwrap();
            let back: WoStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, s);
            assert_eq!(WoStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(WoStatus::default(), WoStatus::Pending);
    }
}
