//! Post-commit hooks run after an order transition has committed.
//!
//! Each hook is independent: a failure is logged, reported back to the caller
//! as a [`HookWarning`], and never undoes the transition.

use std::sync::Arc;

use tracing::{debug, info, warn};

use openmes_core::ServiceError;

use crate::model::{HookWarning, ManufacturingOrder};

use super::MrpService;

/// Order lifecycle events hooks can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Confirmed,
    Started,
    Completed,
    Cancelled,
}

impl OrderEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A best-effort side effect of an order transition.
pub trait OrderHook: Send + Sync {
    /// Hook name, used in logs and warnings.
    fn name(&self) -> &str;

    fn handle(
        &self,
        svc: &MrpService,
        event: OrderEvent,
        order: &ManufacturingOrder,
    ) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// Reservation on confirm
// ---------------------------------------------------------------------------

/// Reserves BOM components when an order is confirmed.
pub struct ReserveOnConfirm;

impl OrderHook for ReserveOnConfirm {
    fn name(&self) -> &str {
        "reserve_components"
    }

    fn handle(
        &self,
        svc: &MrpService,
        event: OrderEvent,
        order: &ManufacturingOrder,
    ) -> Result<(), ServiceError> {
        if event != OrderEvent::Confirmed {
            return Ok(());
        }
        if order.bom_id.is_none() {
            debug!("order {} has no BOM, nothing to reserve", order.reference);
            return Ok(());
        }
        svc.reserve_components(&order.id).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Notification on complete
// ---------------------------------------------------------------------------

/// Delivery channel for order notifications.
pub trait Notifier: Send + Sync {
    fn order_completed(
        &self,
        recipient: &str,
        order: &ManufacturingOrder,
    ) -> Result<(), ServiceError>;
}

/// Notifier that only writes a log line.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn order_completed(
        &self,
        recipient: &str,
        order: &ManufacturingOrder,
    ) -> Result<(), ServiceError> {
        info!(
            "notify {recipient}: order {} completed ({} x {})",
            order.reference, order.quantity, order.product_id
        );
        Ok(())
    }
}

/// Tells the order's creator that it was completed.
pub struct NotifyOnComplete {
    notifier: Arc<dyn Notifier>,
}

impl NotifyOnComplete {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

impl OrderHook for NotifyOnComplete {
    fn name(&self) -> &str {
        "notify_creator"
    }

    fn handle(
        &self,
        _svc: &MrpService,
        event: OrderEvent,
        order: &ManufacturingOrder,
    ) -> Result<(), ServiceError> {
        if event != OrderEvent::Completed {
            return Ok(());
        }
        match order.created_by.as_deref() {
            Some(creator) => self.notifier.order_completed(creator, order),
            None => {
                debug!("order {} has no creator to notify", order.reference);
                Ok(())
            }
        }
    }
}

/// Reservation on confirm plus log-only completion notices.
pub fn default_hooks() -> Vec<Arc<dyn OrderHook>> {
    vec![
        Arc::new(ReserveOnConfirm),
        Arc::new(NotifyOnComplete::new(Arc::new(LogNotifier))),
    ]
}

impl MrpService {
    /// Run every hook for `event`, collecting failures as warnings.
    pub(crate) fn run_hooks(
        &self,
        event: OrderEvent,
        order: &ManufacturingOrder,
    ) -> Vec<HookWarning> {
        let mut warnings = Vec::new();
        for hook in &self.hooks {
            if let Err(e) = hook.handle(self, event, order) {
                warn!(
                    "hook {} failed after order {} {}: {e}",
                    hook.name(),
                    order.reference,
                    event.as_str()
                );
                warnings.push(HookWarning {
                    hook: hook.name().to_string(),
                    code: e.error_code().to_string(),
                    message: e.to_string(),
                });
            }
        }
        warnings
    }
}
