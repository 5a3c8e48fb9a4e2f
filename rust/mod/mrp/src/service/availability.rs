use tracing::{debug, info};

use openmes_core::{ServiceError, ShortfallLine, now_rfc3339};
use openmes_sql::Executor;

use crate::model::{
    Bom, ComponentAvailability, ManufacturingOrder, MoStatus, MovementType, Reservation, round_qty,
};

use super::bom::scale_for_quantity;
use super::ledger::{post_movement, stock_totals};
use super::order::save_order;
use super::records::get_record;
use super::schema::{BOMS, ORDERS};
use super::{MrpService, commit};

/// Requirement of every BOM component at the order's quantity against
/// current stock. Components listed twice are summed.
pub(crate) fn availability_for<E: Executor + ?Sized>(
    db: &E,
    order: &ManufacturingOrder,
) -> Result<Vec<ComponentAvailability>, ServiceError> {
    let Some(ref bom_id) = order.bom_id else {
        return Ok(Vec::new());
    };
    let bom: Bom = get_record(db, BOMS, bom_id)?;
    let scaled = scale_for_quantity(&bom, order.quantity)?;

    let mut required: Vec<(String, f64)> = Vec::new();
    for c in scaled.components {
        match required.iter_mut().find(|(p, _)| *p == c.product_id) {
            Some((_, qty)) => *qty = round_qty(*qty + c.required_qty),
            None => required.push((c.product_id, c.required_qty)),
        }
    }

    required
        .into_iter()
        .map(|(product_id, required_qty)| {
            let on_hand = stock_totals(db, &product_id)?.on_hand();
            let shortfall = round_qty((required_qty - on_hand).max(0.0));
            Ok(ComponentAvailability {
                product_id,
                required_qty,
                on_hand,
                shortfall,
                sufficient: shortfall == 0.0,
            })
        })
        .collect()
}

impl MrpService {
    /// Component coverage for an order. Empty when it has no BOM.
    pub fn components_availability(
        &self,
        mo_id: &str,
    ) -> Result<Vec<ComponentAvailability>, ServiceError> {
        let db = self.sql.as_ref();
        let order: ManufacturingOrder = get_record(db, ORDERS, mo_id)?;
        availability_for(db, &order)
    }

    /// Post an outgoing movement for every BOM component, or nothing at all.
    ///
    /// The stock check and the postings share one transaction, so two
    /// reservations can never both see the same stock.
    pub fn reserve_components(&self, mo_id: &str) -> Result<Reservation, ServiceError> {
        let tx = self.begin()?;
        let mut order: ManufacturingOrder = get_record(&*tx, ORDERS, mo_id)?;

        if !matches!(order.status, MoStatus::Confirmed | MoStatus::InProgress) {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} cannot reserve components while {}",
                order.reference, order.status
            )));
        }
        if let Some(ref at) = order.reserved_at {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} already reserved at {at}",
                order.reference
            )));
        }
        if order.bom_id.is_none() {
            return Err(ServiceError::Validation(format!(
                "order {} has no BOM to reserve against",
                order.reference
            )));
        }

        let lines = availability_for(&*tx, &order)?;
        let short: Vec<ShortfallLine> = lines
            .iter()
            .filter(|l| !l.sufficient)
            .map(|l| ShortfallLine {
                product_id: l.product_id.clone(),
                required: l.required_qty,
                on_hand: l.on_hand,
                missing: l.shortfall,
            })
            .collect();
        if !short.is_empty() {
            return Err(ServiceError::Shortfall(short));
        }

        let mut entries = Vec::with_capacity(lines.len());
        for line in lines.iter().filter(|l| l.required_qty > 0.0) {
            entries.push(post_movement(
                &*tx,
                &line.product_id,
                MovementType::Out,
                line.required_qty,
                Some(&order.reference),
                None,
            )?);
        }

        let now = now_rfc3339();
        order.reserved_at = Some(now.clone());
        order.update_at = Some(now);
        save_order(&*tx, &order)?;
        commit(tx)?;

        if entries.is_empty() {
            debug!("order {} has no components to reserve", order.reference);
        } else {
            info!("reserved {} component(s) for order {}", entries.len(), order.reference);
        }
        Ok(Reservation {
            order_id: order.id,
            reference: order.reference,
            entries,
        })
    }
}
