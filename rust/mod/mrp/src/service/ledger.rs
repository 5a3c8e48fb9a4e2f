//! Append-only stock ledger. Quantities on hand are never stored; every read
//! aggregates the movement rows.

use std::collections::HashMap;

use tracing::info;

use openmes_core::{ListParams, ListResult, ServiceError, now_rfc3339};
use openmes_sql::{Executor, Row, Value};

use crate::model::{
    LedgerEntry, LedgerFilter, MovementType, NewMovement, Product, StockLevel, round_qty,
};

use super::records::{get_record, query_records, storage, update_record};
use super::schema::PRODUCTS;
use super::{MrpService, commit, require_non_negative, require_positive};

/// Σin and Σout for one product.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct StockTotals {
    pub incoming: f64,
    pub outgoing: f64,
}

impl StockTotals {
    pub fn on_hand(&self) -> f64 {
        round_qty(self.incoming - self.outgoing)
    }
}

impl MrpService {
    /// Append a movement. A unit-cost override is written to the product in
    /// the same transaction.
    pub fn record_movement(&self, input: NewMovement) -> Result<LedgerEntry, ServiceError> {
        require_positive("quantity", input.quantity)?;
        if let Some(cost) = input.unit_cost {
            require_non_negative("unitCost", cost)?;
        }

        let tx = self.begin()?;
        let mut product: Product = get_record(&*tx, PRODUCTS, &input.product_id)?;

        if let Some(cost) = input.unit_cost {
            product.unit_cost = cost;
            product.update_at = Some(now_rfc3339());
            update_record(&*tx, PRODUCTS, &product.id, &product, &[
                ("update_at", Value::opt_text(product.update_at.as_deref())),
            ])?;
        }

        let entry = post_movement(
            &*tx,
            &input.product_id,
            input.movement_type,
            input.quantity,
            input.reference.as_deref(),
            input.unit_cost,
        )?;
        commit(tx)?;

        info!(
            "stock {} {} x {} ({})",
            entry.movement_type.as_str(),
            entry.quantity,
            product.name,
            entry.reference.as_deref().unwrap_or("-")
        );
        Ok(entry)
    }

    /// Current stock position of one product.
    pub fn on_hand(&self, product_id: &str) -> Result<StockLevel, ServiceError> {
        let db = self.sql.as_ref();
        let product: Product = get_record(db, PRODUCTS, product_id)?;
        let totals = stock_totals(db, product_id)?;
        Ok(stock_level(&product, totals))
    }

    /// Stock position of every product, by name. Products without movements
    /// report zeros.
    pub fn stock_summary(&self) -> Result<Vec<StockLevel>, ServiceError> {
        let db = self.sql.as_ref();
        let products: Vec<Product> = query_records(
            db,
            "SELECT data FROM products ORDER BY name ASC, rowid ASC",
            &[],
        )?;

        let rows = db
            .query(
                "SELECT product_id, \
                    COALESCE(SUM(CASE WHEN movement_type = 'in' THEN quantity ELSE 0 END), 0) AS incoming, \
                    COALESCE(SUM(CASE WHEN movement_type = 'out' THEN quantity ELSE 0 END), 0) AS outgoing \
                 FROM stock_ledger GROUP BY product_id",
                &[],
            )
            .map_err(storage)?;
        let totals: HashMap<String, StockTotals> = rows
            .iter()
            .filter_map(|r| Some((r.get_str("product_id")?.to_string(), totals_from_row(r))))
            .collect();

        Ok(products
            .iter()
            .map(|p| stock_level(p, totals.get(&p.id).copied().unwrap_or_default()))
            .collect())
    }

    /// Ledger rows, newest first.
    pub fn list_entries(
        &self,
        filter: &LedgerFilter,
        params: &ListParams,
    ) -> Result<ListResult<LedgerEntry>, ServiceError> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        if let Some(ref p) = filter.product_id {
            args.push(Value::Text(p.clone()));
            clauses.push(format!("product_id = ?{}", args.len()));
        }
        if let Some(t) = filter.movement_type {
            args.push(Value::Text(t.as_str().into()));
            clauses.push(format!("movement_type = ?{}", args.len()));
        }
        if let Some(ref r) = filter.reference {
            args.push(Value::Text(r.clone()));
            clauses.push(format!("instr(COALESCE(reference, ''), ?{}) > 0", args.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let db = self.sql.as_ref();
        let count = db
            .query(&format!("SELECT COUNT(*) AS cnt FROM stock_ledger{where_sql}"), &args)
            .map_err(storage)?;
        let total = count.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize;

        args.push(Value::Integer(params.clamped_limit() as i64));
        args.push(Value::Integer(params.offset as i64));
        let sql = format!(
            "SELECT id, product_id, movement_type, quantity, reference, unit_cost, create_at \
             FROM stock_ledger{where_sql} ORDER BY id DESC LIMIT ?{} OFFSET ?{}",
            args.len() - 1,
            args.len(),
        );
        let rows = db.query(&sql, &args).map_err(storage)?;
        let items = rows.iter().map(entry_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(ListResult { items, total })
    }
}

/// Append one ledger row inside the caller's unit of work.
pub(crate) fn post_movement<E: Executor + ?Sized>(
    db: &E,
    product_id: &str,
    movement_type: MovementType,
    quantity: f64,
    reference: Option<&str>,
    unit_cost: Option<f64>,
) -> Result<LedgerEntry, ServiceError> {
    let now = now_rfc3339();
    let rows = db
        .query(
            "INSERT INTO stock_ledger (product_id, movement_type, quantity, reference, unit_cost, create_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
            &[
                Value::Text(product_id.to_string()),
                Value::Text(movement_type.as_str().into()),
                Value::Real(quantity),
                Value::opt_text(reference),
                unit_cost.map_or(Value::Null, Value::Real),
                Value::Text(now.clone()),
            ],
        )
        .map_err(storage)?;
    let id = rows
        .first()
        .and_then(|r| r.get_i64("id"))
        .ok_or_else(|| ServiceError::Internal("ledger insert returned no id".into()))?;

    Ok(LedgerEntry {
        id,
        product_id: product_id.to_string(),
        movement_type,
        quantity,
        reference: reference.map(String::from),
        unit_cost,
        create_at: now,
    })
}

pub(crate) fn stock_totals<E: Executor + ?Sized>(
    db: &E,
    product_id: &str,
) -> Result<StockTotals, ServiceError> {
    let rows = db
        .query(
            "SELECT \
                COALESCE(SUM(CASE WHEN movement_type = 'in' THEN quantity ELSE 0 END), 0) AS incoming, \
                COALESCE(SUM(CASE WHEN movement_type = 'out' THEN quantity ELSE 0 END), 0) AS outgoing \
             FROM stock_ledger WHERE product_id = ?1",
            &[Value::Text(product_id.to_string())],
        )
        .map_err(storage)?;
    Ok(rows.first().map(totals_from_row).unwrap_or_default())
}

fn totals_from_row(row: &Row) -> StockTotals {
    StockTotals {
        incoming: row.get_f64("incoming").unwrap_or(0.0),
        outgoing: row.get_f64("outgoing").unwrap_or(0.0),
    }
}

fn stock_level(product: &Product, totals: StockTotals) -> StockLevel {
    let on_hand = totals.on_hand();
    StockLevel {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        uom: product.uom.clone(),
        incoming: round_qty(totals.incoming),
        outgoing: round_qty(totals.outgoing),
        on_hand,
        free_to_use: on_hand,
        unit_cost: product.unit_cost,
        total_value: round_qty(on_hand * product.unit_cost),
    }
}

fn entry_from_row(row: &Row) -> Result<LedgerEntry, ServiceError> {
    let bad = |col: &str| ServiceError::Internal(format!("stock_ledger: bad column {col}"));
    let movement_type = row
        .get_str("movement_type")
        .and_then(MovementType::parse)
        .ok_or_else(|| bad("movement_type"))?;
    Ok(LedgerEntry {
        id: row.get_i64("id").ok_or_else(|| bad("id"))?,
        product_id: row.get_str("product_id").ok_or_else(|| bad("product_id"))?.to_string(),
        movement_type,
        quantity: row.get_f64("quantity").ok_or_else(|| bad("quantity"))?,
        reference: row.get_str("reference").map(String::from),
        unit_cost: row.get_f64("unit_cost"),
        create_at: row.get_str("create_at").unwrap_or_default().to_string(),
    })
}
