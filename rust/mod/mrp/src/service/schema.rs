use tracing::info;

use openmes_core::{ServiceError, now_rfc3339};
use openmes_sql::{SQLStore, Value};

use super::records::storage;

pub const PRODUCTS: &str = "products";
pub const WORK_CENTERS: &str = "work_centers";
pub const BOMS: &str = "boms";
pub const ORDERS: &str = "manufacturing_orders";
pub const WORK_ORDERS: &str = "work_orders";
pub const LEDGER: &str = "stock_ledger";

/// A numbered schema step. Applied once, in order, and recorded in
/// `schema_migrations`.
struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

/// Document tables store the full JSON in `data`, with the columns used for
/// filtering copied alongside. The ledger is columnar: it is aggregated, never
/// read back as documents.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial schema",
        statements: &[
            "CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                name TEXT,
                category TEXT,
                create_at TEXT,
                update_at TEXT
            )",
            "CREATE TABLE IF NOT EXISTS work_centers (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                name TEXT,
                create_at TEXT,
                update_at TEXT
            )",
            "CREATE TABLE IF NOT EXISTS boms (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                product_id TEXT NOT NULL,
                name TEXT,
                create_at TEXT,
                update_at TEXT
            )",
            "CREATE TABLE IF NOT EXISTS manufacturing_orders (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                reference TEXT UNIQUE NOT NULL,
                product_id TEXT NOT NULL,
                bom_id TEXT,
                status TEXT NOT NULL,
                created_by TEXT,
                end_date TEXT,
                create_at TEXT,
                update_at TEXT
            )",
            "CREATE TABLE IF NOT EXISTS work_orders (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                mo_id TEXT NOT NULL,
                operation_id TEXT,
                work_center_id TEXT,
                status TEXT NOT NULL,
                sequence INTEGER NOT NULL DEFAULT 0,
                create_at TEXT,
                update_at TEXT
            )",
            "CREATE TABLE IF NOT EXISTS stock_ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id TEXT NOT NULL,
                movement_type TEXT NOT NULL CHECK (movement_type IN ('in', 'out')),
                quantity REAL NOT NULL CHECK (quantity > 0),
                reference TEXT,
                unit_cost REAL,
                create_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS sequences (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            // Indexes
            "CREATE INDEX IF NOT EXISTS idx_bom_product ON boms(product_id)",
            "CREATE INDEX IF NOT EXISTS idx_mo_status ON manufacturing_orders(status)",
            "CREATE INDEX IF NOT EXISTS idx_mo_product ON manufacturing_orders(product_id)",
            "CREATE INDEX IF NOT EXISTS idx_mo_bom ON manufacturing_orders(bom_id)",
            "CREATE INDEX IF NOT EXISTS idx_mo_created_by ON manufacturing_orders(created_by)",
            "CREATE INDEX IF NOT EXISTS idx_wo_mo ON work_orders(mo_id)",
            "CREATE INDEX IF NOT EXISTS idx_wo_status ON work_orders(status)",
            "CREATE INDEX IF NOT EXISTS idx_wo_center ON work_orders(work_center_id)",
            "CREATE INDEX IF NOT EXISTS idx_ledger_product ON stock_ledger(product_id)",
        ],
    },
];

/// Bring the schema up to the latest version. Safe to call on every start.
pub fn migrate(sql: &dyn SQLStore) -> Result<i64, ServiceError> {
    sql.exec(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        &[],
    )
    .map_err(|e| ServiceError::Storage(format!("schema init failed: {e}")))?;

    let applied = current_version(sql)?;
    let mut current = applied;

    for m in MIGRATIONS.iter().filter(|m| m.version > applied) {
        let tx = sql.begin().map_err(storage)?;
        for stmt in m.statements {
            tx.exec(stmt, &[]).map_err(|e| {
                ServiceError::Storage(format!("migration {} failed: {e}", m.version))
            })?;
        }
        tx.exec(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            &[
                Value::Integer(m.version),
                Value::Text(m.name.to_string()),
                Value::Text(now_rfc3339()),
            ],
        )
        .map_err(storage)?;
        tx.commit().map_err(storage)?;

        info!("applied schema migration {} ({})", m.version, m.name);
        current = m.version;
    }

    Ok(current)
}

/// Highest applied migration, 0 for an empty database.
pub fn current_version(sql: &dyn SQLStore) -> Result<i64, ServiceError> {
    let rows = sql
        .query("SELECT COALESCE(MAX(version), 0) AS v FROM schema_migrations", &[])
        .map_err(storage)?;
    Ok(rows.first().and_then(|r| r.get_i64("v")).unwrap_or(0))
}
