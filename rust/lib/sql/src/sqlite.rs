use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::warn;

use crate::error::SQLError;
use crate::traits::{Executor, Row, SQLStore, Transaction, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// A single connection guarded by a mutex: every statement and every
/// transaction runs with exclusive access, which makes transactions
/// serializable without relying on SQLite's busy handling.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // Enable WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SQLError> {
        self.conn
            .lock()
            .map_err(|e| SQLError::Connection(format!("connection lock poisoned: {e}")))
    }
}

impl Executor for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self.lock()?;
        run_query(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self.lock()?;
        run_exec(&conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, SQLError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| SQLError::Transaction(format!("begin: {e}")))?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }
}

/// A transaction holding the connection lock until commit or drop.
pub struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Executor for SqliteTransaction<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        run_query(&self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        run_exec(&self.conn, sql, params)
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn commit(mut self: Box<Self>) -> Result<(), SQLError> {
        self.finished = true;
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            // A failed COMMIT leaves the transaction open.
            let _ = self.conn.execute_batch("ROLLBACK");
            return Err(SQLError::Transaction(format!("commit: {e}")));
        }
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<(), SQLError> {
        self.finished = true;
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| SQLError::Transaction(format!("rollback: {e}")))
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("implicit rollback failed: {e}");
            }
        }
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                columns.push((name.clone(), row_value_at(row, i)?));
            }
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
    }
    Ok(result)
}

fn run_exec(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(|e| SQLError::Execution(e.to_string()))?;

    Ok(affected as u64)
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_table() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT UNIQUE, qty REAL)",
                &[],
            )
            .unwrap();
        store
    }

    #[test]
    fn exec_and_query() {
        let store = store_with_table();
        let n = store
            .exec(
                "INSERT INTO items (name, qty) VALUES (?1, ?2)",
                &[Value::Text("bolt".into()), Value::Real(2.5)],
            )
            .unwrap();
        assert_eq!(n, 1);

        let rows = store
            .query("SELECT id, name, qty FROM items WHERE name = ?1", &[Value::Text("bolt".into())])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(rows[0].get_str("name"), Some("bolt"));
        assert_eq!(rows[0].get_f64("qty"), Some(2.5));
    }

    #[test]
    fn commit_persists() {
        let store = store_with_table();
        let tx = store.begin().unwrap();
        tx.exec("INSERT INTO items (name, qty) VALUES ('nut', 1)", &[]).unwrap();
        let inside = tx.query("SELECT COUNT(*) AS cnt FROM items", &[]).unwrap();
        assert_eq!(inside[0].get_i64("cnt"), Some(1));
        tx.commit().unwrap();

        let rows = store.query("SELECT COUNT(*) AS cnt FROM items", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(1));
    }

    #[test]
    fn drop_without_commit_rolls_back() {
        let store = store_with_table();
        {
            let tx = store.begin().unwrap();
            tx.exec("INSERT INTO items (name, qty) VALUES ('washer', 4)", &[]).unwrap();
        }
        let rows = store.query("SELECT COUNT(*) AS cnt FROM items", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(0));

        // The store is usable again after the implicit rollback.
        let tx = store.begin().unwrap();
        tx.rollback().unwrap();
    }

    #[test]
    fn unique_violation_is_detected() {
        let store = store_with_table();
        store.exec("INSERT INTO items (name, qty) VALUES ('pin', 1)", &[]).unwrap();
        let err = store
            .exec("INSERT INTO items (name, qty) VALUES ('pin', 1)", &[])
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn insert_returning_id() {
        let store = store_with_table();
        let rows = store
            .query(
                "INSERT INTO items (name, qty) VALUES (?1, ?2) RETURNING id",
                &[Value::Text("gear".into()), Value::Real(1.0)],
            )
            .unwrap();
        assert_eq!(rows[0].get_i64("id"), Some(1));
    }

    #[test]
    fn on_disk_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.exec("CREATE TABLE t (v INTEGER)", &[]).unwrap();
            store.exec("INSERT INTO t (v) VALUES (7)", &[]).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let rows = store.query("SELECT v FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_i64("v"), Some(7));
    }
}
