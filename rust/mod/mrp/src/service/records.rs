//! Document-row helpers shared by every table of the module.
//!
//! Each table keeps the full JSON document in a `data` column, with the
//! columns used for filtering copied alongside. The helpers are generic over
//! [`Executor`] so the same code runs against the store or inside an open
//! transaction.

use serde::de::DeserializeOwned;
use serde::Serialize;

use openmes_core::{ListResult, ServiceError, merge_patch, now_rfc3339};
use openmes_sql::{Executor, Row, SQLError, Value};

pub(crate) fn storage(e: SQLError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

/// Insert a record as JSON into a table with indexed columns.
pub(crate) fn insert_record<E: Executor + ?Sized, T: Serialize>(
    db: &E,
    table: &str,
    id: &str,
    record: &T,
    indexes: &[(&str, Value)],
) -> Result<(), ServiceError> {
    let json = serde_json::to_string(record)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut cols = vec!["id", "data"];
    let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
    let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

    for (i, (col, val)) in indexes.iter().enumerate() {
        cols.push(col);
        placeholders.push(format!("?{}", i + 3));
        params.push(val.clone());
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", "),
    );

    db.exec(&sql, &params).map_err(|e| {
        if e.is_unique_violation() {
            ServiceError::Conflict(format!("{table}/{id}: {e}"))
        } else {
            storage(e)
        }
    })?;

    Ok(())
}

/// Get a record by id, or `None` when absent.
pub(crate) fn find_record<E: Executor + ?Sized, T: DeserializeOwned>(
    db: &E,
    table: &str,
    id: &str,
) -> Result<Option<T>, ServiceError> {
    let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
    let rows = db
        .query(&sql, &[Value::Text(id.to_string())])
        .map_err(storage)?;
    rows.first().map(row_to_record).transpose()
}

/// Get a record by id, deserializing the JSON `data` column.
pub(crate) fn get_record<E: Executor + ?Sized, T: DeserializeOwned>(
    db: &E,
    table: &str,
    id: &str,
) -> Result<T, ServiceError> {
    find_record(db, table, id)?
        .ok_or_else(|| ServiceError::NotFound(format!("{}/{}", table, id)))
}

/// Update a record's JSON data and indexed columns.
pub(crate) fn update_record<E: Executor + ?Sized, T: Serialize>(
    db: &E,
    table: &str,
    id: &str,
    record: &T,
    indexes: &[(&str, Value)],
) -> Result<(), ServiceError> {
    let json = serde_json::to_string(record)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut sets = vec!["data = ?1".to_string()];
    let mut params: Vec<Value> = vec![Value::Text(json)];

    for (i, (col, val)) in indexes.iter().enumerate() {
        sets.push(format!("{} = ?{}", col, i + 2));
        params.push(val.clone());
    }

    let id_idx = params.len() + 1;
    params.push(Value::Text(id.to_string()));

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table,
        sets.join(", "),
        id_idx,
    );

    let affected = db.exec(&sql, &params).map_err(storage)?;
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("{}/{}", table, id)));
    }
    Ok(())
}

/// Delete a record by id.
pub(crate) fn delete_record<E: Executor + ?Sized>(
    db: &E,
    table: &str,
    id: &str,
) -> Result<(), ServiceError> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", table);
    let affected = db
        .exec(&sql, &[Value::Text(id.to_string())])
        .map_err(storage)?;
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("{}/{}", table, id)));
    }
    Ok(())
}

/// List records with equality filters, pagination, and total count.
pub(crate) fn list_records<E: Executor + ?Sized, T: DeserializeOwned + Serialize>(
    db: &E,
    table: &str,
    filters: &[(&str, Value)],
    order_by: &str,
    limit: usize,
    offset: usize,
) -> Result<ListResult<T>, ServiceError> {
    let mut where_clauses = Vec::new();
    let mut params = Vec::new();

    for (i, (col, val)) in filters.iter().enumerate() {
        where_clauses.push(format!("{} = ?{}", col, i + 1));
        params.push(val.clone());
    }

    let where_sql = if where_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) as cnt FROM {}{}", table, where_sql);
    let rows = db.query(&count_sql, &params).map_err(storage)?;
    let total = rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize;

    let limit_idx = params.len() + 1;
    let offset_idx = params.len() + 2;
    params.push(Value::Integer(limit as i64));
    params.push(Value::Integer(offset as i64));

    let sql = format!(
        "SELECT data FROM {}{} ORDER BY {} LIMIT ?{} OFFSET ?{}",
        table, where_sql, order_by, limit_idx, offset_idx,
    );

    let items = query_records(db, &sql, &params)?;
    Ok(ListResult { items, total })
}

/// Run a `SELECT data ...` query and decode every row.
pub(crate) fn query_records<E: Executor + ?Sized, T: DeserializeOwned>(
    db: &E,
    sql: &str,
    params: &[Value],
) -> Result<Vec<T>, ServiceError> {
    let rows = db.query(sql, params).map_err(storage)?;
    rows.iter().map(row_to_record).collect()
}

fn row_to_record<T: DeserializeOwned>(row: &Row) -> Result<T, ServiceError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
    serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))
}

/// Apply a JSON merge-patch to a record.
///
/// `protected` keys (camelCase, as serialized) are stripped from the patch
/// along with `id` and `createAt`; `updateAt` is refreshed.
pub(crate) fn apply_patch<T: Serialize + DeserializeOwned>(
    current: &T,
    patch: serde_json::Value,
    protected: &[&str],
) -> Result<T, ServiceError> {
    let mut json = serde_json::to_value(current)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut patch_filtered = patch;
    match patch_filtered.as_object_mut() {
        Some(obj) => {
            obj.remove("id");
            obj.remove("createAt");
            for key in protected {
                obj.remove(*key);
            }
            obj.insert("updateAt".into(), serde_json::json!(now_rfc3339()));
        }
        None => return Err(ServiceError::Validation("patch must be a JSON object".into())),
    }

    merge_patch(&mut json, &patch_filtered);
    serde_json::from_value(json).map_err(|e| ServiceError::Validation(e.to_string()))
}

/// Allocate the next value of a named counter inside the caller's transaction.
pub(crate) fn next_sequence<E: Executor + ?Sized>(db: &E, name: &str) -> Result<i64, ServiceError> {
    let rows = db
        .query(
            "INSERT INTO sequences (name, value) VALUES (?1, 1) \
             ON CONFLICT(name) DO UPDATE SET value = value + 1 \
             RETURNING value",
            &[Value::Text(name.to_string())],
        )
        .map_err(storage)?;
    rows.first()
        .and_then(|r| r.get_i64("value"))
        .ok_or_else(|| ServiceError::Internal(format!("sequence {name} returned no value")))
}
