use openmes_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use openmes_sql::{Executor, Value};

use crate::model::{CreateWorkCenterInput, WorkCenter};

use super::records::{get_record, insert_record, list_records, query_records};
use super::schema::WORK_CENTERS;
use super::{MrpService, require_non_negative, require_text};

impl MrpService {
    // ── Work center ──

    pub fn create_work_center(
        &self,
        input: CreateWorkCenterInput,
    ) -> Result<WorkCenter, ServiceError> {
        require_text("name", &input.name)?;
        require_non_negative("costPerHour", input.cost_per_hour)?;

        let id = new_id();
        let now = now_rfc3339();
        let record = WorkCenter {
            id: id.clone(),
            name: input.name,
            cost_per_hour: input.cost_per_hour,
            create_at: Some(now.clone()),
            update_at: Some(now.clone()),
        };

        insert_record(self.sql.as_ref(), WORK_CENTERS, &id, &record, &[
            ("name", Value::Text(record.name.clone())),
            ("create_at", Value::Text(now.clone())),
            ("update_at", Value::Text(now)),
        ])?;

        Ok(record)
    }

    pub fn get_work_center(&self, id: &str) -> Result<WorkCenter, ServiceError> {
        get_record(self.sql.as_ref(), WORK_CENTERS, id)
    }

    /// Work centers in creation order.
    pub fn list_work_centers(
        &self,
        params: &ListParams,
    ) -> Result<ListResult<WorkCenter>, ServiceError> {
        list_records(
            self.sql.as_ref(),
            WORK_CENTERS,
            &[],
            "rowid ASC",
            params.clamped_limit(),
            params.offset,
        )
    }
}

/// The first `n` work centers in creation order.
pub(crate) fn first_work_centers<E: Executor + ?Sized>(
    db: &E,
    n: usize,
) -> Result<Vec<WorkCenter>, ServiceError> {
    query_records(
        db,
        "SELECT data FROM work_centers ORDER BY rowid ASC LIMIT ?1",
        &[Value::Integer(n as i64)],
    )
}

#[cfg(test)]
mod tests {
    use crate::service::testing::service;

    use super::*;

    #[test]
    fn creation_order_is_preserved() {
        let svc = service();
        for (name, rate) in [("Saw", 30.0), ("Lathe", 45.0), ("Assembly", 20.0), ("Paint", 25.0)] {
            svc.create_work_center(CreateWorkCenterInput { name: name.into(), cost_per_hour: rate })
                .unwrap();
        }
        let first = first_work_centers(svc.sql.as_ref(), 3).unwrap();
        let names: Vec<_> = first.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["Saw", "Lathe", "Assembly"]);

        let page = svc.list_work_centers(&ListParams { limit: 2, offset: 2 }).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items[1].name, "Paint");
    }

    #[test]
    fn negative_rate_rejected() {
        let svc = service();
        let err = svc
            .create_work_center(CreateWorkCenterInput { name: "Saw".into(), cost_per_hour: -1.0 })
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
