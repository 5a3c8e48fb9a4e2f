mod bom;
mod order;
mod product;
mod stock;
mod work_center;
mod work_order;

pub use bom::*;
pub use order::*;
pub use product::*;
pub use stock::*;
pub use work_center::*;
pub use work_order::*;

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a stored timestamp. Accepts RFC 3339 or a bare `YYYY-MM-DD` date,
/// which is read as midnight UTC.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
