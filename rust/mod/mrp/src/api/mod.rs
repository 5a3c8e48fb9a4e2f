mod boms;
mod catalog;
mod orders;
mod stock;
mod work_orders;

use std::sync::Arc;

use axum::Router;
use serde::Deserialize;

use openmes_core::ListParams;

use crate::service::MrpService;

type SvcState = Arc<MrpService>;

/// Build the complete MRP router.
///
/// Routes:
/// - `POST   /orders`, `POST /orders/@from-bom`, `GET /orders`, `GET /orders/@late`
/// - `GET|PATCH|DELETE /orders/{id}`
/// - `POST   /orders/{id}/@confirm|@start|@complete|@cancel|@reserve|@attach-bom|@generate-work-orders`
/// - `GET    /orders/{id}/@cost|@availability|@progress`
/// - `GET    /work-orders`, `GET|PATCH /work-orders/{id}`
/// - `POST   /work-orders/{id}/@assign|@start|@pause|@resume|@complete|@cancel`
/// - `GET    /stock`, `GET /stock/{product_id}`, `GET|POST /stock/movements`
/// - `GET|POST /boms`, `GET|PUT|DELETE /boms/{id}`, `GET /boms/{id}/@scale`
/// - `GET|POST /products`, `GET|PATCH /products/{id}`
/// - `GET|POST /work-centers`, `GET /work-centers/{id}`
pub fn router(svc: Arc<MrpService>) -> Router {
    Router::new()
        .merge(orders::router(Arc::clone(&svc)))
        .merge(work_orders::router(Arc::clone(&svc)))
        .merge(stock::router(Arc::clone(&svc)))
        .merge(boms::router(Arc::clone(&svc)))
        .merge(catalog::router(svc))
}

/// Paging fields accepted by every list endpoint.
#[derive(Debug, Default, Deserialize)]
struct Page {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

impl Page {
    fn params(&self) -> ListParams {
        list_params(self.limit, self.offset)
    }
}

// Flattened structs cannot read numbers from urlencoded input; filter
// queries carry their own paging fields.
fn list_params(limit: Option<usize>, offset: Option<usize>) -> ListParams {
    let mut p = ListParams::default();
    if let Some(limit) = limit {
        p.limit = limit;
    }
    if let Some(offset) = offset {
        p.offset = offset;
    }
    p
}
