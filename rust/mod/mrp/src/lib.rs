pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;
use openmes_core::Module;

use service::MrpService;

/// MRP module: manufacturing orders, work orders, BOMs and the stock ledger.
pub struct MrpModule {
    service: Arc<MrpService>,
}

impl MrpModule {
    pub fn new(service: MrpService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub fn service(&self) -> &Arc<MrpService> {
        &self.service
    }
}

impl Module for MrpModule {
    fn name(&self) -> &str {
        "mrp"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}
