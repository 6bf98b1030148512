//! HTTP trigger surface for the workflow runtime
//!
//! Thin JSON adapters over [`FlowRuntime`]; no business logic lives here.

mod error;
mod routes;

pub use error::{ApiError, ErrorResponse};
pub use routes::configure;

use ledgerruntime::FlowRuntime;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub runtime: Arc<FlowRuntime>,
}

impl AppState {
    pub fn new(runtime: FlowRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }
}
