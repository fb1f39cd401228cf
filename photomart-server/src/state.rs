//! Application state shared across all request handlers.

use photomart_core::pipeline::PaymentPipeline;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Verification and fulfillment pipeline with its collaborators.
    pub pipeline: Arc<PaymentPipeline>,
}

impl AppState {
    /// Create a new AppState around a fully wired pipeline.
    pub fn new(pipeline: PaymentPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}
