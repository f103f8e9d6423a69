//! Shared state for request handlers.

use prism_core::Prism;
use std::sync::Arc;

/// Cloned into every handler; the service itself is shared.
#[derive(Clone)]
pub struct AppState {
    pub prism: Arc<Prism>,
}

impl AppState {
    pub fn new(prism: Arc<Prism>) -> Self {
        Self { prism }
    }
}
