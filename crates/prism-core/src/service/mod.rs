//! Request-facing services over the store and dispatcher.

mod intake;
mod query;

pub use intake::{normalize_content_type, IntakeService};
pub use query::QueryService;
