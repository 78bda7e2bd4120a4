//! HTTP request handlers for the stash service.

pub mod health;
pub mod links;
pub mod me;
pub mod metrics;

pub use health::health_check;
pub use links::{create_link, list_links};
pub use me::get_me;
pub use metrics::metrics_handler;
