//! Observability module for the stash service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
