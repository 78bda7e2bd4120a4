//! Common utilities shared across TeamStash components.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (header inspection, size limits, scope parsing)
pub mod jwt;
