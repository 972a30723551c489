//! Common test utilities for section-dl integration tests

#[allow(dead_code)]
pub mod storefront;

pub use storefront::*;
