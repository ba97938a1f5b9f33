//! Common test utilities for codegraph-race
//!
//! Shared fixtures and builders for integration tests.
#![allow(dead_code)]

mod builders;
mod fixtures;

pub use builders::*;
pub use fixtures::*;
