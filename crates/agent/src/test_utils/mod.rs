//! Test utilities shared across the crate's test modules.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
