//! Shared test utilities for cartcure integration tests.
//!
//! This module provides:
//! - `TestHarness`: an engine over an in-memory database with a manual clock
//!   and a recording notifier
//! - Builders for inserting jobs and invoices in arbitrary states

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
