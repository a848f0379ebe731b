//! # Scanner Testing Utils
//!
//! Shared test doubles for the scan service workspace: an in-memory job
//! store that enforces the same state machine as the SQL stores, scripted
//! work units, and builders for test entities.
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! scanner-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;
pub mod work_units;

pub use builders::*;
pub use mocks::*;
pub use work_units::*;
