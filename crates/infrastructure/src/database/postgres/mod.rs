pub mod postgres_scan_store;

pub use postgres_scan_store::*;
