pub mod sqlite_scan_store;

pub use sqlite_scan_store::*;
