pub mod health;
pub mod scans;
