pub mod connection;
pub mod dashboard;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use dashboard::DashboardAggregator;
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
