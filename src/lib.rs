pub mod api;
pub mod config;
pub mod entities;
pub mod metrics;
pub mod migrator;
pub mod store;
pub mod telemetry;

pub use sea_orm;
