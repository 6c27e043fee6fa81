//! Multi-account metrics dashboard core.
//!
//! Fetches metrics concurrently across the configured accounts of several
//! external services, caches results with per-service TTLs, and combines
//! them into a single cross-account view. One failing account degrades its
//! own status and nothing else.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod fetchers;
pub mod query;
pub mod registry;
pub mod services;
pub mod types;

pub use catalog::{CombineRule, MetricCatalog};
pub use config::Settings;
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use query::{DateRange, Granularity, Query};
pub use registry::AccountRegistry;
pub use types::{
    Account, AccountState, AccountStatus, FetchError, MetricRow, RawMetricResult, Result,
    ServiceKind, StreamboardError,
};
