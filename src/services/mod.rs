//! Caching, fetch orchestration, and cross-account aggregation

pub mod aggregator;
pub mod cache;
pub mod orchestrator;

pub use aggregator::{AggregatedView, Aggregator};
pub use cache::{CacheKey, MetricCache};
pub use orchestrator::{FetchOrchestrator, OrchestratorConfig, RefreshOutcome};
