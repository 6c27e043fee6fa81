//! Per-service account fetchers
//!
//! One fetcher per service kind, each wrapping one external data source
//! client. A fetcher asks the cache first and returns hits unchanged; on a
//! miss it calls the client, maps the provider error onto [`FetchError`],
//! shapes the rows, and writes the result to the cache. Failed calls never
//! write (no negative caching).

pub mod ad_revenue;
pub mod analytics;
pub mod cloud;
pub mod demo;

pub use ad_revenue::{AdRevenueApi, AdRevenueApiError, AdRevenueFetcher};
pub use analytics::{AnalyticsApi, AnalyticsApiError, AnalyticsFetcher};
pub use cloud::{CloudMetricsFetcher, CostExplorerApi, CostExplorerError};

use crate::config::Settings;
use crate::query::Query;
use crate::services::cache::MetricCache;
use crate::types::{Account, FetchError, RawMetricResult, ServiceKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Capability interface for fetching one account's metrics.
///
/// Implementations are selected by service-kind tag from a [`FetcherSet`],
/// not by inheritance.
#[async_trait]
pub trait AccountFetcher: Send + Sync {
    fn service_kind(&self) -> ServiceKind;

    /// TTL applied when a result of `query` is written to the cache.
    /// Freshness requirements differ per service.
    fn cache_ttl(&self, query: &Query) -> Duration;

    async fn fetch(
        &self,
        account: &Account,
        query: &Query,
    ) -> Result<RawMetricResult, FetchError>;
}

/// Registry of fetchers, one per service kind
pub struct FetcherSet {
    fetchers: Vec<Arc<dyn AccountFetcher>>,
}

impl FetcherSet {
    pub fn new(fetchers: Vec<Arc<dyn AccountFetcher>>) -> Self {
        Self { fetchers }
    }

    /// Set wired to the deterministic in-process demo clients
    pub fn demo(cache: Arc<MetricCache>, settings: &Settings) -> Self {
        Self::new(vec![
            Arc::new(AnalyticsFetcher::new(
                Arc::new(demo::DemoAnalyticsApi::new()),
                Arc::clone(&cache),
                settings.cache_ttl(),
                settings.cache_ttl_short(),
            )),
            Arc::new(AdRevenueFetcher::new(
                Arc::new(demo::DemoAdRevenueApi::new()),
                Arc::clone(&cache),
                settings.cache_ttl(),
            )),
            Arc::new(CloudMetricsFetcher::new(
                Arc::new(demo::DemoCostExplorerApi::new()),
                cache,
                settings.cloud_cache_ttl(),
            )),
        ])
    }

    pub fn for_kind(&self, kind: ServiceKind) -> Option<Arc<dyn AccountFetcher>> {
        self.fetchers
            .iter()
            .find(|f| f.service_kind() == kind)
            .cloned()
    }

    pub fn kinds(&self) -> Vec<ServiceKind> {
        self.fetchers.iter().map(|f| f.service_kind()).collect()
    }
}
