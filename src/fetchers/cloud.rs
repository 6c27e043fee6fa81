//! Cloud cost/usage fetcher (Cost Explorer-style API)
//!
//! Cost data moves slowly, so this fetcher carries the longest default TTL
//! of the three service kinds.

use super::AccountFetcher;
use crate::query::Query;
use crate::services::cache::{CacheKey, MetricCache};
use crate::types::{Account, FetchError, MetricRow, RawMetricResult, ServiceKind};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Provider-specific errors from the cost/usage API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CostExplorerError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("cost query timed out")]
    Timeout,

    /// No usage recorded for the range (fresh account, unused region)
    #[error("no usage data")]
    NoUsage,
}

/// External cost/usage client. Rows come back grouped by
/// (date, cloud service) dimensions.
#[async_trait]
pub trait CostExplorerApi: Send + Sync {
    async fn get_cost_and_usage(
        &self,
        credentials_ref: &str,
        region: Option<&str>,
        query: &Query,
    ) -> Result<Vec<MetricRow>, CostExplorerError>;
}

/// Cache-first fetcher for cloud accounts
pub struct CloudMetricsFetcher {
    client: Arc<dyn CostExplorerApi>,
    cache: Arc<MetricCache>,
    ttl: Duration,
}

impl CloudMetricsFetcher {
    pub fn new(client: Arc<dyn CostExplorerApi>, cache: Arc<MetricCache>, ttl: Duration) -> Self {
        Self { client, cache, ttl }
    }

    fn map_error(err: CostExplorerError) -> FetchError {
        match err {
            CostExplorerError::AccessDenied(msg) => FetchError::Auth(msg),
            CostExplorerError::Throttled(msg) => FetchError::RateLimited(msg),
            CostExplorerError::ServiceUnavailable(msg) => FetchError::Upstream(msg),
            CostExplorerError::Timeout => FetchError::Timeout,
            CostExplorerError::NoUsage => FetchError::NoData,
        }
    }

    /// Negative amounts are refunds/credits in provider exports; clamp them
    /// out of the cost series so sums stay spend-only.
    fn shape_rows(mut rows: Vec<MetricRow>) -> Vec<MetricRow> {
        for row in &mut rows {
            if let Some(cost) = row.values.get_mut("cost") {
                if *cost < 0.0 {
                    *cost = 0.0;
                }
            }
        }
        rows
    }
}

#[async_trait]
impl AccountFetcher for CloudMetricsFetcher {
    fn service_kind(&self) -> ServiceKind {
        ServiceKind::CloudMetrics
    }

    fn cache_ttl(&self, _query: &Query) -> Duration {
        self.ttl
    }

    async fn fetch(
        &self,
        account: &Account,
        query: &Query,
    ) -> Result<RawMetricResult, FetchError> {
        let key = CacheKey::new(self.service_kind(), &account.id, &query.signature());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let rows = self
            .client
            .get_cost_and_usage(&account.credentials_ref, account.region.as_deref(), query)
            .await
            .map_err(Self::map_error)?;

        let result = RawMetricResult {
            account_id: account.id.clone(),
            fetched_at: Utc::now(),
            rows: Self::shape_rows(rows),
        };
        self.cache.put(key, result.clone(), self.ttl);
        Ok(result)
    }
}
