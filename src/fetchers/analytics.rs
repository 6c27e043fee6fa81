//! Web analytics fetcher (GA4-style reporting API)

use super::AccountFetcher;
use crate::query::Query;
use crate::services::cache::{CacheKey, MetricCache};
use crate::types::{Account, FetchError, MetricRow, RawMetricResult, ServiceKind};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Rate metrics the provider reports as fractions; the dashboard works in
/// percent, so the fetcher scales them on the way in.
const FRACTIONAL_RATE_METRICS: [&str; 2] = ["bounce_rate", "engagement_rate"];

/// Provider-specific errors from the analytics reporting API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyticsApiError {
    #[error("permission denied for property: {0}")]
    PermissionDenied(String),

    #[error("report quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("reporting backend unavailable: {0}")]
    Unavailable(String),

    #[error("report request timed out")]
    Timeout,

    /// The property has no rows for the requested range
    #[error("empty report")]
    EmptyReport,
}

/// External analytics reporting client, one call per (property, query)
#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    async fn run_report(
        &self,
        credentials_ref: &str,
        query: &Query,
    ) -> Result<Vec<MetricRow>, AnalyticsApiError>;
}

/// Cache-first fetcher for analytics properties
pub struct AnalyticsFetcher {
    client: Arc<dyn AnalyticsApi>,
    cache: Arc<MetricCache>,
    ttl: Duration,
    /// Shorter TTL for near-real-time queries (live user counts)
    realtime_ttl: Duration,
}

impl AnalyticsFetcher {
    pub fn new(
        client: Arc<dyn AnalyticsApi>,
        cache: Arc<MetricCache>,
        ttl: Duration,
        realtime_ttl: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            ttl,
            realtime_ttl,
        }
    }

    fn map_error(err: AnalyticsApiError) -> FetchError {
        match err {
            AnalyticsApiError::PermissionDenied(msg) => FetchError::Auth(msg),
            AnalyticsApiError::QuotaExhausted(msg) => FetchError::RateLimited(msg),
            AnalyticsApiError::Unavailable(msg) => FetchError::Upstream(msg),
            AnalyticsApiError::Timeout => FetchError::Timeout,
            AnalyticsApiError::EmptyReport => FetchError::NoData,
        }
    }

    /// Scale fractional rates to percent
    fn shape_rows(mut rows: Vec<MetricRow>) -> Vec<MetricRow> {
        for row in &mut rows {
            for metric in FRACTIONAL_RATE_METRICS {
                if let Some(value) = row.values.get_mut(metric) {
                    *value *= 100.0;
                }
            }
        }
        rows
    }
}

#[async_trait]
impl AccountFetcher for AnalyticsFetcher {
    fn service_kind(&self) -> ServiceKind {
        ServiceKind::Analytics
    }

    fn cache_ttl(&self, query: &Query) -> Duration {
        if query.metric_set.iter().any(|m| m == "realtime_users") {
            self.realtime_ttl
        } else {
            self.ttl
        }
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
            .run_report(&account.credentials_ref, query)
            .await
            .map_err(Self::map_error)?;

        let result = RawMetricResult {
            account_id: account.id.clone(),
            fetched_at: Utc::now(),
            rows: Self::shape_rows(rows),
        };
        self.cache
            .put(key, result.clone(), self.cache_ttl(query));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{DateRange, Granularity};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubApi {
        calls: AtomicUsize,
        response: Result<Vec<MetricRow>, AnalyticsApiError>,
    }

    #[async_trait]
    impl AnalyticsApi for StubApi {
        async fn run_report(
            &self,
            _credentials_ref: &str,
            _query: &Query,
        ) -> Result<Vec<MetricRow>, AnalyticsApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn account() -> Account {
        Account {
            id: "prop-1".into(),
            service_kind: ServiceKind::Analytics,
            display_name: "Main site".into(),
            credentials_ref: "sa-token".into(),
            region: None,
            enabled: true,
        }
    }

    fn query(metrics: &[&str]) -> Query {
        Query::new(
            ServiceKind::Analytics,
            metrics.iter().map(|m| m.to_string()).collect(),
            DateRange::new(
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
            )
            .unwrap(),
            Granularity::Daily,
        )
    }

    fn fetcher(api: Arc<StubApi>, cache: Arc<MetricCache>) -> AnalyticsFetcher {
        AnalyticsFetcher::new(
            api,
            cache,
            Duration::from_secs(3600),
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_miss_calls_client_then_hit_skips_it() {
        let api = Arc::new(StubApi {
            calls: AtomicUsize::new(0),
            response: Ok(vec![
                MetricRow::new(vec!["2025-01-01".into()]).with_value("sessions", 120.0)
            ]),
        });
        let cache = Arc::new(MetricCache::new());
        let f = fetcher(Arc::clone(&api), Arc::clone(&cache));

        let first = f.fetch(&account(), &query(&["sessions"])).await.unwrap();
        let second = f.fetch(&account(), &query(&["sessions"])).await.unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        // Cached value returned unchanged
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_fractional_rates_scaled_to_percent() {
        let api = Arc::new(StubApi {
            calls: AtomicUsize::new(0),
            response: Ok(vec![MetricRow::new(vec!["2025-01-01".into()])
                .with_value("sessions", 400.0)
                .with_value("bounce_rate", 0.423)
                .with_value("engagement_rate", 0.685)]),
        });
        let f = fetcher(api, Arc::new(MetricCache::new()));

        let result = f
            .fetch(&account(), &query(&["sessions", "bounce_rate"]))
            .await
            .unwrap();
        let values = &result.rows[0].values;
        assert!((values["bounce_rate"] - 42.3).abs() < 1e-9);
        assert!((values["engagement_rate"] - 68.5).abs() < 1e-9);
        assert_eq!(values["sessions"], 400.0);
    }

    #[tokio::test]
    async fn test_failure_maps_error_and_never_caches() {
        let api = Arc::new(StubApi {
            calls: AtomicUsize::new(0),
            response: Err(AnalyticsApiError::PermissionDenied("prop-1".into())),
        });
        let cache = Arc::new(MetricCache::new());
        let f = fetcher(Arc::clone(&api), Arc::clone(&cache));

        let err = f.fetch(&account(), &query(&["sessions"])).await.unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));
        assert!(cache.is_empty());

        // A retry goes straight back to the client, no failure TTL to wait out
        let _ = f.fetch(&account(), &query(&["sessions"])).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_report_maps_to_no_data() {
        let api = Arc::new(StubApi {
            calls: AtomicUsize::new(0),
            response: Err(AnalyticsApiError::EmptyReport),
        });
        let cache = Arc::new(MetricCache::new());
        let f = fetcher(api, Arc::clone(&cache));

        let err = f.fetch(&account(), &query(&["sessions"])).await.unwrap_err();
        assert_eq!(err, FetchError::NoData);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_realtime_queries_use_short_ttl() {
        let api = Arc::new(StubApi {
            calls: AtomicUsize::new(0),
            response: Ok(vec![]),
        });
        let f = fetcher(api, Arc::new(MetricCache::new()));
        assert_eq!(
            f.cache_ttl(&query(&["realtime_users"])),
            Duration::from_secs(300)
        );
        assert_eq!(f.cache_ttl(&query(&["sessions"])), Duration::from_secs(3600));
    }
}
