//! Deterministic demo data sources
//!
//! Stand-ins for the live provider clients, used by the CLI when no real
//! integrations are wired up and as fixtures in tests. Series are pure
//! functions of the account seed and day index, so repeated fetches and
//! aggregations are reproducible.
//!
//! An account whose `credentials_ref` starts with `revoked:` fails with the
//! provider's auth error, which makes status handling visible in the demo.

use super::ad_revenue::{AdRevenueApi, AdRevenueApiError};
use super::analytics::{AnalyticsApi, AnalyticsApiError};
use super::cloud::{CostExplorerApi, CostExplorerError};
use crate::query::{Granularity, Query};
use crate::types::MetricRow;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};

const CLOUD_SERVICES: [&str; 5] = ["EC2", "S3", "RDS", "Lambda", "CloudFront"];

/// FNV-1a; stable across runs, unlike the std hasher
fn seed(credentials_ref: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in credentials_ref.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Smooth daily series around `base` with amplitude `amp`
fn wave(seed: u64, day: i64, base: f64, amp: f64) -> f64 {
    let phase = (seed % 7) as f64;
    base + amp * (day as f64 * 0.2 + phase).sin()
}

fn days_in(query: &Query) -> impl Iterator<Item = (i64, NaiveDate)> + '_ {
    (0..query.date_range.days())
        .map(move |offset| (offset, query.date_range.start + Duration::days(offset)))
}

fn revoked(credentials_ref: &str) -> bool {
    credentials_ref.starts_with("revoked:")
}

/// Demo analytics property
#[derive(Debug, Default)]
pub struct DemoAnalyticsApi;

impl DemoAnalyticsApi {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AnalyticsApi for DemoAnalyticsApi {
    async fn run_report(
        &self,
        credentials_ref: &str,
        query: &Query,
    ) -> Result<Vec<MetricRow>, AnalyticsApiError> {
        if revoked(credentials_ref) {
            return Err(AnalyticsApiError::PermissionDenied(
                "service account lost access to property".into(),
            ));
        }
        let seed = seed(credentials_ref);
        let mut rows = Vec::new();
        for (day, date) in days_in(query) {
            let sessions = wave(seed, day, 1600.0, 280.0).round();
            let mut row = MetricRow::new(vec![date.format("%Y-%m-%d").to_string()]);
            for metric in &query.metric_set {
                let value = match metric.as_str() {
                    "sessions" => sessions,
                    "users" => (sessions * 0.72).round(),
                    "pageviews" => (sessions * 2.6).round(),
                    // Rates are fractional here; the fetcher scales to percent
                    "bounce_rate" => 0.47 + 0.07 * wave(seed, day, 0.0, 1.0),
                    "engagement_rate" => 0.64 + 0.05 * wave(seed, day, 0.0, 1.0),
                    "avg_session_duration" => wave(seed, day, 210.0, 60.0).round(),
                    "realtime_users" => wave(seed, day, 45.0, 12.0).round(),
                    _ => continue,
                };
                row.values.insert(metric.clone(), value);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Demo ad revenue account
#[derive(Debug, Default)]
pub struct DemoAdRevenueApi;

impl DemoAdRevenueApi {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AdRevenueApi for DemoAdRevenueApi {
    async fn generate_report(
        &self,
        credentials_ref: &str,
        query: &Query,
    ) -> Result<Vec<MetricRow>, AdRevenueApiError> {
        if revoked(credentials_ref) {
            return Err(AdRevenueApiError::InvalidGrant(
                "token revoked, re-authorization required".into(),
            ));
        }
        let seed = seed(credentials_ref);
        let mut rows = Vec::new();
        for (day, date) in days_in(query) {
            let impressions = wave(seed, day, 15000.0, 4000.0).round();
            let mut row = MetricRow::new(vec![date.format("%Y-%m-%d").to_string()]);
            for metric in &query.metric_set {
                let value = match metric.as_str() {
                    "earnings" => {
                        let base = wave(seed, day, 125.0, 60.0);
                        (base * (1.0 + (day as f64 * 0.2).sin() * 0.3) * 100.0).round() / 100.0
                    }
                    "impressions" => impressions,
                    "clicks" => (impressions * 0.017).round(),
                    "pageviews" => (impressions * 0.8).round(),
                    "rpm" => (wave(seed, day, 8.4, 2.2) * 100.0).round() / 100.0,
                    // No "ctr": the fetcher derives it from clicks/impressions
                    _ => continue,
                };
                row.values.insert(metric.clone(), value);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Demo cloud account, costs grouped by (period, service)
#[derive(Debug, Default)]
pub struct DemoCostExplorerApi;

impl DemoCostExplorerApi {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CostExplorerApi for DemoCostExplorerApi {
    async fn get_cost_and_usage(
        &self,
        credentials_ref: &str,
        _region: Option<&str>,
        query: &Query,
    ) -> Result<Vec<MetricRow>, CostExplorerError> {
        if revoked(credentials_ref) {
            return Err(CostExplorerError::AccessDenied(
                "not authorized to perform cost queries".into(),
            ));
        }
        let seed = seed(credentials_ref);
        let mut rows = Vec::new();
        for (day, date) in days_in(query) {
            let period = match query.granularity {
                Granularity::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
                _ => date.format("%Y-%m-%d").to_string(),
            };
            for (i, service) in CLOUD_SERVICES.iter().enumerate() {
                let cost = wave(seed.wrapping_add(i as u64), day, 27.0, 22.0).max(0.5);
                let mut row = MetricRow::new(vec![period.clone(), service.to_string()]);
                if query.metric_set.iter().any(|m| m == "cost") {
                    row.values
                        .insert("cost".to_string(), (cost * 100.0).round() / 100.0);
                }
                if query.metric_set.iter().any(|m| m == "forecast_cost") {
                    row.values
                        .insert("forecast_cost".to_string(), (cost * 1.08 * 100.0).round() / 100.0);
                }
                if !row.values.is_empty() {
                    rows.push(row);
                }
            }
            // Monthly granularity collapses each month to its first day
            if query.granularity == Granularity::Monthly {
                break;
            }
        }
        Ok(rows)
    }
}
