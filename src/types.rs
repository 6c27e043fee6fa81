//! Core value types, account status state machine, and error taxonomy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category of external data source an account belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    /// Web analytics properties (sessions, pageviews, bounce rate)
    Analytics,
    /// Ad revenue accounts (earnings, impressions, CTR)
    AdRevenue,
    /// Cloud cost/usage accounts (per-service spend)
    CloudMetrics,
}

impl ServiceKind {
    /// Stable identifier used in cache keys and JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Analytics => "analytics",
            ServiceKind::AdRevenue => "ad-revenue",
            ServiceKind::CloudMetrics => "cloud-metrics",
        }
    }

    pub fn all() -> [ServiceKind; 3] {
        [
            ServiceKind::Analytics,
            ServiceKind::AdRevenue,
            ServiceKind::CloudMetrics,
        ]
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured external data source instance.
///
/// Immutable for the life of a run except `enabled`, which the registry may
/// toggle live. `(service_kind, id)` is unique; `display_name` is unique
/// within a service kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub service_kind: ServiceKind,
    pub display_name: String,
    /// Opaque token handed to the external client; never inspected here
    pub credentials_ref: String,
    /// Region/scope metadata (e.g. cloud region), if the service has one
    pub region: Option<String>,
    pub enabled: bool,
}

/// One row of fetched data: dimension values (e.g. date) plus metric values.
///
/// `values` is a BTreeMap so serialization and aggregation order are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub dimensions: Vec<String>,
    pub values: BTreeMap<String, f64>,
}

impl MetricRow {
    pub fn new(dimensions: Vec<String>) -> Self {
        Self {
            dimensions,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, metric: &str, value: f64) -> Self {
        self.values.insert(metric.to_string(), value);
        self
    }
}

/// Result of one account fetch. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricResult {
    pub account_id: String,
    pub fetched_at: DateTime<Utc>,
    pub rows: Vec<MetricRow>,
}

impl RawMetricResult {
    /// Valid empty result (e.g. provider reported no data for the range)
    pub fn empty(account_id: &str, fetched_at: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.to_string(),
            fetched_at,
            rows: Vec::new(),
        }
    }
}

/// Health of a single account, as shown in the dashboard banner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountState {
    Healthy,
    Degraded,
    Failed,
    Disabled,
}

/// Per-account status bookkeeping.
///
/// Created at registry load and replaced (never deleted) while the account
/// exists. Transitions happen on every fetch attempt; one failing account
/// only ever degrades its own status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub account_id: String,
    pub state: AccountState,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl AccountStatus {
    pub fn new(account_id: &str, enabled: bool) -> Self {
        Self {
            account_id: account_id.to_string(),
            state: if enabled {
                AccountState::Healthy
            } else {
                AccountState::Disabled
            },
            last_error: None,
            last_success_at: None,
            consecutive_failures: 0,
        }
    }

    /// Fetch succeeded: immediate recovery from any non-disabled state
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        if self.state == AccountState::Disabled {
            return;
        }
        self.state = AccountState::Healthy;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.last_success_at = Some(now);
    }

    /// Fetch failed: Healthy -> Degraded, Degraded -> Failed once the
    /// consecutive failure count reaches `threshold`
    pub fn record_failure(&mut self, error: &FetchError, threshold: u32) {
        if self.state == AccountState::Disabled {
            return;
        }
        self.consecutive_failures += 1;
        self.last_error = Some(error.to_string());
        self.state = if self.consecutive_failures >= threshold {
            AccountState::Failed
        } else {
            AccountState::Degraded
        };
    }

    /// Enable/disable transition. Re-enabling is optimistic: the account is
    /// considered Healthy until the next fetch proves otherwise.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            if self.state == AccountState::Disabled {
                self.state = AccountState::Healthy;
                self.consecutive_failures = 0;
                self.last_error = None;
            }
        } else {
            self.state = AccountState::Disabled;
        }
    }
}

/// Fetch-level error taxonomy. Captured as values per account, never
/// propagated across account boundaries.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum FetchError {
    /// Bad or expired credentials; surfaced as action-required, not retried
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider rate limit; retried with backoff on the next cycle
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Fetch did not complete within the cycle deadline; transient
    #[error("fetch timed out")]
    Timeout,

    /// Provider-side failure; transient, retried next cycle
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Valid empty result, not a failure; contributes zero rows
    #[error("no data for the requested range")]
    NoData,
}

/// Process-level errors. Only `Catalog` misconfiguration is fatal by design;
/// fetch failures stay values inside the refresh outcome.
#[derive(Debug, thiserror::Error)]
pub enum StreamboardError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Metric catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StreamboardError>;
