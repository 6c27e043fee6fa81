//! Process-scoped dashboard state
//!
//! Owns the account registry, the shared metric cache, the fetch
//! orchestrator, and the combination-rule catalog. Everything a rendering
//! collaborator needs goes through here; there are no ambient globals, so
//! two dashboards in one process stay fully independent.

use crate::catalog::MetricCatalog;
use crate::config::Settings;
use crate::fetchers::FetcherSet;
use crate::query::Query;
use crate::registry::AccountRegistry;
use crate::services::aggregator::{AggregatedView, Aggregator};
use crate::services::cache::MetricCache;
use crate::services::orchestrator::{FetchOrchestrator, OrchestratorConfig};
use crate::types::{Account, AccountStatus, Result, ServiceKind};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One refresh cycle's renderable output
#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardSnapshot {
    pub view: AggregatedView,
    pub statuses: BTreeMap<String, AccountStatus>,
}

/// Default metric set queried per service kind
pub fn standard_metrics(kind: ServiceKind) -> Vec<String> {
    let metrics: &[&str] = match kind {
        ServiceKind::Analytics => &[
            "users",
            "sessions",
            "pageviews",
            "bounce_rate",
            "engagement_rate",
            "avg_session_duration",
        ],
        ServiceKind::AdRevenue => &["earnings", "pageviews", "impressions", "clicks", "ctr", "rpm"],
        ServiceKind::CloudMetrics => &["cost", "forecast_cost"],
    };
    metrics.iter().map(|m| m.to_string()).collect()
}

pub struct Dashboard {
    registry: AccountRegistry,
    cache: Arc<MetricCache>,
    orchestrator: FetchOrchestrator,
    catalog: MetricCatalog,
}

impl Dashboard {
    /// Build a dashboard over an already-wired fetcher set. The catalog is
    /// validated here; a bad combination table must fail at startup, not
    /// mid-aggregation.
    pub fn new(
        settings: &Settings,
        catalog: MetricCatalog,
        fetchers: FetcherSet,
        cache: Arc<MetricCache>,
    ) -> Result<Self> {
        settings.validate()?;
        catalog.validate()?;
        let registry = AccountRegistry::new(settings.clone().into_accounts())?;
        let orchestrator = FetchOrchestrator::new(
            fetchers,
            OrchestratorConfig {
                fetch_timeout: settings.fetch_timeout(),
                failure_threshold: settings.failure_threshold,
            },
        );
        Ok(Self {
            registry,
            cache,
            orchestrator,
            catalog,
        })
    }

    /// Dashboard over the deterministic demo clients and standard catalog
    pub fn demo(settings: Settings) -> Result<Self> {
        let cache = Arc::new(MetricCache::new());
        let fetchers = FetcherSet::demo(Arc::clone(&cache), &settings);
        Self::new(&settings, MetricCatalog::standard(), fetchers, cache)
    }

    /// Run one full refresh cycle for the query's service kind
    pub async fn refresh(&self, query: &Query) -> Result<DashboardSnapshot> {
        let accounts = self.registry.snapshot();
        let outcome = self.orchestrator.refresh_all(&accounts, query).await;
        let view = Aggregator::aggregate(&outcome.per_account, &outcome.statuses, &self.catalog)?;
        Ok(DashboardSnapshot {
            view,
            statuses: outcome.statuses,
        })
    }

    /// Manual refresh for specific accounts: drop only their cache entries,
    /// then re-run the cycle. Untouched accounts keep serving from cache.
    pub async fn refresh_accounts(
        &self,
        account_ids: &[&str],
        query: &Query,
    ) -> Result<DashboardSnapshot> {
        for id in account_ids {
            self.cache.invalidate_account(query.service_kind, id);
        }
        self.refresh(query).await
    }

    /// Toggle an account live. Dropping its cache entries means the next
    /// cycle after a re-enable fetches fresh data instead of serving the
    /// pre-disable snapshot.
    pub fn set_account_enabled(
        &self,
        service_kind: ServiceKind,
        account_id: &str,
        enabled: bool,
    ) -> Result<()> {
        self.registry.set_enabled(service_kind, account_id, enabled)?;
        self.orchestrator.mark_enabled(service_kind, account_id, enabled);
        self.cache.invalidate_account(service_kind, account_id);
        Ok(())
    }

    /// Replace the account list (explicit reload entry point)
    pub fn reload_accounts(&self, accounts: Vec<Account>) -> Result<()> {
        self.registry.reload(accounts)
    }

    /// Current status of every configured account, in registry order.
    /// Accounts that have never been fetched read as Healthy (or Disabled).
    pub fn statuses(&self) -> Vec<AccountStatus> {
        self.registry
            .snapshot()
            .iter()
            .map(|account| {
                self.orchestrator
                    .status(account.service_kind, &account.id)
                    .unwrap_or_else(|| AccountStatus::new(&account.id, account.enabled))
            })
            .collect()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.registry.snapshot()
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &MetricCache {
        &self.cache
    }
}
