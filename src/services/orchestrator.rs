//! Concurrent per-account fetch orchestration
//!
//! One tokio task per enabled account per refresh cycle. Failures are
//! captured as values and drive the account status state machine; they are
//! never allowed to abort sibling fetches. A single deadline covers the
//! whole fan-out: accounts still in flight when it elapses are abandoned
//! and reported as timed out, while completed siblings keep their results.
//!
//! The orchestrator owns the persistent per-account status map; consecutive
//! failure counts survive across cycles for the process lifetime.

use crate::fetchers::FetcherSet;
use crate::query::Query;
use crate::types::{Account, AccountStatus, FetchError, RawMetricResult, ServiceKind};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

/// Tunables for one orchestrator instance
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Overall deadline for one refresh cycle
    pub fetch_timeout: Duration,
    /// Consecutive failures before Degraded becomes Failed
    pub failure_threshold: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            failure_threshold: 3,
        }
    }
}

/// Everything one refresh cycle produced
#[derive(Debug)]
pub struct RefreshOutcome {
    /// One entry per enabled account of the cycle, in registry order —
    /// never completion order
    pub per_account: Vec<(String, Result<RawMetricResult, FetchError>)>,
    /// Status snapshot for every account of the cycle, disabled included
    pub statuses: BTreeMap<String, AccountStatus>,
}

/// Fans one query out across accounts and keeps their statuses
pub struct FetchOrchestrator {
    fetchers: FetcherSet,
    statuses: Mutex<HashMap<(ServiceKind, String), AccountStatus>>,
    config: OrchestratorConfig,
}

impl FetchOrchestrator {
    pub fn new(fetchers: FetcherSet, config: OrchestratorConfig) -> Self {
        Self {
            fetchers,
            statuses: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Run one refresh cycle for the accounts matching the query's service
    /// kind. Accounts of other kinds are untouched.
    pub async fn refresh_all(&self, accounts: &[Account], query: &Query) -> RefreshOutcome {
        let cycle: Vec<Account> = accounts
            .iter()
            .filter(|a| a.service_kind == query.service_kind)
            .cloned()
            .collect();
        let enabled: Vec<Account> = cycle.iter().filter(|a| a.enabled).cloned().collect();

        // Fan out, one task per enabled account. Slot indices pin results
        // back to registry order regardless of completion order.
        let mut slots: Vec<Option<Result<RawMetricResult, FetchError>>> =
            (0..enabled.len()).map(|_| None).collect();
        let deadline = Instant::now() + self.config.fetch_timeout;
        let mut tasks: JoinSet<(usize, Result<RawMetricResult, FetchError>)> = JoinSet::new();

        for (idx, account) in enabled.iter().enumerate() {
            match self.fetchers.for_kind(account.service_kind) {
                Some(fetcher) => {
                    let account = account.clone();
                    let query = query.clone();
                    tasks.spawn(async move { (idx, fetcher.fetch(&account, &query).await) });
                }
                None => {
                    slots[idx] = Some(Err(FetchError::Upstream(format!(
                        "no fetcher registered for service kind '{}'",
                        account.service_kind
                    ))));
                }
            }
        }

        while !tasks.is_empty() {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((idx, result)))) => slots[idx] = Some(result),
                // A panicked task only loses its own slot; it reads as Timeout
                Ok(Some(Err(_))) => {}
                Ok(None) => break,
                Err(_) => {
                    // Deadline elapsed: abandon what is still in flight.
                    // The underlying call may still finish and warm the
                    // cache for next cycle, but it is not waited upon.
                    tasks.abort_all();
                    break;
                }
            }
        }

        let now = Utc::now();
        let per_account: Vec<(String, Result<RawMetricResult, FetchError>)> = enabled
            .iter()
            .zip(slots)
            .map(|(account, slot)| {
                let result = match slot {
                    Some(Err(FetchError::NoData)) => {
                        // Valid empty result, not a failure
                        Ok(RawMetricResult::empty(&account.id, now))
                    }
                    Some(result) => result,
                    None => Err(FetchError::Timeout),
                };
                (account.id.clone(), result)
            })
            .collect();

        // Advance the state machine and snapshot statuses for the cycle
        let mut statuses = self.statuses.lock().expect("status lock poisoned");
        let mut snapshot = BTreeMap::new();

        for account in &cycle {
            let status = statuses
                .entry((account.service_kind, account.id.clone()))
                .or_insert_with(|| AccountStatus::new(&account.id, account.enabled));
            status.set_enabled(account.enabled);
        }
        for (account_id, result) in &per_account {
            let status = statuses
                .get_mut(&(query.service_kind, account_id.clone()))
                .expect("status created above");
            match result {
                Ok(_) => status.record_success(now),
                Err(err) => status.record_failure(err, self.config.failure_threshold),
            }
        }
        for account in &cycle {
            let status = &statuses[&(account.service_kind, account.id.clone())];
            snapshot.insert(account.id.clone(), status.clone());
        }

        RefreshOutcome {
            per_account,
            statuses: snapshot,
        }
    }

    /// Apply an enable/disable toggle to the persistent status map
    pub fn mark_enabled(&self, service_kind: ServiceKind, account_id: &str, enabled: bool) {
        let mut statuses = self.statuses.lock().expect("status lock poisoned");
        statuses
            .entry((service_kind, account_id.to_string()))
            .or_insert_with(|| AccountStatus::new(account_id, enabled))
            .set_enabled(enabled);
    }

    /// Current status for one account, if it has ever been seen
    pub fn status(&self, service_kind: ServiceKind, account_id: &str) -> Option<AccountStatus> {
        self.statuses
            .lock()
            .expect("status lock poisoned")
            .get(&(service_kind, account_id.to_string()))
            .cloned()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}
