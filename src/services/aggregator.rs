//! Cross-account aggregation
//!
//! Combines one refresh cycle's per-account results into a single view.
//! Only healthy contributions count: an account whose fetch failed, or
//! whose status is Failed or Disabled, is excluded exactly as if it were
//! not configured. Rows are joined on their dimension tuple and each
//! metric is combined under its catalog rule; averages are weighted by
//! their catalog weight metric, never averaged naively.

use crate::catalog::{CombineRule, MetricCatalog};
use crate::types::{
    AccountState, AccountStatus, FetchError, MetricRow, RawMetricResult, Result,
    StreamboardError,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Synthetic account id carried by the combined result
pub const COMBINED_ID: &str = "combined";

/// One cycle's aggregated output
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AggregatedView {
    /// Cross-account totals, one row per dimension tuple
    pub combined: RawMetricResult,
    /// The contributing per-account results, in registry order
    pub per_account: Vec<RawMetricResult>,
    /// Ids of the accounts that contributed, in registry order
    pub contributing_accounts: Vec<String>,
}

pub struct Aggregator;

impl Aggregator {
    /// Aggregate one refresh cycle. `per_account` and `statuses` come from
    /// the orchestrator's [`RefreshOutcome`](crate::services::orchestrator::RefreshOutcome).
    ///
    /// Fails only on catalog misconfiguration (a metric with no combine
    /// rule); account failures were already captured upstream as values.
    pub fn aggregate(
        per_account: &[(String, std::result::Result<RawMetricResult, FetchError>)],
        statuses: &BTreeMap<String, AccountStatus>,
        catalog: &MetricCatalog,
    ) -> Result<AggregatedView> {
        let contributing: Vec<&RawMetricResult> = per_account
            .iter()
            .filter(|(id, result)| result.is_ok() && contributes(statuses.get(id)))
            .map(|(_, result)| result.as_ref().expect("filtered to Ok above"))
            .collect();

        // Join rows across accounts on the dimension tuple
        let mut joined: BTreeMap<&[String], Vec<&MetricRow>> = BTreeMap::new();
        for result in &contributing {
            for row in &result.rows {
                joined.entry(&row.dimensions).or_default().push(row);
            }
        }

        let mut rows = Vec::with_capacity(joined.len());
        for (dimensions, group) in joined {
            let mut combined_row = MetricRow::new(dimensions.to_vec());
            let metrics: BTreeSet<&str> = group
                .iter()
                .flat_map(|r| r.values.keys().map(String::as_str))
                .collect();
            for metric in metrics {
                let rule = catalog.rule(metric).ok_or_else(|| {
                    StreamboardError::Catalog(format!(
                        "metric '{metric}' has no combine rule"
                    ))
                })?;
                if let Some(value) = combine(metric, rule, &group) {
                    combined_row.values.insert(metric.to_string(), value);
                }
            }
            rows.push(combined_row);
        }

        let combined = RawMetricResult {
            account_id: COMBINED_ID.to_string(),
            // Derived from the inputs so re-aggregating is reproducible
            fetched_at: contributing
                .iter()
                .map(|r| r.fetched_at)
                .max()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            rows,
        };

        Ok(AggregatedView {
            combined,
            contributing_accounts: contributing.iter().map(|r| r.account_id.clone()).collect(),
            per_account: contributing.into_iter().cloned().collect(),
        })
    }
}

/// A missing status means the account was never seen failing; include it
fn contributes(status: Option<&AccountStatus>) -> bool {
    !matches!(
        status.map(|s| s.state),
        Some(AccountState::Failed) | Some(AccountState::Disabled)
    )
}

/// Combine one metric across the rows of one dimension group. Accounts that
/// do not report the metric are skipped, never treated as zero. Returns None
/// when no account contributes a usable value.
fn combine(metric: &str, rule: &CombineRule, group: &[&MetricRow]) -> Option<f64> {
    match rule {
        CombineRule::Sum => {
            let mut total = 0.0;
            let mut seen = false;
            for row in group {
                if let Some(v) = row.values.get(metric) {
                    total += v;
                    seen = true;
                }
            }
            seen.then_some(total)
        }
        CombineRule::WeightedAverage { weight } => {
            // Each account contributes weight * rate; accounts missing
            // either side are skipped so they cannot skew the average
            let mut num = 0.0;
            let mut den = 0.0;
            for row in group {
                if let (Some(w), Some(v)) = (row.values.get(weight), row.values.get(metric)) {
                    num += w * v;
                    den += w;
                }
            }
            if den > 0.0 {
                Some(num / den)
            } else {
                Some(0.0)
            }
        }
        CombineRule::Max => group
            .iter()
            .filter_map(|row| row.values.get(metric))
            .copied()
            .reduce(f64::max),
        CombineRule::Min => group
            .iter()
            .filter_map(|row| row.values.get(metric))
            .copied()
            .reduce(f64::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn catalog() -> MetricCatalog {
        MetricCatalog::standard()
    }

    fn fetched_at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap()
    }

    fn result(id: &str, day: u32, rows: Vec<MetricRow>) -> RawMetricResult {
        RawMetricResult {
            account_id: id.to_string(),
            fetched_at: fetched_at(day),
            rows,
        }
    }

    fn row(date: &str, values: &[(&str, f64)]) -> MetricRow {
        let mut row = MetricRow::new(vec![date.to_string()]);
        for (metric, value) in values {
            row.values.insert(metric.to_string(), *value);
        }
        row
    }

    fn healthy(id: &str) -> (String, AccountStatus) {
        (id.to_string(), AccountStatus::new(id, true))
    }

    // Test 1: sums add across accounts per dimension tuple
    #[test]
    fn test_sum_across_accounts() {
        let per_account = vec![
            (
                "a".to_string(),
                Ok(result("a", 1, vec![row("2025-01-01", &[("sessions", 100.0)])])),
            ),
            (
                "b".to_string(),
                Ok(result("b", 1, vec![row("2025-01-01", &[("sessions", 300.0)])])),
            ),
        ];
        let statuses = [healthy("a"), healthy("b")].into();

        let view = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap();
        assert_eq!(view.combined.rows.len(), 1);
        assert_eq!(view.combined.rows[0].values["sessions"], 400.0);
        assert_eq!(view.contributing_accounts, vec!["a", "b"]);
    }

    // Test 2: rate metrics are weighted by their catalog weight, not
    // naively averaged. (100 sessions at 20% + 300 at 60%) / 400 = 50%.
    #[test]
    fn test_weighted_average_not_naive_mean() {
        let per_account = vec![
            (
                "a".to_string(),
                Ok(result(
                    "a",
                    1,
                    vec![row("2025-01-01", &[("sessions", 100.0), ("bounce_rate", 20.0)])],
                )),
            ),
            (
                "b".to_string(),
                Ok(result(
                    "b",
                    1,
                    vec![row("2025-01-01", &[("sessions", 300.0), ("bounce_rate", 60.0)])],
                )),
            ),
        ];
        let statuses = [healthy("a"), healthy("b")].into();

        let view = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap();
        let combined = &view.combined.rows[0];
        assert_eq!(combined.values["sessions"], 400.0);
        assert_eq!(combined.values["bounce_rate"], 50.0);
        // A naive mean would have said 40%
        assert_ne!(combined.values["bounce_rate"], 40.0);
    }

    // Test 3: a failed fetch is equivalent to the account not existing
    #[test]
    fn test_failed_fetch_excluded_like_removal() {
        let ok_only = vec![(
            "a".to_string(),
            Ok(result("a", 1, vec![row("2025-01-01", &[("sessions", 100.0)])])),
        )];
        let with_failure = {
            let mut v = ok_only.clone();
            v.push((
                "b".to_string(),
                Err(FetchError::Upstream("provider down".into())),
            ));
            v
        };
        let statuses = [healthy("a"), healthy("b")].into();

        let without = Aggregator::aggregate(&ok_only, &statuses, &catalog()).unwrap();
        let with = Aggregator::aggregate(&with_failure, &statuses, &catalog()).unwrap();
        assert_eq!(without.combined, with.combined);
        assert_eq!(with.contributing_accounts, vec!["a"]);
    }

    // Test 4: Failed/Disabled statuses exclude even an Ok result
    #[test]
    fn test_failed_and_disabled_statuses_excluded() {
        let per_account = vec![
            (
                "a".to_string(),
                Ok(result("a", 1, vec![row("2025-01-01", &[("sessions", 100.0)])])),
            ),
            (
                "b".to_string(),
                Ok(result("b", 1, vec![row("2025-01-01", &[("sessions", 999.0)])])),
            ),
            (
                "c".to_string(),
                Ok(result("c", 1, vec![row("2025-01-01", &[("sessions", 999.0)])])),
            ),
        ];
        let mut failed = AccountStatus::new("b", true);
        for _ in 0..3 {
            failed.record_failure(&FetchError::Timeout, 3);
        }
        let statuses = [
            healthy("a"),
            ("b".to_string(), failed),
            ("c".to_string(), AccountStatus::new("c", false)),
        ]
        .into();

        let view = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap();
        assert_eq!(view.combined.rows[0].values["sessions"], 100.0);
        assert_eq!(view.contributing_accounts, vec!["a"]);
    }

    // Test 5: accounts missing a metric are skipped, not counted as zero
    #[test]
    fn test_absent_metric_skipped_not_zeroed() {
        let per_account = vec![
            (
                "a".to_string(),
                Ok(result(
                    "a",
                    1,
                    vec![row("2025-01-01", &[("sessions", 100.0), ("bounce_rate", 40.0)])],
                )),
            ),
            (
                "b".to_string(),
                // Reports sessions but no bounce_rate
                Ok(result("b", 1, vec![row("2025-01-01", &[("sessions", 900.0)])])),
            ),
        ];
        let statuses = [healthy("a"), healthy("b")].into();

        let view = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap();
        let combined = &view.combined.rows[0];
        assert_eq!(combined.values["sessions"], 1000.0);
        // Only account a carries both sides of the weighted average
        assert_eq!(combined.values["bounce_rate"], 40.0);
    }

    // Test 6: zero total weight yields 0.0, never NaN
    #[test]
    fn test_zero_weight_yields_zero() {
        let per_account = vec![(
            "a".to_string(),
            Ok(result(
                "a",
                1,
                vec![row("2025-01-01", &[("sessions", 0.0), ("bounce_rate", 55.0)])],
            )),
        )];
        let statuses = [healthy("a")].into();

        let view = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap();
        assert_eq!(view.combined.rows[0].values["bounce_rate"], 0.0);
    }

    // Test 7: a metric without a combine rule is a configuration error
    #[test]
    fn test_unknown_metric_is_fatal() {
        let per_account = vec![(
            "a".to_string(),
            Ok(result("a", 1, vec![row("2025-01-01", &[("mystery_metric", 1.0)])])),
        )];
        let statuses = [healthy("a")].into();

        let err = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap_err();
        assert!(err.to_string().contains("mystery_metric"));
    }

    // Test 8: no contributors still yields a well-formed empty view
    #[test]
    fn test_empty_input_yields_empty_view() {
        let view = Aggregator::aggregate(&[], &BTreeMap::new(), &catalog()).unwrap();
        assert!(view.combined.rows.is_empty());
        assert!(view.contributing_accounts.is_empty());
        assert_eq!(view.combined.account_id, COMBINED_ID);
    }

    // Test 9: same inputs always serialize to the same JSON
    #[test]
    fn test_aggregation_is_deterministic() {
        let per_account = vec![
            (
                "a".to_string(),
                Ok(result(
                    "a",
                    2,
                    vec![
                        row("2025-01-01", &[("sessions", 10.0), ("earnings", 1.25)]),
                        row("2025-01-02", &[("sessions", 12.0)]),
                    ],
                )),
            ),
            (
                "b".to_string(),
                Ok(result("b", 1, vec![row("2025-01-02", &[("sessions", 8.0)])])),
            ),
        ];
        let statuses: BTreeMap<String, AccountStatus> = [healthy("a"), healthy("b")].into();

        let first = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap();
        let second = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    // Test 10: combined timestamp is the max of the contributing fetches
    #[test]
    fn test_combined_timestamp_is_max_input() {
        let per_account = vec![
            (
                "a".to_string(),
                Ok(result("a", 3, vec![row("2025-01-01", &[("sessions", 1.0)])])),
            ),
            (
                "b".to_string(),
                Ok(result("b", 9, vec![row("2025-01-01", &[("sessions", 2.0)])])),
            ),
        ];
        let statuses = [healthy("a"), healthy("b")].into();

        let view = Aggregator::aggregate(&per_account, &statuses, &catalog()).unwrap();
        assert_eq!(view.combined.fetched_at, fetched_at(9));
    }

    // Test 11: max/min rules fold correctly
    #[test]
    fn test_max_rule() {
        let mut catalog_rules = BTreeMap::new();
        catalog_rules.insert("peak_concurrent".to_string(), CombineRule::Max);
        let catalog = MetricCatalog::new(catalog_rules).unwrap();

        let per_account = vec![
            (
                "a".to_string(),
                Ok(result("a", 1, vec![row("2025-01-01", &[("peak_concurrent", 40.0)])])),
            ),
            (
                "b".to_string(),
                Ok(result("b", 1, vec![row("2025-01-01", &[("peak_concurrent", 75.0)])])),
            ),
        ];
        let statuses = [healthy("a"), healthy("b")].into();

        let view = Aggregator::aggregate(&per_account, &statuses, &catalog).unwrap();
        assert_eq!(view.combined.rows[0].values["peak_concurrent"], 75.0);
    }
}
