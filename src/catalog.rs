//! Metric combination-rule catalog
//!
//! Each metric is tagged with an explicit rule for merging across accounts.
//! The rule is looked up by name, never inferred from it: applying `Sum` to a
//! ratio metric is exactly the bug this table exists to prevent.

use crate::types::{Result, StreamboardError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a metric is merged across accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum CombineRule {
    /// Additive counts and totals (sessions, cost, clicks)
    Sum,
    /// Rates/ratios, weighted by their natural denominator metric
    /// (bounce rate by sessions, CTR by impressions)
    WeightedAverage { weight: String },
    /// Status-like values where the largest reporter wins
    Max,
    /// Status-like values where the smallest reporter wins
    Min,
}

/// Explicit metric name -> combination rule table.
///
/// Validated at construction: a weighted average's weight metric must itself
/// be a `Sum` metric in the same table. A metric missing from the table is a
/// fatal catalog error at aggregation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCatalog {
    rules: BTreeMap<String, CombineRule>,
}

impl MetricCatalog {
    pub fn new(rules: BTreeMap<String, CombineRule>) -> Result<Self> {
        let catalog = Self { rules };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Catalog covering the dashboard's standard metric set across the
    /// analytics, ad revenue, and cloud cost services.
    pub fn standard() -> Self {
        let mut rules = BTreeMap::new();
        let sum = |rules: &mut BTreeMap<String, CombineRule>, name: &str| {
            rules.insert(name.to_string(), CombineRule::Sum);
        };
        let weighted = |rules: &mut BTreeMap<String, CombineRule>, name: &str, weight: &str| {
            rules.insert(
                name.to_string(),
                CombineRule::WeightedAverage {
                    weight: weight.to_string(),
                },
            );
        };

        // Analytics
        sum(&mut rules, "users");
        sum(&mut rules, "sessions");
        sum(&mut rules, "pageviews");
        sum(&mut rules, "realtime_users");
        weighted(&mut rules, "bounce_rate", "sessions");
        weighted(&mut rules, "engagement_rate", "sessions");
        weighted(&mut rules, "avg_session_duration", "sessions");

        // Ad revenue
        sum(&mut rules, "earnings");
        sum(&mut rules, "impressions");
        sum(&mut rules, "clicks");
        weighted(&mut rules, "ctr", "impressions");
        weighted(&mut rules, "rpm", "pageviews");

        // Cloud cost
        sum(&mut rules, "cost");
        sum(&mut rules, "forecast_cost");

        // validate() cannot fail on the table above
        Self { rules }
    }

    pub fn rule(&self, metric: &str) -> Option<&CombineRule> {
        self.rules.get(metric)
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Weight metrics must be additive, otherwise the weighted-average
    /// denominator itself would need a combination rule.
    pub fn validate(&self) -> Result<()> {
        for (name, rule) in &self.rules {
            if let CombineRule::WeightedAverage { weight } = rule {
                match self.rules.get(weight) {
                    Some(CombineRule::Sum) => {}
                    Some(_) => {
                        return Err(StreamboardError::Catalog(format!(
                            "metric '{}' is weighted by '{}', which is not a Sum metric",
                            name, weight
                        )));
                    }
                    None => {
                        return Err(StreamboardError::Catalog(format!(
                            "metric '{}' is weighted by unknown metric '{}'",
                            name, weight
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
