//! Settings and account configuration
//!
//! The core never parses provider credential formats; the config file only
//! carries opaque `credentials_ref` tokens that the external clients resolve.
//! Accounts load once at startup (or on explicit reload) from
//! `~/.streamboard/config.json` or a path supplied by the caller.

use crate::types::{Account, Result, ServiceKind, StreamboardError};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_true() -> bool {
    true
}

/// One account entry in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub name: String,
    pub credentials_ref: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AccountConfig {
    fn into_account(self, service_kind: ServiceKind) -> Account {
        Account {
            id: self.id,
            service_kind,
            display_name: self.name,
            credentials_ref: self.credentials_ref,
            region: self.region,
            enabled: self.enabled,
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_cache_ttl_short_secs() -> u64 {
    300
}

fn default_cloud_cache_ttl_secs() -> u64 {
    21600
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

/// Application settings with multi-account support
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Standard result freshness (1 hour)
    pub cache_ttl_secs: u64,
    /// Near-real-time freshness (5 minutes)
    pub cache_ttl_short_secs: u64,
    /// Cost data freshness (6 hours)
    pub cloud_cache_ttl_secs: u64,
    /// Overall deadline for one refresh cycle
    pub fetch_timeout_secs: u64,
    /// Consecutive failures before an account is marked Failed
    pub failure_threshold: u32,
    pub analytics_accounts: Vec<AccountConfig>,
    pub ad_revenue_accounts: Vec<AccountConfig>,
    pub cloud_accounts: Vec<AccountConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_ttl_short_secs: default_cache_ttl_short_secs(),
            cloud_cache_ttl_secs: default_cloud_cache_ttl_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            analytics_accounts: Vec::new(),
            ad_revenue_accounts: Vec::new(),
            cloud_accounts: Vec::new(),
        }
    }
}

impl Settings {
    /// Default config file location (~/.streamboard/config.json)
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|d| d.home_dir().join(".streamboard").join("config.json"))
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_ttl_short(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_short_secs)
    }

    pub fn cloud_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cloud_cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Validate the configuration, collecting every problem before failing
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.fetch_timeout_secs == 0 {
            errors.push("fetch_timeout_secs must be positive".to_string());
        }
        if self.failure_threshold == 0 {
            errors.push("failure_threshold must be positive".to_string());
        }

        let sections = [
            ("analytics", &self.analytics_accounts),
            ("ad_revenue", &self.ad_revenue_accounts),
            ("cloud", &self.cloud_accounts),
        ];
        for (section, accounts) in sections {
            for (i, account) in accounts.iter().enumerate() {
                if account.id.trim().is_empty() {
                    errors.push(format!("{} account {}: id is required", section, i + 1));
                }
                if account.name.trim().is_empty() {
                    errors.push(format!("{} account {}: name is required", section, i + 1));
                }
                if account.credentials_ref.trim().is_empty() {
                    errors.push(format!(
                        "{} account {}: credentials_ref is required",
                        section,
                        i + 1
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StreamboardError::Config(errors.join("; ")))
        }
    }

    /// All configured accounts in registry order: analytics, ad revenue,
    /// cloud, each section in file order
    pub fn into_accounts(self) -> Vec<Account> {
        let mut accounts = Vec::new();
        accounts.extend(
            self.analytics_accounts
                .into_iter()
                .map(|a| a.into_account(ServiceKind::Analytics)),
        );
        accounts.extend(
            self.ad_revenue_accounts
                .into_iter()
                .map(|a| a.into_account(ServiceKind::AdRevenue)),
        );
        accounts.extend(
            self.cloud_accounts
                .into_iter()
                .map(|a| a.into_account(ServiceKind::CloudMetrics)),
        );
        accounts
    }

    /// Demo configuration: two analytics properties, one ad account, one
    /// cloud account, plus a revoked analytics property so the status
    /// banner has something to show
    pub fn demo() -> Self {
        let account = |id: &str, name: &str, cred: &str| AccountConfig {
            id: id.to_string(),
            name: name.to_string(),
            credentials_ref: cred.to_string(),
            region: None,
            enabled: true,
        };
        Self {
            analytics_accounts: vec![
                account("prop-main", "Main site", "demo:main"),
                account("prop-blog", "Blog", "demo:blog"),
                account("prop-legacy", "Legacy site", "revoked:legacy"),
            ],
            ad_revenue_accounts: vec![account("pub-001", "Ad network", "demo:ads")],
            cloud_accounts: vec![AccountConfig {
                region: Some("us-east-1".into()),
                ..account("123456789012", "Prod cloud", "demo:cloud")
            }],
            ..Self::default()
        }
    }
}
