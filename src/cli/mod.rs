//! CLI command handling

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;

use crate::config::Settings;
use crate::dashboard::{standard_metrics, Dashboard, DashboardSnapshot};
use crate::query::{DateRange, Granularity, Query};
use crate::types::{AccountState, ServiceKind};

/// Multi-account metrics dashboard
#[derive(Parser)]
#[command(name = "streamboard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Combined cross-account view for every service (default)
    Overview {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Number of days to cover, ending today
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// List configured accounts
    Accounts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch and show per-account health
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Force-refresh cached data (all accounts, or one with --account)
    Refresh {
        /// Refresh only this account id
        #[arg(long)]
        account: Option<String>,
    },
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        match self.command {
            None | Some(Commands::Overview { json: false, days: 7 }) => {
                runtime.block_on(run_overview(7, false))
            }
            Some(Commands::Overview { json, days }) => runtime.block_on(run_overview(days, json)),
            Some(Commands::Accounts { json }) => run_accounts(json),
            Some(Commands::Status { json }) => runtime.block_on(run_status(json)),
            Some(Commands::Refresh { account }) => {
                runtime.block_on(run_refresh(account.as_deref()))
            }
        }
    }
}

/// Settings from the config file, or the demo set when no accounts are
/// configured (the dashboard always has something to render)
fn load_settings() -> anyhow::Result<Settings> {
    let settings = Settings::load_default()?;
    if settings.clone().into_accounts().is_empty() {
        eprintln!("[streamboard] no accounts configured, using demo data");
        Ok(Settings::demo())
    } else {
        Ok(settings)
    }
}

fn build_dashboard() -> anyhow::Result<Dashboard> {
    Ok(Dashboard::demo(load_settings()?)?)
}

fn query_for(kind: ServiceKind, days: u32) -> Query {
    Query::new(
        kind,
        standard_metrics(kind),
        DateRange::last_days(chrono::Utc::now().date_naive(), days),
        Granularity::Daily,
    )
}

/// One refresh cycle per service kind, keyed by the kind's stable id
async fn refresh_all_services(
    dashboard: &Dashboard,
    days: u32,
) -> anyhow::Result<BTreeMap<&'static str, DashboardSnapshot>> {
    let mut snapshots = BTreeMap::new();
    for kind in ServiceKind::all() {
        let snapshot = dashboard.refresh(&query_for(kind, days)).await?;
        snapshots.insert(kind.as_str(), snapshot);
    }
    Ok(snapshots)
}

async fn run_overview(days: u32, json: bool) -> anyhow::Result<()> {
    let dashboard = build_dashboard()?;
    let snapshots = refresh_all_services(&dashboard, days).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    for (service, snapshot) in &snapshots {
        println!("== {} (last {} days, all accounts) ==", service, days);
        if snapshot.view.combined.rows.is_empty() {
            println!("  (no data)");
        }
        for row in &snapshot.view.combined.rows {
            let values: Vec<String> = row
                .values
                .iter()
                .map(|(metric, value)| format!("{}={:.2}", metric, value))
                .collect();
            println!("  {}  {}", row.dimensions.join(" "), values.join("  "));
        }
        println!(
            "  contributing: {}\n",
            snapshot.view.contributing_accounts.join(", ")
        );
    }

    print_status_banner(&dashboard);
    Ok(())
}

fn run_accounts(json: bool) -> anyhow::Result<()> {
    let dashboard = build_dashboard()?;
    let accounts = dashboard.accounts();

    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    for account in accounts {
        println!(
            "{:<14} {:<16} {:<24} {}",
            account.service_kind,
            account.id,
            account.display_name,
            if account.enabled { "enabled" } else { "disabled" }
        );
    }
    Ok(())
}

async fn run_status(json: bool) -> anyhow::Result<()> {
    let dashboard = build_dashboard()?;
    refresh_all_services(&dashboard, 1).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard.statuses())?);
        return Ok(());
    }

    print_status_banner(&dashboard);
    Ok(())
}

async fn run_refresh(account: Option<&str>) -> anyhow::Result<()> {
    let dashboard = build_dashboard()?;

    let mut contributing = 0usize;
    for kind in ServiceKind::all() {
        let query = query_for(kind, 7);
        let snapshot = match account {
            Some(id) if dashboard.accounts().iter().any(|a| a.service_kind == kind && a.id == id) => {
                dashboard.refresh_accounts(&[id], &query).await?
            }
            Some(_) => continue,
            None => dashboard.refresh(&query).await?,
        };
        contributing += snapshot.view.contributing_accounts.len();
    }

    println!("refreshed, {} contributing account(s)", contributing);
    print_status_banner(&dashboard);
    Ok(())
}

fn print_status_banner(dashboard: &Dashboard) {
    println!("== account status ==");
    for status in dashboard.statuses() {
        let marker = match status.state {
            AccountState::Healthy => "ok",
            AccountState::Degraded => "degraded",
            AccountState::Failed => "FAILED",
            AccountState::Disabled => "disabled",
        };
        let detail = status
            .last_error
            .as_deref()
            .map(|e| format!("  ({})", e))
            .unwrap_or_default();
        println!("  {:<16} {}{}", status.account_id, marker, detail);
    }
}
