//! Account registry
//!
//! Pure data: the ordered set of configured accounts per service. The order
//! accounts are registered in is the order every downstream output follows.
//! `enabled` is the only field that changes during a run.

use crate::types::{Account, Result, ServiceKind, StreamboardError};
use std::collections::HashSet;
use std::sync::RwLock;

/// Ordered, uniqueness-checked account set
#[derive(Debug)]
pub struct AccountRegistry {
    accounts: RwLock<Vec<Account>>,
}

impl AccountRegistry {
    pub fn new(accounts: Vec<Account>) -> Result<Self> {
        validate(&accounts)?;
        Ok(Self {
            accounts: RwLock::new(accounts),
        })
    }

    /// Replace the full account list (explicit reload entry point).
    /// Fails without touching the current list if the new one is invalid.
    pub fn reload(&self, accounts: Vec<Account>) -> Result<()> {
        validate(&accounts)?;
        *self.accounts.write().expect("registry lock poisoned") = accounts;
        Ok(())
    }

    /// Current accounts in configured order
    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts
            .read()
            .expect("registry lock poisoned")
            .clone()
    }

    pub fn get(&self, service_kind: ServiceKind, id: &str) -> Option<Account> {
        self.accounts
            .read()
            .expect("registry lock poisoned")
            .iter()
            .find(|a| a.service_kind == service_kind && a.id == id)
            .cloned()
    }

    /// Toggle an account live. Returns the previous enabled value.
    pub fn set_enabled(
        &self,
        service_kind: ServiceKind,
        id: &str,
        enabled: bool,
    ) -> Result<bool> {
        let mut accounts = self.accounts.write().expect("registry lock poisoned");
        let account = accounts
            .iter_mut()
            .find(|a| a.service_kind == service_kind && a.id == id)
            .ok_or_else(|| {
                StreamboardError::Registry(format!(
                    "no {} account with id '{}'",
                    service_kind, id
                ))
            })?;
        let previous = account.enabled;
        account.enabled = enabled;
        Ok(previous)
    }

    pub fn len(&self) -> usize {
        self.accounts.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `(service_kind, id)` must be unique; `display_name` must be unique within
/// a service kind (it doubles as the human-facing disambiguator)
fn validate(accounts: &[Account]) -> Result<()> {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();
    let mut names = HashSet::new();

    for account in accounts {
        if !ids.insert((account.service_kind, account.id.as_str())) {
            errors.push(format!(
                "duplicate {} account id '{}'",
                account.service_kind, account.id
            ));
        }
        if !names.insert((account.service_kind, account.display_name.as_str())) {
            errors.push(format!(
                "duplicate {} display name '{}'",
                account.service_kind, account.display_name
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StreamboardError::Registry(errors.join("; ")))
    }
}
