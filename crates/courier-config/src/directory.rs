//! Rule and account lookup collaborators.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::Account;
use crate::error::{ConfigError, ConfigResult};
use crate::rule::Rule;
use crate::validate::validate_rule;

/// Source of the rules owned by a username.
#[async_trait]
pub trait RuleProvider: Send + Sync {
    /// Rules whose source binding belongs to `username`, in priority order.
    async fn rules_for_user(&self, username: &str) -> anyhow::Result<Vec<Rule>>;
}

/// Source of local account definitions.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Account named `name`, if it exists.
    async fn account_by_name(&self, name: &str) -> anyhow::Result<Option<Account>>;
}

/// Serialized form of a [`StaticDirectory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryDocument {
    /// Known accounts.
    pub accounts: Vec<Account>,
    /// Rules in priority order.
    pub rules: Vec<Rule>,
}

/// In-memory provider loaded once from a document.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    accounts: HashMap<String, Account>,
    rules: Vec<Rule>,
}

impl StaticDirectory {
    /// Validate `document` and index its accounts.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate usernames or invalid rules.
    pub fn from_document(document: DirectoryDocument) -> ConfigResult<Self> {
        let mut accounts = HashMap::with_capacity(document.accounts.len());
        for account in document.accounts {
            if accounts.contains_key(&account.username) {
                return Err(ConfigError::DuplicateAccount {
                    username: account.username,
                });
            }
            accounts.insert(account.username.clone(), account);
        }
        for rule in &document.rules {
            validate_rule(rule)?;
        }
        debug!(
            accounts = accounts.len(),
            rules = document.rules.len(),
            "directory loaded"
        );
        Ok(Self {
            accounts,
            rules: document.rules,
        })
    }

    /// Number of rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[async_trait]
impl RuleProvider for StaticDirectory {
    async fn rules_for_user(&self, username: &str) -> anyhow::Result<Vec<Rule>> {
        Ok(self
            .rules
            .iter()
            .filter(|rule| rule.osn.local_user == username)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccountProvider for StaticDirectory {
    async fn account_by_name(&self, name: &str) -> anyhow::Result<Option<Account>> {
        Ok(self.accounts.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::SourceBinding;

    fn rule(id: i64, owner: &str, pattern: &str) -> Rule {
        Rule {
            id,
            pattern: pattern.to_string(),
            osn: SourceBinding {
                local_user: owner.to_string(),
                ..SourceBinding::default()
            },
            ..Rule::default()
        }
    }

    fn account(name: &str) -> Account {
        Account {
            username: name.to_string(),
            home_dir: format!("/srv/{name}"),
            ..Account::default()
        }
    }

    #[tokio::test]
    async fn rules_are_filtered_by_owner_in_document_order() -> anyhow::Result<()> {
        let directory = StaticDirectory::from_document(DirectoryDocument {
            accounts: vec![account("alice")],
            rules: vec![
                rule(1, "alice", "*.csv"),
                rule(2, "bob", "*.csv"),
                rule(3, "alice", "report*"),
            ],
        })?;
        let ids: Vec<i64> = directory
            .rules_for_user("alice")
            .await?
            .into_iter()
            .map(|rule| rule.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(directory.account_by_name("alice").await?.is_some());
        assert!(directory.account_by_name("carol").await?.is_none());
        Ok(())
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        let err = StaticDirectory::from_document(DirectoryDocument {
            accounts: vec![account("alice"), account("alice")],
            rules: Vec::new(),
        })
        .expect_err("duplicate usernames");
        assert!(matches!(err, ConfigError::DuplicateAccount { .. }));
    }
}
