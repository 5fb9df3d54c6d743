//! Binding-to-account resolution shared by source and destination bindings.

use courier_config::{Account, AccountProvider};

use crate::error::{DistributionError, DistributionResult};

/// Look up the local account a binding names.
///
/// # Errors
///
/// Returns [`DistributionError::Provider`] when the lookup fails and
/// [`DistributionError::AccountNotFound`] when the provider knows no such
/// account.
pub async fn resolve_local_account(
    provider: &dyn AccountProvider,
    name: &str,
) -> DistributionResult<Account> {
    provider
        .account_by_name(name)
        .await
        .map_err(|source| DistributionError::provider("account_by_name", source))?
        .ok_or_else(|| DistributionError::AccountNotFound {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier_config::{DirectoryDocument, StaticDirectory};

    struct Offline;

    #[async_trait]
    impl AccountProvider for Offline {
        async fn account_by_name(&self, _name: &str) -> anyhow::Result<Option<Account>> {
            Err(anyhow::anyhow!("directory offline"))
        }
    }

    #[tokio::test]
    async fn missing_and_failing_lookups_are_distinguished() -> anyhow::Result<()> {
        let directory = StaticDirectory::from_document(DirectoryDocument {
            accounts: vec![Account {
                username: "bob".to_string(),
                home_dir: "/srv/bob".to_string(),
                ..Account::default()
            }],
            rules: Vec::new(),
        })?;

        let bob = resolve_local_account(&directory, "bob").await?;
        assert_eq!(bob.home_dir, "/srv/bob");

        let missing = resolve_local_account(&directory, "carol")
            .await
            .expect_err("carol is unknown");
        assert!(matches!(missing, DistributionError::AccountNotFound { ref name } if name == "carol"));

        let failing = resolve_local_account(&Offline, "bob")
            .await
            .expect_err("provider is offline");
        assert!(matches!(
            failing,
            DistributionError::Provider {
                operation: "account_by_name",
                ..
            }
        ));
        Ok(())
    }
}
