//! Local account source, local or object-storage destinations.

use std::sync::Arc;

use async_trait::async_trait;
use courier_config::{Account, DestinationBinding, Rule, TransferMode};
use courier_events::{DestinationRecord, FileEvent, TransactionLog};
use courier_vfs::{Fs, path};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Transfer, TransferInput};
use crate::account::resolve_local_account;
use crate::copy::{cancellable, copy_file, ensure_parent};
use crate::error::{DistributionError, DistributionResult, describe};
use crate::paths::{account_path, backup_path};
use crate::stage::{StageKind, StageStatus};
use crate::task::TaskContext;

#[derive(Debug)]
struct Source {
    account: Account,
    fs: Arc<dyn Fs>,
}

/// Transfer for [`TransferMode::LocalToMix`] rules.
#[derive(Debug)]
pub struct LocalToMix {
    context: Arc<TaskContext>,
    event: FileEvent,
    rule: Rule,
    cancel: CancellationToken,
    source: Option<Source>,
    backup_path: Option<String>,
}

impl LocalToMix {
    /// Transfer for one matched event.
    #[must_use]
    pub fn new(input: TransferInput) -> Self {
        Self {
            context: input.context,
            event: input.event,
            rule: input.rule,
            cancel: input.cancel,
            source: None,
            backup_path: None,
        }
    }

    /// Backup copy written by the backup stage, if any.
    #[must_use]
    pub fn backup_path(&self) -> Option<&str> {
        self.backup_path.as_deref()
    }

    fn located(&self, stage: StageKind) -> DistributionResult<&Source> {
        self.source
            .as_ref()
            .ok_or(DistributionError::StageOutOfOrder {
                stage: stage.as_str(),
            })
    }

    fn progress(&self, log: &TransactionLog, stage: StageKind, status: StageStatus) {
        self.context.progress(log.transaction_id, stage, status);
    }

    async fn locate_source(&mut self) -> DistributionResult<u64> {
        let source_path = self.event.path.as_str();
        if source_path.is_empty() {
            return Err(DistributionError::EmptySourcePath);
        }
        if self.rule.osn.local_user.is_empty() {
            return Err(DistributionError::Unsupported {
                operation: "remote_source",
            });
        }

        let account = cancellable(
            &self.cancel,
            resolve_local_account(self.context.accounts(), &self.rule.osn.local_user),
        )
        .await??;
        let fs = account
            .filesystem(self.context.registry())
            .map_err(|source| DistributionError::Storage {
                operation: "adapter",
                path: source_path.to_string(),
                source,
            })?;
        let info = cancellable(&self.cancel, fs.stat(source_path))
            .await?
            .map_err(|source| DistributionError::SourceMissingOrIsDirectory {
                path: source_path.to_string(),
                source: Some(source),
            })?;
        if info.is_dir() {
            return Err(DistributionError::SourceMissingOrIsDirectory {
                path: source_path.to_string(),
                source: None,
            });
        }

        self.source = Some(Source { account, fs });
        Ok(info.size)
    }

    async fn deliver(
        &self,
        source: &Source,
        binding: &DestinationBinding,
        origin: &str,
        record: &mut DestinationRecord,
    ) -> DistributionResult<()> {
        if binding.local_user.is_empty() {
            return Err(DistributionError::Unsupported {
                operation: "remote_delivery",
            });
        }
        let resolution = |source: DistributionError| DistributionError::DestinationResolution {
            account: binding.local_user.clone(),
            source: Box::new(source),
        };

        let account = cancellable(
            &self.cancel,
            resolve_local_account(self.context.accounts(), &binding.local_user),
        )
        .await?
        .map_err(resolution)?;
        let fs = account
            .filesystem(self.context.registry())
            .map_err(|source| {
                resolution(DistributionError::Storage {
                    operation: "adapter",
                    path: account.home_dir.clone(),
                    source,
                })
            })?;

        let target = account_path(&account, &binding.relative_path, &path::base(&self.event.path));
        record.path.clone_from(&target);
        record.provider = account.storage.provider().as_str().to_string();

        let registry = self.context.registry();
        let same_store = registry
            .effective_config(&source.account.storage)
            .same_store(&registry.effective_config(&account.storage));
        if self.rule.symlink && same_store {
            ensure_parent(&fs, &target, &self.cancel).await?;
            match cancellable(&self.cancel, source.fs.symlink(origin, &target)).await? {
                Ok(()) => {
                    record.linked = true;
                    info!(source = origin, target = %target, account = %account.username, "linked destination");
                }
                Err(err) if source.fs.is_not_supported(&err) => {
                    debug!(target = %target, backend = source.fs.name(), "symlink unsupported, destination skipped");
                }
                Err(source) => {
                    return Err(DistributionError::SymlinkFailed {
                        path: target,
                        source,
                    });
                }
            }
            return Ok(());
        }

        record.bytes = copy_file(&source.fs, &fs, origin, &target, &self.cancel)
            .await
            .map_err(|err| {
                if err.is_cancelled() {
                    err
                } else {
                    DistributionError::CopyFailed {
                        path: target.clone(),
                        source: Box::new(err),
                    }
                }
            })?;
        Ok(())
    }
}

#[async_trait]
impl Transfer for LocalToMix {
    fn mode(&self) -> TransferMode {
        TransferMode::LocalToMix
    }

    fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn check(&mut self, log: &mut TransactionLog) -> DistributionResult<()> {
        let located = self.locate_source().await;
        if matches!(&located, Err(err) if err.is_cancelled()) {
            return located.map(|_| ());
        }

        log.check.path.clone_from(&self.event.path);
        let status = match &located {
            Ok(size) => {
                log.check.size = *size;
                StageStatus::Completed
            }
            Err(err) => {
                log.check.error = Some(describe(err));
                StageStatus::Failed
            }
        };
        log.check.at = Some(log.stamp());
        self.progress(log, StageKind::Check, status);
        located.map(|_| ())
    }

    async fn backup(&mut self, log: &mut TransactionLog) -> DistributionResult<()> {
        let source = self.located(StageKind::Backup)?;
        log.backup.enabled = self.rule.backup;
        log.backup.source_path.clone_from(&self.event.path);
        if !self.rule.backup {
            log.backup.error = Some(describe(&DistributionError::BackupDisabled));
            log.backup.at = Some(log.stamp());
            self.progress(log, StageKind::Backup, StageStatus::Skipped);
            return Ok(());
        }

        let target = backup_path(&source.account, &path::base(&self.event.path));
        log.backup.target_path.clone_from(&target);
        match copy_file(&source.fs, &source.fs, &self.event.path, &target, &self.cancel).await {
            Ok(size) => {
                log.backup.size = size;
                log.backup.at = Some(log.stamp());
                self.progress(log, StageKind::Backup, StageStatus::Completed);
                self.backup_path = Some(target);
                Ok(())
            }
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                let err = DistributionError::BackupFailed {
                    path: target,
                    source: Box::new(err),
                };
                log.backup.error = Some(describe(&err));
                log.backup.at = Some(log.stamp());
                self.progress(log, StageKind::Backup, StageStatus::Failed);
                Err(err)
            }
        }
    }

    async fn distribute(&mut self, log: &mut TransactionLog) -> DistributionResult<()> {
        let source = self.located(StageKind::Distribute)?;
        if self.rule.hsn.is_empty() {
            self.progress(log, StageKind::Distribute, StageStatus::Failed);
            return Err(DistributionError::NoDestinations {
                rule_id: self.rule.id,
            });
        }

        let origin = self
            .backup_path
            .clone()
            .unwrap_or_else(|| self.event.path.clone());
        let mut failed = false;
        for binding in &self.rule.hsn {
            if self.cancel.is_cancelled() {
                return Err(DistributionError::Cancelled);
            }
            let mut record = DestinationRecord {
                account: binding.display_name().to_string(),
                addr: self.context.machine_addr().to_string(),
                ..DestinationRecord::default()
            };
            match self.deliver(source, binding, &origin, &mut record).await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    warn!(
                        transaction_id = %log.transaction_id,
                        account = %record.account,
                        error = %err,
                        "destination failed"
                    );
                    record.error = Some(describe(&err));
                    failed = true;
                }
            }
            record.at = log.stamp();
            log.hsn.push(record);
        }

        let status = if failed {
            StageStatus::Failed
        } else {
            StageStatus::Completed
        };
        self.progress(log, StageKind::Distribute, status);
        Ok(())
    }

    async fn delete(&mut self, log: &mut TransactionLog) -> DistributionResult<()> {
        let source = self.located(StageKind::Delete)?;
        log.delete.enabled = self.rule.rm_source;
        log.delete.path.clone_from(&self.event.path);
        if !self.rule.rm_source {
            self.progress(log, StageKind::Delete, StageStatus::Skipped);
            return Ok(());
        }

        let removed = cancellable(&self.cancel, source.fs.remove(&self.event.path, false))
            .await?
            .map_err(|err| DistributionError::DeleteFailed {
                path: self.event.path.clone(),
                source: err,
            });
        log.delete.at = Some(log.stamp());
        match removed {
            Ok(()) => {
                info!(transaction_id = %log.transaction_id, path = %self.event.path, "source removed");
                self.progress(log, StageKind::Delete, StageStatus::Completed);
                Ok(())
            }
            Err(err) => {
                log.delete.error = Some(describe(&err));
                self.progress(log, StageKind::Delete, StageStatus::Failed);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_config::{AccountProvider, RuleProvider};
    use courier_test_support::fixtures;
    use courier_vfs::StorageRegistry;

    use crate::engine::Collaborators;
    use crate::sink::LogSink;

    #[derive(Debug)]
    struct Quiet;

    impl LogSink for Quiet {
        fn finished(&self, _log: &TransactionLog, _outcome: &'static str) {}
    }

    fn transfer(
        accounts: Vec<Account>,
        rule: Rule,
        event: FileEvent,
        registry: Arc<StorageRegistry>,
    ) -> anyhow::Result<LocalToMix> {
        let directory = fixtures::directory(accounts, vec![rule.clone()])?;
        let rules: Arc<dyn RuleProvider> = directory.clone();
        let accounts: Arc<dyn AccountProvider> = directory;
        Ok(LocalToMix::new(TransferInput {
            context: Arc::new(TaskContext::new(
                Collaborators {
                    rules,
                    accounts,
                    registry,
                },
                "10.0.0.5",
                Arc::new(Quiet),
            )),
            event,
            rule,
            cancel: CancellationToken::new(),
        }))
    }

    fn log(file: &str) -> TransactionLog {
        TransactionLog::begin("alice", path::base(file), file, 4, "10.0.0.5")
    }

    #[tokio::test]
    async fn stages_refuse_to_run_before_check() -> anyhow::Result<()> {
        let (_connector, registry) = fixtures::memory_registry();
        let mut transfer = transfer(
            vec![fixtures::local_account("alice", "/home/alice")],
            fixtures::rule(1, "alice", "*.csv"),
            FileEvent::upload("alice", "/home/alice/report.csv", 4),
            registry,
        )?;
        let mut log = log("/home/alice/report.csv");

        let err = transfer
            .backup(&mut log)
            .await
            .expect_err("check has not run");
        assert!(matches!(
            err,
            DistributionError::StageOutOfOrder { stage: "backup" }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn directories_fail_the_check() -> anyhow::Result<()> {
        let temp = fixtures::temp_dir()?;
        let home = temp.path().to_string_lossy().to_string();
        let (_connector, registry) = fixtures::memory_registry();
        let mut transfer = transfer(
            vec![fixtures::local_account("alice", &home)],
            fixtures::rule(1, "alice", "*"),
            FileEvent::upload("alice", home.clone(), 0),
            registry,
        )?;
        let mut log = log(&home);

        let err = transfer.check(&mut log).await.expect_err("home is a directory");
        assert!(matches!(
            err,
            DistributionError::SourceMissingOrIsDirectory { source: None, .. }
        ));
        assert_eq!(
            log.check.error.as_deref(),
            Some("source is missing or is a directory")
        );
        assert!(log.check.at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn disabled_backup_is_recorded_and_distribution_uses_the_source() -> anyhow::Result<()> {
        let (connector, registry) = fixtures::memory_registry();
        let store = connector.store("oss.example.com", "media");
        store.insert("alice/report.csv", &b"1234"[..]);
        let mut rule = fixtures::rule(1, "alice", "*.csv");
        rule.hsn = vec![
            fixtures::destination("bob", "/in"),
            fixtures::destination("carol", "/in"),
        ];
        let mut transfer = transfer(
            vec![
                fixtures::object_account("alice", "media", "oss.example.com", "ak", "alice"),
                fixtures::object_account("bob", "media", "oss.example.com", "other-ak", "bob"),
            ],
            rule,
            FileEvent::upload("alice", "/alice/report.csv", 4),
            registry,
        )?;
        let mut log = log("/alice/report.csv");

        transfer.check(&mut log).await?;
        transfer.backup(&mut log).await?;
        transfer.distribute(&mut log).await?;

        assert!(!log.backup.enabled);
        assert_eq!(log.backup.error.as_deref(), Some("backup disabled for rule"));
        assert!(transfer.backup_path().is_none());
        assert_eq!(log.hsn.len(), 2);
        assert_eq!(log.hsn[0].path, "/bob/in/report.csv");
        assert_eq!(log.hsn[0].bytes, 4);
        assert!(log.hsn[0].error.is_none());
        assert_eq!(log.hsn[1].account, "carol");
        assert!(
            log.hsn[1]
                .error
                .as_deref()
                .is_some_and(|error| error.starts_with("destination could not be resolved"))
        );
        assert!(store.contains("bob/in/report.csv"));
        Ok(())
    }

    #[tokio::test]
    async fn remote_destinations_are_recorded_as_unsupported() -> anyhow::Result<()> {
        let (connector, registry) = fixtures::memory_registry();
        connector
            .store("oss.example.com", "media")
            .insert("alice/report.csv", &b"1234"[..]);
        let mut rule = fixtures::rule(1, "alice", "*.csv");
        rule.hsn = vec![DestinationBinding {
            remote_user: Some(courier_config::RemoteUser {
                username: "partner".to_string(),
                ..courier_config::RemoteUser::default()
            }),
            ..DestinationBinding::default()
        }];
        let mut transfer = transfer(
            vec![fixtures::object_account(
                "alice",
                "media",
                "oss.example.com",
                "ak",
                "alice",
            )],
            rule,
            FileEvent::upload("alice", "/alice/report.csv", 4),
            registry,
        )?;
        let mut log = log("/alice/report.csv");

        transfer.check(&mut log).await?;
        transfer.distribute(&mut log).await?;
        assert_eq!(log.hsn[0].account, "partner");
        assert_eq!(
            log.hsn[0].error.as_deref(),
            Some("operation not supported")
        );
        Ok(())
    }
}
