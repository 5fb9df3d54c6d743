use std::fs;

use courier_config::{
    AccountProvider, ConfigError, RuleProvider, TransferMode, load_config, load_directory,
};
use courier_vfs::{ProviderKind, StorageConfig};

type TestResult<T> = anyhow::Result<T>;

const DIRECTORY_YAML: &str = r#"
accounts:
  - username: alice
    home_dir: /srv/alice
  - username: bob
    home_dir: /srv/bob
    storage:
      provider: object_storage
      bucket: media
      endpoint: oss-cn-hangzhou.aliyuncs.com
      access_key: ak
      access_secret: sk
      key_prefix: bob/
rules:
  - id: 1
    code: csv-fanout
    pattern: "*.csv"
    backup: true
    mode: local_to_mix
    rm_source: true
    osn:
      local_user: alice
    hsn:
      - local_user: bob
        relative_path: /in
"#;

#[test]
fn directory_document_loads_accounts_and_rules() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let path = temp.path().join("directory.yaml");
    fs::write(&path, DIRECTORY_YAML)?;

    let directory = load_directory(&path)?;
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let rules = runtime.block_on(directory.rules_for_user("alice"))?;
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].mode, TransferMode::LocalToMix);
    assert_eq!(rules[0].hsn[0].relative_path, "/in");

    let bob = runtime
        .block_on(directory.account_by_name("bob"))?
        .ok_or_else(|| anyhow::anyhow!("bob missing"))?;
    assert_eq!(bob.storage.provider(), ProviderKind::ObjectStorage);
    let alice = runtime
        .block_on(directory.account_by_name("alice"))?
        .ok_or_else(|| anyhow::anyhow!("alice missing"))?;
    assert_eq!(alice.storage, StorageConfig::Local);
    Ok(())
}

#[test]
fn symlink_rules_without_backup_fail_to_load() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let path = temp.path().join("directory.json");
    fs::write(
        &path,
        r#"{"rules":[{"id":4,"pattern":"*.pdf","symlink":true,"osn":{"local_user":"alice"}}]}"#,
    )?;
    let err = load_directory(&path).expect_err("symlink requires backup");
    assert!(matches!(err, ConfigError::InvalidRule { rule_id: 4, .. }));
    Ok(())
}

#[test]
fn engine_config_file_round_trips_backend_settings() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let path = temp.path().join("engine.yml");
    fs::write(
        &path,
        "enabled: true\ntimeout_secs: 120\nbackends:\n  oss:\n    endpoint: oss-cn-hangzhou.aliyuncs.com\n    access_key: ak\n    access_secret: sk\nlogging:\n  level: debug\n  format: json\n",
    )?;
    let config = load_config(&path)?;
    assert_eq!(config.timeout_secs, 120);
    let oss = config
        .backends
        .oss
        .ok_or_else(|| anyhow::anyhow!("oss settings missing"))?;
    assert_eq!(oss.defaults().access_key, "ak");
    assert_eq!(oss.request_timeout_secs, 30);
    assert_eq!(config.logging.level, "debug");
    Ok(())
}

#[test]
fn missing_files_report_io_errors() {
    let err = load_config(std::path::Path::new("/nonexistent/engine.yaml"))
        .expect_err("file is absent");
    assert!(matches!(err, ConfigError::Io { .. }));
}
