//! Validation for engine configuration and rules.

use crate::error::{ConfigError, ConfigResult};
use crate::model::DistributionConfig;
use crate::rule::Rule;

/// Validate the engine configuration.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first invalid field.
pub fn validate_config(config: &DistributionConfig) -> ConfigResult<()> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::InvalidField {
            section: "distribution",
            field: "timeout_secs",
            value: Some(config.timeout_secs.to_string()),
            reason: "must be greater than zero",
        });
    }
    if config.intake_capacity == 0 {
        return Err(ConfigError::InvalidField {
            section: "distribution",
            field: "intake_capacity",
            value: Some(config.intake_capacity.to_string()),
            reason: "must be greater than zero",
        });
    }
    if let Some(oss) = &config.backends.oss {
        if oss.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                section: "backends.oss",
                field: "endpoint",
                value: None,
                reason: "must not be empty",
            });
        }
        if oss.access_key.is_empty() != oss.access_secret.is_empty() {
            return Err(ConfigError::InvalidField {
                section: "backends.oss",
                field: "access_secret",
                value: None,
                reason: "access key and secret must be set together",
            });
        }
    }
    Ok(())
}

/// Validate one rule.
///
/// Symlink mode requires backup so links survive source deletion.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidRule`] for the first inconsistency.
pub fn validate_rule(rule: &Rule) -> ConfigResult<()> {
    let invalid = |field: &'static str, reason: &'static str| ConfigError::InvalidRule {
        rule_id: rule.id,
        field,
        reason,
    };
    if rule.pattern.trim().is_empty() {
        return Err(invalid("pattern", "must not be empty"));
    }
    if rule.symlink && !rule.backup {
        return Err(invalid("symlink", "requires backup to be enabled"));
    }
    if rule.osn.local_user.trim().is_empty() && rule.osn.remote_user.is_none() {
        return Err(invalid("osn.local_user", "must name an account"));
    }
    if rule
        .hsn
        .iter()
        .any(|binding| binding.local_user.trim().is_empty() && binding.remote_user.is_none())
    {
        return Err(invalid("hsn.local_user", "must name an account"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OssSettings;
    use crate::rule::{DestinationBinding, SourceBinding};

    fn rule() -> Rule {
        Rule {
            id: 7,
            pattern: "*.csv".to_string(),
            osn: SourceBinding {
                local_user: "alice".to_string(),
                ..SourceBinding::default()
            },
            hsn: vec![DestinationBinding {
                local_user: "bob".to_string(),
                relative_path: "/in".to_string(),
                ..DestinationBinding::default()
            }],
            ..Rule::default()
        }
    }

    #[test]
    fn symlink_without_backup_is_rejected() {
        let mut candidate = rule();
        candidate.symlink = true;
        let err = validate_rule(&candidate).expect_err("symlink needs backup");
        assert!(matches!(
            err,
            ConfigError::InvalidRule {
                rule_id: 7,
                field: "symlink",
                ..
            }
        ));
        candidate.backup = true;
        assert!(validate_rule(&candidate).is_ok());
    }

    #[test]
    fn empty_pattern_and_unnamed_destinations_are_rejected() {
        let mut candidate = rule();
        candidate.pattern = "  ".to_string();
        assert!(validate_rule(&candidate).is_err());

        let mut candidate = rule();
        candidate.hsn.push(DestinationBinding::default());
        let err = validate_rule(&candidate).expect_err("unnamed destination");
        assert!(matches!(
            err,
            ConfigError::InvalidRule {
                field: "hsn.local_user",
                ..
            }
        ));
    }

    #[test]
    fn config_requires_positive_timeout_and_capacity() {
        let mut config = DistributionConfig::default();
        assert!(validate_config(&config).is_ok());
        config.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
        config.timeout_secs = 5;
        config.intake_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn oss_backend_needs_endpoint_and_paired_credentials() {
        let mut config = DistributionConfig::default();
        config.backends.oss = Some(OssSettings::default());
        assert!(validate_config(&config).is_err());

        config.backends.oss = Some(OssSettings {
            endpoint: "oss-cn-hangzhou.aliyuncs.com".to_string(),
            access_key: "ak".to_string(),
            ..OssSettings::default()
        });
        assert!(validate_config(&config).is_err());
    }
}
