//! Rule resolution for a file event.
//!
//! Rules are scanned in provider order and the first pattern that matches
//! the lowercased base name wins. There is no specificity ranking: operators
//! order overlapping rules themselves.

use courier_config::{Rule, RuleProvider};
use courier_events::TransactionLog;
use courier_vfs::path;
use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

use crate::error::{DistributionError, DistributionResult, describe};

/// Resolve the rule for `username`'s file at `virtual_path`, recording the
/// outcome and its time in `log`.
///
/// # Errors
///
/// Returns [`DistributionError::NoUsername`] for an empty username,
/// [`DistributionError::Provider`] when the rule lookup fails and
/// [`DistributionError::NoMatch`] when no pattern matches.
pub async fn match_rule(
    provider: &dyn RuleProvider,
    username: &str,
    virtual_path: &str,
    log: &mut TransactionLog,
) -> DistributionResult<Rule> {
    let result = find_rule(provider, username, virtual_path).await;
    let record = &mut log.rule_match;
    match &result {
        Ok(rule) => {
            record.rule_id = Some(rule.id);
            record.code = Some(rule.code.clone());
            record.pattern = Some(rule.pattern.clone());
            record.mode = Some(rule.mode.as_str().to_string());
        }
        Err(err) => record.error = Some(describe(err)),
    }
    log.rule_match.at = Some(log.stamp());
    result
}

async fn find_rule(
    provider: &dyn RuleProvider,
    username: &str,
    virtual_path: &str,
) -> DistributionResult<Rule> {
    if username.is_empty() {
        return Err(DistributionError::NoUsername);
    }
    let rules = provider
        .rules_for_user(username)
        .await
        .map_err(|source| DistributionError::provider("rules_for_user", source))?;

    let file_name = path::base(virtual_path).to_lowercase();
    for rule in rules {
        let Some(matcher) = compile(&rule) else {
            continue;
        };
        if matcher.is_match(&file_name) {
            debug!(rule_id = rule.id, pattern = %rule.pattern, file = %file_name, "rule matched");
            return Ok(rule);
        }
    }
    Err(DistributionError::NoMatch {
        username: username.to_string(),
        file_name,
    })
}

fn compile(rule: &Rule) -> Option<GlobMatcher> {
    match GlobBuilder::new(&rule.pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
    {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(err) => {
            warn!(rule_id = rule.id, pattern = %rule.pattern, error = %err, "skipping rule with invalid pattern");
            None
        }
    }
}
