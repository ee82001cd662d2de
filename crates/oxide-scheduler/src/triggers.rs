//! Trigger matching and evaluation.

use oxide_core::event::{EventDescriptor, EventKind, RunDecision};
use oxide_core::pipeline::TriggerRule;
use oxide_core::{Error, Result};
use std::collections::{BTreeSet, HashSet};

/// Decides whether an incoming event starts a run.
pub struct TriggerEvaluator;

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `event` against the declared trigger rules.
    ///
    /// Fails with a configuration error when the event lacks the field its
    /// kind requires, or when more than one rule is declared for a kind.
    pub fn evaluate(&self, event: &EventDescriptor, rules: &[TriggerRule]) -> Result<RunDecision> {
        let mut seen = HashSet::new();
        for rule in rules {
            if !seen.insert(rule.kind()) {
                return Err(Error::configuration(format!(
                    "duplicate trigger rule for '{}'",
                    rule.kind()
                )));
            }
        }

        // Manual events run whether or not a manual rule is declared.
        if event.kind == EventKind::Manual {
            return Ok(RunDecision::run("manual trigger"));
        }

        let Some(rule) = rules.iter().find(|r| r.kind() == event.kind) else {
            return Ok(RunDecision::skip(format!(
                "no trigger rule for '{}' events",
                event.kind
            )));
        };

        match (event.kind, rule) {
            (EventKind::Push, TriggerRule::Push { paths }) => {
                let changed = event.changed_paths.as_ref().ok_or_else(|| {
                    Error::configuration("push event is missing changed_paths")
                })?;
                Ok(self.evaluate_push(paths, changed))
            }
            (EventKind::PullRequest, TriggerRule::PullRequest { branches }) => {
                let branch = event.target_branch.as_deref().ok_or_else(|| {
                    Error::configuration("pull_request event is missing target_branch")
                })?;
                Ok(self.evaluate_pull_request(branches, branch))
            }
            _ => Err(Error::Internal(format!(
                "rule for '{}' matched event '{}'",
                rule.kind(),
                event.kind
            ))),
        }
    }

    fn evaluate_push(&self, prefixes: &[String], changed: &BTreeSet<String>) -> RunDecision {
        match changed
            .iter()
            .find_map(|path| self.matching_prefix(prefixes, path).map(|p| (path, p)))
        {
            Some((path, prefix)) => {
                RunDecision::run(format!("changed path '{}' matches prefix '{}'", path, prefix))
            }
            None => RunDecision::skip("no changed path matches a configured prefix"),
        }
    }

    fn evaluate_pull_request(&self, branches: &[String], target: &str) -> RunDecision {
        if branches.iter().any(|b| b == target) {
            RunDecision::run(format!("target branch '{}' is configured", target))
        } else {
            RunDecision::skip(format!("target branch '{}' is not configured", target))
        }
    }

    /// Literal prefix match, no glob expansion.
    fn matching_prefix<'a>(&self, prefixes: &'a [String], path: &str) -> Option<&'a str> {
        prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| path.starts_with(prefix))
    }
}

impl Default for TriggerEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
