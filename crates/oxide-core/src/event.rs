//! Trigger events and run decisions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of occurrence that may start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Manual,
    Push,
    PullRequest,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Manual => "manual",
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
        };
        f.write_str(name)
    }
}

/// The triggering occurrence, as received from a webhook or a manual
/// invocation.
///
/// `changed_paths` is only meaningful for `push` and `target_branch` only for
/// `pull_request`. Both are optional here so that an incomplete payload can
/// be represented and rejected during trigger evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_paths: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
}

impl EventDescriptor {
    pub fn manual() -> Self {
        Self {
            kind: EventKind::Manual,
            changed_paths: None,
            target_branch: None,
        }
    }

    pub fn push<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: EventKind::Push,
            changed_paths: Some(paths.into_iter().map(Into::into).collect()),
            target_branch: None,
        }
    }

    pub fn pull_request(target_branch: impl Into<String>) -> Self {
        Self {
            kind: EventKind::PullRequest,
            changed_paths: None,
            target_branch: Some(target_branch.into()),
        }
    }
}

/// Outcome of trigger evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDecision {
    pub run: bool,
    pub reason: String,
}

impl RunDecision {
    pub fn run(reason: impl Into<String>) -> Self {
        Self {
            run: true,
            reason: reason.into(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            run: false,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constructor_collects_paths() {
        let event = EventDescriptor::push(["src/lib.rs", "README.md", "src/lib.rs"]);
        assert_eq!(event.kind, EventKind::Push);
        assert_eq!(event.changed_paths.as_ref().map(|p| p.len()), Some(2));
        assert!(event.target_branch.is_none());
    }

    #[test]
    fn test_event_deserializes_from_webhook_shape() {
        let event: EventDescriptor =
            serde_json::from_str(r#"{"kind":"pull_request","target_branch":"main"}"#).unwrap();
        assert_eq!(event, EventDescriptor::pull_request("main"));
    }

    #[test]
    fn test_kind_display_matches_serde_name() {
        assert_eq!(EventKind::PullRequest.to_string(), "pull_request");
        assert_eq!(
            serde_json::to_string(&EventKind::PullRequest).unwrap(),
            "\"pull_request\""
        );
    }
}
