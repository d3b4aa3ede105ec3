//! Results of probing the types inside a binary archive or directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of trying to instantiate one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryOutcome {
    /// Instantiated, and the instance is a visual component.
    VisualComponent,
    /// Instantiated, but the instance is something else.
    Other,
    /// Instantiation failed; see the entry's cause.
    Error,
}

/// One probed type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationEntry {
    /// Fully-qualified type name.
    pub type_name: String,
    /// Probe outcome.
    pub outcome: EntryOutcome,
    /// Failure cause, present for [`EntryOutcome::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ExplorationEntry {
    /// A successful probe.
    pub fn ok(type_name: impl Into<String>, visual: bool) -> Self {
        Self {
            type_name: type_name.into(),
            outcome: if visual {
                EntryOutcome::VisualComponent
            } else {
                EntryOutcome::Other
            },
            cause: None,
        }
    }

    /// A failed probe with its cause.
    pub fn error(type_name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            outcome: EntryOutcome::Error,
            cause: Some(cause.into()),
        }
    }

    /// Whether the probe succeeded.
    pub fn is_ok(&self) -> bool {
        self.outcome != EntryOutcome::Error
    }
}

/// Probe results for one archive or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationReport {
    /// The explored archive or directory.
    pub source: PathBuf,
    /// One entry per discoverable type, in name order.
    pub entries: Vec<ExplorationEntry>,
    /// Whether a successfully-probed type belongs to a restricted vendor set.
    pub restricted: bool,
    /// Set when the archive itself could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ExplorationReport {
    /// An empty report for `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            entries: Vec::new(),
            restricted: false,
            failure: None,
        }
    }

    /// A report for an archive that could not be read at all.
    pub fn failed(source: impl Into<PathBuf>, cause: impl Into<String>) -> Self {
        Self {
            failure: Some(cause.into()),
            ..Self::new(source)
        }
    }

    /// Entries that instantiated as visual components.
    pub fn visual_components(&self) -> impl Iterator<Item = &ExplorationEntry> {
        self.entries
            .iter()
            .filter(|e| e.outcome == EntryOutcome::VisualComponent)
    }

    /// Entries that failed.
    pub fn errors(&self) -> impl Iterator<Item = &ExplorationEntry> {
        self.entries.iter().filter(|e| e.outcome == EntryOutcome::Error)
    }
}
