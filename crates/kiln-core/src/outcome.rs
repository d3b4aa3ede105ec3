//! Two-value lookup outcome.
//!
//! Resolution code must tell "legitimately nothing there" apart from "could
//! not find out". Public entry points collapse both into an empty result and
//! log the failure; tests and internal callers match on the variants.

use crate::client::ClientError;

/// Result of a lookup that may legitimately find nothing.
#[derive(Debug)]
pub enum Resolution<T> {
    /// The lookup produced a value.
    Found(T),
    /// The lookup completed and there was nothing to find.
    NotFound,
    /// The lookup could not be completed.
    Failed(ClientError),
}

impl<T> Resolution<T> {
    /// The found value, discarding the failure distinction.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound | Self::Failed(_) => None,
        }
    }

    /// Whether the lookup could not be completed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether the lookup completed without a value.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Map the found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Self::Found(v) => Resolution::Found(f(v)),
            Self::NotFound => Resolution::NotFound,
            Self::Failed(e) => Resolution::Failed(e),
        }
    }

    /// Collapse to the caller-visible shape, logging a failure under `what`.
    pub fn or_log(self, what: &str) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => {
                tracing::debug!("{what}: nothing found");
                None
            }
            Self::Failed(e) => {
                tracing::warn!("{what}: could not complete: {e}");
                None
            }
        }
    }
}

impl<T> From<Result<Option<T>, ClientError>> for Resolution<T> {
    fn from(result: Result<Option<T>, ClientError>) -> Self {
        match result {
            Ok(Some(v)) => Self::Found(v),
            Ok(None) => Self::NotFound,
            Err(e) => Self::Failed(e),
        }
    }
}
