//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific TUI or GUI implementation.

use std::path::Path;

use kiln_schema::{Coordinate, ExplorationReport};

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Installing").
    fn section(&self, title: &str);

    /// A coordinate is being resolved against a repository.
    fn resolving(&self, coordinate: &Coordinate, repository: &str);

    /// A coordinate landed in the shared cache.
    fn installed(&self, coordinate: &Coordinate, path: &Path);

    /// An operation on `subject` failed with a specific reason.
    fn failed(&self, subject: &str, reason: &str);

    /// File `index` (0-based) of `total` is about to be explored.
    fn exploring(&self, file: &Path, index: usize, total: usize);

    /// A file finished exploring.
    fn explored(&self, report: &ExplorationReport);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn resolving(&self, coordinate: &Coordinate, repository: &str) {
        (**self).resolving(coordinate, repository);
    }
    fn installed(&self, coordinate: &Coordinate, path: &Path) {
        (**self).installed(coordinate, path);
    }
    fn failed(&self, subject: &str, reason: &str) {
        (**self).failed(subject, reason);
    }
    fn exploring(&self, file: &Path, index: usize, total: usize) {
        (**self).exploring(file, index, total);
    }
    fn explored(&self, report: &ExplorationReport) {
        (**self).explored(report);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn resolving(&self, _: &Coordinate, _: &str) {}
    fn installed(&self, _: &Coordinate, _: &Path) {}
    fn failed(&self, _: &str, _: &str) {}
    fn exploring(&self, _: &Path, _: usize, _: usize) {}
    fn explored(&self, _: &ExplorationReport) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
