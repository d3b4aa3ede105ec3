//! Import sessions.
//!
//! An [`ImportSession`] explores a list of archives and class directories in
//! the background, inside one [`LoadingContext`] built from all of them plus
//! the packages already installed. The resulting [`ImportSelection`] lets the
//! caller check and uncheck discovered components against the previously
//! persisted exclusion filter.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use kiln_schema::{ExclusionFilter, ExplorationReport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::explorer::{BinaryExplorer, LoadingContext};
use crate::reporter::{NullReporter, Reporter};

/// Progress of a running import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportProgress {
    /// Files explored so far.
    pub completed: usize,
    pub total: usize,
    /// File currently being explored.
    pub current: Option<PathBuf>,
    pub finished: bool,
}

/// Everything an import produced.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// One report per explored file, in input order. Shorter than the input
    /// when the import was cancelled.
    pub reports: Vec<ExplorationReport>,
    pub selection: ImportSelection,
    pub cancelled: bool,
}

/// Checked state of discovered components, reconciled with an earlier filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSelection {
    checked: BTreeMap<String, bool>,
    carry_over: ExclusionFilter,
}

impl ImportSelection {
    /// Visual components of `reports` start checked unless `previous`
    /// excludes them. Excluded names that were rediscovered leave the
    /// carry-over set; the rest of `previous` is carried over untouched.
    pub fn reconcile(reports: &[ExplorationReport], previous: &ExclusionFilter) -> Self {
        let mut carry_over = previous.clone();
        let mut checked = BTreeMap::new();
        for entry in reports.iter().flat_map(ExplorationReport::visual_components) {
            let excluded = carry_over.remove(&entry.type_name) || previous.contains(&entry.type_name);
            checked.insert(entry.type_name.clone(), !excluded);
        }
        Self { checked, carry_over }
    }

    /// Discovered names with their checked state, sorted.
    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        self.checked.iter().map(|(name, checked)| (name.as_str(), *checked))
    }

    pub fn is_checked(&self, type_name: &str) -> Option<bool> {
        self.checked.get(type_name).copied()
    }

    /// Returns `false` if `type_name` was not discovered.
    pub fn set_checked(&mut self, type_name: &str, checked: bool) -> bool {
        match self.checked.get_mut(type_name) {
            Some(state) => {
                *state = checked;
                true
            }
            None => false,
        }
    }

    pub fn checked(&self) -> impl Iterator<Item = &str> {
        self.entries().filter(|(_, c)| *c).map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.checked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checked.is_empty()
    }

    /// The filter to persist: carried-over names plus everything unchecked.
    pub fn commit(&self) -> ExclusionFilter {
        let unchecked: ExclusionFilter = self
            .entries()
            .filter(|(_, checked)| !checked)
            .map(|(name, _)| name)
            .collect();
        self.carry_over.union(&unchecked)
    }
}

/// A running import.
#[derive(Debug)]
pub struct ImportTask {
    cancel: CancellationToken,
    progress: watch::Receiver<ImportProgress>,
    handle: JoinHandle<ImportOutcome>,
}

impl ImportTask {
    /// Stop before the next file. Reports already produced are kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn progress(&self) -> ImportProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ImportProgress> {
        self.progress.clone()
    }

    /// Wait for the import to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the background task panicked.
    pub async fn join(self) -> Result<ImportOutcome, tokio::task::JoinError> {
        self.handle.await
    }
}

/// Runs imports with a shared explorer.
pub struct ImportSession {
    explorer: Arc<BinaryExplorer>,
    installed: Vec<PathBuf>,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for ImportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportSession")
            .field("explorer", &self.explorer)
            .field("installed", &self.installed)
            .finish_non_exhaustive()
    }
}

impl ImportSession {
    /// `installed` archives join every loading context after the imported files.
    pub fn new(explorer: Arc<BinaryExplorer>, installed: Vec<PathBuf>) -> Self {
        Self {
            explorer,
            installed,
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Explore `files` in order on a background task.
    pub fn run(&self, files: Vec<PathBuf>, previous: ExclusionFilter) -> ImportTask {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(ImportProgress {
            total: files.len(),
            ..ImportProgress::default()
        });
        let explorer = self.explorer.clone();
        let reporter = self.reporter.clone();
        let search_path: Vec<PathBuf> = files.iter().chain(&self.installed).cloned().collect();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            reporter.section("Importing");
            let ctx = match tokio::task::spawn_blocking(move || LoadingContext::open(&search_path)).await {
                Ok(ctx) => Arc::new(ctx),
                Err(e) => {
                    tracing::warn!("Building the loading context failed: {e}");
                    Arc::new(LoadingContext::open(&[]))
                }
            };

            let total = files.len();
            let mut reports = Vec::with_capacity(total);
            let mut cancelled = false;
            for (index, file) in files.into_iter().enumerate() {
                if token.is_cancelled() {
                    tracing::info!("Import cancelled after {index} of {total} files");
                    cancelled = true;
                    break;
                }
                reporter.exploring(&file, index, total);
                tx.send_modify(|p| p.current = Some(file.clone()));

                let report = explorer.explore(&file, ctx.clone()).await;
                if let Some(cause) = &report.failure {
                    reporter.failed(&file.display().to_string(), cause);
                }
                reporter.explored(&report);
                reports.push(report);
                tx.send_modify(|p| {
                    p.completed = index + 1;
                    p.current = None;
                });
            }

            ctx.close();
            tx.send_modify(|p| p.finished = true);
            let selection = ImportSelection::reconcile(&reports, &previous);
            ImportOutcome {
                reports,
                selection,
                cancelled,
            }
        });

        ImportTask {
            cancel,
            progress: rx,
            handle,
        }
    }
}
