//! Explore command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use kiln_core::{ArtifactStore, BinaryExplorer, ImportSession};
use kiln_schema::ExclusionFilter;

use crate::context::{Context, parse_coordinate};
use crate::ui;

/// Explore `files` in one session. With `artifact`, the discovered
/// components are reconciled with its stored exclusion filter and the
/// committed filter is written back.
pub async fn explore(
    ctx: &Context,
    files: Vec<PathBuf>,
    artifact: Option<&str>,
    exclude: &[String],
) -> Result<()> {
    let store = ctx.store();
    let mut record = match artifact {
        Some(coordinate) => {
            let coordinate = parse_coordinate(coordinate)?;
            match store.load(&coordinate)? {
                Some(record) => Some(record),
                None => bail!("{coordinate} is not installed"),
            }
        }
        None => None,
    };
    let previous = record
        .as_ref()
        .map_or_else(ExclusionFilter::new, |r| r.filter.clone());

    let installed: Vec<PathBuf> = store
        .list()
        .context("Failed to read installed artifacts")?
        .iter()
        .flat_map(kiln_schema::ResolvedArtifact::class_path)
        .collect();

    let explorer = Arc::new(BinaryExplorer::from_settings(&ctx.settings.explorer));
    let session = ImportSession::new(explorer, installed).with_reporter(ctx.reporter.clone());
    let task = session.run(files, previous);

    let outcome = tokio::select! {
        outcome = task.join() => outcome.context("Import task failed")?,
        _ = tokio::signal::ctrl_c() => {
            bail!("Interrupted");
        }
    };

    for report in &outcome.reports {
        ui::print_report(report);
    }

    let mut selection = outcome.selection;
    for name in exclude {
        if !selection.set_checked(name, false) {
            ctx.reporter.warning(&format!("{name} was not discovered"));
        }
    }

    if let Some(record) = record.as_mut() {
        record.filter = selection.commit();
        store.save(record)?;
        ui::print_footer(&format!(
            "{} components selected, {} excluded for {}",
            selection.checked().count(),
            record.filter.len(),
            record.coordinate
        ));
    } else {
        ui::print_footer(&format!(
            "{} files explored, {} components",
            outcome.reports.len(),
            selection.len()
        ));
    }
    Ok(())
}
