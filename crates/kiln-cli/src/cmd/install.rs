//! Install command

use anyhow::{Context as _, Result};
use kiln_core::ArtifactStore;

use crate::context::{Context, parse_coordinate};
use crate::ui;

/// Install a coordinate with its classified variants and dependencies,
/// then record it in the artifact store.
pub async fn install(
    ctx: &Context,
    coordinate: &str,
    repo: Option<&str>,
    classifiers: &[String],
) -> Result<()> {
    let start = std::time::Instant::now();
    let coordinate = parse_coordinate(coordinate)?;
    let repository = ctx.repository(repo);
    let classifiers: Vec<&str> = classifiers.iter().map(String::as_str).collect();

    let mut artifact = ctx
        .installer()
        .install_resolved(repository.as_ref(), &coordinate, &classifiers, &ctx.dependencies())
        .await
        .with_context(|| format!("Failed to install {coordinate}"))?;

    let store = ctx.store();
    // Keep the user's filter across reinstalls.
    if let Some(previous) = store.load(&artifact.coordinate)? {
        artifact.filter = previous.filter;
    }
    store.save(&artifact)?;

    println!();
    ui::print_header(&["file", "variant"]);
    ui::print_row(&artifact.path.display().to_string(), "main", "");
    for (classifier, path) in &artifact.classified {
        ui::print_row(&path.display().to_string(), classifier, "");
    }
    for path in &artifact.dependencies {
        ui::print_row(&path.display().to_string(), "dependency", "");
    }
    ui::print_footer(&format!(
        "INSTALLED {}, {} dependencies, elapsed {:.2}s",
        artifact.coordinate,
        artifact.dependencies.len(),
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}
