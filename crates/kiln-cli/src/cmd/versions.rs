//! Versions command

use anyhow::Result;

use crate::context::{Context, parse_coordinate};
use crate::ui;

pub async fn versions(ctx: &Context, coordinate: &str, repo: Option<&str>) -> Result<()> {
    let coordinate = parse_coordinate(coordinate)?;
    let resolver = ctx.versions();
    let result = match ctx.repository(repo) {
        Some(repository) => resolver.find_versions_in(&coordinate, &repository).await,
        None => resolver.find_versions(&coordinate).await,
    };

    if result.is_empty() {
        println!();
        println!("  No versions of {} found", coordinate.key());
        println!();
        return Ok(());
    }

    println!();
    ui::print_header(&["coordinate", "version", "repository"]);
    for found in result.entries() {
        ui::print_row(&coordinate.key(), found.version.as_str(), &found.repository);
    }
    let latest = result
        .latest_release()
        .map_or_else(|| "none".to_string(), |d| d.version.to_string());
    ui::print_footer(&format!("{} versions, latest release {latest}", result.len()));
    Ok(())
}
