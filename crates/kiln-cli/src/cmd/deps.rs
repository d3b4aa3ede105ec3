//! Dependency closure command

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::context::{Context, parse_coordinate};
use crate::ui;

pub async fn deps(ctx: &Context, coordinate: &str, repo: Option<&str>, tree: bool) -> Result<()> {
    let coordinate = parse_coordinate(coordinate)?;
    let repository = ctx.repository(repo);
    let resolver = ctx.dependencies();

    if !tree {
        let paths = resolver.dependencies(&coordinate, repository.as_ref()).await;
        for path in &paths {
            println!("{}", path.display());
        }
        ui::print_footer(&format!("{} dependencies", paths.len()));
        return Ok(());
    }

    let graph = resolver
        .resolve_graph(&coordinate, repository.as_ref(), &CancellationToken::new())
        .await
        .or_log(&format!("Dependencies of {coordinate}"))
        .unwrap_or_default();
    if graph.is_empty() {
        println!();
        println!("  {coordinate} could not be resolved");
        println!();
        return Ok(());
    }
    for node in &graph {
        let status = if node.path.is_some() { "" } else { " (missing)" };
        println!("{}{}{status}", "  ".repeat(node.depth), node.coordinate);
    }
    ui::print_footer(&format!("{} nodes", graph.len()));
    Ok(())
}
