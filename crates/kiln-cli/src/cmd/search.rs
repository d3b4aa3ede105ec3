//! Search command

use std::time::Duration;

use anyhow::Result;
use crossterm::style::Stylize;
use kiln_core::SearchAggregator;
use kiln_core::search::{SearchPhase, backends_from_settings};

use crate::context::Context;
use crate::ui;

/// Search every configured backend and print the merged candidates.
pub async fn search(ctx: &Context, query: &str, timeout: u64) -> Result<()> {
    let start = std::time::Instant::now();
    let settings = &ctx.settings;
    let backends = backends_from_settings(settings, ctx.client.http());
    tracing::debug!(backends = backends.len(), workers = settings.search.workers, "starting search");
    let aggregator = SearchAggregator::new(backends, settings.search.workers);

    let session = aggregator.search(query);
    let snapshot = match tokio::time::timeout(Duration::from_secs(timeout), session.wait()).await {
        Ok(snapshot) => snapshot,
        Err(_) => {
            aggregator.cancel();
            ctx.reporter
                .warning(&format!("Search timed out after {timeout}s, showing partial results"));
            session.snapshot()
        }
    };

    if snapshot.results.is_empty() {
        println!();
        println!("  No packages found matching '{}'", query.white());
        println!();
        return Ok(());
    }

    println!();
    ui::print_header(&["coordinate", "version", "source"]);
    for result in &snapshot.results {
        ui::print_row(
            &result.key(),
            &result.coordinate.version().to_string(),
            &result.source,
        );
    }

    let status = match snapshot.phase {
        SearchPhase::Cancelled => "SEARCH CANCELLED",
        _ => "SEARCH COMPLETE",
    };
    ui::print_footer(&format!(
        "{status} {}, elapsed {:.2}s",
        snapshot.results.len(),
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}
