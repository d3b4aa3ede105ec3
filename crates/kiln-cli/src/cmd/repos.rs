//! Repository management commands

use anyhow::{Result, bail};
use kiln_core::RepositoryRegistry;
use kiln_schema::{Repository, RepositoryKind};

use crate::context::Context;
use crate::ui;

pub fn list(ctx: &Context, releases: bool) {
    println!();
    ui::print_header(&["id", "kind", "url"]);
    for repository in ctx.registry.list(releases) {
        ui::print_row(
            &repository.id,
            &repository.kind.to_string(),
            &repository.url,
        );
    }
}

/// Add a user repository and persist it to the configuration file.
pub fn add(
    ctx: &Context,
    id: &str,
    url: &str,
    kind: RepositoryKind,
    credentials: Option<(String, String)>,
) -> Result<()> {
    let mut repository = Repository::new(id, kind, url);
    if let Some((user, password)) = credentials {
        repository = repository.with_credentials(user, password);
    }

    let mut registry = RepositoryRegistry::with_records(
        &ctx.settings.cache_dir,
        ctx.settings.repositories.clone(),
    );
    registry.add(repository)?;
    save(ctx, &registry)?;
    println!("Added repository {id}");
    Ok(())
}

pub fn remove(ctx: &Context, id: &str) -> Result<()> {
    let mut registry = RepositoryRegistry::with_records(
        &ctx.settings.cache_dir,
        ctx.settings.repositories.clone(),
    );
    if registry.remove(id).is_none() {
        bail!("No user repository '{id}' (presets cannot be removed)");
    }
    save(ctx, &registry)?;
    println!("Removed repository {id}");
    Ok(())
}

fn save(ctx: &Context, registry: &RepositoryRegistry) -> Result<()> {
    let mut settings = ctx.settings.clone();
    settings.repositories = registry.user_records();
    settings.save(&ctx.config_path)?;
    Ok(())
}
