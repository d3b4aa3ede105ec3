//! kiln CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kiln_cli::context::Context;
use kiln_cli::{Cli, Commands, RepoCommands, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(cli.config, cli.quiet)?;

    match cli.command {
        Commands::Search { query, timeout } => cmd::search::search(&ctx, &query, timeout).await,
        Commands::Versions { coordinate, repo } => {
            cmd::versions::versions(&ctx, &coordinate, repo.as_deref()).await
        }
        Commands::Install {
            coordinate,
            repo,
            classifiers,
        } => cmd::install::install(&ctx, &coordinate, repo.as_deref(), &classifiers).await,
        Commands::Deps {
            coordinate,
            repo,
            tree,
        } => cmd::deps::deps(&ctx, &coordinate, repo.as_deref(), tree).await,
        Commands::Explore {
            files,
            artifact,
            exclude,
        } => cmd::explore::explore(&ctx, files, artifact.as_deref(), &exclude).await,
        Commands::Repos { command } => match command {
            RepoCommands::List { releases } => {
                cmd::repos::list(&ctx, releases);
                Ok(())
            }
            RepoCommands::Add {
                id,
                url,
                kind,
                user,
                password,
            } => cmd::repos::add(
                &ctx,
                &id,
                &url,
                kind.into(),
                user.map(|u| (u, password.unwrap_or_default())),
            ),
            RepoCommands::Remove { id } => cmd::repos::remove(&ctx, &id),
        },
    }
}
