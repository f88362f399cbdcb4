//! Command-line interface.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;

use magpie::config::Settings;
use magpie::models::Source;
use magpie::repository::Repositories;
use magpie::storage::FsBlobStore;
use magpie_crawl::Scheduler;
use magpie_server::AppState;

#[derive(Parser)]
#[command(name = "magpie", version, about = "Web-archiving crawler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the store schema.
    Init,
    /// Run the archiver: store, crawl scheduler, and HTTP service.
    Serve {
        /// Bind address: a port, a host, or host:port.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage source records.
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },
}

#[derive(Subcommand)]
enum SourceCommand {
    /// Add or update a source prefix.
    Add {
        /// URL prefix the source covers.
        url: String,
        /// Human-readable label; defaults to the URL.
        #[arg(long)]
        name: Option<String>,
        /// Do not crawl this source's host recursively.
        #[arg(long)]
        no_crawl: bool,
        /// Per-source staleness override, in hours.
        #[arg(long)]
        stale_hours: Option<i64>,
    },
    /// List configured sources.
    List,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Command::Init => cmd_init(&settings).await,
        Command::Serve { bind } => cmd_serve(&settings, bind.as_deref()).await,
        Command::Source { command } => cmd_source(&settings, command).await,
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<Repositories> {
    let repos = Repositories::open(&settings.database_url);
    repos
        .init_schema()
        .await
        .context("store initialization failed")?;
    Ok(repos)
}

async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let _ = open_store(settings).await?;
    println!(
        "{} store ready at {}",
        style("✓").green(),
        settings.database_url
    );
    Ok(())
}

async fn cmd_source(settings: &Settings, command: SourceCommand) -> anyhow::Result<()> {
    let repos = open_store(settings).await?;
    match command {
        SourceCommand::Add {
            url,
            name,
            no_crawl,
            stale_hours,
        } => {
            let mut source = Source::new(url.clone(), name.unwrap_or_else(|| url.clone()), !no_crawl);
            source.stale_hours = stale_hours;
            repos.sources.save(&source).await?;
            println!("{} added source {}", style("✓").green(), source.url);
        }
        SourceCommand::List => {
            let sources = repos.sources.get_all().await?;
            if sources.is_empty() {
                println!("no sources configured");
            }
            for source in sources {
                let crawl = if source.crawl { "crawl" } else { "archive-only" };
                println!("{}  {}  [{}]", source.id, source.url, crawl);
            }
        }
    }
    Ok(())
}

async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let repos = open_store(settings).await?;
    let blob = Arc::new(FsBlobStore::new(settings.blob_dir.clone()));
    let scheduler = Scheduler::new(repos.clone(), blob, settings)
        .context("could not build the crawl scheduler")?;

    let (stop_tx, _stop_rx) = tokio::sync::watch::channel(false);

    if settings.crawl {
        scheduler.start();
    } else {
        println!("{} crawling disabled by configuration", style("→").cyan());
    }

    // Ctrl-C feeds the same stop channel as POST /shutdown
    {
        let stop_tx = stop_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop_tx.send_replace(true);
            }
        });
    }

    let (host, port) = parse_bind_address(bind, settings.port)?;
    println!(
        "{} serving at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );

    let state = AppState::new(repos, scheduler.clone(), stop_tx, settings);
    magpie_server::serve(state, &host, port).await?;

    // The listener is down; wind the scheduler down too
    scheduler.cancel().await;
    Ok(())
}

/// Parse a bind address that can be a bare port, a bare host, or
/// host:port.
fn parse_bind_address(bind: Option<&str>, default_port: u16) -> anyhow::Result<(String, u16)> {
    let Some(bind) = bind else {
        return Ok(("0.0.0.0".to_string(), default_port));
    };

    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("127.0.0.1".to_string(), port));
    }
    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }
    Ok((bind.to_string(), default_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_forms() {
        assert_eq!(
            parse_bind_address(None, 3030).unwrap(),
            ("0.0.0.0".to_string(), 3030)
        );
        assert_eq!(
            parse_bind_address(Some("8080"), 3030).unwrap(),
            ("127.0.0.1".to_string(), 8080)
        );
        assert_eq!(
            parse_bind_address(Some("0.0.0.0:9000"), 3030).unwrap(),
            ("0.0.0.0".to_string(), 9000)
        );
        assert_eq!(
            parse_bind_address(Some("localhost"), 3030).unwrap(),
            ("localhost".to_string(), 3030)
        );
    }
}
