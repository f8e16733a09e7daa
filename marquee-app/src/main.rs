use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use marquee_common::observability::init_logging;
use marquee_config::MarqueeConfig;
use marquee_http::HttpClient;
use marquee_listener::Listener;
use marquee_scrape::{Query, Resolver};
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, CliCommand};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging(cli.log_config())?;
    let cfg = cli.load_config().context("invalid configuration")?;
    tracing::info!(log = %log_path.display(), "marquee.start");

    match cli.command.unwrap_or(CliCommand::Listen) {
        CliCommand::Listen => listen(cfg).await,
        CliCommand::Resolve { title } => resolve(cfg, title.join(" ")).await,
    }
}

async fn listen(cfg: MarqueeConfig) -> Result<()> {
    let fetcher = Arc::new(HttpClient::new()?);
    let mut listener = Listener::new(&cfg, fetcher)?;
    // Without the record or the destination there is nothing to serve.
    listener.prepare().context("startup failed")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("marquee.ctrl_c");
            on_signal.cancel();
        }
    });

    listener.run(cancel).await?;
    Ok(())
}

async fn resolve(cfg: MarqueeConfig, title: String) -> Result<()> {
    std::fs::create_dir_all(&cfg.dest_dir).with_context(|| {
        format!(
            "cannot create destination directory {}",
            cfg.dest_dir.display()
        )
    })?;
    let resolver = Resolver::new(Arc::new(HttpClient::new()?), &cfg)?;
    let resolved = resolver
        .fetch_image(&Query::new(title.as_str()))
        .await
        .with_context(|| format!("could not resolve an image for {title:?}"))?;
    println!("{}", resolved.path.display());
    Ok(())
}
