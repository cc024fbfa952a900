mod client;
mod console;
mod page;
mod poller;

use std::path::PathBuf;

use activity_proto::config::Config;
use activity_proto::fragment::ActivitySelectors;
use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use crate::client::HttpActivitySource;
use crate::console::ConsolePage;
use crate::page::Page;
use crate::poller::{ActivityPoller, PollTiming};

/// Watch a user's "now playing" activity and print it when it changes.
#[derive(Parser, Debug)]
#[command(name = "nowplaying-watch", version)]
struct Args {
    /// Config file (defaults to ~/.config/nowplaying/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Site origin serving /api/me, e.g. https://example.org
    #[arg(long)]
    base_url: Option<String>,

    /// Watch this user instead of the authenticated one
    #[arg(long)]
    username: Option<String>,

    /// Poll once, print the result and exit
    #[arg(long)]
    once: bool,

    /// With --once, print the activity as JSON
    #[arg(long, requires = "once")]
    json: bool,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    status: Option<&'a str>,
    title: Option<&'a str>,
    artists: Option<&'a str>,
    has_lyrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = activity_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("watch.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        "info,nowplaying_watch=debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string()
    });
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    if !args.once {
        eprintln!("nowplaying-watch log: {}", log_path.display());
    }
    tracing::info!("nowplaying-watch starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("Config load failed, using defaults: {:#}", e);
            Config::default()
        }),
    };
    if let Some(base_url) = args.base_url {
        config.endpoint.base_url = base_url;
    }
    if let Some(username) = args.username {
        config.endpoint.username = Some(username);
    }

    let selectors =
        ActivitySelectors::from_config(&config.selectors).context("Invalid [selectors] config")?;
    let source = HttpActivitySource::new(&config.endpoint)?;
    tracing::info!(
        "Watching {} (user: {})",
        source.url(),
        config.endpoint.username.as_deref().unwrap_or("<self>")
    );

    let mut poller = ActivityPoller::new(
        source,
        ConsolePage::new(),
        selectors,
        PollTiming::from(&config.polling),
    );

    // ── One-shot ─────────────────────────────────────────────────────────────
    if args.once {
        let update = poller.poll().await?;
        tracing::info!("One-shot poll: {:?}", update);
        if args.json {
            if let Some(c) = poller.page().container() {
                let frag = c.fragment();
                let snapshot = Snapshot {
                    status: frag.fields.status.as_deref(),
                    title: frag.fields.title.as_deref(),
                    artists: frag.fields.artists.as_deref(),
                    has_lyrics: frag.has_lyrics,
                };
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
        } else if poller.page().document().journal().is_empty() {
            // Nothing was rendered: the fragment had no activity anchor
            println!("nothing playing");
        }
        return Ok(());
    }

    // ── Loop until Ctrl-C ────────────────────────────────────────────────────
    let handle = poller.spawn();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut usr1 = signal(SignalKind::user_defined1())?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = usr1.recv() => {
                    tracing::info!("SIGUSR1: refreshing now");
                    handle.refresh_now();
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("Shutting down");
    let poller = handle.stop().await?;
    let report = poller.report();
    tracing::info!(
        "Stopped after {} consecutive failure(s), last error: {:?}",
        report.consecutive_failures,
        report.last_error
    );

    Ok(())
}
