// src/main.rs
use crate::config::AppConfig;
use crate::connectors::http::HttpQuoteClient;
use crate::connectors::socketio::SocketIoClient;
use crate::connectors::traits::{QuoteSource, StreamClient};
use crate::core::engine::{InstrumentEngine, InstrumentHandle};
use crate::core::fetcher::SnapshotFetcher;
use crate::types::Trigger;
use anyhow::Context;
use dotenvy::dotenv;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;

mod config;
mod connectors;
mod core;
mod error;
mod tui;
mod types;
mod utils;

fn init_tracing(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
    let level = Level::from_str(&config.log.level)
        .with_context(|| format!("invalid log level {}", config.log.level))?;
    let appender =
        tracing_appender::rolling::daily(&config.log.directory, &config.log.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_max_level(level)
        .with_ansi(false)
        .init();
    Ok(guard)
}

/// Emits one `Poll` per tick until the engine goes away.
fn spawn_poller(id: String, every: Duration, sender: mpsc::Sender<Trigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick fires immediately; activation fetch covers it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if sender.send(Trigger::Poll).await.is_err() {
                info!("Poller for {} stopped", id);
                break;
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // 1. Load Configuration
    let config = AppConfig::new().context("failed to load configuration")?;
    let _log_guard = init_tracing(&config)?;

    info!(
        "quote_watch starting: api={} push={} instruments={}",
        config.api_base_url,
        config.push_url,
        config.instruments.len()
    );

    // 2. Shared transport handles
    let quotes: Arc<dyn QuoteSource> = Arc::new(HttpQuoteClient::new(
        &config.api_base_url,
        config.request_timeout(),
    )?);
    let mut push = SocketIoClient::new(&config.push_url, config.reconnect_delay())?;

    // 3. One engine per instrument
    let mut handles = Vec::new();
    let mut tasks = Vec::new();
    for instrument in &config.instruments {
        let (trigger_tx, trigger_rx) = mpsc::channel(100);
        push.subscribe_topic(&instrument.topic, trigger_tx.clone())
            .await?;

        let fetcher = SnapshotFetcher::new(
            Arc::clone(&quotes),
            instrument.endpoint.clone(),
            instrument.rounding(),
            config.intervals(),
        );
        let engine = InstrumentEngine::new(
            instrument.id.clone(),
            instrument.name.clone(),
            fetcher,
            config.initial_interval(),
            trigger_rx,
            config.fetch_on_start,
        );

        handles.push(InstrumentHandle::new(
            instrument.id.clone(),
            config.intervals(),
            trigger_tx.clone(),
            engine.interval_selector(),
            engine.subscribe_view(),
        ));

        if let Some(every) = config.poll_every() {
            spawn_poller(instrument.id.clone(), every, trigger_tx);
        }

        let id = instrument.id.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                error!("Engine {} stopped with error: {}", id, e);
            }
        }));
    }

    // 4. Presentation
    if config.headless {
        info!("Headless mode, waiting for Ctrl+C");
        tokio::signal::ctrl_c().await?;
    } else if let Err(e) = tui::run(handles).await {
        eprintln!("TUI error: {}", e);
    }

    info!("Shutting down");
    for task in &tasks {
        task.abort();
    }
    for result in futures::future::join_all(tasks).await {
        if let Err(e) = result {
            if !e.is_cancelled() {
                warn!("Engine task ended abnormally: {}", e);
            }
        }
    }
    Ok(())
}
