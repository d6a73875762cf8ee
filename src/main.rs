use anyhow::Result;
use okex_swap_bot::config::AppConfig;
use okex_swap_bot::engine::Engine;
use okex_swap_bot::exchange::okex_rest::OkexRest;
use okex_swap_bot::exchange::okex_ws_feed::WsFeed;
use okex_swap_bot::exchange::signer::Credentials;
use okex_swap_bot::observability::init_tracing;
use okex_swap_bot::recorder::FeedRecorder;
use okex_swap_bot::strategy::trend::TrendStrategy;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::load()?;
    init_tracing(&cfg.observability)?;

    let credentials = Credentials::from_env()?;
    let rest = OkexRest::new(
        cfg.okex.api_server.clone(),
        credentials,
        Duration::from_secs(cfg.okex.timeout_secs),
    )?;

    let (events_tx, events_rx) = mpsc::channel(cfg.feed.queue_depth);
    let recorder = cfg
        .feed
        .record_path
        .as_deref()
        .map(FeedRecorder::open)
        .transpose()?;

    let feed = WsFeed::new(
        cfg.okex.ws_url.clone(),
        cfg.subscription_messages(),
        &cfg.feed,
        events_tx,
        recorder,
    );
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed.run().await {
            tracing::error!(error = ?e, "feed terminated with error");
        }
    });

    let strategy = TrendStrategy::new(&cfg.strategy, cfg.instrument_id.clone(), rest.clone())?;
    let mut engine = Engine::new(cfg, rest, strategy, events_rx);
    let mut engine_task = tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            tracing::error!(error = ?e, "engine terminated with error");
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::warn!("ctrl_c received; shutting down");
        }
        _ = &mut engine_task => {
            tracing::warn!("engine task ended; shutting down");
        }
    }

    feed_task.abort();
    Ok(())
}
