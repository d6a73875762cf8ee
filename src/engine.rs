use crate::config::AppConfig;
use crate::events::MarketEvent;
use crate::exchange::okex_rest::OkexRest;
use crate::strategy::trend::TrendStrategy;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Drives one strategy instance from one feed channel and runs periodic
/// housekeeping (cancel stale orders). Events are processed strictly in
/// arrival order; the strategy never sees two events concurrently.
pub struct Engine {
    cfg: AppConfig,
    rest: OkexRest,
    strategy: TrendStrategy,
    events_rx: mpsc::Receiver<MarketEvent>,
}

impl Engine {
    pub fn new(
        cfg: AppConfig,
        rest: OkexRest,
        strategy: TrendStrategy,
        events_rx: mpsc::Receiver<MarketEvent>,
    ) -> Self {
        Self {
            cfg,
            rest,
            strategy,
            events_rx,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        // Reconcile against the live exchange position before trading.
        if let Err(e) = self.strategy.load_position().await {
            tracing::warn!(error = %e, "initial position load failed; starting flat");
        }

        // Apply the configured leverage, best effort.
        if let Err(e) = self
            .rest
            .set_setting(
                &self.cfg.instrument_id,
                self.cfg.strategy.leverage,
                self.cfg.strategy.leverage_side,
            )
            .await
        {
            tracing::warn!(error = %e, "leverage setting failed");
        }

        let cancel_period = Duration::from_secs(self.cfg.housekeeping.cancel_interval_secs);
        let mut housekeeping = interval_at(Instant::now() + cancel_period, cancel_period);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.strategy.run(&event).await,
                        None => {
                            tracing::warn!("feed channel closed; engine stopping");
                            break;
                        }
                    }
                }
                _ = housekeeping.tick() => {
                    if let Err(e) = self.strategy.cancel_unfill_orders().await {
                        tracing::warn!(error = %e, "cancel sweep failed");
                    }
                }
            }
        }
        Ok(())
    }
}
