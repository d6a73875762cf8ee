use crate::amount::Amount;
use crate::config::StrategyCfg;
use crate::events::MarketEvent;
use crate::exchange::okex_rest::{OkexRest, Placement, RestError};
use crate::strategy::PositionSide;
use crate::types::{Candle, OrderStatus, OrderType, PositionDirection, Ticker};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Per-instrument trend-following signal engine.
///
/// Consumes decoded market events, keeps the latest ticker/candle snapshots
/// (memoryless beyond one candle), and opens or closes leveraged positions
/// through the REST client. Exactly one feed worker drives one engine
/// instance, so no internal locking is needed.
pub struct TrendStrategy {
    instrument_id: String,
    rest: OkexRest,

    leverage: Amount,
    do_long: bool,
    do_short: bool,
    entry_percent: Amount,
    entry_volume: Amount,
    entry_size: Amount,
    exit_gap_hard: Amount,
    exit_gap_soft: Amount,
    exit_soft_secs: i64,
    exit_force_secs: i64,

    pub long: PositionSide,
    pub short: PositionSide,
    pub spot_ticker: Option<Ticker>,
    pub swap_ticker: Option<Ticker>,
    pub last_candle: Option<Candle>,
}

impl TrendStrategy {
    pub fn new(cfg: &StrategyCfg, instrument_id: String, rest: OkexRest) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            instrument_id,
            rest,
            leverage: Amount::from(cfg.leverage),
            do_long: cfg.do_long,
            do_short: cfg.do_short,
            entry_percent: cfg.entry_percent.parse().context("entry_percent")?,
            entry_volume: cfg.entry_volume.parse().context("entry_volume")?,
            entry_size: cfg.entry_size.parse().context("entry_size")?,
            exit_gap_hard: cfg.exit_gap_hard.parse().context("exit_gap_hard")?,
            exit_gap_soft: cfg.exit_gap_soft.parse().context("exit_gap_soft")?,
            exit_soft_secs: cfg.exit_soft_secs,
            exit_force_secs: cfg.exit_force_secs,
            long: PositionSide::closed(now),
            short: PositionSide::closed(now),
            spot_ticker: None,
            swap_ticker: None,
            last_candle: None,
        })
    }

    /// Ingests one decoded event, then evaluates entry and exit conditions.
    pub async fn run(&mut self, event: &MarketEvent) {
        self.ingest(event);
        let now = Utc::now();
        self.try_enter(now).await;
        self.try_exit(now).await;
    }

    /// Snapshot updates are idempotent replacements, not deltas.
    fn ingest(&mut self, event: &MarketEvent) {
        match event {
            MarketEvent::SpotTicker { ticker, .. } => {
                self.spot_ticker = Some(ticker.clone());
            }
            MarketEvent::SwapTicker { ticker, .. } => {
                self.swap_ticker = Some(ticker.clone());
            }
            MarketEvent::SpotCandle { candle, .. } | MarketEvent::SwapCandle { candle, .. } => {
                tracing::debug!(
                    percent = %candle.percent,
                    volume = %candle.volume,
                    "candle snapshot updated"
                );
                self.last_candle = Some(candle.clone());
            }
        }
    }

    /// Entry signal: `(order type, entry price, entry size)` if the latest
    /// candle clears the percent-change and volume thresholds for a side not
    /// already held.
    pub fn match_enter_position(&self) -> Option<(OrderType, Amount, Amount)> {
        let candle = self.last_candle.as_ref()?;
        let swap = self.swap_ticker.as_ref()?;

        if self.do_long
            && !self.long.is_open
            && candle.percent >= self.entry_percent
            && candle.volume >= self.entry_volume
        {
            tracing::info!(
                percent = %candle.percent,
                volume = %candle.volume,
                enter_price = %swap.best_ask,
                enter_size = %self.entry_size,
                "match enter long"
            );
            return Some((OrderType::OpenLong, swap.best_ask, self.entry_size));
        }

        if self.do_short
            && !self.short.is_open
            && candle.percent <= -self.entry_percent
            && candle.volume >= self.entry_volume
        {
            tracing::info!(
                percent = %candle.percent,
                volume = %candle.volume,
                enter_price = %swap.best_bid,
                enter_size = %self.entry_size,
                "match enter short"
            );
            return Some((OrderType::OpenShort, swap.best_bid, self.entry_size));
        }

        None
    }

    /// Exit signal for an open side. The gap is the leveraged percentage move
    /// since entry; exit fires on the hard gap, on the soft gap after the soft
    /// holding time, or unconditionally after the forced holding time.
    pub fn match_exit_position(&self, now: DateTime<Utc>) -> Option<(OrderType, Amount, Amount)> {
        let swap = self.swap_ticker.as_ref()?;

        if self.long.is_open {
            let exit_price = swap.best_bid;
            if let Some(gap) = self.leveraged_gap(exit_price, self.long.entry_price, false) {
                let elapsed = (now - self.long.entry_time).num_seconds();
                tracing::debug!(%gap, elapsed, best_bid = %exit_price, "check exit long");
                if self.exit_fires(gap, elapsed) {
                    tracing::info!(%gap, elapsed, %exit_price, "match exit long");
                    return Some((OrderType::CloseLong, exit_price, self.long.entry_size));
                }
            }
        }

        if self.short.is_open {
            let exit_price = swap.best_ask;
            if let Some(gap) = self.leveraged_gap(exit_price, self.short.entry_price, true) {
                let elapsed = (now - self.short.entry_time).num_seconds();
                tracing::debug!(%gap, elapsed, best_ask = %exit_price, "check exit short");
                if self.exit_fires(gap, elapsed) {
                    tracing::info!(%gap, elapsed, %exit_price, "match exit short");
                    return Some((OrderType::CloseShort, exit_price, self.short.entry_size));
                }
            }
        }

        None
    }

    fn leveraged_gap(&self, exit_price: Amount, entry_price: Amount, short: bool) -> Option<Amount> {
        let moved = (exit_price - entry_price) * self.leverage;
        let gap = moved.checked_div(entry_price).ok()?;
        Some(if short { -gap } else { gap })
    }

    fn exit_fires(&self, gap: Amount, elapsed_secs: i64) -> bool {
        gap >= self.exit_gap_hard
            || (gap >= self.exit_gap_soft && elapsed_secs >= self.exit_soft_secs)
            || elapsed_secs >= self.exit_force_secs
    }

    async fn try_enter(&mut self, now: DateTime<Utc>) {
        let Some((order_type, price, size)) = self.match_enter_position() else {
            return;
        };
        if price <= Amount::ZERO || size <= Amount::ZERO {
            return;
        }

        match self
            .rest
            .place_order(&self.instrument_id, order_type, price, size)
            .await
        {
            Placement::Placed { order_id } => {
                tracing::info!(%order_id, order_type = order_type.describe(), "entry order placed");
                match order_type {
                    OrderType::OpenLong => self.long = PositionSide::opened(price, size, now),
                    OrderType::OpenShort => self.short = PositionSide::opened(price, size, now),
                    _ => {}
                }
            }
            Placement::Failed => {
                tracing::warn!(
                    order_type = order_type.describe(),
                    "entry placement failed; position unchanged"
                );
            }
        }
    }

    async fn try_exit(&mut self, now: DateTime<Utc>) {
        let Some((order_type, price, size)) = self.match_exit_position(now) else {
            return;
        };
        if price <= Amount::ZERO || size <= Amount::ZERO {
            return;
        }

        // Optimistic-state policy: the side is cleared on trigger, not on fill
        // confirmation. The exchange stays the source of truth and a later
        // load_position reconciles any divergence.
        match order_type {
            OrderType::CloseLong => self.long.clear(now),
            OrderType::CloseShort => self.short.clear(now),
            _ => {}
        }

        if let Placement::Failed = self
            .rest
            .place_order(&self.instrument_id, order_type, price, size)
            .await
        {
            tracing::warn!(
                order_type = order_type.describe(),
                "exit placement failed; awaiting reconciliation"
            );
        }
    }

    /// Replaces in-memory position state wholesale from the live exchange
    /// snapshot. A side absent from the snapshot is treated as closed.
    pub async fn load_position(&mut self) -> Result<(), RestError> {
        let snapshot = self.rest.position(&self.instrument_id).await?;

        let now = Utc::now();
        let mut long = PositionSide::closed(now);
        let mut short = PositionSide::closed(now);
        for holding in &snapshot.holding {
            let side = PositionSide::opened(holding.avg_cost, holding.position, holding.timestamp);
            match holding.side {
                PositionDirection::Long => long = side,
                PositionDirection::Short => short = side,
            }
        }

        tracing::debug!(
            margin_mode = %snapshot.margin_mode,
            long_open = long.is_open,
            short_open = short.is_open,
            "position loaded"
        );
        self.long = long;
        self.short = short;
        Ok(())
    }

    /// Cancels every pending order for the instrument, best effort:
    /// per-order failures are logged and do not abort the batch.
    pub async fn cancel_unfill_orders(&self) -> Result<(), RestError> {
        let orders = self
            .rest
            .get_orders(&self.instrument_id, OrderStatus::Pending)
            .await?;
        for order in orders {
            match self.rest.cancel_order(&self.instrument_id, &order.order_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(order_id = %order.order_id, "cancel rejected by exchange");
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.order_id, error = %e, "cancel failed");
                }
            }
        }
        Ok(())
    }
}
