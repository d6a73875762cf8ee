use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OkexCfg {
    pub api_server: String,
    pub ws_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedCfg {
    /// Channels subscribed per instrument, e.g. "swap/ticker", "swap/candle60s".
    pub channels: Vec<String>,
    pub reconnect_delay_secs: u64,
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub queue_depth: usize,
    /// Optional append-only TSV file of decoded events for offline analysis.
    pub record_path: Option<String>,
}

/// Strategy thresholds. Decimal values are strings so they parse losslessly
/// into `Amount` at startup; the numbers differ per deployment and are never
/// hard-coded.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyCfg {
    pub leverage: u32,
    /// Leverage side code: 1 fixed-margin long, 2 fixed-margin short, 3 crossed.
    pub leverage_side: u8,
    pub do_long: bool,
    pub do_short: bool,
    /// Minimum candle percent change to enter, e.g. "0.003".
    pub entry_percent: String,
    /// Minimum candle volume (contracts) to enter, e.g. "2000".
    pub entry_volume: String,
    /// Fixed entry size in contracts, e.g. "100".
    pub entry_size: String,
    /// Leveraged gap that exits immediately, e.g. "1.0".
    pub exit_gap_hard: String,
    /// Leveraged gap that exits after `exit_soft_secs`, e.g. "0.05".
    pub exit_gap_soft: String,
    pub exit_soft_secs: i64,
    /// Forced time-based exit regardless of gap.
    pub exit_force_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HousekeepingCfg {
    /// How often pending unfilled orders are swept and cancelled.
    pub cancel_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityCfg {
    pub log_json: bool,
    /// Filter directives used when `RUST_LOG` is unset,
    /// e.g. "info,okex_swap_bot=debug".
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub instrument_id: String,
    pub okex: OkexCfg,
    pub feed: FeedCfg,
    pub strategy: StrategyCfg,
    pub housekeeping: HousekeepingCfg,
    pub observability: ObservabilityCfg,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name("config.example").required(false))
            .add_source(config::Environment::default().separator("__"));

        if let Ok(path) = std::env::var("BOT_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        builder
            .build()
            .context("failed to build config")?
            .try_deserialize()
            .context("failed to deserialize config")
    }

    /// One subscription message per configured channel, sent verbatim on every
    /// (re)connect in this order.
    pub fn subscription_messages(&self) -> Vec<String> {
        self.feed
            .channels
            .iter()
            .map(|channel| {
                serde_json::json!({
                    "op": "subscribe",
                    "args": [format!("{}:{}", channel, self.instrument_id)],
                })
                .to_string()
            })
            .collect()
    }
}
