use crate::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Order side/type codes as the exchange defines them (1..=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

impl OrderType {
    pub fn code(self) -> u8 {
        match self {
            OrderType::OpenLong => 1,
            OrderType::OpenShort => 2,
            OrderType::CloseLong => 3,
            OrderType::CloseShort => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(OrderType::OpenLong),
            2 => Some(OrderType::OpenShort),
            3 => Some(OrderType::CloseLong),
            4 => Some(OrderType::CloseShort),
            _ => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            OrderType::OpenLong => "open long",
            OrderType::OpenShort => "open short",
            OrderType::CloseLong => "close long",
            OrderType::CloseShort => "close short",
        }
    }
}

/// Order lifecycle states (-2..=2 on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Failed,
    Cancelled,
    Pending,
    PartiallyFilled,
    Filled,
}

impl OrderStatus {
    pub fn code(self) -> i8 {
        match self {
            OrderStatus::Failed => -2,
            OrderStatus::Cancelled => -1,
            OrderStatus::Pending => 0,
            OrderStatus::PartiallyFilled => 1,
            OrderStatus::Filled => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -2 => Some(OrderStatus::Failed),
            -1 => Some(OrderStatus::Cancelled),
            0 => Some(OrderStatus::Pending),
            1 => Some(OrderStatus::PartiallyFilled),
            2 => Some(OrderStatus::Filled),
            _ => None,
        }
    }
}

/// One exchange order, built from REST responses only. A fresh fetch replaces
/// stale state; orders are never mutated locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub timestamp: String,
    pub instrument_id: String,
    pub order_type: OrderType,
    pub price: Amount,
    pub size: Amount,
    pub filled_qty: Amount,
    pub fee: Amount,
    pub status: OrderStatus,
    pub contract_val: Amount,
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.order_id == other.order_id && self.instrument_id == other.instrument_id
    }
}

impl Eq for Order {}

impl Hash for Order {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order_id.hash(state);
        self.instrument_id.hash(state);
    }
}

/// Top-of-book snapshot, overwritten on every ticker event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub best_bid: Amount,
    pub best_ask: Amount,
    pub last: Amount,
}

/// OHLCV bar with its percent change precomputed at the decode boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: String,
    pub open: Amount,
    pub high: Amount,
    pub low: Amount,
    pub close: Amount,
    pub volume: Amount,
    pub percent: Amount,
}

impl Candle {
    /// Builds a candle from the wire form
    /// `[ts, open, high, low, close, volume, currency_volume]`.
    pub fn from_values(values: &[serde_json::Value]) -> anyhow::Result<Self> {
        if values.len() < 6 {
            anyhow::bail!("candle row has {} fields, expected at least 6", values.len());
        }
        let timestamp = values[0]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("candle timestamp is not a string"))?
            .to_string();
        let open = json_amount(&values[1]).ok_or_else(|| anyhow::anyhow!("bad candle open"))?;
        let high = json_amount(&values[2]).ok_or_else(|| anyhow::anyhow!("bad candle high"))?;
        let low = json_amount(&values[3]).ok_or_else(|| anyhow::anyhow!("bad candle low"))?;
        let close = json_amount(&values[4]).ok_or_else(|| anyhow::anyhow!("bad candle close"))?;
        let volume = json_amount(&values[5]).ok_or_else(|| anyhow::anyhow!("bad candle volume"))?;
        let percent = (close - open).checked_div(open)?;
        Ok(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            percent,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionDirection {
    Long,
    Short,
}

#[derive(Debug, Clone)]
pub struct PositionHolding {
    pub side: PositionDirection,
    pub avg_cost: Amount,
    pub position: Amount,
    pub realized_pnl: Amount,
    pub timestamp: DateTime<Utc>,
}

/// Live per-instrument position snapshot: margin mode plus per-side holdings.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub margin_mode: String,
    pub holding: Vec<PositionHolding>,
}

#[derive(Debug, Clone)]
pub struct AccountBalance {
    pub equity: Amount,
    pub total_avail_balance: Amount,
    pub margin: Amount,
    pub realized_pnl: Amount,
}

#[derive(Debug, Clone)]
pub struct LeverageSetting {
    pub long_leverage: Amount,
    pub short_leverage: Amount,
    pub margin_mode: String,
}

#[derive(Debug, Clone)]
pub struct DepthLevel {
    pub price: Amount,
    pub size: Amount,
}

#[derive(Debug, Clone)]
pub struct OrderBookSnapshot {
    pub asks: Vec<DepthLevel>,
    pub bids: Vec<DepthLevel>,
    pub timestamp: String,
}

/// Numeric wire fields arrive as strings most of the time, occasionally as
/// raw numbers. Accept both.
pub fn json_amount(value: &serde_json::Value) -> Option<Amount> {
    if let Some(s) = value.as_str() {
        return Amount::from_str(s).ok();
    }
    if let Some(f) = value.as_f64() {
        return Amount::from_f64(f).ok();
    }
    None
}
