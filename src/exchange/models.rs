use crate::exchange::okex_rest::RestError;
use crate::types::{
    json_amount, AccountBalance, DepthLevel, LeverageSetting, OrderBookSnapshot, PositionDirection,
    PositionHolding, PositionSnapshot, Ticker,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;

fn parse_amount(field: &str, raw: &str) -> Result<crate::amount::Amount, RestError> {
    crate::amount::Amount::from_str(raw)
        .map_err(|_| RestError::Parse(format!("field '{field}' is not numeric: '{raw}'")))
}

#[derive(Debug, Deserialize)]
pub struct ServerTimeResp {
    pub iso: String,
}

#[derive(Debug, Deserialize)]
pub struct TickerResp {
    pub best_bid: String,
    pub best_ask: String,
    pub last: String,
}

impl TickerResp {
    pub fn into_ticker(self) -> Result<Ticker, RestError> {
        Ok(Ticker {
            best_bid: parse_amount("best_bid", &self.best_bid)?,
            best_ask: parse_amount("best_ask", &self.best_ask)?,
            last: parse_amount("last", &self.last)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DepthResp {
    pub asks: Vec<Vec<serde_json::Value>>,
    pub bids: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub timestamp: String,
}

impl DepthResp {
    pub fn into_snapshot(self) -> Result<OrderBookSnapshot, RestError> {
        let parse_side = |rows: Vec<Vec<serde_json::Value>>| -> Result<Vec<DepthLevel>, RestError> {
            rows.into_iter()
                .map(|row| {
                    if row.len() < 2 {
                        return Err(RestError::Parse("depth level too short".into()));
                    }
                    let price = json_amount(&row[0])
                        .ok_or_else(|| RestError::Parse("bad depth price".into()))?;
                    let size = json_amount(&row[1])
                        .ok_or_else(|| RestError::Parse("bad depth size".into()))?;
                    Ok(DepthLevel { price, size })
                })
                .collect()
        };
        Ok(OrderBookSnapshot {
            asks: parse_side(self.asks)?,
            bids: parse_side(self.bids)?,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HoldingResp {
    pub side: String,
    pub avg_cost: String,
    pub position: String,
    pub realized_pnl: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct PositionResp {
    pub margin_mode: String,
    #[serde(default)]
    pub holding: Vec<HoldingResp>,
}

impl PositionResp {
    pub fn into_snapshot(self) -> Result<PositionSnapshot, RestError> {
        let mut holding = Vec::with_capacity(self.holding.len());
        for h in self.holding {
            let side = match h.side.as_str() {
                "long" => PositionDirection::Long,
                "short" => PositionDirection::Short,
                other => {
                    tracing::warn!(side = %other, "unknown holding side, skipping");
                    continue;
                }
            };
            let timestamp = DateTime::parse_from_rfc3339(&h.timestamp)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| RestError::Parse(format!("bad holding timestamp '{}'", h.timestamp)))?;
            holding.push(PositionHolding {
                side,
                avg_cost: parse_amount("avg_cost", &h.avg_cost)?,
                position: parse_amount("position", &h.position)?,
                realized_pnl: parse_amount("realized_pnl", &h.realized_pnl)?,
                timestamp,
            });
        }
        Ok(PositionSnapshot {
            margin_mode: self.margin_mode,
            holding,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountInfoResp {
    pub equity: String,
    pub total_avail_balance: String,
    pub margin: String,
    pub realized_pnl: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountsResp {
    pub info: AccountInfoResp,
}

impl AccountsResp {
    pub fn into_balance(self) -> Result<AccountBalance, RestError> {
        Ok(AccountBalance {
            equity: parse_amount("equity", &self.info.equity)?,
            total_avail_balance: parse_amount(
                "total_avail_balance",
                &self.info.total_avail_balance,
            )?,
            margin: parse_amount("margin", &self.info.margin)?,
            realized_pnl: parse_amount("realized_pnl", &self.info.realized_pnl)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SettingsResp {
    pub long_leverage: String,
    pub short_leverage: String,
    pub margin_mode: String,
}

impl SettingsResp {
    pub fn into_setting(self) -> Result<LeverageSetting, RestError> {
        Ok(LeverageSetting {
            long_leverage: parse_amount("long_leverage", &self.long_leverage)?,
            short_leverage: parse_amount("short_leverage", &self.short_leverage)?,
            margin_mode: self.margin_mode,
        })
    }
}
