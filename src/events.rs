use crate::types::{json_amount, Candle, Ticker};
use anyhow::{Context, Result};

/// One decoded market event, tagged at the feed boundary so the engine can
/// match on it exhaustively instead of re-inspecting table names.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    SpotTicker {
        instrument_id: String,
        ticker: Ticker,
    },
    SwapTicker {
        instrument_id: String,
        ticker: Ticker,
    },
    SpotCandle {
        instrument_id: String,
        candle: Candle,
    },
    SwapCandle {
        instrument_id: String,
        candle: Candle,
    },
}

/// Decodes one inflated frame into zero or more events.
///
/// Control/ack frames (no `data` field) and unknown tables decode to an empty
/// vec; only malformed JSON is an error. Rows that fail to parse inside an
/// otherwise valid envelope are dropped with a warning so one bad row never
/// costs the rest of the frame.
pub fn decode_frame(text: &str) -> Result<Vec<MarketEvent>> {
    let envelope: serde_json::Value =
        serde_json::from_str(text).context("frame is not valid JSON")?;

    let Some(data) = envelope.get("data").and_then(|d| d.as_array()) else {
        tracing::debug!(frame = %text, "control frame, ignoring");
        return Ok(Vec::new());
    };
    let table = envelope
        .get("table")
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    let mut events = Vec::with_capacity(data.len());
    for row in data {
        match decode_row(table, row) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {
                tracing::debug!(%table, "unhandled table, dropping row");
            }
            Err(e) => {
                tracing::warn!(%table, error = %e, "dropping undecodable row");
            }
        }
    }
    Ok(events)
}

fn decode_row(table: &str, row: &serde_json::Value) -> Result<Option<MarketEvent>> {
    let instrument_id = row
        .get("instrument_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    match table {
        "spot/ticker" => Ok(Some(MarketEvent::SpotTicker {
            instrument_id,
            ticker: decode_ticker(row)?,
        })),
        "swap/ticker" => Ok(Some(MarketEvent::SwapTicker {
            instrument_id,
            ticker: decode_ticker(row)?,
        })),
        t if t.starts_with("spot/candle") => Ok(Some(MarketEvent::SpotCandle {
            instrument_id,
            candle: decode_candle(row)?,
        })),
        t if t.starts_with("swap/candle") => Ok(Some(MarketEvent::SwapCandle {
            instrument_id,
            candle: decode_candle(row)?,
        })),
        _ => Ok(None),
    }
}

fn decode_ticker(row: &serde_json::Value) -> Result<Ticker> {
    let field = |key: &str| {
        row.get(key)
            .and_then(json_amount)
            .with_context(|| format!("ticker field '{key}' missing or non-numeric"))
    };
    Ok(Ticker {
        best_bid: field("best_bid")?,
        best_ask: field("best_ask")?,
        last: field("last")?,
    })
}

fn decode_candle(row: &serde_json::Value) -> Result<Candle> {
    let values = row
        .get("candle")
        .and_then(|c| c.as_array())
        .context("candle row without candle array")?;
    Candle::from_values(values)
}
