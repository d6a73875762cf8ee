use crate::amount::Amount;
use crate::exchange::models::{
    AccountsResp, DepthResp, PositionResp, ServerTimeResp, SettingsResp, TickerResp,
};
use crate::exchange::signer::{Credentials, OkexSigner};
use crate::types::{
    AccountBalance, Candle, LeverageSetting, Order, OrderBookSnapshot, OrderStatus, OrderType,
    PositionSnapshot, Ticker,
};
use anyhow::Result;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors from the REST boundary. Order placement is deliberately absent:
/// it signals failure by value (`Placement::Failed`) so a failed placement
/// can never interrupt the signal engine's control flow.
#[derive(Debug, Error)]
pub enum RestError {
    /// Network failure, non-2xx status, or a body that is not JSON. Carries a
    /// truncated response summary for diagnostics.
    #[error("invalid HTTP response: {0}")]
    Transport(String),
    /// Well-formed 200 response carrying a non-zero application error code.
    #[error("API error {code}: {summary}")]
    Api { code: i64, summary: String },
    /// A response field that should be numeric or structured failed to decode.
    #[error("malformed response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RestError {
    fn from(e: reqwest::Error) -> Self {
        RestError::Transport(e.to_string())
    }
}

/// Result of an order placement. Never an error: callers treat `Failed` as
/// "no position change" and keep running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Placed { order_id: String },
    Failed,
}

impl Placement {
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Placement::Placed { order_id } => Some(order_id),
            Placement::Failed => None,
        }
    }
}

/// Signed REST client for the swap API. Stateless beyond credentials, safe to
/// clone and use concurrently; every call opens its own request.
#[derive(Clone)]
pub struct OkexRest {
    api_server: String,
    credentials: Credentials,
    signer: OkexSigner,
    client: Client,
}

impl OkexRest {
    pub fn new(api_server: String, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let signer = OkexSigner::new(credentials.secret_key.clone());
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_server,
            credentials,
            signer,
            client,
        })
    }

    /// Fresh server timestamp, used for signing to avoid clock-skew rejection.
    pub async fn server_timestamp(&self) -> Result<String, RestError> {
        let url = format!("{}/api/general/v3/time", self.api_server);
        let resp = self.client.get(url).send().await?;
        let data = Self::check_response(resp, false).await?;
        let time: ServerTimeResp = serde_json::from_value(data)
            .map_err(|e| RestError::Parse(format!("server time: {e}")))?;
        Ok(time.iso)
    }

    pub async fn ticker(&self, instrument_id: &str) -> Result<Ticker, RestError> {
        let data = self
            .http_get(&format!("/api/swap/v3/instruments/{instrument_id}/ticker"), true)
            .await?;
        let resp: TickerResp =
            serde_json::from_value(data).map_err(|e| RestError::Parse(format!("ticker: {e}")))?;
        resp.into_ticker()
    }

    pub async fn depth(&self, instrument_id: &str) -> Result<OrderBookSnapshot, RestError> {
        let data = self
            .http_get(&format!("/api/swap/v3/instruments/{instrument_id}/depth"), true)
            .await?;
        let resp: DepthResp =
            serde_json::from_value(data).map_err(|e| RestError::Parse(format!("depth: {e}")))?;
        resp.into_snapshot()
    }

    pub async fn position(&self, instrument_id: &str) -> Result<PositionSnapshot, RestError> {
        let data = self
            .http_get(&format!("/api/swap/v3/{instrument_id}/position"), true)
            .await?;
        let resp: PositionResp =
            serde_json::from_value(data).map_err(|e| RestError::Parse(format!("position: {e}")))?;
        resp.into_snapshot()
    }

    pub async fn accounts(&self, instrument_id: &str) -> Result<AccountBalance, RestError> {
        let data = self
            .http_get(&format!("/api/swap/v3/{instrument_id}/accounts"), true)
            .await?;
        let resp: AccountsResp =
            serde_json::from_value(data).map_err(|e| RestError::Parse(format!("accounts: {e}")))?;
        resp.into_balance()
    }

    pub async fn get_setting(&self, instrument_id: &str) -> Result<LeverageSetting, RestError> {
        let data = self
            .http_get(&format!("/api/swap/v3/accounts/{instrument_id}/settings"), true)
            .await?;
        let resp: SettingsResp =
            serde_json::from_value(data).map_err(|e| RestError::Parse(format!("settings: {e}")))?;
        resp.into_setting()
    }

    /// Sets the leverage multiplier for the instrument.
    /// `side`: 1 fixed-margin long, 2 fixed-margin short, 3 crossed.
    pub async fn set_setting(
        &self,
        instrument_id: &str,
        leverage: u32,
        side: u8,
    ) -> Result<(), RestError> {
        tracing::info!(%instrument_id, leverage, side, "applying leverage setting");
        let body = json!({
            "leverage": leverage.to_string(),
            "side": side.to_string(),
        });
        let result = self
            .http_post(&format!("/api/swap/v3/accounts/{instrument_id}/leverage"), &body)
            .await?;
        tracing::info!(%instrument_id, %result, "leverage setting applied");
        Ok(())
    }

    /// Fetches orders in the given status, dropping rows with unrecognized
    /// type codes rather than erroring.
    pub async fn get_orders(
        &self,
        instrument_id: &str,
        status: OrderStatus,
    ) -> Result<Vec<Order>, RestError> {
        let resource = format!(
            "/api/swap/v3/orders/{instrument_id}?status={}",
            status.code()
        );
        let data = self.http_get(&resource, true).await?;
        let rows = data
            .get("order_info")
            .and_then(|v| v.as_array())
            .ok_or_else(|| RestError::Parse("orders response without order_info".into()))?;

        let orders: Vec<Order> = rows.iter().filter_map(Self::parse_order).collect();
        tracing::debug!(%instrument_id, count = orders.len(), "fetched orders");
        Ok(orders)
    }

    /// Places one order. Any failure, transport or application level, comes
    /// back as `Placement::Failed` with a warning.
    pub async fn place_order(
        &self,
        instrument_id: &str,
        order_type: OrderType,
        price: Amount,
        size: Amount,
    ) -> Placement {
        let Some(contracts) = size.whole_units().filter(|c| *c > 0) else {
            tracing::warn!(%instrument_id, %size, "order size is not a positive contract count");
            return Placement::Failed;
        };

        tracing::info!(
            %instrument_id,
            order_type = order_type.describe(),
            %price,
            contracts,
            "placing order"
        );

        let body = json!({
            "instrument_id": instrument_id,
            "type": order_type.code().to_string(),
            "price": price.to_string(),
            "size": contracts.to_string(),
        });

        match self.http_post("/api/swap/v3/order", &body).await {
            Ok(data) => {
                let order_id = data
                    .get("order_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                match order_id {
                    Some(order_id) => {
                        tracing::info!(
                            %instrument_id,
                            order_type = order_type.describe(),
                            %order_id,
                            "order placed"
                        );
                        Placement::Placed { order_id }
                    }
                    None => {
                        tracing::warn!(%instrument_id, %data, "order response without order_id");
                        Placement::Failed
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%instrument_id, error = %e, "order placement failed");
                Placement::Failed
            }
        }
    }

    pub async fn cancel_order(
        &self,
        instrument_id: &str,
        order_id: &str,
    ) -> Result<bool, RestError> {
        tracing::info!(%instrument_id, %order_id, "cancelling order");
        let data = self
            .http_post(
                &format!("/api/swap/v3/cancel_order/{instrument_id}/{order_id}"),
                &json!({}),
            )
            .await?;
        let ok = truthy(data.get("result"));
        tracing::info!(%instrument_id, %order_id, ok, "cancel order result");
        Ok(ok)
    }

    /// One page of candles ending at `end` (exchange caps the page at 200).
    /// Paging further back in time is the caller's responsibility.
    pub async fn get_candles(
        &self,
        instrument_id: &str,
        end: &str,
        granularity: u32,
    ) -> Result<Vec<Candle>, RestError> {
        let resource = format!(
            "/api/swap/v3/instruments/{instrument_id}/candles?end={end}&granularity={granularity}"
        );
        let data = self.http_get(&resource, true).await?;
        let rows = data
            .as_array()
            .ok_or_else(|| RestError::Parse("candles response is not an array".into()))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(values) = row.as_array() else {
                tracing::warn!("candle row is not an array, skipping");
                continue;
            };
            match Candle::from_values(values) {
                Ok(candle) => candles.push(candle),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable candle row"),
            }
        }
        Ok(candles)
    }

    /// Pages backward from now, following each page's oldest timestamp, until
    /// `max_pages` pages are fetched or the exchange runs out of history.
    pub async fn download_candle_history(
        &self,
        instrument_id: &str,
        granularity: u32,
        max_pages: u32,
    ) -> Result<Vec<Candle>, RestError> {
        let mut end = format!("{}Z", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3f"));
        let mut all = Vec::new();
        for page in 0..max_pages {
            let candles = self.get_candles(instrument_id, &end, granularity).await?;
            tracing::info!(%instrument_id, page, count = candles.len(), %end, "candle page fetched");
            let Some(oldest) = candles.last() else {
                break;
            };
            end = oldest.timestamp.clone();
            all.extend(candles);
        }
        Ok(all)
    }

    fn parse_order(row: &serde_json::Value) -> Option<Order> {
        let order_type = OrderType::from_code(int_field(row, "type")?)?;
        let status = OrderStatus::from_code(int_field(row, "status")?)?;
        Some(Order {
            order_id: str_field(row, "order_id")?,
            timestamp: str_field(row, "timestamp")?,
            instrument_id: str_field(row, "instrument_id")?,
            order_type,
            price: row.get("price").and_then(crate::types::json_amount)?,
            size: row.get("size").and_then(crate::types::json_amount)?,
            filled_qty: row.get("filled_qty").and_then(crate::types::json_amount)?,
            fee: row.get("fee").and_then(crate::types::json_amount)?,
            status,
            contract_val: row.get("contract_val").and_then(crate::types::json_amount)?,
        })
    }

    async fn http_get(
        &self,
        resource: &str,
        check_error_code: bool,
    ) -> Result<serde_json::Value, RestError> {
        let timestamp = self.server_timestamp().await?;
        let sign = self
            .signer
            .sign(&timestamp, "GET", resource, "")
            .map_err(|e| RestError::Transport(format!("signing failed: {e}")))?;

        let resp = self
            .client
            .get(format!("{}{}", self.api_server, resource))
            .header(CONTENT_TYPE, "application/json")
            .header("OK-ACCESS-KEY", &self.credentials.api_key)
            .header("OK-ACCESS-SIGN", sign)
            .header("OK-ACCESS-TIMESTAMP", &timestamp)
            .header(
                "OK-ACCESS-PASSPHRASE",
                self.credentials.passphrase.expose_secret(),
            )
            .send()
            .await?;
        Self::check_response(resp, check_error_code).await
    }

    async fn http_post(
        &self,
        resource: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, RestError> {
        let body_text = body.to_string();
        let timestamp = self.server_timestamp().await?;
        let sign = self
            .signer
            .sign(&timestamp, "POST", resource, &body_text)
            .map_err(|e| RestError::Transport(format!("signing failed: {e}")))?;

        let resp = self
            .client
            .post(format!("{}{}", self.api_server, resource))
            .header(CONTENT_TYPE, "application/json")
            .header("OK-ACCESS-KEY", &self.credentials.api_key)
            .header("OK-ACCESS-SIGN", sign)
            .header("OK-ACCESS-TIMESTAMP", &timestamp)
            .header(
                "OK-ACCESS-PASSPHRASE",
                self.credentials.passphrase.expose_secret(),
            )
            .body(body_text)
            .send()
            .await?;
        Self::check_response(resp, true).await
    }

    async fn check_response(
        resp: reqwest::Response,
        check_error_code: bool,
    ) -> Result<serde_json::Value, RestError> {
        let status = resp.status();
        let text = resp.text().await?;
        let summary = response_summary(status, &text);

        if !status.is_success() {
            return Err(RestError::Transport(summary));
        }
        let data: serde_json::Value =
            serde_json::from_str(&text).map_err(|_| RestError::Transport(summary.clone()))?;

        if check_error_code {
            if let Some(code) = error_code(&data) {
                if code > 0 {
                    return Err(RestError::Api { code, summary });
                }
            }
        }
        Ok(data)
    }
}

/// Status line plus the first 2048 chars of the body, newlines stripped, so
/// diagnostics never leak a full payload into the logs.
fn response_summary(status: reqwest::StatusCode, body: &str) -> String {
    let text: String = body
        .replace('\r', "")
        .replace('\n', "")
        .chars()
        .take(2048)
        .collect();
    format!(
        "{} {} ({})",
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        text
    )
}

fn error_code(data: &serde_json::Value) -> Option<i64> {
    let v = data.get("error_code")?;
    v.as_i64().or_else(|| v.as_str()?.parse().ok())
}

fn truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(v) => v.as_bool().unwrap_or_else(|| v.as_str() == Some("true")),
        None => false,
    }
}

fn int_field(row: &serde_json::Value, key: &str) -> Option<i64> {
    let v = row.get(key)?;
    v.as_i64().or_else(|| v.as_str()?.parse().ok())
}

fn str_field(row: &serde_json::Value, key: &str) -> Option<String> {
    row.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
