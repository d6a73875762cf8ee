use crate::config::FeedCfg;
use crate::events::{decode_frame, MarketEvent};
use crate::recorder::FeedRecorder;
use anyhow::{Context, Result};
use flate2::read::DeflateDecoder;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::io::Read;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Inflates one raw-deflate frame (zlib deflate without header/trailer) into
/// UTF-8 text.
pub fn inflate_frame(data: &[u8]) -> Result<String> {
    let mut decoder = DeflateDecoder::new(data);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .context("inflate frame")?;
    Ok(text)
}

/// Streaming feed client. Owns one long-lived connection, replays the full
/// subscription set on every (re)connect, and delivers decoded events in
/// arrival order to the single registered consumer (the channel sender).
/// Reconnects forever on any disconnect with a flat delay.
pub struct WsFeed {
    ws_url: String,
    subscriptions: Vec<String>,
    reconnect_delay: Duration,
    ping_interval: Duration,
    pong_timeout: Duration,
    out_tx: mpsc::Sender<MarketEvent>,
    recorder: Option<FeedRecorder>,
}

impl WsFeed {
    pub fn new(
        ws_url: String,
        subscriptions: Vec<String>,
        cfg: &FeedCfg,
        out_tx: mpsc::Sender<MarketEvent>,
        recorder: Option<FeedRecorder>,
    ) -> Self {
        Self {
            ws_url,
            subscriptions,
            reconnect_delay: Duration::from_secs(cfg.reconnect_delay_secs),
            ping_interval: Duration::from_secs(cfg.ping_interval_secs),
            pong_timeout: Duration::from_secs(cfg.pong_timeout_secs),
            out_tx,
            recorder,
        }
    }

    pub async fn run(self) -> Result<()> {
        loop {
            let ws = match tokio_tungstenite::connect_async(&self.ws_url).await {
                Ok((ws, _)) => ws,
                Err(e) => {
                    tracing::warn!(url = %self.ws_url, error = %e, "feed connect failed; retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };
            tracing::info!(url = %self.ws_url, "feed connected");

            let (mut write, mut read) = ws.split();
            if self.replay_subscriptions(&mut write).await {
                self.read_loop(&mut write, &mut read).await;
            }

            tracing::warn!(url = %self.ws_url, "feed disconnected; reconnecting");
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Sends every configured subscription, in order, logging each one.
    async fn replay_subscriptions(&self, write: &mut WsWrite) -> bool {
        for message in &self.subscriptions {
            if let Err(e) = write.send(Message::Text(message.clone())).await {
                tracing::warn!(error = %e, "subscription send failed");
                return false;
            }
            tracing::info!(subscribe = %message, "subscription sent");
        }
        true
    }

    async fn read_loop(&self, write: &mut WsWrite, read: &mut WsRead) {
        let mut ping = tokio::time::interval(self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.reset();
        let mut last_rx = Instant::now();

        loop {
            tokio::select! {
                msg = read.next() => {
                    let Some(msg) = msg else {
                        tracing::warn!("feed stream ended");
                        break;
                    };
                    last_rx = Instant::now();
                    match msg {
                        Ok(Message::Binary(bytes)) => self.handle_compressed(&bytes).await,
                        Ok(Message::Text(text)) => self.handle_text(&text).await,
                        Ok(Message::Ping(payload)) => {
                            if write.send(Message::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Ok(Message::Pong(_)) => {}
                        Ok(Message::Close(frame)) => {
                            tracing::warn!(?frame, "feed closed by remote");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "feed read error");
                            break;
                        }
                    }
                }
                _ = ping.tick() => {
                    if last_rx.elapsed() > self.ping_interval + self.pong_timeout {
                        tracing::warn!("feed heartbeat expired");
                        break;
                    }
                    if write.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// A frame that fails to inflate or parse is dropped with a warning; it
    /// never terminates the connection.
    async fn handle_compressed(&self, bytes: &[u8]) {
        match inflate_frame(bytes) {
            Ok(text) => self.handle_text(&text).await,
            Err(e) => tracing::warn!(error = %e, "dropping non-inflatable frame"),
        }
    }

    async fn handle_text(&self, text: &str) {
        let events = match decode_frame(text) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };
        // every decodable envelope is recorded, control/ack frames included
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.append(text) {
                tracing::warn!(error = %e, "feed record append failed");
            }
        }
        if events.is_empty() {
            return;
        }

        for event in events {
            if self.out_tx.send(event).await.is_err() {
                tracing::warn!("feed consumer dropped; discarding event");
                return;
            }
        }
    }
}
