use flate2::write::DeflateEncoder;
use flate2::Compression;
use futures_util::{SinkExt, StreamExt};
use okex_swap_bot::config::FeedCfg;
use okex_swap_bot::events::MarketEvent;
use okex_swap_bot::exchange::okex_ws_feed::WsFeed;
use okex_swap_bot::recorder::FeedRecorder;
use std::io::Write;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

fn feed_cfg() -> FeedCfg {
    FeedCfg {
        channels: vec!["swap/ticker".into(), "swap/candle60s".into()],
        reconnect_delay_secs: 1,
        ping_interval_secs: 30,
        pong_timeout_secs: 10,
        queue_depth: 64,
        record_path: None,
    }
}

fn deflate(payload: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

fn ticker_frame() -> Vec<u8> {
    deflate(
        br#"{"table":"swap/ticker","data":[
            {"instrument_id":"ETH-USD-SWAP","best_bid":"100","best_ask":"101","last":"100.5"}
        ]}"#,
    )
}

async fn local_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn spawn_feed(url: String, subscriptions: Vec<String>) -> mpsc::Receiver<MarketEvent> {
    let (tx, rx) = mpsc::channel(64);
    let feed = WsFeed::new(url, subscriptions, &feed_cfg(), tx, None);
    tokio::spawn(feed.run());
    rx
}

#[tokio::test]
async fn reconnect_replays_all_subscriptions_in_order() {
    let (listener, url) = local_server().await;
    let subscriptions = vec![
        r#"{"op":"subscribe","args":["swap/ticker:ETH-USD-SWAP"]}"#.to_string(),
        r#"{"op":"subscribe","args":["swap/candle60s:ETH-USD-SWAP"]}"#.to_string(),
    ];
    let mut rx = spawn_feed(url, subscriptions.clone());

    // first connection is dropped before the handshake completes
    let (stream, _) = listener.accept().await.unwrap();
    drop(stream);

    // second connection must see the full subscription set again, in order,
    // before anything else
    let (stream, _) = tokio::time::timeout(Duration::from_secs(10), listener.accept())
        .await
        .unwrap()
        .unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    for expected in &subscriptions {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg, Message::Text(expected.clone()));
    }

    ws.send(Message::Binary(ticker_frame())).await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, MarketEvent::SwapTicker { .. }));
}

#[tokio::test]
async fn corrupt_frame_is_dropped_without_killing_the_connection() {
    let (listener, url) = local_server().await;
    let subscriptions = vec![r#"{"op":"subscribe","args":["swap/ticker:ETH-USD-SWAP"]}"#.to_string()];
    let mut rx = spawn_feed(url, subscriptions);

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    // drain the subscription
    let _ = ws.next().await.unwrap().unwrap();

    ws.send(Message::Binary(vec![0xde, 0xad, 0xbe, 0xef]))
        .await
        .unwrap();
    ws.send(Message::Binary(ticker_frame())).await.unwrap();

    // only the valid frame produces an event, on the same connection
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        MarketEvent::SwapTicker { instrument_id, .. } => {
            assert_eq!(instrument_id, "ETH-USD-SWAP");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn recorder_captures_every_decodable_envelope() {
    let record_path =
        std::env::temp_dir().join(format!("feed-record-control-{}.tsv", std::process::id()));
    let _ = std::fs::remove_file(&record_path);

    let (listener, url) = local_server().await;
    let subscriptions = vec![r#"{"op":"subscribe","args":["swap/ticker:ETH-USD-SWAP"]}"#.to_string()];
    let (tx, mut rx) = mpsc::channel(64);
    let recorder = FeedRecorder::open(&record_path).unwrap();
    let feed = WsFeed::new(url, subscriptions, &feed_cfg(), tx, Some(recorder));
    tokio::spawn(feed.run());

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let _ = ws.next().await.unwrap().unwrap();

    // a control/ack envelope produces no events but is still recorded
    ws.send(Message::Binary(deflate(
        br#"{"event":"subscribe","channel":"swap/ticker:ETH-USD-SWAP"}"#,
    )))
    .await
    .unwrap();
    ws.send(Message::Binary(ticker_frame())).await.unwrap();

    // the ticker event arriving means both frames were already handled
    let _ = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    let contents = std::fs::read_to_string(&record_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2, "records: {contents}");
    assert!(lines[0].contains(r#""event":"subscribe""#));
    assert!(lines[1].contains(r#""table":"swap/ticker""#));
    let _ = std::fs::remove_file(&record_path);
}

#[tokio::test]
async fn control_messages_never_reach_the_consumer() {
    let (listener, url) = local_server().await;
    let subscriptions = vec![r#"{"op":"subscribe","args":["swap/ticker:ETH-USD-SWAP"]}"#.to_string()];
    let mut rx = spawn_feed(url, subscriptions);

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let _ = ws.next().await.unwrap().unwrap();

    ws.send(Message::Binary(deflate(
        br#"{"event":"subscribe","channel":"swap/ticker:ETH-USD-SWAP"}"#,
    )))
    .await
    .unwrap();
    ws.send(Message::Binary(ticker_frame())).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, MarketEvent::SwapTicker { .. }));
    assert!(rx.try_recv().is_err());
}
