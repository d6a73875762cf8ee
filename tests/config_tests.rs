use okex_swap_bot::config::{
    AppConfig, FeedCfg, HousekeepingCfg, ObservabilityCfg, OkexCfg, StrategyCfg,
};

fn app_config() -> AppConfig {
    AppConfig {
        instrument_id: "ETH-USD-SWAP".into(),
        okex: OkexCfg {
            api_server: "https://www.okex.com".into(),
            ws_url: "wss://real.okex.com:10442/ws/v3".into(),
            timeout_secs: 10,
        },
        feed: FeedCfg {
            channels: vec!["swap/ticker".into(), "swap/candle60s".into()],
            reconnect_delay_secs: 5,
            ping_interval_secs: 15,
            pong_timeout_secs: 10,
            queue_depth: 2048,
            record_path: None,
        },
        strategy: StrategyCfg {
            leverage: 30,
            leverage_side: 3,
            do_long: true,
            do_short: false,
            entry_percent: "0.003".into(),
            entry_volume: "2000".into(),
            entry_size: "100".into(),
            exit_gap_hard: "1.0".into(),
            exit_gap_soft: "0.05".into(),
            exit_soft_secs: 60,
            exit_force_secs: 3600,
        },
        housekeeping: HousekeepingCfg {
            cancel_interval_secs: 30,
        },
        observability: ObservabilityCfg {
            log_json: false,
            log_filter: None,
        },
    }
}

#[test]
fn one_subscription_message_per_channel_in_order() {
    let cfg = app_config();
    let messages = cfg.subscription_messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("\"subscribe\""));
    assert!(messages[0].contains("swap/ticker:ETH-USD-SWAP"));
    assert!(messages[1].contains("swap/candle60s:ETH-USD-SWAP"));
}

#[test]
fn log_filter_is_optional() {
    let cfg: ObservabilityCfg = serde_json::from_str(r#"{"log_json":true}"#).unwrap();
    assert!(cfg.log_filter.is_none());

    let cfg: ObservabilityCfg =
        serde_json::from_str(r#"{"log_json":false,"log_filter":"warn,okex_swap_bot=info"}"#)
            .unwrap();
    assert_eq!(cfg.log_filter.as_deref(), Some("warn,okex_swap_bot=info"));
}
