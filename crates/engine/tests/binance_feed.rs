use std::time::Duration;

use mockito::Matcher;

use common::{Error, FeedConfig, MarketDataFeed};
use engine::BinanceFeed;

const FIXTURE: &str = include_str!("fixtures/ethusdt_1m_200.json");

fn feed_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> BinanceFeed {
    BinanceFeed::new(&FeedConfig {
        base_url: server.url(),
        proxy: None,
        api_key: api_key.map(str::to_string),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn requests_one_minute_klines_for_upper_case_symbol() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()),
            Matcher::UrlEncoded("interval".into(), "1m".into()),
            Matcher::UrlEncoded("limit".into(), "200".into()),
        ]))
        .match_header("user-agent", Matcher::Regex("^Mozilla/5.0 ".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(FIXTURE)
        .create_async()
        .await;

    let candles = feed_for(&server, None)
        .recent_candles("ethusdt", 200)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(candles.len(), 200);
    assert_eq!(candles[199].close, 2185.5);
    assert_eq!(candles[199].open_time.timestamp_millis(), 1_700_011_920_000);
    assert!(candles.windows(2).all(|w| w[0].open_time < w[1].open_time));
}

#[tokio::test]
async fn api_key_is_sent_when_configured() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::Any)
        .match_header("x-mbx-apikey", "k3y")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let candles = feed_for(&server, Some("k3y"))
        .recent_candles("BTCUSDT", 5)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(candles.is_empty());
}

#[tokio::test]
async fn http_error_is_a_fetch_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(r#"{"code":-1003,"msg":"Too many requests"}"#)
        .create_async()
        .await;

    let err = feed_for(&server, None)
        .recent_candles("ETHUSDT", 200)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Fetch(ref m) if m.contains("429")), "{err}");
}

#[tokio::test]
async fn garbage_body_is_a_parse_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let err = feed_for(&server, None)
        .recent_candles("ETHUSDT", 200)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "{err}");
}

#[tokio::test]
async fn unreachable_host_is_a_fetch_error() {
    let feed = BinanceFeed::new(&FeedConfig {
        base_url: "http://127.0.0.1:1".into(),
        timeout: Duration::from_secs(2),
        ..FeedConfig::default()
    })
    .unwrap();

    let err = feed.recent_candles("ETHUSDT", 200).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)), "{err}");
}
