//! Serialization tests for outbound request types and the Channel enum.

mod common;

use rust_decimal_macros::dec;

use kraken_feed::KrakenClient;
use kraken_feed::models::trading::Side;
use kraken_feed::models::{
    AddOrderRequest, CancelOrderRequest, Channel, PingRequest, SubscribeRequest, Subscription,
    UnsubscribeRequest,
};

use common::{FakeExchange, test_config};

#[test]
fn test_channel_as_str_returns_correct_wire_names() {
    assert_eq!(Channel::Book.as_str(), "book");
    assert_eq!(Channel::Ticker.as_str(), "ticker");
    assert_eq!(Channel::Candles.as_str(), "ohlc");
    assert_eq!(Channel::Trades.as_str(), "trade");
    assert_eq!(Channel::Spread.as_str(), "spread");
    assert_eq!(Channel::OwnTrades.as_str(), "ownTrades");
    assert_eq!(Channel::OpenOrders.as_str(), "openOrders");
}

#[test]
fn test_channel_wire_names_with_suffix() {
    assert_eq!(Channel::from_wire("book-1000"), Some((Channel::Book, Some(1000))));
    assert_eq!(Channel::from_wire("ohlc-60"), Some((Channel::Candles, Some(60))));
    assert_eq!(Channel::from_wire("spread"), Some((Channel::Spread, None)));
    assert_eq!(Channel::from_wire("level3"), None);
    assert!(Channel::OpenOrders.is_private());
    assert!(!Channel::Book.is_private());
}

#[test]
fn test_ping_request_serializes() {
    let request = PingRequest::new(7);

    let json = serde_json::to_string(&request).expect("Failed to serialize ping request");
    let value: serde_json::Value =
        serde_json::from_str(&json).expect("Failed to parse serialized JSON");

    assert_eq!(value["event"], "ping");
    assert_eq!(value["reqid"], 7);
}

#[test]
fn test_subscribe_request_serializes() {
    let params = Subscription::public(Channel::Book, "XBT/USD").with_depth(25).params();
    let pairs = vec!["XBT/USD".to_string(), "ETH/USD".to_string()];
    let request = SubscribeRequest::new(3, pairs, params);

    let value = serde_json::to_value(&request).expect("Failed to serialize subscribe request");

    assert_eq!(value["event"], "subscribe");
    assert_eq!(value["reqid"], 3);
    assert_eq!(value["pair"][0], "XBT/USD");
    assert_eq!(value["pair"][1], "ETH/USD");
    assert_eq!(value["subscription"]["name"], "book");
    assert_eq!(value["subscription"]["depth"], 25);
    assert!(value["subscription"].get("interval").is_none());
    assert!(value["subscription"].get("token").is_none());
}

#[test]
fn test_private_subscribe_request_carries_token() {
    let params = Subscription::private(Channel::OwnTrades, "WW91ciBhdXRoZW50aWNhdGlvbiB0b2tlbg").params();
    let request = SubscribeRequest::new(4, Vec::new(), params);

    let value = serde_json::to_value(&request).unwrap();
    assert!(value.get("pair").is_none());
    assert_eq!(value["subscription"]["name"], "ownTrades");
    assert_eq!(value["subscription"]["token"], "WW91ciBhdXRoZW50aWNhdGlvbiB0b2tlbg");
}

#[test]
fn test_unsubscribe_request_serializes() {
    let params = Subscription::public(Channel::Candles, "XBT/USD").with_interval(60).params();
    let request = UnsubscribeRequest::new(9, vec!["XBT/USD".to_string()], params);

    let value = serde_json::to_value(&request).expect("Failed to serialize unsubscribe request");

    assert_eq!(value["event"], "unsubscribe");
    assert_eq!(value["pair"][0], "XBT/USD");
    assert_eq!(value["subscription"]["name"], "ohlc");
    assert_eq!(value["subscription"]["interval"], 60);
}

#[test]
fn test_cancel_order_request_serializes() {
    let request = CancelOrderRequest::new(
        "token",
        vec!["OGTT3Y-C6I3P-XRI6HX".to_string(), "OGTT3Y-C6I3P-X2I6HX".to_string()],
        11,
    );
    assert_eq!(request.order_count(), 2);

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["event"], "cancelOrder");
    assert_eq!(value["token"], "token");
    assert_eq!(value["txid"][1], "OGTT3Y-C6I3P-X2I6HX");
}

#[test]
fn test_token_is_hidden_from_debug_output() {
    let subscription = Subscription::private(Channel::OpenOrders, "super-secret");
    assert!(!format!("{subscription:?}").contains("super-secret"));
}

#[tokio::test]
async fn test_add_order_is_stamped_with_token_and_reqid() {
    let exchange = FakeExchange::new();
    let client = KrakenClient::builder(test_config())
        .connector(exchange.clone())
        .connect()
        .await
        .unwrap();

    let mut request = AddOrderRequest::limit(Side::Buy, "XBT/USD", dec!(1.25), dec!(9000.5));
    request.oflags = Some("post".to_string());
    let reqid = client.add_order("order-token", request).await.unwrap();

    let sent = exchange.sent_events(0, "addOrder");
    assert_eq!(sent.len(), 1);
    let order = &sent[0];
    assert_eq!(order["token"], "order-token");
    assert_eq!(order["reqid"], reqid);
    assert_eq!(order["ordertype"], "limit");
    assert_eq!(order["type"], "buy");
    assert_eq!(order["pair"], "XBT/USD");
    assert_eq!(order["volume"], "1.25");
    assert_eq!(order["price"], "9000.5");
    assert_eq!(order["oflags"], "post");
    assert!(order.get("price2").is_none());

    let err = client.cancel_order("order-token", Vec::new()).await.unwrap_err();
    assert!(matches!(err, kraken_feed::FeedError::InvalidRequest(_)));
}
