//! Shared test utilities: an in-memory exchange and event helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use kraken_feed::websocket::{BoxSink, BoxStream, Connector};
use kraken_feed::{ClientConfig, Event, FeedError};
use serde_json::Value;
use tungstenite::Message;

/// Kraken WebSocket v1 public endpoint URL.
pub const KRAKEN_WS_URL: &str = "wss://ws.kraken.com";

/// One accepted connection, seen from the exchange side.
struct Link {
    inbound: mpsc::UnboundedSender<tungstenite::Result<Message>>,
    sent: Arc<Mutex<Vec<String>>>,
}

/// A [`Connector`] that hands out in-memory transports and records every
/// text frame the client writes on each of them.
#[derive(Default)]
pub struct FakeExchange {
    links: Mutex<Vec<Link>>,
    dial_attempts: AtomicUsize,
    refuse: AtomicBool,
}

impl FakeExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connections accepted so far.
    pub fn connects(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// Every dial, accepted or refused.
    pub fn dial_attempts(&self) -> usize {
        self.dial_attempts.load(Ordering::SeqCst)
    }

    /// Makes subsequent dials fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Sends a text frame to the client over connection `link`.
    pub fn push(&self, link: usize, text: &str) {
        let links = self.links.lock().unwrap();
        links[link]
            .inbound
            .unbounded_send(Ok(Message::text(text.to_string())))
            .expect("client stopped reading");
    }

    /// Ends connection `link` as if the server went away.
    pub fn drop_connection(&self, link: usize) {
        self.links.lock().unwrap()[link].inbound.close_channel();
    }

    /// Frames written by the client on connection `link`, parsed.
    pub fn sent(&self, link: usize) -> Vec<Value> {
        let links = self.links.lock().unwrap();
        let sent = links[link].sent.lock().unwrap();
        sent.iter()
            .map(|text| serde_json::from_str(text).expect("client sent invalid json"))
            .collect()
    }

    /// Frames on connection `link` with the given `event` field.
    pub fn sent_events(&self, link: usize, event: &str) -> Vec<Value> {
        self.sent(link)
            .into_iter()
            .filter(|frame| frame["event"] == event)
            .collect()
    }
}

#[async_trait]
impl Connector for FakeExchange {
    async fn connect(&self, _url: &str) -> kraken_feed::Result<(BoxSink, BoxStream)> {
        self.dial_attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(FeedError::WebSocket(tungstenite::Error::ConnectionClosed));
        }

        let (inbound, stream) = mpsc::unbounded();
        let sent = Arc::new(Mutex::new(Vec::new()));

        let log = sent.clone();
        let sink = futures::sink::unfold(log, |log, message: Message| async move {
            if let Message::Text(text) = &message {
                log.lock().unwrap().push(text.as_str().to_owned());
            }
            Ok::<_, tungstenite::Error>(log)
        });

        self.links.lock().unwrap().push(Link { inbound, sent });
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Short timings so reconnect tests finish quickly.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        websocket_url: "wss://fake.exchange".to_string(),
        dial_timeout: Duration::from_secs(1),
        reconnect_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        max_reconnect_attempts: 3,
        send_timeout: Duration::from_millis(100),
        ..ClientConfig::default()
    }
}

/// Polls `condition` until it holds, failing the test after a few seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Receives events until one matches `predicate`.
pub async fn next_matching(
    events: &mut tokio::sync::mpsc::Receiver<Event>,
    predicate: impl Fn(&Event) -> bool,
) -> Event {
    let wait = async {
        while let Some(event) = events.recv().await {
            if predicate(&event) {
                return event;
            }
        }
        panic!("event stream ended");
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for event")
}

/// A subscription confirmation for a public channel.
///
/// `subscription` is the echoed subscription object, e.g.
/// `{"depth":10,"name":"book"}`.
pub fn subscribed(
    channel_id: u64,
    channel_name: &str,
    pair: &str,
    reqid: u64,
    subscription: &str,
) -> String {
    format!(
        r#"{{"channelID":{channel_id},"channelName":"{channel_name}","event":"subscriptionStatus","pair":"{pair}","reqid":{reqid},"status":"subscribed","subscription":{subscription}}}"#
    )
}

/// The `reqid` of the `n`th frame with `event` on connection `link`.
pub fn reqid_of(exchange: &FakeExchange, link: usize, event: &str, n: usize) -> u64 {
    exchange.sent_events(link, event)[n]["reqid"]
        .as_u64()
        .expect("request without reqid")
}
