//! Outbound request encoding.
//!
//! Every request leaves as one text frame carrying a fresh `reqid`.
//! Subscriptions that share channel, parameters and token are batched into
//! a single request with a pair list, the way the exchange accepts them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::debug;

use crate::Result;
use crate::models::{
    AddOrderRequest, CancelAllRequest, CancelOrderRequest, Channel, SubscribeRequest,
    Subscription, UnsubscribeRequest,
};

/// Source of request ids, unique for the lifetime of a client.
#[derive(Debug)]
pub(crate) struct RequestIds(AtomicU64);

impl RequestIds {
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// An encoded request ready for the wire.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub reqid: u64,
    pub text: String,
    /// Subscriptions this request asks for; recorded as pending when it is
    /// written.
    pub subscriptions: Vec<Subscription>,
}

impl Outbound {
    pub(crate) fn encode<T: Serialize>(reqid: u64, request: &T) -> Result<Self> {
        Ok(Self {
            reqid,
            text: serde_json::to_string(request)?,
            subscriptions: Vec::new(),
        })
    }
}

type GroupKey = (Channel, Option<u32>, Option<u32>, Option<String>);

fn group(subscriptions: Vec<Subscription>) -> BTreeMap<GroupKey, Vec<Subscription>> {
    let mut groups: BTreeMap<GroupKey, Vec<Subscription>> = BTreeMap::new();
    for sub in subscriptions {
        let key = (
            sub.channel,
            sub.interval,
            sub.depth,
            sub.token.as_ref().map(|t| t.expose().to_string()),
        );
        let batch = groups.entry(key).or_default();
        if !batch.iter().any(|queued| queued.same_stream(&sub)) {
            batch.push(sub);
        }
    }
    groups
}

/// Pair list of a batch; `group` has already removed repeated pairs.
fn pairs(subscriptions: &[Subscription]) -> Vec<String> {
    subscriptions.iter().filter_map(|s| s.pair.clone()).collect()
}

/// Builds the `subscribe` requests for `subscriptions`.
pub(crate) fn subscribe_frames(
    subscriptions: Vec<Subscription>,
    reqids: &RequestIds,
) -> Result<Vec<Outbound>> {
    let mut frames = Vec::new();
    for (_, batch) in group(subscriptions) {
        let reqid = reqids.next();
        let request = SubscribeRequest::new(reqid, pairs(&batch), batch[0].params());
        let mut frame = Outbound::encode(reqid, &request)?;
        debug!(
            reqid,
            channel = %batch[0].channel,
            pairs = ?request.pair,
            "Encoded subscribe request"
        );
        frame.subscriptions = batch;
        frames.push(frame);
    }
    Ok(frames)
}

/// Builds the `unsubscribe` requests for `subscriptions`.
pub(crate) fn unsubscribe_frames(
    subscriptions: Vec<Subscription>,
    reqids: &RequestIds,
) -> Result<Vec<Outbound>> {
    let mut frames = Vec::new();
    for (_, batch) in group(subscriptions) {
        let reqid = reqids.next();
        let request = UnsubscribeRequest::new(reqid, pairs(&batch), batch[0].params());
        debug!(reqid, channel = %batch[0].channel, "Encoded unsubscribe request");
        frames.push(Outbound::encode(reqid, &request)?);
    }
    Ok(frames)
}

pub(crate) fn add_order(mut request: AddOrderRequest, token: &str, reqid: u64) -> Result<Outbound> {
    request.authorize(token, reqid);
    debug!(reqid, pair = %request.pair, side = request.side.as_str(), "Encoded addOrder request");
    Outbound::encode(reqid, &request)
}

pub(crate) fn cancel_order(txids: Vec<String>, token: &str, reqid: u64) -> Result<Outbound> {
    let request = CancelOrderRequest::new(token, txids, reqid);
    debug!(reqid, order_count = request.order_count(), "Encoded cancelOrder request");
    Outbound::encode(reqid, &request)
}

pub(crate) fn cancel_all(token: &str, reqid: u64) -> Result<Outbound> {
    debug!(reqid, "Encoded cancelAll request");
    Outbound::encode(reqid, &CancelAllRequest::new(token, reqid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn json(frame: &Outbound) -> Value {
        serde_json::from_str(&frame.text).unwrap()
    }

    #[test]
    fn same_parameters_share_one_request() {
        let reqids = RequestIds::new();
        let frames = subscribe_frames(
            vec![
                Subscription::public(Channel::Book, "XBT/EUR").with_depth(10),
                Subscription::public(Channel::Book, "ETH/EUR").with_depth(10),
                Subscription::public(Channel::Book, "XBT/USD").with_depth(100),
            ],
            &reqids,
        )
        .unwrap();

        assert_eq!(frames.len(), 2);
        let first = json(&frames[0]);
        assert_eq!(first["event"], "subscribe");
        assert_eq!(first["pair"], serde_json::json!(["XBT/EUR", "ETH/EUR"]));
        assert_eq!(first["subscription"]["depth"], 10);
        assert_eq!(frames[0].subscriptions.len(), 2);
        assert_ne!(frames[0].reqid, frames[1].reqid);
    }

    #[test]
    fn repeated_pairs_are_requested_once() {
        let reqids = RequestIds::new();
        let frames = subscribe_frames(
            ["XBT/EUR", "ETH/EUR", "XBT/EUR"]
                .into_iter()
                .map(|pair| Subscription::public(Channel::Ticker, pair))
                .collect(),
            &reqids,
        )
        .unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(json(&frames[0])["pair"], serde_json::json!(["XBT/EUR", "ETH/EUR"]));
        assert_eq!(frames[0].subscriptions.len(), 2);

        let frames = unsubscribe_frames(
            vec![
                Subscription::public(Channel::Spread, "XBT/EUR"),
                Subscription::public(Channel::Spread, "XBT/EUR"),
            ],
            &reqids,
        )
        .unwrap();
        assert_eq!(json(&frames[0])["pair"], serde_json::json!(["XBT/EUR"]));
    }

    #[test]
    fn private_request_has_token_and_no_pair() {
        let reqids = RequestIds::new();
        let frames =
            subscribe_frames(vec![Subscription::private(Channel::OpenOrders, "abc")], &reqids)
                .unwrap();
        let value = json(&frames[0]);
        assert!(value.get("pair").is_none());
        assert_eq!(value["subscription"]["name"], "openOrders");
        assert_eq!(value["subscription"]["token"], "abc");
    }

    #[test]
    fn unsubscribe_keeps_parameters() {
        let reqids = RequestIds::new();
        let frames = unsubscribe_frames(
            vec![Subscription::public(Channel::Candles, "XBT/EUR").with_interval(5)],
            &reqids,
        )
        .unwrap();
        let value = json(&frames[0]);
        assert_eq!(value["event"], "unsubscribe");
        assert_eq!(value["subscription"]["interval"], 5);
        assert!(frames[0].subscriptions.is_empty());
    }

    #[test]
    fn request_ids_increase() {
        let reqids = RequestIds::new();
        let a = reqids.next();
        let b = reqids.next();
        assert!(b > a);
    }
}
