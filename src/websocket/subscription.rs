//! Registry of subscriptions and the channel ids the exchange assigned them.
//!
//! A subscription starts out *pending* under the request id it was sent
//! with, and becomes *active* once a `subscriptionStatus` event confirms it.
//! Public subscriptions are then keyed by their numeric `channelID`; private
//! ones by channel name.
//!
//! All state sits behind one lock, so every method is atomic with respect to
//! the others.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::models::update::ChannelId;
use crate::models::{Channel, Subscription};

/// Identifies a pending subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub reqid: u64,
    pub channel: Channel,
    pub pair: Option<String>,
}

#[derive(Debug)]
struct Pending {
    subscription: Subscription,
    /// Was active before a reconnect; survives until confirmed again.
    resubscribe: bool,
}

#[derive(Debug, Default)]
struct Inner {
    pending: HashMap<PendingKey, Pending>,
    active: HashMap<ChannelId, Subscription>,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a subscription whose request was just sent.
    pub fn record_pending(&self, subscription: Subscription, reqid: u64) -> PendingKey {
        self.insert_pending(subscription, reqid, false)
    }

    /// Records a subscription replayed after a reconnect.
    pub(crate) fn record_replay(&self, subscription: Subscription, reqid: u64) -> PendingKey {
        self.insert_pending(subscription, reqid, true)
    }

    fn insert_pending(&self, subscription: Subscription, reqid: u64, resubscribe: bool) -> PendingKey {
        let key = PendingKey {
            reqid,
            channel: subscription.channel,
            pair: subscription.pair.clone(),
        };
        self.lock().pending.insert(
            key.clone(),
            Pending {
                subscription,
                resubscribe,
            },
        );
        key
    }

    /// Promotes a subscription to active under `id`.
    ///
    /// Any existing mapping for `id` is overwritten. The matching pending
    /// entry, if any, is removed and its token carried over, since
    /// confirmations never echo the token. Returns the stored descriptor.
    pub fn confirm(&self, id: ChannelId, mut descriptor: Subscription) -> Subscription {
        let mut inner = self.lock();

        let matched = inner
            .pending
            .iter()
            .filter(|(_, p)| p.subscription.same_stream(&descriptor))
            .map(|(k, _)| k.clone())
            .min_by_key(|k| k.reqid);
        if let Some(pending) = matched.and_then(|k| inner.pending.remove(&k))
            && descriptor.token.is_none()
        {
            descriptor.token = pending.subscription.token;
        }

        // A stream confirmed under a new id replaces its old mapping.
        inner
            .active
            .retain(|existing, sub| *existing == id || !sub.same_stream(&descriptor));

        if let Some(previous) = inner.active.insert(id, descriptor.clone())
            && !previous.same_stream(&descriptor)
        {
            debug!(channel_id = %id, old = %previous.channel, "Replaced stale channel mapping");
        }
        descriptor
    }

    /// Descriptor of the active subscription for `id`.
    pub fn lookup(&self, id: ChannelId) -> Option<Subscription> {
        self.lock().active.get(&id).cloned()
    }

    /// Removes the active subscription for `id`.
    pub fn remove(&self, id: ChannelId) -> Option<Subscription> {
        self.lock().active.remove(&id)
    }

    /// Drops the pending entry a rejection refers to.
    ///
    /// With a pair, only that pair's entry under `reqid` is dropped; without
    /// one every entry sent under `reqid` is.
    pub fn discard_pending(&self, reqid: u64, pair: Option<&str>) -> Vec<Subscription> {
        let mut inner = self.lock();
        let keys: Vec<PendingKey> = inner
            .pending
            .keys()
            .filter(|k| k.reqid == reqid && (pair.is_none() || k.pair.as_deref() == pair))
            .cloned()
            .collect();
        keys.iter()
            .filter_map(|k| inner.pending.remove(k))
            .map(|p| p.subscription)
            .collect()
    }

    /// Every active subscription.
    pub fn all_active(&self) -> Vec<Subscription> {
        self.lock().active.values().cloned().collect()
    }

    /// Active subscriptions of `channel` for `pair` (`None` for private).
    pub fn active_for(&self, channel: Channel, pair: Option<&str>) -> Vec<(ChannelId, Subscription)> {
        self.lock()
            .active
            .iter()
            .filter(|(_, s)| s.channel == channel && s.pair.as_deref() == pair)
            .map(|(id, s)| (*id, s.clone()))
            .collect()
    }

    /// Empties the registry for a new connection and returns what must be
    /// subscribed again: every active subscription plus those still
    /// awaiting re-confirmation from an earlier replay, each once.
    ///
    /// Pending subscriptions that were never confirmed are dropped.
    pub(crate) fn take_for_replay(&self) -> Vec<Subscription> {
        let mut inner = self.lock();
        let mut replay: Vec<Subscription> = inner.active.drain().map(|(_, s)| s).collect();

        let mut dropped = 0usize;
        for (_, pending) in inner.pending.drain() {
            if !pending.resubscribe {
                dropped += 1;
                continue;
            }
            if !replay.iter().any(|s| s.same_stream(&pending.subscription)) {
                replay.push(pending.subscription);
            }
        }
        if dropped > 0 {
            debug!(dropped, "Dropped unconfirmed subscriptions");
        }

        replay.sort_by(|a, b| (a.channel, &a.pair).cmp(&(b.channel, &b.pair)));
        replay
    }

    pub fn active_len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(pair: &str) -> Subscription {
        Subscription::public(Channel::Book, pair).with_depth(10)
    }

    #[test]
    fn confirm_promotes_pending() {
        let registry = SubscriptionRegistry::new();
        let key = registry.record_pending(book("XBT/EUR"), 1);
        assert_eq!(key.reqid, 1);
        assert_eq!(registry.pending_len(), 1);

        registry.confirm(ChannelId::Public(336), book("XBT/EUR"));
        assert_eq!(registry.pending_len(), 0);
        assert_eq!(registry.lookup(ChannelId::Public(336)), Some(book("XBT/EUR")));
        assert_eq!(registry.lookup(ChannelId::Public(337)), None);
    }

    #[test]
    fn confirm_carries_token_over() {
        let registry = SubscriptionRegistry::new();
        registry.record_pending(Subscription::private(Channel::OwnTrades, "tok"), 4);

        let echoed = Subscription {
            token: None,
            ..Subscription::private(Channel::OwnTrades, "")
        };
        let stored = registry.confirm(ChannelId::Private(Channel::OwnTrades), echoed);
        assert_eq!(stored.token.as_ref().map(|t| t.expose()), Some("tok"));
    }

    #[test]
    fn confirm_overwrites_stale_mapping() {
        let registry = SubscriptionRegistry::new();
        registry.confirm(ChannelId::Public(1), book("XBT/EUR"));
        registry.confirm(ChannelId::Public(1), book("ETH/EUR"));
        assert_eq!(registry.lookup(ChannelId::Public(1)), Some(book("ETH/EUR")));

        registry.confirm(ChannelId::Public(2), book("ETH/EUR"));
        assert_eq!(registry.active_len(), 1);
        assert_eq!(registry.lookup(ChannelId::Public(1)), None);
    }

    #[test]
    fn remove_and_discard() {
        let registry = SubscriptionRegistry::new();
        registry.confirm(ChannelId::Public(1), book("XBT/EUR"));
        assert!(registry.remove(ChannelId::Public(1)).is_some());
        assert!(registry.remove(ChannelId::Public(1)).is_none());

        registry.record_pending(book("XBT/EUR"), 9);
        registry.record_pending(book("ETH/EUR"), 9);
        let dropped = registry.discard_pending(9, Some("ETH/EUR"));
        assert_eq!(dropped, vec![book("ETH/EUR")]);
        assert_eq!(registry.pending_len(), 1);
        assert_eq!(registry.discard_pending(9, None).len(), 1);
    }

    #[test]
    fn replay_takes_active_once_and_drops_unconfirmed() {
        let registry = SubscriptionRegistry::new();
        registry.confirm(ChannelId::Public(1), book("XBT/EUR"));
        registry.confirm(ChannelId::Public(2), Subscription::public(Channel::Ticker, "XBT/EUR"));
        registry.record_pending(Subscription::public(Channel::Trades, "XBT/EUR"), 7);

        let replay = registry.take_for_replay();
        assert_eq!(replay.len(), 2);
        assert!(!replay.iter().any(|s| s.channel == Channel::Trades));
        assert_eq!(registry.active_len(), 0);
        assert_eq!(registry.pending_len(), 0);
    }

    #[test]
    fn replayed_but_unconfirmed_survive_another_reconnect() {
        let registry = SubscriptionRegistry::new();
        registry.confirm(ChannelId::Public(1), book("XBT/EUR"));

        for sub in registry.take_for_replay() {
            registry.record_replay(sub, 20);
        }
        let again = registry.take_for_replay();
        assert_eq!(again, vec![book("XBT/EUR")]);
    }
}
