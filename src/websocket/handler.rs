//! Incoming frame dispatch.
//!
//! [`Dispatcher::dispatch`] turns one raw frame into at most one [`Event`]:
//! event frames update the subscription registry or become acknowledgement
//! events, channel frames are routed through the registry to the parser for
//! their channel kind.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::subscription::SubscriptionRegistry;
use crate::decode::{DecodeError, ParserRegistry};
use crate::error::FeedError;
use crate::frame::{ChannelFrame, Frame, classify};
use crate::models::trading::AckStatus;
use crate::models::update::ChannelId;
use crate::models::{
    ErrorResponse, Event, EventFrame, Subscription, SubscriptionState, SubscriptionStatus, Update,
};

pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    parsers: ParserRegistry,
}

impl Dispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self::with_parsers(registry, ParserRegistry::default())
    }

    pub fn with_parsers(registry: Arc<SubscriptionRegistry>, parsers: ParserRegistry) -> Self {
        Self { registry, parsers }
    }

    /// Classifies and decodes one frame.
    ///
    /// Returns `Ok(None)` for frames that only matter to the session itself
    /// (heartbeats, pongs).
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the frame is malformed or refers to a
    /// channel id with no active subscription. The caller drops the frame.
    pub fn dispatch(&self, bytes: &[u8]) -> Result<Option<Event>, DecodeError> {
        match classify(bytes)? {
            Frame::Event(event) => self.handle_event(event),
            Frame::Channel(frame) => self.handle_channel(frame).map(Some),
        }
    }

    fn handle_event(&self, event: EventFrame) -> Result<Option<Event>, DecodeError> {
        let event = match event {
            EventFrame::Heartbeat => {
                debug!("Heartbeat");
                return Ok(None);
            }
            EventFrame::Pong(pong) => {
                debug!(reqid = ?pong.reqid, "Pong");
                return Ok(None);
            }
            EventFrame::SystemStatus(status) => {
                info!(
                    status = %status.status,
                    version = ?status.version,
                    connection_id = ?status.connection_id,
                    "System status"
                );
                Event::SystemStatus(status)
            }
            EventFrame::SubscriptionStatus(status) => return self.handle_subscription_status(status),
            EventFrame::AddOrderStatus(status) => match status.status {
                AckStatus::Ok => Event::AddOrder(status),
                AckStatus::Error => order_rejected("addOrder", status.error_message),
            },
            EventFrame::CancelOrderStatus(status) => match status.status {
                AckStatus::Ok => Event::CancelOrder(status),
                AckStatus::Error => order_rejected("cancelOrder", status.error_message),
            },
            EventFrame::CancelAllStatus(status) => match status.status {
                AckStatus::Ok => Event::CancelAll(status),
                AckStatus::Error => order_rejected("cancelAll", status.error_message),
            },
            EventFrame::Error(error) => return Ok(self.handle_error(error)),
        };
        Ok(Some(event))
    }

    fn handle_subscription_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Option<Event>, DecodeError> {
        if status.status == SubscriptionState::Error {
            let message = status
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            if let Some(reqid) = status.reqid {
                self.registry.discard_pending(reqid, status.pair.as_deref());
            }
            let channel = status
                .subscription
                .as_ref()
                .map(|s| s.name.clone())
                .or(status.channel_name.clone())
                .unwrap_or_default();
            warn!(%channel, pair = ?status.pair, %message, "Subscription rejected");
            return Ok(Some(Event::SubscriptionRejected(
                FeedError::SubscriptionRejected {
                    channel,
                    pair: status.pair,
                    message,
                },
            )));
        }

        let descriptor = status
            .descriptor()
            .ok_or(DecodeError::MissingField("subscription"))?;
        let id = channel_id(&status, &descriptor)?;

        match status.status {
            SubscriptionState::Subscribed => {
                let stored = self.registry.confirm(id, descriptor);
                info!(
                    channel_id = %id,
                    channel = %stored.channel,
                    pair = ?stored.pair,
                    "Subscribed"
                );
                Ok(Some(Event::Subscribed(stored)))
            }
            SubscriptionState::Unsubscribed => {
                let removed = self.registry.remove(id).unwrap_or(descriptor);
                info!(
                    channel_id = %id,
                    channel = %removed.channel,
                    pair = ?removed.pair,
                    "Unsubscribed"
                );
                Ok(Some(Event::Unsubscribed(removed)))
            }
            SubscriptionState::Error => Ok(None),
        }
    }

    /// A generic `error` event answers a request the exchange could not
    /// parse. Subscriptions sent under its `reqid` will never be confirmed.
    fn handle_error(&self, error: ErrorResponse) -> Option<Event> {
        let message = error
            .error_message
            .unwrap_or_else(|| "unknown error".to_string());
        warn!(reqid = ?error.reqid, %message, "Exchange reported an error");

        let rejected = error
            .reqid
            .map(|reqid| self.registry.discard_pending(reqid, None))
            .unwrap_or_default();
        let first = rejected.first()?;
        Some(Event::SubscriptionRejected(FeedError::SubscriptionRejected {
            channel: first.channel.to_string(),
            pair: first.pair.clone(),
            message,
        }))
    }

    fn handle_channel(&self, frame: ChannelFrame) -> Result<Event, DecodeError> {
        let subscription = self
            .registry
            .lookup(frame.id)
            .ok_or(DecodeError::UnknownChannel(frame.id))?;

        let data = self
            .parsers
            .parse(subscription.channel, &frame.payload, frame.pair.as_deref())?;

        Ok(Event::Update(Update {
            channel_id: frame.id,
            channel_name: frame.name,
            pair: frame.pair,
            sequence: frame.sequence,
            data,
        }))
    }
}

/// Public subscriptions are keyed by the numeric id in the status; private
/// ones by their channel kind.
fn channel_id(status: &SubscriptionStatus, descriptor: &Subscription) -> Result<ChannelId, DecodeError> {
    if descriptor.channel.is_private() {
        return Ok(ChannelId::Private(descriptor.channel));
    }
    status
        .channel_id
        .map(ChannelId::Public)
        .ok_or(DecodeError::MissingField("channelID"))
}

fn order_rejected(method: &str, message: Option<String>) -> Event {
    let message = message.unwrap_or_else(|| "unknown error".to_string());
    warn!(method, %message, "Order request rejected");
    Event::OrderRejected(FeedError::OrderRejected {
        method: method.to_string(),
        message,
    })
}
