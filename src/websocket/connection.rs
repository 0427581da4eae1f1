//! Session lifecycle management.
//!
//! A [`Session`] owns exactly one live transport at a time. Its supervisor
//! loop (`run`) holds the write half, the heartbeat timer and the command
//! queue; a reader task per transport classifies and dispatches inbound
//! frames in wire order.
//!
//! When the transport fails (read error, server close, heartbeat timeout,
//! failed write) or a resync is requested, the supervisor stops the old
//! reader, waits out an exponential backoff, redials, and replays the
//! registry's active subscriptions. Exceeding the attempt ceiling ends the
//! session with [`Event::Fatal`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tungstenite::Message;

use super::handler::Dispatcher;
use super::subscription::SubscriptionRegistry;
use super::trading::{self, Outbound, RequestIds};
use super::{BoxSink, BoxStream, ConnectionState, Connector};
use crate::Result;
use crate::auth::TokenIssuer;
use crate::config::ClientConfig;
use crate::error::FeedError;
use crate::models::{Event, PingRequest, RedactedToken};

/// Upper bound on closing a transport's write half.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Requests from the client to the supervisor.
pub(crate) enum Command {
    /// Write a frame; the reply is sent once it has been written.
    Send {
        frame: Outbound,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Drop the current transport and reconnect.
    Resync,
}

/// Delivers events to the bounded output stream.
///
/// A full stream blocks delivery for at most `timeout`, after which the
/// event is dropped.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<Event>,
    timeout: Duration,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<Event>, timeout: Duration) -> Self {
        Self { tx, timeout }
    }

    /// Returns the event if it could not be delivered.
    pub(crate) async fn deliver(&self, event: Event) -> std::result::Result<(), Event> {
        match self.tx.send_timeout(event, self.timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(event)) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Event stream full, dropping event"
                );
                Err(event)
            }
            Err(SendTimeoutError::Closed(event)) => {
                debug!("Event stream closed, dropping event");
                Err(event)
            }
        }
    }

    pub(crate) async fn emit(&self, event: Event) {
        let _ = self.deliver(event).await;
    }
}

/// One live connection: the write half and the task reading the other.
pub(crate) struct Transport {
    sink: BoxSink,
    reader: Option<JoinHandle<FeedError>>,
}

impl Transport {
    /// Stops the reader, then closes the write half.
    async fn close(mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, self.sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Error closing transport"),
            Err(_) => debug!("Timed out closing transport"),
        }
    }
}

/// Why the supervisor left the connected loop.
enum Outcome {
    Lost(FeedError),
    Resync,
    Shutdown,
}

/// Why reconnecting stopped without a new transport.
enum Stop {
    Shutdown,
    Fatal(FeedError),
}

/// Everything the supervisor needs, moved into its task.
pub(crate) struct Session {
    pub(crate) config: ClientConfig,
    pub(crate) url: String,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) token_issuer: Option<Arc<dyn TokenIssuer>>,
    pub(crate) registry: Arc<SubscriptionRegistry>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) events: EventSink,
    pub(crate) state: watch::Sender<ConnectionState>,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
    pub(crate) shutdown: watch::Receiver<bool>,
    pub(crate) reqids: Arc<RequestIds>,
    pub(crate) last_inbound: Arc<Mutex<Instant>>,
}

impl Session {
    /// Moves the state machine and reports the transition on the event
    /// stream.
    pub(crate) async fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Connection state changed");
            self.events.emit(Event::StateChanged(next)).await;
        }
    }

    /// Dials a new transport and starts its reader.
    pub(crate) async fn dial(&self) -> Result<Transport> {
        info!(url = %self.url, "Connecting to WebSocket");
        let (sink, stream) =
            match tokio::time::timeout(self.config.dial_timeout, self.connector.connect(&self.url))
                .await
            {
                Ok(result) => result?,
                Err(_) => return Err(FeedError::DialTimeout(self.config.dial_timeout)),
            };

        touch(&self.last_inbound);
        let reader = tokio::spawn(read_loop(
            stream,
            self.dispatcher.clone(),
            self.events.clone(),
            self.last_inbound.clone(),
        ));

        Ok(Transport {
            sink,
            reader: Some(reader),
        })
    }

    /// Runs the supervisor until close or fatal failure.
    ///
    /// `transport` is the connection established by the initial dial.
    pub(crate) async fn run(mut self, mut transport: Transport) -> Result<()> {
        loop {
            let cause = match self.drive(&mut transport).await {
                Outcome::Shutdown => {
                    self.finish(Some(transport)).await;
                    return Ok(());
                }
                Outcome::Lost(err) => {
                    warn!(error = %err, "Connection lost");
                    Some(err)
                }
                Outcome::Resync => {
                    info!("Resync requested");
                    None
                }
            };

            self.set_state(ConnectionState::Reconnecting).await;
            transport.close().await;

            transport = match self.reconnect(cause).await {
                Ok(next) => next,
                Err(Stop::Shutdown) => {
                    self.finish(None).await;
                    return Ok(());
                }
                Err(Stop::Fatal(err)) => {
                    error!(error = %err, "Giving up on the connection");
                    self.set_state(ConnectionState::Closed).await;
                    // Fatal is always the last event on the stream.
                    let undelivered = self.events.deliver(Event::Fatal(err)).await;
                    return match undelivered {
                        Err(Event::Fatal(err)) => Err(err),
                        _ => Ok(()),
                    };
                }
            };
        }
    }

    /// The connected loop: heartbeat, liveness check and outbound commands.
    async fn drive(&mut self, transport: &mut Transport) -> Outcome {
        let period = self.config.ping_interval.max(Duration::from_millis(1));
        let timeout = self.config.heartbeat_timeout;
        let mut ping = tokio::time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = last_seen(&self.last_inbound) + timeout;

            tokio::select! {
                biased;

                _ = self.shutdown.changed() => return Outcome::Shutdown,

                err = reader_finished(&mut transport.reader) => return Outcome::Lost(err),

                () = tokio::time::sleep_until(deadline) => {
                    if last_seen(&self.last_inbound) + timeout <= Instant::now() {
                        return Outcome::Lost(FeedError::HeartbeatTimeout(timeout));
                    }
                }

                _ = ping.tick() => {
                    if let Err(err) = self.ping(&mut transport.sink).await {
                        return Outcome::Lost(err);
                    }
                }

                command = self.commands.recv() => match command {
                    Some(Command::Send { frame, reply }) => {
                        if let Err(err) = self.write(&mut transport.sink, frame).await {
                            let _ = reply.send(Err(FeedError::NotConnected));
                            return Outcome::Lost(err);
                        }
                        let _ = reply.send(Ok(()));
                    }
                    Some(Command::Resync) => return Outcome::Resync,
                    // Client dropped.
                    None => return Outcome::Shutdown,
                },
            }
        }
    }

    /// Redials with exponential backoff and replays subscriptions.
    async fn reconnect(&mut self, cause: Option<FeedError>) -> std::result::Result<Transport, Stop> {
        let max_attempts = self.config.max_reconnect_attempts;
        let mut backoff = self.config.reconnect_backoff;
        let mut last_error = cause;

        for attempt in 1..=max_attempts {
            if *self.shutdown.borrow() {
                return Err(Stop::Shutdown);
            }
            info!(
                attempt,
                max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                "Backing off before reconnect"
            );
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => return Err(Stop::Shutdown),
                () = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.max_backoff);

            let mut transport = match self.dial().await {
                Ok(transport) => transport,
                Err(err) => {
                    warn!(attempt, error = %err, "Reconnect attempt failed");
                    last_error = Some(err);
                    continue;
                }
            };

            match self.replay(&mut transport.sink).await {
                Ok(count) => {
                    info!(attempt, resubscribed = count, "Reconnected");
                    self.set_state(ConnectionState::Connected).await;
                    return Ok(transport);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Resubscribe after reconnect failed");
                    transport.close().await;
                    last_error = Some(err);
                }
            }
        }

        Err(Stop::Fatal(FeedError::ReconnectExhausted {
            attempts: max_attempts,
            source: Box::new(last_error.unwrap_or(FeedError::NotConnected)),
        }))
    }

    /// Resubscribes everything the registry had active.
    ///
    /// Private subscriptions get a fresh token when an issuer is set;
    /// otherwise the token they were created with is reused. Entries are
    /// recorded as pending before anything is written, so a failed replay
    /// is retried in full on the next attempt.
    async fn replay(&self, sink: &mut BoxSink) -> Result<usize> {
        let mut subscriptions = self.registry.take_for_replay();
        if subscriptions.is_empty() {
            return Ok(0);
        }

        if let Some(issuer) = &self.token_issuer
            && subscriptions.iter().any(|s| s.channel.is_private())
        {
            match issuer.token().await {
                Ok(token) => {
                    let token = RedactedToken::new(&token);
                    for sub in subscriptions.iter_mut().filter(|s| s.channel.is_private()) {
                        sub.token = Some(token.clone());
                    }
                }
                Err(err) => warn!(error = %err, "Token refresh failed, reusing stored token"),
            }
        }

        let count = subscriptions.len();
        let frames = trading::subscribe_frames(subscriptions, &self.reqids)?;
        for frame in &frames {
            for sub in &frame.subscriptions {
                self.registry.record_replay(sub.clone(), frame.reqid);
            }
        }
        for frame in frames {
            debug!(reqid = frame.reqid, "Replaying subscription");
            sink.send(Message::Text(frame.text.into())).await?;
        }
        Ok(count)
    }

    /// Writes a client frame, recording its subscriptions as pending first.
    async fn write(&self, sink: &mut BoxSink, frame: Outbound) -> Result<()> {
        for sub in frame.subscriptions {
            self.registry.record_pending(sub, frame.reqid);
        }
        sink.send(Message::Text(frame.text.into())).await?;
        debug!(reqid = frame.reqid, "Sent request");
        Ok(())
    }

    async fn ping(&self, sink: &mut BoxSink) -> Result<()> {
        let request = PingRequest::new(self.reqids.next());
        let json = serde_json::to_string(&request)?;
        sink.send(Message::Text(json.into())).await?;
        debug!(reqid = request.reqid, "Sent ping");
        Ok(())
    }

    /// Closing → Closed. The event stream ends when this task and the
    /// reader are gone.
    async fn finish(&self, transport: Option<Transport>) {
        self.set_state(ConnectionState::Closing).await;
        if let Some(transport) = transport {
            transport.close().await;
        }
        self.set_state(ConnectionState::Closed).await;
        info!("Session closed");
    }
}

/// Reads frames until the transport fails; returns why.
async fn read_loop(
    mut stream: BoxStream,
    dispatcher: Arc<Dispatcher>,
    events: EventSink,
    last_inbound: Arc<Mutex<Instant>>,
) -> FeedError {
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => return FeedError::WebSocket(err),
        };
        touch(&last_inbound);

        let outcome = match &message {
            Message::Text(text) => dispatcher.dispatch(text.as_bytes()),
            Message::Binary(bytes) => dispatcher.dispatch(bytes),
            Message::Close(frame) => {
                info!(?frame, "Server closed the connection");
                return FeedError::WebSocket(tungstenite::Error::ConnectionClosed);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        match outcome {
            Ok(Some(event)) => events.emit(event).await,
            Ok(None) => {}
            Err(err) => warn!(error = %err, "Dropping undecodable frame"),
        }
    }

    FeedError::WebSocket(tungstenite::Error::ConnectionClosed)
}

/// Resolves when the reader task ends; pending forever once it has.
async fn reader_finished(reader: &mut Option<JoinHandle<FeedError>>) -> FeedError {
    let Some(handle) = reader.as_mut() else {
        return std::future::pending().await;
    };
    let result = handle.await;
    *reader = None;
    result.unwrap_or_else(|err| {
        error!(error = %err, "Reader task failed");
        FeedError::WebSocket(tungstenite::Error::ConnectionClosed)
    })
}

fn touch(last_inbound: &Mutex<Instant>) {
    *last_inbound.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
}

fn last_seen(last_inbound: &Mutex<Instant>) -> Instant {
    *last_inbound.lock().unwrap_or_else(PoisonError::into_inner)
}
