// file: src/push.rs
// description: unidirectional (server-push) channel client with reconnect and bounded history

use crate::{
    config::PushChannelConfig,
    envelope::{Envelope, EventKind},
    error::DriftwireError,
    events::{ChannelKind, EventBus, TransportEvent},
    monitoring,
    ring::EventRing,
    sse::{SseFrame, SseParser},
    state::{self, ChannelPhase, ChannelState, ChannelStatus},
};
use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

#[derive(Debug)]
enum PushCommand {
    Connect,
    Disconnect,
}

const ENVELOPE_STREAM_CAPACITY: usize = 256;

/// Handle to the push channel. Cheap getters never block the driver; the
/// driver task owns the live connection, the reconnect timer, and all state
/// mutation. Dropping the handle disconnects the channel.
pub struct PushClient {
    command_tx: mpsc::UnboundedSender<PushCommand>,
    status_rx: watch::Receiver<ChannelStatus>,
    ring: Arc<Mutex<EventRing>>,
    envelopes: broadcast::Sender<Envelope>,
}

impl PushClient {
    pub fn spawn(config: PushChannelConfig, bus: EventBus) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = state::status_channel();
        let ring = Arc::new(Mutex::new(EventRing::new(config.buffer_capacity)));
        let (envelopes, _) = broadcast::channel(ENVELOPE_STREAM_CAPACITY);

        let driver = PushDriver {
            http: reqwest::Client::new(),
            config,
            state: ChannelState::new(),
            status_tx,
            ring: Arc::clone(&ring),
            envelopes: envelopes.clone(),
            bus,
            command_rx,
            shutdown: false,
        };
        tokio::spawn(driver.run());

        Self {
            command_tx,
            status_rx,
            ring,
            envelopes,
        }
    }

    /// Request a connect. No-op while a connection attempt is in flight or a
    /// connection is live; after exhausted retries this resets the attempt
    /// counter and tries again immediately.
    pub fn connect(&self) {
        let _ = self.command_tx.send(PushCommand::Connect);
    }

    /// Tear down the connection and suppress any pending reconnect. Safe to
    /// call repeatedly.
    pub fn disconnect(&self) {
        let _ = self.command_tx.send(PushCommand::Disconnect);
    }

    pub fn status(&self) -> ChannelStatus {
        self.status_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.status_rx.borrow().is_connecting()
    }

    pub fn error(&self) -> Option<String> {
        self.status_rx.borrow().error.clone()
    }

    /// Most recently accepted envelope, if any.
    pub fn last_event(&self) -> Option<Envelope> {
        self.ring_lock().latest().cloned()
    }

    /// Snapshot of the buffered history, oldest first.
    pub fn events(&self) -> Vec<Envelope> {
        self.ring_lock().snapshot()
    }

    /// Empty the history and latest-event pointer; connection state is
    /// untouched.
    pub fn clear_events(&self) {
        self.ring_lock().clear();
    }

    /// Live envelope stream for observers; dropping the receiver
    /// unsubscribes.
    pub fn subscribe_envelopes(&self) -> broadcast::Receiver<Envelope> {
        self.envelopes.subscribe()
    }

    /// Watch stream of status snapshots, for observers that want change
    /// notifications instead of polling.
    pub fn status_stream(&self) -> watch::Receiver<ChannelStatus> {
        self.status_rx.clone()
    }

    fn ring_lock(&self) -> MutexGuard<'_, EventRing> {
        self.ring.lock().expect("event ring lock poisoned")
    }
}

struct PushDriver {
    config: PushChannelConfig,
    http: reqwest::Client,
    state: ChannelState,
    status_tx: watch::Sender<ChannelStatus>,
    ring: Arc<Mutex<EventRing>>,
    envelopes: broadcast::Sender<Envelope>,
    bus: EventBus,
    command_rx: mpsc::UnboundedReceiver<PushCommand>,
    shutdown: bool,
}

impl PushDriver {
    async fn run(mut self) {
        if self.config.auto_connect {
            self.state.begin_connect();
            self.publish();
        }

        while !self.shutdown {
            match self.state.phase {
                ChannelPhase::Connecting => self.establish_and_stream().await,
                ChannelPhase::Reconnecting => self.await_retry().await,
                _ => self.await_command().await,
            }
        }
        debug!("push driver stopped");
    }

    /// Parked in idle/closed/failed until the owner says otherwise.
    async fn await_command(&mut self) {
        match self.command_rx.recv().await {
            Some(PushCommand::Connect) => {
                self.state.reset_attempts();
                if self.state.begin_connect() {
                    self.publish();
                }
            }
            Some(PushCommand::Disconnect) => self.finish_disconnect(),
            None => {
                self.finish_disconnect();
                self.shutdown = true;
            }
        }
    }

    /// Backoff wait between failures. A disconnect here cancels the pending
    /// reconnect; a manual connect overrides the timer and resets the budget.
    async fn await_retry(&mut self) {
        let policy = self.config.retry();
        let attempt = self.state.attempt;
        let Some(delay) = policy.delay(attempt) else {
            warn!(
                attempts = policy.max_attempts,
                "push channel giving up; call connect() to retry"
            );
            self.state.mark_failed(policy.max_attempts);
            self.publish();
            let _ = self.bus.send(TransportEvent::RetriesExhausted {
                channel: ChannelKind::Push,
                attempts: policy.max_attempts,
            });
            return;
        };

        info!(attempt, delay_ms = delay.as_millis() as u64, "push channel reconnecting");
        let _ = self.bus.send(TransportEvent::Reconnecting {
            channel: ChannelKind::Push,
            attempt,
            delay,
        });

        tokio::select! {
            _ = sleep(delay) => {
                self.state.begin_connect();
                self.publish();
            }
            cmd = self.command_rx.recv() => match cmd {
                Some(PushCommand::Connect) => {
                    self.state.reset_attempts();
                    self.state.begin_connect();
                    self.publish();
                }
                Some(PushCommand::Disconnect) => self.finish_disconnect(),
                None => {
                    self.finish_disconnect();
                    self.shutdown = true;
                }
            }
        }
    }

    async fn establish_and_stream(&mut self) {
        let url = self.config.url.clone();
        let _ = self.bus.send(TransportEvent::Connecting {
            channel: ChannelKind::Push,
            url: url.to_string(),
        });

        let request = self
            .http
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();
        tokio::pin!(request);

        let response = loop {
            tokio::select! {
                result = &mut request => break result,
                cmd = self.command_rx.recv() => match cmd {
                    Some(PushCommand::Connect) => {
                        trace!("connect ignored: push connect already in flight");
                    }
                    Some(PushCommand::Disconnect) => {
                        self.finish_disconnect();
                        return;
                    }
                    None => {
                        self.finish_disconnect();
                        self.shutdown = true;
                        return;
                    }
                }
            }
        };

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                let err = DriftwireError::StreamRejected {
                    status: r.status().as_u16(),
                };
                self.schedule_retry(err.to_string());
                return;
            }
            Err(e) => {
                self.schedule_retry(DriftwireError::HttpError(e).to_string());
                return;
            }
        };

        let connection_id = uuid::Uuid::new_v4().to_string();
        info!(connection_id = %connection_id, url = %url, "push channel open");
        self.state.mark_open(connection_id.clone());
        self.publish();
        monitoring::PUSH_CONNECTED_GAUGE.set(1.0);
        let _ = self.bus.send(TransportEvent::Connected {
            channel: ChannelKind::Push,
            connection_id,
        });

        let mut parser = SseParser::new();
        let mut stream = response.bytes_stream();
        loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for frame in parser.feed(&bytes) {
                            self.handle_frame(frame);
                        }
                    }
                    Some(Err(e)) => {
                        self.schedule_retry(DriftwireError::HttpError(e).to_string());
                        return;
                    }
                    None => {
                        self.schedule_retry(DriftwireError::ConnectionClosed.to_string());
                        return;
                    }
                },
                cmd = self.command_rx.recv() => match cmd {
                    Some(PushCommand::Connect) => {
                        trace!("connect ignored: push channel already open");
                    }
                    Some(PushCommand::Disconnect) => {
                        self.finish_disconnect();
                        return;
                    }
                    None => {
                        self.finish_disconnect();
                        self.shutdown = true;
                        return;
                    }
                }
            }
        }
    }

    /// One decoded SSE frame. Unknown event names and malformed payloads are
    /// dropped here and never reach the ring or any observer.
    fn handle_frame(&mut self, frame: SseFrame) {
        let Some(kind) = EventKind::from_push_name(&frame.event) else {
            debug!(event = %frame.event, "ignoring unknown push event type");
            return;
        };

        // keep-alive frames may arrive without a payload
        let data = if frame.data.is_empty() && kind == EventKind::KeepAlive {
            serde_json::Value::Null
        } else {
            match serde_json::from_str(&frame.data) {
                Ok(value) => value,
                Err(e) => {
                    monitoring::DROPPED_FRAMES_COUNTER.increment(1);
                    warn!(event = %frame.event, error = %e, "dropping malformed push frame");
                    return;
                }
            }
        };

        let envelope = Envelope::new(kind, data);
        trace!(kind = %envelope.kind, "push event accepted");
        monitoring::ENVELOPES_RECEIVED_COUNTER.increment(1);
        self.ring
            .lock()
            .expect("event ring lock poisoned")
            .record(envelope.clone());
        let _ = self.envelopes.send(envelope.clone());
        let _ = self.bus.send(TransportEvent::EnvelopeReceived(envelope));
    }

    /// The stream reached a terminal closed condition: record the error and
    /// park in `Reconnecting` for the scheduler.
    fn schedule_retry(&mut self, error: impl Into<String>) {
        let error = error.into();
        warn!(error = %error, "push channel lost");
        monitoring::PUSH_CONNECTED_GAUGE.set(0.0);
        monitoring::RECONNECT_COUNTER.increment(1);
        self.state.mark_reconnecting(error);
        self.publish();
    }

    /// Caller-intended teardown. Caps the attempt counter first so no retry
    /// path can schedule afterward; repeat calls converge on the same state.
    fn finish_disconnect(&mut self) {
        let was_closed = self.state.phase == ChannelPhase::Closed;
        self.state.suppress_retries(self.config.reconnect_attempts);
        self.state.begin_close();
        self.state.mark_closed();
        self.publish();
        monitoring::PUSH_CONNECTED_GAUGE.set(0.0);
        if !was_closed {
            info!("push channel disconnected");
            let _ = self.bus.send(TransportEvent::Disconnected {
                channel: ChannelKind::Push,
            });
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.state.snapshot());
    }
}
