// file: src/duplex.rs
// description: bidirectional (WebSocket) channel client with heartbeat and subscription replay

use crate::{
    config::DuplexChannelConfig,
    error::DriftwireError,
    events::{ChannelKind, EventBus, TransportEvent},
    monitoring,
    state::{self, ChannelPhase, ChannelState, ChannelStatus},
    subscriptions::SubscriptionSet,
    types::{ClientCommand, ServerMessage, Topic},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::Message,
    tungstenite::protocol::{CloseFrame, frame::coding::CloseCode},
};
use tracing::{debug, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

#[derive(Debug)]
enum DuplexCommand {
    Connect,
    Disconnect,
    Send(ClientCommand),
    Subscribe(Topic),
    Unsubscribe(Topic),
}

const MESSAGE_STREAM_CAPACITY: usize = 256;

/// Handle to the duplex channel. `send` is best-effort: commands issued while
/// the socket is not open are dropped with a diagnostic, never queued or
/// errored. Dropping the handle disconnects the channel.
pub struct DuplexClient {
    command_tx: mpsc::UnboundedSender<DuplexCommand>,
    status_rx: watch::Receiver<ChannelStatus>,
    last_message_rx: watch::Receiver<Option<ServerMessage>>,
    messages: broadcast::Sender<ServerMessage>,
}

impl DuplexClient {
    pub fn spawn(config: DuplexChannelConfig, bus: EventBus) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = state::status_channel();
        let (last_message_tx, last_message_rx) = watch::channel(None);
        let (messages, _) = broadcast::channel(MESSAGE_STREAM_CAPACITY);

        let driver = DuplexDriver {
            config,
            state: ChannelState::new(),
            subscriptions: SubscriptionSet::new(),
            status_tx,
            last_message_tx,
            messages: messages.clone(),
            bus,
            command_rx,
            shutdown: false,
        };
        tokio::spawn(driver.run());

        Self {
            command_tx,
            status_rx,
            last_message_rx,
            messages,
        }
    }

    /// Request a connect. No-op while connecting or open; after exhausted
    /// retries this resets the attempt counter and tries again immediately.
    pub fn connect(&self) {
        let _ = self.command_tx.send(DuplexCommand::Connect);
    }

    /// Stop the heartbeat, cancel any pending reconnect, and close with the
    /// normal-closure code. Safe to call repeatedly.
    pub fn disconnect(&self) {
        let _ = self.command_tx.send(DuplexCommand::Disconnect);
    }

    /// Best-effort command send; dropped with a warning unless the socket is
    /// open.
    pub fn send(&self, command: ClientCommand) {
        let _ = self.command_tx.send(DuplexCommand::Send(command));
    }

    /// Subscribe to a topic. Registered for replay-on-reconnect even when the
    /// socket is not currently open.
    pub fn subscribe(&self, topic: Topic) {
        let _ = self.command_tx.send(DuplexCommand::Subscribe(topic));
    }

    pub fn unsubscribe(&self, topic: Topic) {
        let _ = self.command_tx.send(DuplexCommand::Unsubscribe(topic));
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

    /// Most recent successfully parsed response. This channel keeps no
    /// history; it is a command/response channel, not an event stream.
    pub fn last_message(&self) -> Option<ServerMessage> {
        self.last_message_rx.borrow().clone()
    }

    /// Live response stream for observers; dropping the receiver
    /// unsubscribes.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<ServerMessage> {
        self.messages.subscribe()
    }

    pub fn status_stream(&self) -> watch::Receiver<ChannelStatus> {
        self.status_rx.clone()
    }
}

struct DuplexDriver {
    config: DuplexChannelConfig,
    state: ChannelState,
    subscriptions: SubscriptionSet,
    status_tx: watch::Sender<ChannelStatus>,
    last_message_tx: watch::Sender<Option<ServerMessage>>,
    messages: broadcast::Sender<ServerMessage>,
    bus: EventBus,
    command_rx: mpsc::UnboundedReceiver<DuplexCommand>,
    shutdown: bool,
}

impl DuplexDriver {
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
        debug!("duplex driver stopped");
    }

    async fn await_command(&mut self) {
        match self.command_rx.recv().await {
            Some(DuplexCommand::Connect) => {
                self.state.reset_attempts();
                if self.state.begin_connect() {
                    self.publish();
                }
            }
            Some(DuplexCommand::Disconnect) => self.finish_disconnect(),
            Some(cmd) => self.handle_offline_command(cmd),
            None => {
                self.finish_disconnect();
                self.shutdown = true;
            }
        }
    }

    async fn await_retry(&mut self) {
        let policy = self.config.retry();
        let attempt = self.state.attempt;
        let Some(delay) = policy.delay(attempt) else {
            warn!(
                attempts = policy.max_attempts,
                "duplex channel giving up; call connect() to retry"
            );
            self.state.mark_failed(policy.max_attempts);
            self.publish();
            let _ = self.bus.send(TransportEvent::RetriesExhausted {
                channel: ChannelKind::Duplex,
                attempts: policy.max_attempts,
            });
            return;
        };

        info!(attempt, delay_ms = delay.as_millis() as u64, "duplex channel reconnecting");
        let _ = self.bus.send(TransportEvent::Reconnecting {
            channel: ChannelKind::Duplex,
            attempt,
            delay,
        });

        // Fixed deadline: subscription bookkeeping during the wait must not
        // restart the timer.
        let deadline = tokio::time::Instant::now() + delay;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    self.state.begin_connect();
                    self.publish();
                    return;
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(DuplexCommand::Connect) => {
                        self.state.reset_attempts();
                        self.state.begin_connect();
                        self.publish();
                        return;
                    }
                    Some(DuplexCommand::Disconnect) => {
                        self.finish_disconnect();
                        return;
                    }
                    Some(cmd) => self.handle_offline_command(cmd),
                    None => {
                        self.finish_disconnect();
                        self.shutdown = true;
                        return;
                    }
                }
            }
        }
    }

    async fn establish_and_stream(&mut self) {
        let url = self.config.url.clone();
        let _ = self.bus.send(TransportEvent::Connecting {
            channel: ChannelKind::Duplex,
            url: url.to_string(),
        });

        let connect = connect_async(url.as_str());
        tokio::pin!(connect);

        let result = loop {
            tokio::select! {
                result = &mut connect => break result,
                cmd = self.command_rx.recv() => match cmd {
                    Some(DuplexCommand::Connect) => {
                        trace!("connect ignored: duplex connect already in flight");
                    }
                    Some(DuplexCommand::Disconnect) => {
                        self.finish_disconnect();
                        return;
                    }
                    Some(cmd) => self.handle_offline_command(cmd),
                    None => {
                        self.finish_disconnect();
                        self.shutdown = true;
                        return;
                    }
                }
            }
        };

        let ws = match result {
            Ok((ws, _response)) => ws,
            Err(e) => {
                self.schedule_retry(DriftwireError::WebSocketError(e).to_string());
                return;
            }
        };

        let connection_id = uuid::Uuid::new_v4().to_string();
        info!(connection_id = %connection_id, url = %url, "duplex channel open");
        self.state.mark_open(connection_id.clone());
        self.publish();
        monitoring::DUPLEX_CONNECTED_GAUGE.set(1.0);
        let _ = self.bus.send(TransportEvent::Connected {
            channel: ChannelKind::Duplex,
            connection_id,
        });

        let (mut sink, mut stream) = ws.split();

        // Baseline `all` plus every caller-requested topic, on every open.
        for topic in self.subscriptions.replay() {
            if let Err(e) = self.send_command(&mut sink, &ClientCommand::subscribe(topic)).await {
                self.schedule_retry(format!("subscription replay failed: {e}"));
                return;
            }
        }

        // Heartbeat starts only after a successful open; first ping lands one
        // full interval later. The timer dies with this scope on any exit.
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        self.handle_server_close(frame);
                        return;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(bytes = data.len(), "binary frames not supported, ignoring");
                    }
                    Some(Ok(Message::Ping(_))) => trace!("ping from server"),
                    Some(Ok(Message::Pong(_))) => trace!("pong received"),
                    Some(Ok(_)) => trace!("ignoring raw frame"),
                    Some(Err(e)) => {
                        self.schedule_retry(format!("socket error: {e}"));
                        return;
                    }
                    None => {
                        self.schedule_retry(DriftwireError::ConnectionClosed.to_string());
                        return;
                    }
                },
                _ = heartbeat.tick() => {
                    if let Err(e) = self.send_command(&mut sink, &ClientCommand::ping()).await {
                        self.schedule_retry(format!("heartbeat send failed: {e}"));
                        return;
                    }
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(DuplexCommand::Connect) => {
                        trace!("connect ignored: duplex channel already open");
                    }
                    Some(DuplexCommand::Disconnect) | None => {
                        let close = Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "client disconnect".into(),
                        }));
                        if let Err(e) = sink.send(close).await {
                            debug!(error = %e, "close frame send failed");
                        }
                        let stop = cmd.is_none();
                        self.finish_disconnect();
                        self.shutdown = stop;
                        return;
                    }
                    Some(DuplexCommand::Send(command)) => {
                        if let Err(e) = self.send_command(&mut sink, &command).await {
                            self.schedule_retry(format!("send failed: {e}"));
                            return;
                        }
                    }
                    Some(DuplexCommand::Subscribe(topic)) => {
                        self.subscriptions.insert(topic);
                        if let Err(e) = self.send_command(&mut sink, &ClientCommand::subscribe(topic)).await {
                            self.schedule_retry(format!("subscribe failed: {e}"));
                            return;
                        }
                    }
                    Some(DuplexCommand::Unsubscribe(topic)) => {
                        self.subscriptions.remove(topic);
                        if let Err(e) = self.send_command(&mut sink, &ClientCommand::unsubscribe(topic)).await {
                            self.schedule_retry(format!("unsubscribe failed: {e}"));
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Commands arriving while the socket is not open. Subscription intent is
    /// recorded for replay; the wire send itself is best-effort and dropped.
    fn handle_offline_command(&mut self, cmd: DuplexCommand) {
        match cmd {
            DuplexCommand::Send(command) => {
                warn!(kind = %command.kind, "dropping command: duplex channel not open");
            }
            DuplexCommand::Subscribe(topic) => {
                self.subscriptions.insert(topic);
                warn!(topic = %topic, "duplex channel not open; topic registered for replay");
            }
            DuplexCommand::Unsubscribe(topic) => {
                self.subscriptions.remove(topic);
            }
            // Connect/Disconnect are handled at every call site before
            // delegating here.
            DuplexCommand::Connect | DuplexCommand::Disconnect => {}
        }
    }

    async fn send_command(
        &mut self,
        sink: &mut WsSink,
        command: &ClientCommand,
    ) -> Result<(), DriftwireError> {
        let text = serde_json::to_string(command)?;
        sink.send(Message::Text(text.into())).await?;
        monitoring::COMMANDS_SENT_COUNTER.increment(1);
        trace!(kind = %command.kind, "command sent");
        let _ = self.bus.send(TransportEvent::CommandSent {
            kind: command.kind,
            topic: command.topic,
        });
        Ok(())
    }

    fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => {
                monitoring::MESSAGES_RECEIVED_COUNTER.increment(1);
                trace!(kind = %message.kind, "duplex message received");
                self.last_message_tx.send_replace(Some(message.clone()));
                let _ = self.messages.send(message.clone());
                let _ = self.bus.send(TransportEvent::MessageReceived(message));
            }
            Err(e) => {
                monitoring::DROPPED_FRAMES_COUNTER.increment(1);
                warn!(error = %e, "dropping malformed duplex frame");
            }
        }
    }

    /// Close frame from the server. The two no-error closure codes mean
    /// client intent and end the connection quietly; anything else is an
    /// abnormal closure and goes through the reconnect scheduler.
    fn handle_server_close(&mut self, frame: Option<CloseFrame>) {
        let clean = matches!(
            &frame,
            Some(f) if f.code == CloseCode::Normal || f.code == CloseCode::Away
        );
        if clean {
            info!("duplex channel closed by server with normal code");
            self.state.mark_closed();
            self.publish();
            monitoring::DUPLEX_CONNECTED_GAUGE.set(0.0);
            let _ = self.bus.send(TransportEvent::Disconnected {
                channel: ChannelKind::Duplex,
            });
        } else {
            self.schedule_retry(match frame {
                Some(f) => format!("abnormal close: {} {}", u16::from(f.code), f.reason),
                None => "abnormal close without close code".to_string(),
            });
        }
    }

    fn schedule_retry(&mut self, error: impl Into<String>) {
        let error = error.into();
        warn!(error = %error, "duplex channel lost");
        monitoring::DUPLEX_CONNECTED_GAUGE.set(0.0);
        monitoring::RECONNECT_COUNTER.increment(1);
        self.state.mark_reconnecting(error);
        self.publish();
    }

    /// Caller-intended teardown: retries suppressed, reconnect timer dead,
    /// heartbeat dropped with the connection scope. Repeat calls converge.
    fn finish_disconnect(&mut self) {
        let was_closed = self.state.phase == ChannelPhase::Closed;
        self.state.suppress_retries(self.config.reconnect_attempts);
        self.state.begin_close();
        self.state.mark_closed();
        self.publish();
        monitoring::DUPLEX_CONNECTED_GAUGE.set(0.0);
        if !was_closed {
            info!("duplex channel disconnected");
            let _ = self.bus.send(TransportEvent::Disconnected {
                channel: ChannelKind::Duplex,
            });
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.state.snapshot());
    }
}
