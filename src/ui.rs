/// file: src/ui.rs
/// description: terminal presentation loop over the transport event bus
use crate::{
    envelope::Envelope,
    events::{EventBusReceiver, TransportEvent},
    types::ServerMessage,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// ANSI color table for status output.
pub struct Colors;

#[allow(dead_code)]
impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";
    pub const WHITE: &'static str = "\x1b[37m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
}

/// Prints connection lifecycle and inbound events as they arrive. This is the
/// binary's stand-in for the dashboard: it only reads what the transport
/// layer exposes.
pub struct StatusPrinter {
    events: EventBusReceiver,
    quiet: bool,
}

impl StatusPrinter {
    pub fn new(events: EventBusReceiver, quiet: bool) -> Self {
        Self { events, quiet }
    }

    pub async fn run(&mut self) {
        loop {
            match self.events.recv().await {
                Ok(event) => self.handle_event(event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "printer lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connecting { channel, url } => {
                self.print_status("CONNECTING", Colors::BRIGHT_YELLOW, &format!("{channel} -> {url}"));
            }
            TransportEvent::Connected {
                channel,
                connection_id,
            } => {
                self.print_status(
                    "CONNECTED",
                    Colors::BRIGHT_GREEN,
                    &format!("{channel} (id {connection_id})"),
                );
            }
            TransportEvent::EnvelopeReceived(envelope) => self.print_envelope(&envelope),
            TransportEvent::MessageReceived(message) => self.print_message(&message),
            TransportEvent::CommandSent { kind, topic } => {
                if !self.quiet {
                    let topic = topic.map(|t| format!(" {t}")).unwrap_or_default();
                    println!(
                        "{}{}[SENT]{} > {kind}{topic}",
                        Colors::BOLD,
                        Colors::BRIGHT_MAGENTA,
                        Colors::RESET
                    );
                }
            }
            TransportEvent::Reconnecting {
                channel,
                attempt,
                delay,
            } => {
                self.print_status(
                    "RECONNECTING",
                    Colors::BRIGHT_YELLOW,
                    &format!("{channel} attempt {attempt} in {}ms", delay.as_millis()),
                );
            }
            TransportEvent::RetriesExhausted { channel, attempts } => {
                self.print_status(
                    "FAILED",
                    Colors::BRIGHT_RED,
                    &format!("{channel} gave up after {attempts} attempts"),
                );
            }
            TransportEvent::Disconnected { channel } => {
                self.print_status("DISCONNECTED", Colors::BRIGHT_RED, &channel.to_string());
            }
        }
    }

    fn print_status(&self, status: &str, color: &str, message: &str) {
        println!(
            "{}{}[{}]{} {}{}{}",
            Colors::BOLD,
            color,
            status,
            Colors::RESET,
            Colors::WHITE,
            message,
            Colors::RESET
        );
    }

    fn print_envelope(&self, envelope: &Envelope) {
        if self.quiet {
            return;
        }
        println!(
            "{}{}{}{} {}{}{} {}",
            Colors::DIM,
            envelope.timestamp.format("%H:%M:%S%.3f"),
            Colors::RESET,
            Colors::BOLD,
            Colors::BRIGHT_CYAN,
            envelope.kind,
            Colors::RESET,
            envelope.data
        );
    }

    fn print_message(&self, message: &ServerMessage) {
        if self.quiet {
            return;
        }
        let envelope = message.to_envelope();
        self.print_envelope(&envelope);
    }
}
