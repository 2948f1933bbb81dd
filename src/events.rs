/// file: src/events.rs
/// description: transport event bus decoupling the channel drivers from presentation
use crate::envelope::Envelope;
use crate::types::{CommandKind, ServerMessage, Topic};
use std::time::Duration;
use tokio::sync::broadcast;

/// Which channel a lifecycle notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Push,
    Duplex,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Duplex => write!(f, "duplex"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connecting {
        channel: ChannelKind,
        url: String,
    },
    Connected {
        channel: ChannelKind,
        connection_id: String,
    },
    /// A push-channel envelope was accepted into the ring buffer.
    EnvelopeReceived(Envelope),
    /// A duplex-channel response replaced the last-message slot.
    MessageReceived(ServerMessage),
    CommandSent {
        kind: CommandKind,
        topic: Option<Topic>,
    },
    Reconnecting {
        channel: ChannelKind,
        attempt: u32,
        delay: Duration,
    },
    RetriesExhausted {
        channel: ChannelKind,
        attempts: u32,
    },
    Disconnected {
        channel: ChannelKind,
    },
}

// Bounded so a stalled observer lags (and is told so) instead of growing the
// process; 1024 events rides out dashboard-scale bursts.
const EVENT_BUS_CAPACITY: usize = 1024;

/// Many independent observers tap the same bus; each `subscribe()` is its own
/// cursor, and dropping the receiver unsubscribes.
pub type EventBus = broadcast::Sender<TransportEvent>;
pub type EventBusReceiver = broadcast::Receiver<TransportEvent>;

pub fn create_event_bus() -> EventBus {
    broadcast::channel(EVENT_BUS_CAPACITY).0
}
