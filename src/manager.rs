// file: src/manager.rs
// description: composition-root owner of both channel clients

use crate::{
    config::Config,
    duplex::DuplexClient,
    events::{EventBus, EventBusReceiver, create_event_bus},
    push::PushClient,
    status::{self, LinkStatus},
    types::Topic,
};
use tracing::info;

/// Owns one push client and one duplex client — the "at most one live socket
/// per channel" invariant lives here instead of in hidden globals. Construct
/// it at the application's composition root and hand references to consumers.
pub struct ConnectionManager {
    pub push: PushClient,
    pub duplex: DuplexClient,
    bus: EventBus,
}

impl ConnectionManager {
    pub fn start(config: Config) -> Self {
        let bus = create_event_bus();
        let push = PushClient::spawn(config.push, bus.clone());
        let duplex = DuplexClient::spawn(config.duplex, bus.clone());
        Self { push, duplex, bus }
    }

    /// Subscribe the caller's initial duplex topics (the baseline `all` is
    /// implicit and always active).
    pub fn subscribe_topics(&self, topics: impl IntoIterator<Item = Topic>) {
        for topic in topics {
            self.duplex.subscribe(topic);
        }
    }

    /// Aggregated presentation status; tolerates channels that never
    /// connected.
    pub fn status(&self) -> LinkStatus {
        status::aggregate(&self.push.status(), &self.duplex.status())
    }

    pub fn is_live(&self) -> bool {
        status::is_live(&self.push.status(), &self.duplex.status())
    }

    /// Tap the transport event bus; each receiver is an independent observer.
    pub fn subscribe(&self) -> EventBusReceiver {
        self.bus.subscribe()
    }

    /// Disconnect both channels. Called on shutdown; dropping the manager has
    /// the same effect through each client's handle drop.
    pub fn shutdown(&self) {
        info!("shutting down both channels");
        self.push.disconnect();
        self.duplex.disconnect();
    }
}
