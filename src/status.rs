// file: src/status.rs
// description: presentation-facing status derived from both channel snapshots

use crate::state::ChannelStatus;

/// Qualitative link status across both channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// At least one channel is open.
    Live,
    /// Nothing open yet, but a connect or reconnect is in flight.
    Connecting,
    /// Neither channel is usable.
    Offline,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Connecting => write!(f, "connecting"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// The link is treated as live when either channel is open.
pub fn is_live(push: &ChannelStatus, duplex: &ChannelStatus) -> bool {
    push.is_connected() || duplex.is_connected()
}

/// Pure derivation over two snapshots; owns no state and tolerates channels
/// that have never connected.
pub fn aggregate(push: &ChannelStatus, duplex: &ChannelStatus) -> LinkStatus {
    if is_live(push, duplex) {
        LinkStatus::Live
    } else if push.is_connecting() || duplex.is_connecting() {
        LinkStatus::Connecting
    } else {
        LinkStatus::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChannelState;

    fn open() -> ChannelStatus {
        let mut state = ChannelState::new();
        state.begin_connect();
        state.mark_open("c".to_string());
        state.snapshot()
    }

    fn connecting() -> ChannelStatus {
        let mut state = ChannelState::new();
        state.begin_connect();
        state.snapshot()
    }

    fn failed() -> ChannelStatus {
        let mut state = ChannelState::new();
        state.begin_connect();
        state.mark_reconnecting("refused");
        state.mark_failed(3);
        state.snapshot()
    }

    #[test]
    fn never_connected_defaults_to_offline() {
        let (push, duplex) = (ChannelStatus::default(), ChannelStatus::default());
        assert_eq!(aggregate(&push, &duplex), LinkStatus::Offline);
        assert!(!is_live(&push, &duplex));
    }

    #[test]
    fn either_open_channel_makes_the_link_live() {
        assert_eq!(aggregate(&open(), &ChannelStatus::default()), LinkStatus::Live);
        assert_eq!(aggregate(&ChannelStatus::default(), &open()), LinkStatus::Live);
        assert_eq!(aggregate(&open(), &open()), LinkStatus::Live);
        assert!(is_live(&open(), &failed()));
    }

    #[test]
    fn connecting_outranks_offline_but_not_live() {
        assert_eq!(
            aggregate(&connecting(), &ChannelStatus::default()),
            LinkStatus::Connecting
        );
        assert_eq!(aggregate(&connecting(), &open()), LinkStatus::Live);
    }

    #[test]
    fn exhausted_channels_read_as_offline() {
        assert_eq!(aggregate(&failed(), &failed()), LinkStatus::Offline);
    }
}
