// file: src/subscriptions.rs
// description: duplex-channel topic registry, replayed after every open

use crate::types::Topic;
use std::collections::BTreeSet;

/// Active subscriptions for the duplex channel.
///
/// Membership persists across reconnects; the driver replays the whole set
/// after every successful open. The baseline `all` subscription is implicit
/// and always replayed first, whether or not the caller asked for it.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    topics: BTreeSet<Topic>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the topic was not already present.
    pub fn insert(&mut self, topic: Topic) -> bool {
        self.topics.insert(topic)
    }

    /// Returns true when the topic was present.
    pub fn remove(&mut self, topic: Topic) -> bool {
        self.topics.remove(&topic)
    }

    pub fn contains(&self, topic: Topic) -> bool {
        self.topics.contains(&topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Topics to subscribe after an open: `all` first, then the caller's
    /// topics. The relative order of the rest is not significant but is kept
    /// stable for logging.
    pub fn replay(&self) -> Vec<Topic> {
        let mut order = vec![Topic::All];
        order.extend(self.topics.iter().copied().filter(|t| *t != Topic::All));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_leads_with_all_even_when_empty() {
        let set = SubscriptionSet::new();
        assert_eq!(set.replay(), vec![Topic::All]);
    }

    #[test]
    fn replay_does_not_duplicate_an_explicit_all() {
        let mut set = SubscriptionSet::new();
        set.insert(Topic::All);
        set.insert(Topic::Stats);
        assert_eq!(set.replay(), vec![Topic::All, Topic::Stats]);
    }

    #[test]
    fn caller_topics_follow_the_baseline() {
        let mut set = SubscriptionSet::new();
        set.insert(Topic::Stats);
        set.insert(Topic::Drifts);

        let replay = set.replay();
        assert_eq!(replay[0], Topic::All);
        assert_eq!(replay.len(), 3);
        assert!(replay.contains(&Topic::Drifts));
        assert!(replay.contains(&Topic::Stats));
    }

    #[test]
    fn insert_and_remove_report_membership_changes() {
        let mut set = SubscriptionSet::new();
        assert!(set.insert(Topic::Drifts));
        assert!(!set.insert(Topic::Drifts));
        assert!(set.contains(Topic::Drifts));

        assert!(set.remove(Topic::Drifts));
        assert!(!set.remove(Topic::Drifts));
        assert!(set.is_empty());
    }
}
