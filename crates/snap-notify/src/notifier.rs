use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use snap_types::ContentEvent;

use crate::error::{NotifyError, Result};

/// Shared secret used when none is configured.
pub const DEFAULT_TOKEN: &str = "snapmenu-secret-token";

/// Configuration for the [`ChangeNotifier`].
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    /// Token clients must present to subscribe.
    pub token: String,
    /// Capacity of the shared event channel. A subscriber further behind
    /// than this loses the oldest messages.
    pub channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN.to_string(),
            channel_capacity: 64,
        }
    }
}

/// Receiving end held by one connected client.
pub struct Subscription {
    id: u64,
    receiver: broadcast::Receiver<ContentEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. Missed events are skipped with a warning.
    pub async fn next(&mut self) -> Result<ContentEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(subscriber = self.id, missed, "subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => return Err(NotifyError::Closed),
            }
        }
    }
}

/// Fan-out of content events to token-admitted subscribers.
///
/// All subscribers share one broadcast channel, so a subscriber only sees
/// events sent after it subscribed.
pub struct ChangeNotifier {
    config: NotifierConfig,
    sender: broadcast::Sender<ContentEvent>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            config,
            sender,
            next_id: AtomicU64::new(1),
        }
    }

    /// Check a connection token against the shared secret.
    pub fn admit(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(t) if t == self.config.token => Ok(()),
            _ => {
                debug!("subscription refused: bad or missing token");
                Err(NotifyError::Unauthorized)
            }
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let receiver = self.sender.subscribe();
        info!(subscriber = id, "client subscribed to content updates");
        Subscription { id, receiver }
    }

    /// Send `event` to every open subscriber and return how many were
    /// reached. Dropped subscriptions no longer count.
    pub fn broadcast(&self, event: &ContentEvent) -> usize {
        let delivered = self.sender.send(event.clone()).unwrap_or(0);
        debug!(delivered, "content event broadcast");
        delivered
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(n: i64) -> ContentEvent {
        ContentEvent::content_update(json!({ "n": n }))
    }

    #[test]
    fn admit_checks_token() {
        let notifier = ChangeNotifier::new(NotifierConfig {
            token: "s3cret".into(),
            ..Default::default()
        });
        assert!(notifier.admit(Some("s3cret")).is_ok());
        assert!(matches!(notifier.admit(Some("wrong")), Err(NotifyError::Unauthorized)));
        assert!(matches!(notifier.admit(None), Err(NotifyError::Unauthorized)));
    }

    #[test]
    fn broadcast_without_subscribers() {
        let notifier = ChangeNotifier::default();
        assert_eq!(notifier.broadcast(&event(1)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives() {
        let notifier = ChangeNotifier::default();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        assert_ne!(a.id(), b.id());

        assert_eq!(notifier.broadcast(&event(7)), 2);
        assert_eq!(a.next().await.unwrap(), event(7));
        assert_eq!(b.next().await.unwrap(), event(7));
    }

    #[tokio::test]
    async fn dropped_subscribers_are_not_counted() {
        let notifier = ChangeNotifier::default();
        let mut kept = notifier.subscribe();
        let gone = notifier.subscribe();
        drop(gone);

        assert_eq!(notifier.broadcast(&event(1)), 1);
        assert_eq!(notifier.subscriber_count(), 1);
        assert_eq!(kept.next().await.unwrap(), event(1));
    }

    #[tokio::test]
    async fn per_connection_order_is_kept() {
        let notifier = ChangeNotifier::default();
        let mut sub = notifier.subscribe();
        for n in 0..5 {
            notifier.broadcast(&event(n));
        }
        for n in 0..5 {
            assert_eq!(sub.next().await.unwrap(), event(n));
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_recent() {
        let notifier = ChangeNotifier::new(NotifierConfig {
            channel_capacity: 2,
            ..Default::default()
        });
        let mut sub = notifier.subscribe();
        for n in 0..5 {
            notifier.broadcast(&event(n));
        }
        assert_eq!(sub.next().await.unwrap(), event(3));
        assert_eq!(sub.next().await.unwrap(), event(4));
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let notifier = ChangeNotifier::default();
        notifier.broadcast(&event(1));
        let mut sub = notifier.subscribe();
        notifier.broadcast(&event(2));
        assert_eq!(sub.next().await.unwrap(), event(2));
    }
}
