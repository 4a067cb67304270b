//! Resource subscription bookkeeping (spec §4.2).
//!
//! A subscription records which list-shaped URI a client cares about;
//! mutating tools call [`SubscriptionRegistry::notify_isbn_changed`] after
//! commit so updates are delivered in commit order (spec §5 ordering rule
//! (b)), never before.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::outbound::OutboundQueue;
use crate::protocol::{JsonRpcNotification, ResourceUpdatedNotification};
use crate::resources::uri::ResourceUri;

struct Subscription {
    uri: String,
    resource: ResourceUri,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, uri: &str, resource: ResourceUri) -> String {
        let id = Uuid::new_v4().to_string();
        self.subscriptions.lock().unwrap().insert(
            id.clone(),
            Subscription {
                uri: uri.to_string(),
                resource,
            },
        );
        id
    }

    /// Unknown ids are a no-op (spec §4.2).
    pub fn unsubscribe(&self, subscription_id: &str) {
        self.subscriptions.lock().unwrap().remove(subscription_id);
    }

    /// Notifies every subscription whose query result a change to `isbn`
    /// (in `genre`, by `author_id`) could affect.
    pub fn notify_isbn_changed(
        &self,
        outbound: &OutboundQueue,
        isbn: &str,
        author_id: &str,
        genre: &str,
        diff: serde_json::Value,
    ) {
        let subscriptions = self.subscriptions.lock().unwrap();
        for (id, sub) in subscriptions.iter() {
            let relevant = match &sub.resource {
                ResourceUri::Books => true,
                ResourceUri::AuthorBooks { author_id: a } => a == author_id,
                ResourceUri::GenreBooks { genre: g } => g.as_str() == genre,
                _ => false,
            };
            if relevant {
                outbound.send_notification(JsonRpcNotification::new(
                    crate::protocol::methods::NOTIFICATIONS_RESOURCES_UPDATED,
                    serde_json::to_value(ResourceUpdatedNotification {
                        subscription_id: id.clone(),
                        uri: sub.uri.clone(),
                        diff: diff.clone(),
                    })
                    .unwrap_or(serde_json::Value::Null),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_unknown_id_is_noop() {
        let registry = SubscriptionRegistry::new();
        registry.unsubscribe("does-not-exist");
    }

    #[test]
    fn subscribe_returns_unique_ids() {
        let registry = SubscriptionRegistry::new();
        let a = registry.subscribe("library://books", ResourceUri::Books);
        let b = registry.subscribe("library://books", ResourceUri::Books);
        assert_ne!(a, b);
    }
}
