//! Change notification.
//!
//! After every committed mutation the engine publishes the document to
//! everyone subscribed to the widget's channel. One channel per
//! conversation; subscribers are plain `std::sync::mpsc` receivers so a
//! session can drain them from any thread.
//!
//! A participant subscribes as themselves and receives the copy
//! [`redact_for`] allows them to see. Server-side consumers use
//! [`ChannelHub::observe`] and receive every document unredacted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, mpsc};

use serde::{Deserialize, Serialize};

use crate::model::{Actor, ActorId, ChannelKey, WidgetDocument};
use crate::view::redact_for;

/// One outbound update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub channel: ChannelKey,
    pub document: WidgetDocument,
}

/// Sink for committed documents.
pub trait Notifier: Send + Sync {
    /// Deliver `document` to every subscriber of `channel`. Returns how many
    /// subscribers received it.
    fn publish(&self, channel: &ChannelKey, document: &WidgetDocument) -> usize;
}

/// Notifier that drops everything. Useful for tests and batch tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn publish(&self, _channel: &ChannelKey, _document: &WidgetDocument) -> usize {
        0
    }
}

/// Receiving end handed to a subscriber.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub channel: ChannelKey,
    pub receiver: mpsc::Receiver<Broadcast>,
}

impl Subscription {
    /// Drain every broadcast queued so far without blocking.
    pub fn drain(&self) -> Vec<Broadcast> {
        self.receiver.try_iter().collect()
    }
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    /// `None` for an observer.
    viewer: Option<ActorId>,
    sender: mpsc::Sender<Broadcast>,
}

type Senders = Vec<Subscriber>;

/// In-process fan-out keyed by channel.
#[derive(Debug, Default)]
pub struct ChannelHub {
    channels: RwLock<HashMap<ChannelKey, Senders>>,
    next_id: AtomicU64,
}

impl ChannelHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `viewer` on `channel`. Hidden votes of other participants
    /// are removed from everything this subscription receives.
    pub fn subscribe(&self, channel: &ChannelKey, viewer: &Actor) -> Subscription {
        self.register(channel, Some(viewer.id.clone()))
    }

    /// Register a server-side consumer that receives every document whole.
    pub fn observe(&self, channel: &ChannelKey) -> Subscription {
        self.register(channel, None)
    }

    fn register(&self, channel: &ChannelKey, viewer: Option<ActorId>) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let observer = viewer.is_none();
        let subscriber = Subscriber { id, viewer, sender };
        match self.channels.write() {
            Ok(mut channels) => channels.entry(channel.clone()).or_default().push(subscriber),
            Err(poisoned) => poisoned
                .into_inner()
                .entry(channel.clone())
                .or_default()
                .push(subscriber),
        }
        tracing::debug!(%channel, subscriber = id, observer, "subscribed");
        Subscription {
            id,
            channel: channel.clone(),
            receiver,
        }
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut channels = match self.channels.write() {
            Ok(channels) => channels,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(senders) = channels.get_mut(&subscription.channel) else {
            return false;
        };
        let before = senders.len();
        senders.retain(|s| s.id != subscription.id);
        let removed = senders.len() < before;
        if senders.is_empty() {
            channels.remove(&subscription.channel);
        }
        removed
    }

    /// Number of live subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &ChannelKey) -> usize {
        self.channels
            .read()
            .map_or(0, |channels| channels.get(channel).map_or(0, Vec::len))
    }
}

impl Notifier for ChannelHub {
    fn publish(&self, channel: &ChannelKey, document: &WidgetDocument) -> usize {
        let mut channels = match self.channels.write() {
            Ok(channels) => channels,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(senders) = channels.get_mut(channel) else {
            return 0;
        };

        let before = senders.len();
        senders.retain(|subscriber| {
            let document = match &subscriber.viewer {
                Some(viewer) => redact_for(document, viewer),
                None => document.clone(),
            };
            subscriber
                .sender
                .send(Broadcast {
                    channel: channel.clone(),
                    document,
                })
                .is_ok()
        });
        let delivered = senders.len();
        if delivered < before {
            tracing::debug!(%channel, pruned = before - delivered, "dropped closed subscribers");
        }
        if senders.is_empty() {
            channels.remove(channel);
        }
        delivered
    }
}
