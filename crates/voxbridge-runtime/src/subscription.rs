//! Whisper subscription registry
//!
//! Channels carry a "manual" flag: manual entries were requested explicitly
//! and only an explicit manual unsubscribe (or `clear`) removes them.
//! Automatic entries follow whoever started playback and are pruned by
//! `restore`. Clients are a plain ordered set.
//!
//! The send loop never reads the maps directly. It holds an
//! `Arc<SubscriptionSnapshot>` and swaps it for a fresh one only when the
//! dirty flag says something changed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use voxbridge_core::{ChannelId, ClientId};

/// Immutable view of the whisper targets at one committed state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub channels: Vec<ChannelId>,
    pub clients: Vec<ClientId>,
}

impl SubscriptionSnapshot {
    /// No targets means broadcast
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.clients.is_empty()
    }
}

#[derive(Default)]
struct Targets {
    /// channel -> manually requested
    channels: BTreeMap<ChannelId, bool>,
    clients: Vec<ClientId>,
    snapshot: Arc<SubscriptionSnapshot>,
}

impl Targets {
    fn subscribe_channel(&mut self, channel: ChannelId, manual: bool) {
        let entry = self.channels.entry(channel).or_insert(false);
        *entry |= manual;
    }

    fn unsubscribe_channel(&mut self, channel: ChannelId, manual: bool) {
        if manual {
            self.channels.remove(&channel);
        } else if self.channels.get(&channel) == Some(&false) {
            self.channels.remove(&channel);
        }
    }

    fn restore(&mut self, channel: ChannelId) {
        self.subscribe_channel(channel, false);
        self.channels.retain(|id, manual| *manual || *id == channel);
    }

    fn subscribe_client(&mut self, client: ClientId) {
        if !self.clients.contains(&client) {
            self.clients.push(client);
        }
    }

    fn unsubscribe_client(&mut self, client: ClientId) {
        self.clients.retain(|c| *c != client);
    }

    fn clear(&mut self) {
        self.channels.clear();
        self.clients.clear();
    }

    fn build_snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            channels: self.channels.keys().copied().collect(),
            clients: self.clients.clone(),
        }
    }
}

/// Batch handle for several mutations committed under one lock
pub struct TargetBatch<'a> {
    targets: &'a mut Targets,
}

impl TargetBatch<'_> {
    pub fn subscribe_channel(&mut self, channel: ChannelId, manual: bool) -> &mut Self {
        self.targets.subscribe_channel(channel, manual);
        self
    }

    pub fn unsubscribe_channel(&mut self, channel: ChannelId, manual: bool) -> &mut Self {
        self.targets.unsubscribe_channel(channel, manual);
        self
    }

    pub fn subscribe_client(&mut self, client: ClientId) -> &mut Self {
        self.targets.subscribe_client(client);
        self
    }

    pub fn unsubscribe_client(&mut self, client: ClientId) -> &mut Self {
        self.targets.unsubscribe_client(client);
        self
    }
}

/// Channel and client whisper targets
#[derive(Default)]
pub struct SubscriptionRegistry {
    targets: Mutex<Targets>,
    dirty: AtomicBool,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a mutation and mark the snapshot stale while still holding the lock
    fn mutate<R>(&self, f: impl FnOnce(&mut Targets) -> R) -> R {
        let mut targets = self.targets.lock();
        let result = f(&mut targets);
        self.dirty.store(true, Ordering::Release);
        result
    }

    pub fn subscribe_channel(&self, channel: ChannelId, manual: bool) {
        trace!(%channel, manual, "subscribe channel");
        self.mutate(|t| t.subscribe_channel(channel, manual));
    }

    /// A manual unsubscribe always removes; an automatic one spares manual pins
    pub fn unsubscribe_channel(&self, channel: ChannelId, manual: bool) {
        trace!(%channel, manual, "unsubscribe channel");
        self.mutate(|t| t.unsubscribe_channel(channel, manual));
    }

    /// Follow `channel` and drop every other automatic subscription
    pub fn restore(&self, channel: ChannelId) {
        trace!(%channel, "restore subscriptions");
        self.mutate(|t| t.restore(channel));
    }

    pub fn subscribe_client(&self, client: ClientId) {
        self.mutate(|t| t.subscribe_client(client));
    }

    pub fn unsubscribe_client(&self, client: ClientId) {
        self.mutate(|t| t.unsubscribe_client(client));
    }

    /// Remove every channel and client target, manual pins included
    pub fn clear(&self) {
        self.mutate(Targets::clear);
    }

    /// Apply several changes atomically with respect to snapshots
    pub fn batch(&self, f: impl FnOnce(&mut TargetBatch<'_>)) {
        self.mutate(|targets| f(&mut TargetBatch { targets }));
    }

    /// `(channel, manual)` pairs in channel order
    pub fn channel_subscriptions(&self) -> Vec<(ChannelId, bool)> {
        self.targets
            .lock()
            .channels
            .iter()
            .map(|(id, manual)| (*id, *manual))
            .collect()
    }

    pub fn client_subscriptions(&self) -> Vec<ClientId> {
        self.targets.lock().clients.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Replace `cached` with the current snapshot if the registry changed
    ///
    /// Returns `true` if `cached` was replaced. The rebuild happens at most
    /// once per batch of changes no matter how many readers race here.
    pub fn refresh(&self, cached: &mut Arc<SubscriptionSnapshot>) -> bool {
        if !self.dirty.load(Ordering::Acquire) {
            return false;
        }

        let mut targets = self.targets.lock();
        if self.dirty.load(Ordering::Acquire) {
            targets.snapshot = Arc::new(targets.build_snapshot());
            self.dirty.store(false, Ordering::Release);
        }
        if Arc::ptr_eq(cached, &targets.snapshot) {
            return false;
        }
        *cached = Arc::clone(&targets.snapshot);
        true
    }

    /// Current snapshot, rebuilding it if stale
    pub fn snapshot(&self) -> Arc<SubscriptionSnapshot> {
        let mut cached = Arc::clone(&self.targets.lock().snapshot);
        self.refresh(&mut cached);
        cached
    }
}
