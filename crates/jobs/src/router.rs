// crates/jobs/src/router.rs
//! Resource-scoped fan-out of job events to connected subscribers.
//!
//! A scope is the set of subscribers currently interested in one resource.
//! Publishing delivers to exactly that set; nothing is buffered for
//! subscribers that join later.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::event::JobEvent;
use crate::types::ResourceId;

/// Identity of one realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriberId(pub Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The remote end is gone; the subscriber is dropped from the scope.
    #[error("subscriber closed")]
    Closed,
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Transport-side delivery of events to one connection.
///
/// Implementations must not block: the router calls `deliver` while holding
/// the scope's lock.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &JobEvent) -> Result<(), DeliveryError>;
}

impl EventSink for mpsc::UnboundedSender<JobEvent> {
    fn deliver(&self, event: &JobEvent) -> Result<(), DeliveryError> {
        self.send(event.clone()).map_err(|_| DeliveryError::Closed)
    }
}

/// A connection's identity paired with its sink.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    sink: Arc<dyn EventSink>,
}

impl Subscriber {
    pub fn new(id: SubscriberId, sink: Arc<dyn EventSink>) -> Self {
        Self { id, sink }
    }

    /// Subscriber backed by an unbounded channel. Handy for in-process consumers.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(SubscriberId::new(), Arc::new(tx)), rx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

/// Scope membership and event delivery.
///
/// Publishing takes the scope's write lock so every member observes one
/// scope's events in publish order. Unrelated scopes live on independent
/// shards and do not contend.
///
/// Membership changes hold the subscriber's `memberships` entry while they
/// edit `scopes`, so the two maps never disagree. Lock order is always
/// `memberships` then `scopes`; `publish` releases its scope guard before it
/// prunes closed subscribers.
#[derive(Default)]
pub struct SubscriptionRouter {
    scopes: DashMap<ResourceId, HashMap<SubscriberId, Subscriber>>,
    memberships: DashMap<SubscriberId, HashSet<ResourceId>>,
}

impl SubscriptionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subscriber` to `resource_id`'s scope. Joining twice is the same as joining once.
    pub fn join(&self, resource_id: &ResourceId, subscriber: Subscriber) {
        let id = subscriber.id;
        let mut memberships = self.memberships.entry(id).or_default();
        self.scopes
            .entry(resource_id.clone())
            .or_default()
            .insert(id, subscriber);
        memberships.insert(resource_id.clone());
        drop(memberships);
        tracing::debug!(subscriber_id = %id, resource_id = %resource_id, "joined scope");
    }

    /// Remove `subscriber` from one scope. No-op if it is not a member.
    pub fn leave(&self, resource_id: &ResourceId, subscriber: SubscriberId) {
        match self.memberships.get_mut(&subscriber) {
            Some(mut scopes) => {
                self.remove_member(resource_id, subscriber);
                scopes.remove(resource_id);
            }
            None => self.remove_member(resource_id, subscriber),
        }
        self.memberships
            .remove_if(&subscriber, |_, scopes| scopes.is_empty());
    }

    /// Remove `subscriber` from every scope. Called when a connection closes.
    pub fn leave_all(&self, subscriber: SubscriberId) {
        let Entry::Occupied(entry) = self.memberships.entry(subscriber) else {
            return;
        };
        for resource_id in entry.get() {
            self.remove_member(resource_id, subscriber);
        }
        let (_, scopes) = entry.remove_entry();
        tracing::debug!(subscriber_id = %subscriber, scopes = scopes.len(), "left all scopes");
    }

    /// Deliver `event` to every current member of `resource_id`'s scope.
    ///
    /// Best-effort: a failing sink is logged and skipped, closed sinks are
    /// dropped. Returns the number of successful deliveries.
    pub fn publish(&self, resource_id: &ResourceId, event: &JobEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        if let Some(mut scope) = self.scopes.get_mut(resource_id) {
            for (id, subscriber) in scope.iter() {
                match subscriber.sink.deliver(event) {
                    Ok(()) => delivered += 1,
                    Err(DeliveryError::Closed) => closed.push(*id),
                    Err(e) => {
                        tracing::warn!(subscriber_id = %id, resource_id = %resource_id, error = %e, "event delivery failed");
                    }
                }
            }
            for id in &closed {
                scope.remove(id);
            }
        }

        for id in closed {
            tracing::debug!(subscriber_id = %id, resource_id = %resource_id, "dropping closed subscriber");
            self.leave(resource_id, id);
        }

        crate::metrics::record_publish(event.job.kind, delivered);
        delivered
    }

    /// Current members of a scope.
    pub fn members(&self, resource_id: &ResourceId) -> Vec<SubscriberId> {
        self.scopes
            .get(resource_id)
            .map(|scope| scope.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Scopes a subscriber currently belongs to.
    pub fn scopes_of(&self, subscriber: SubscriberId) -> Vec<ResourceId> {
        self.memberships
            .get(&subscriber)
            .map(|scopes| scopes.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of non-empty scopes.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    fn remove_member(&self, resource_id: &ResourceId, subscriber: SubscriberId) {
        if let Some(mut scope) = self.scopes.get_mut(resource_id) {
            scope.remove(&subscriber);
        }
        self.scopes.remove_if(resource_id, |_, scope| scope.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Job, JobKind};
    use serde_json::json;

    fn rid(s: &str) -> ResourceId {
        ResourceId::new(s).unwrap()
    }

    fn event_for(resource: &str) -> JobEvent {
        JobEvent::finished(&Job::new(rid(resource), JobKind::Build, json!({})))
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn deliver(&self, _event: &JobEvent) -> Result<(), DeliveryError> {
            Err(DeliveryError::Rejected("socket buffer full".into()))
        }
    }

    #[test]
    fn test_join_is_idempotent() {
        let router = SubscriptionRouter::new();
        let (sub, mut rx) = Subscriber::channel();
        let id = sub.id();

        router.join(&rid("p1"), sub.clone());
        router.join(&rid("p1"), sub);
        assert_eq!(router.members(&rid("p1")), vec![id]);
        assert_eq!(router.scopes_of(id), vec![rid("p1")]);

        assert_eq!(router.publish(&rid("p1"), &event_for("p1")), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_to_empty_scope_is_noop() {
        let router = SubscriptionRouter::new();
        assert_eq!(router.publish(&rid("nobody"), &event_for("nobody")), 0);
        assert_eq!(router.scope_count(), 0);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let router = SubscriptionRouter::new();
        let (a, mut rx_a) = Subscriber::channel();
        let (b, mut rx_b) = Subscriber::channel();
        router.join(&rid("p1"), a);
        router.join(&rid("p2"), b);

        router.publish(&rid("p1"), &event_for("p1"));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_leave_and_leave_all() {
        let router = SubscriptionRouter::new();
        let (sub, mut rx) = Subscriber::channel();
        let id = sub.id();
        router.join(&rid("p1"), sub.clone());
        router.join(&rid("p2"), sub);

        router.leave(&rid("p1"), id);
        // Leaving a scope twice, or one never joined, is a no-op.
        router.leave(&rid("p1"), id);
        router.leave(&rid("p3"), id);
        assert_eq!(router.scopes_of(id), vec![rid("p2")]);
        assert_eq!(router.publish(&rid("p1"), &event_for("p1")), 0);
        assert!(rx.try_recv().is_err());

        router.leave_all(id);
        assert!(router.scopes_of(id).is_empty());
        assert_eq!(router.scope_count(), 0);
        assert_eq!(router.publish(&rid("p2"), &event_for("p2")), 0);
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let router = SubscriptionRouter::new();
        let failing = Subscriber::new(SubscriberId::new(), Arc::new(FailingSink));
        let (ok, mut rx) = Subscriber::channel();
        router.join(&rid("p1"), failing.clone());
        router.join(&rid("p1"), ok);

        assert_eq!(router.publish(&rid("p1"), &event_for("p1")), 1);
        assert!(rx.try_recv().is_ok());
        // Rejected (not closed) sinks stay subscribed.
        assert!(router.members(&rid("p1")).contains(&failing.id()));
    }

    #[test]
    fn test_closed_sink_is_pruned() {
        let router = SubscriptionRouter::new();
        let (sub, rx) = Subscriber::channel();
        let id = sub.id();
        router.join(&rid("p1"), sub);
        drop(rx);

        assert_eq!(router.publish(&rid("p1"), &event_for("p1")), 0);
        assert!(router.members(&rid("p1")).is_empty());
        assert!(router.scopes_of(id).is_empty());
    }

    #[test]
    fn test_no_retroactive_delivery() {
        let router = SubscriptionRouter::new();
        for _ in 0..3 {
            router.publish(&rid("p1"), &event_for("p1"));
        }
        let (late, mut rx) = Subscriber::channel();
        router.join(&rid("p1"), late);
        assert!(rx.try_recv().is_err());

        router.publish(&rid("p1"), &event_for("p1"));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_per_scope_order_is_publish_order() {
        let router = SubscriptionRouter::new();
        let (sub, mut rx) = Subscriber::channel();
        router.join(&rid("p1"), sub);

        let events: Vec<JobEvent> = (0..5).map(|_| event_for("p1")).collect();
        for event in &events {
            router.publish(&rid("p1"), event);
        }
        for expected in &events {
            assert_eq!(rx.try_recv().unwrap().job.id, expected.job.id);
        }
    }

    #[test]
    fn test_concurrent_join_and_leave_all_stay_consistent() {
        let router = SubscriptionRouter::new();
        let (sub, _rx) = Subscriber::channel();
        let id = sub.id();

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..2_000 {
                    router.join(&rid(&format!("p{}", i % 8)), sub.clone());
                }
            });
            s.spawn(|| {
                for _ in 0..2_000 {
                    router.leave_all(id);
                }
            });
        });

        router.leave_all(id);
        assert_eq!(router.scope_count(), 0);
        assert!(router.scopes_of(id).is_empty());
    }
}
