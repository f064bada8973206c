use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use crate::models::{ProjectId, TrackedSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    SessionChanged(TrackedSession),
    BreakChanged { project: Option<ProjectId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerEvent {
    pub origin: Option<WidgetId>,
    pub kind: EventKind,
}

pub trait BusListener: Send + Sync {
    fn on_event(&self, event: &TrackerEvent);
}

struct Entry {
    id: u64,
    listener: Weak<dyn BusListener>,
}

#[derive(Default)]
struct Shared {
    listeners: Mutex<Vec<Entry>>,
    latest: Mutex<Option<TrackerEvent>>,
    next_id: AtomicU64,
}

#[derive(Clone, Default)]
pub struct EventBus {
    shared: Arc<Shared>,
}

pub struct Subscription {
    id: u64,
    bus: Weak<Shared>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Weak<dyn BusListener>) -> Subscription {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry { id, listener });
        Subscription {
            id,
            bus: Arc::downgrade(&self.shared),
        }
    }

    pub fn subscribe_replaying(&self, listener: Weak<dyn BusListener>) -> Subscription {
        let replay = self.latest();
        let target = listener.upgrade();
        let subscription = self.subscribe(listener);
        if let (Some(event), Some(target)) = (replay, target) {
            target.on_event(&event);
        }
        subscription
    }

    pub fn publish(&self, event: TrackerEvent) -> usize {
        *self.shared.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(event.clone());

        // Snapshot so listeners may publish or (un)subscribe re-entrantly.
        let targets: Vec<Arc<dyn BusListener>> = {
            let mut listeners = self
                .shared
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            listeners.retain(|entry| entry.listener.strong_count() > 0);
            listeners
                .iter()
                .filter_map(|entry| entry.listener.upgrade())
                .collect()
        };

        debug!(listeners = targets.len(), origin = ?event.origin, "publishing tracker event");
        for target in &targets {
            target.on_event(&event);
        }
        targets.len()
    }

    pub fn latest(&self) -> Option<TrackerEvent> {
        self.shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn listener_count(&self) -> usize {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.listener.strong_count() > 0)
            .count()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.bus.upgrade() {
            shared
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|entry| entry.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackerStatus;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<TrackerEvent>>,
    }

    impl BusListener for Recorder {
        fn on_event(&self, event: &TrackerEvent) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    fn weak(recorder: &Arc<Recorder>) -> Weak<dyn BusListener> {
        let as_listener: Arc<dyn BusListener> = recorder.clone();
        Arc::downgrade(&as_listener)
    }

    fn session_event(origin: u64, seconds: u64) -> TrackerEvent {
        TrackerEvent {
            origin: Some(WidgetId(origin)),
            kind: EventKind::SessionChanged(TrackedSession {
                member: Some(1),
                project: Some(42),
                status: TrackerStatus::Active,
                total_seconds: seconds,
            }),
        }
    }

    #[test]
    fn test_publish_reaches_every_listener() {
        let bus = EventBus::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let _sa = bus.subscribe(weak(&a));
        let _sb = bus.subscribe(weak(&b));

        assert_eq!(bus.publish(session_event(1, 10)), 2);
        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 1);
    }

    #[test]
    fn test_dropped_subscription_stops_delivery() {
        let bus = EventBus::new();
        let a = Arc::new(Recorder::default());
        let sub = bus.subscribe(weak(&a));
        drop(sub);

        assert_eq!(bus.publish(session_event(1, 10)), 0);
        assert_eq!(a.count(), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_dead_listener_is_pruned() {
        let bus = EventBus::new();
        let a = Arc::new(Recorder::default());
        let _sub = bus.subscribe(weak(&a));
        drop(a);

        assert_eq!(bus.publish(session_event(1, 10)), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_late_subscriber_misses_without_replay() {
        let bus = EventBus::new();
        bus.publish(session_event(1, 10));

        let late = Arc::new(Recorder::default());
        let _sub = bus.subscribe(weak(&late));
        assert_eq!(late.count(), 0);
    }

    #[test]
    fn test_late_subscriber_replays_latest() {
        let bus = EventBus::new();
        bus.publish(session_event(1, 10));
        bus.publish(session_event(1, 20));

        let late = Arc::new(Recorder::default());
        let _sub = bus.subscribe_replaying(weak(&late));
        let seen = late.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], session_event(1, 20));
    }

    #[test]
    fn test_replay_with_empty_history() {
        let bus = EventBus::new();
        let late = Arc::new(Recorder::default());
        let _sub = bus.subscribe_replaying(weak(&late));
        assert_eq!(late.count(), 0);
        assert_eq!(bus.latest(), None);
    }

    #[test]
    fn test_clones_share_listeners() {
        let bus = EventBus::new();
        let other = bus.clone();
        let a = Arc::new(Recorder::default());
        let _sub = bus.subscribe(weak(&a));

        other.publish(session_event(2, 5));
        assert_eq!(a.count(), 1);
        assert_eq!(bus.latest(), Some(session_event(2, 5)));
    }
}
