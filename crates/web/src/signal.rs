//! Request lifecycle signals.
//!
//! The dispatcher owns two [`Signal`]s: `started` fires before a request is
//! decoded and `finished` after its response has been handed over (for a
//! streaming response: once the body is drained). Listeners are stored in an
//! `ArcSwap`, so sending never takes a lock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Started,
    Finished,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a connected listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

pub struct Signal {
    event: LifecycleEvent,
    listeners: ArcSwap<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("event", &self.event).field("receivers", &self.receivers_len()).finish()
    }
}

impl Signal {
    pub fn new(event: LifecycleEvent) -> Self {
        Self { event, listeners: ArcSwap::from_pointee(Vec::new()), next_id: AtomicU64::new(0) }
    }

    pub fn event(&self) -> LifecycleEvent {
        self.event
    }

    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);

        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push((id, Arc::clone(&listener)));
            next
        });

        id
    }

    /// Removes a listener; returns whether it was connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let previous = self.listeners.rcu(|current| {
            current.iter().filter(|(listener_id, _)| *listener_id != id).cloned().collect::<Vec<_>>()
        });
        previous.iter().any(|(listener_id, _)| *listener_id == id)
    }

    /// Calls every listener, in connection order.
    pub fn send(&self) {
        let listeners = self.listeners.load();
        for (_, listener) in listeners.iter() {
            listener(self.event);
        }
    }

    pub fn receivers_len(&self) -> usize {
        self.listeners.load().len()
    }
}

#[derive(Debug, Clone)]
pub struct Signals {
    pub started: Arc<Signal>,
    pub finished: Arc<Signal>,
}

impl Default for Signals {
    fn default() -> Self {
        Self {
            started: Arc::new(Signal::new(LifecycleEvent::Started)),
            finished: Arc::new(Signal::new(LifecycleEvent::Finished)),
        }
    }
}
