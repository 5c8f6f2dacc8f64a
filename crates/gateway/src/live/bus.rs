//! Live event fanout.
//!
//! Tracks two disjoint collections of WebSocket sessions: **unfiltered**
//! sessions receive every event; sessions subscribed to a trace receive
//! only that trace's events. Each session owns an outbound queue of
//! pre-serialized frames drained by its socket writer task.
//!
//! There is no back-pressure: a session whose queue is full or whose
//! receiver is gone fails `try_send` and is removed from every registry
//! before the next broadcast.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use bn_domain::span::SpanDetail;
use bn_domain::trace::TraceSummary;

/// Outbound frames buffered per session before the session is dropped
/// as a slow consumer.
const SESSION_QUEUE_DEPTH: usize = 64;

pub type SessionId = u64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LiveEvent {
    SpanCreated {
        span: SpanDetail,
    },
    SpanUpdated {
        span_id: String,
        #[serde(skip)]
        trace_id: String,
        updates: Value,
    },
    TraceCreated {
        trace: TraceSummary,
    },
}

impl LiveEvent {
    /// The trace this event belongs to, for per-trace targeting.
    /// `trace_created` has no per-trace audience: subscribers of that
    /// trace by definition already know it.
    fn trace_scope(&self) -> Option<&str> {
        match self {
            Self::SpanCreated { span } => Some(&span.trace_id),
            Self::SpanUpdated { trace_id, .. } => Some(trace_id),
            Self::TraceCreated { .. } => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct Registries {
    senders: HashMap<SessionId, mpsc::Sender<String>>,
    unfiltered: HashSet<SessionId>,
    by_trace: HashMap<String, HashSet<SessionId>>,
}

pub struct LiveBus {
    next_id: AtomicU64,
    inner: RwLock<Registries>,
}

impl Default for LiveBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: RwLock::new(Registries::default()),
        }
    }

    /// Register a new session. It starts unfiltered; the returned
    /// receiver feeds the session's socket writer.
    pub fn register(&self) -> (SessionId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_DEPTH);
        let mut inner = self.inner.write();
        inner.senders.insert(id, tx);
        inner.unfiltered.insert(id);
        (id, rx)
    }

    /// Remove a session from every registry.
    pub fn disconnect(&self, session: SessionId) {
        let mut inner = self.inner.write();
        remove_session(&mut inner, session);
    }

    /// Move a session from the unfiltered set into a trace's
    /// subscriber set.
    pub fn subscribe_trace(&self, session: SessionId, trace_id: &str) {
        let mut inner = self.inner.write();
        if !inner.senders.contains_key(&session) {
            return;
        }
        inner.unfiltered.remove(&session);
        inner
            .by_trace
            .entry(trace_id.to_string())
            .or_default()
            .insert(session);
    }

    /// Move a session out of a trace's subscriber set back into the
    /// unfiltered set.
    pub fn unsubscribe_trace(&self, session: SessionId, trace_id: &str) {
        let mut inner = self.inner.write();
        if !inner.senders.contains_key(&session) {
            return;
        }
        if let Some(subscribers) = inner.by_trace.get_mut(trace_id) {
            subscribers.remove(&session);
            if subscribers.is_empty() {
                inner.by_trace.remove(trace_id);
            }
        }
        inner.unfiltered.insert(session);
    }

    /// Send a frame to one session (used for protocol error replies).
    /// A failed send evicts the session.
    pub fn send_to(&self, session: SessionId, frame: String) {
        let sender = self.inner.read().senders.get(&session).cloned();
        if let Some(tx) = sender {
            if tx.try_send(frame).is_err() {
                self.disconnect(session);
            }
        }
    }

    /// Deliver an event to the union of unfiltered sessions and this
    /// trace's subscribers (`trace_created`: unfiltered only). Sessions
    /// that fail to accept the frame are evicted immediately.
    pub fn broadcast(&self, event: &LiveEvent) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize live event");
                return;
            }
        };

        let targets: Vec<(SessionId, mpsc::Sender<String>)> = {
            let inner = self.inner.read();
            let mut ids: HashSet<SessionId> = inner.unfiltered.iter().copied().collect();
            if let Some(trace_id) = event.trace_scope() {
                if let Some(subscribers) = inner.by_trace.get(trace_id) {
                    ids.extend(subscribers.iter().copied());
                }
            }
            ids.into_iter()
                .filter_map(|id| inner.senders.get(&id).map(|tx| (id, tx.clone())))
                .collect()
        };

        let mut failed: Vec<SessionId> = Vec::new();
        for (id, tx) in targets {
            if tx.try_send(frame.clone()).is_err() {
                failed.push(id);
            }
        }

        if !failed.is_empty() {
            let mut inner = self.inner.write();
            for id in failed {
                tracing::debug!(session = id, "evicting session after send failure");
                remove_session(&mut inner, id);
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.read().senders.len()
    }

    #[cfg(test)]
    fn is_unfiltered(&self, session: SessionId) -> bool {
        self.inner.read().unfiltered.contains(&session)
    }

    #[cfg(test)]
    fn subscriber_count(&self, trace_id: &str) -> usize {
        self.inner
            .read()
            .by_trace
            .get(trace_id)
            .map_or(0, HashSet::len)
    }
}

fn remove_session(inner: &mut Registries, session: SessionId) {
    inner.senders.remove(&session);
    inner.unfiltered.remove(&session);
    inner.by_trace.retain(|_, subscribers| {
        subscribers.remove(&session);
        !subscribers.is_empty()
    });
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
