//! Correlation identifiers.
//!
//! Every call opens an [`IdSession`] on the client's [`IdStore`], stamps the
//! session's id on the outbound envelope and closes the session once the
//! call is over, whatever the outcome. Stores only promise uniqueness among
//! outstanding calls.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::IdError;

/// Source of correlation identifiers
pub trait IdStore: Send + Sync {
    fn new_session(&self) -> Result<Box<dyn IdSession>, IdError>;
}

/// One identifier, held for the duration of one call
pub trait IdSession: Send {
    fn id(&self) -> Value;

    fn close(self: Box<Self>) -> Result<(), IdError>;
}

/// Monotonic `u64` ids; the first id handed out is `1`. Lock-free, and
/// closing a session does nothing.
///
/// Each store owns its counter. Clones share it, so one store can be handed
/// to several clients that must not reuse each other's ids.
#[derive(Debug, Clone)]
pub struct DefaultIdStore {
    counter: Arc<AtomicU64>,
}

impl DefaultIdStore {
    pub fn new() -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for DefaultIdStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdStore for DefaultIdStore {
    fn new_session(&self) -> Result<Box<dyn IdSession>, IdError> {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Box::new(CounterSession(id)))
    }
}

struct CounterSession(u64);

impl IdSession for CounterSession {
    fn id(&self) -> Value {
        Value::from(self.0)
    }

    fn close(self: Box<Self>) -> Result<(), IdError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LeaseState {
    next: u64,
    free: Vec<u64>,
    leased: HashSet<u64>,
}

/// Ids leased from a bounded pool `1..=capacity`; closed ids go back to the
/// pool. Opening a session while every id is out fails with
/// [`IdError::Exhausted`].
#[derive(Debug, Clone)]
pub struct LeasedIdStore {
    capacity: u64,
    state: Arc<Mutex<LeaseState>>,
}

impl LeasedIdStore {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            state: Arc::new(Mutex::new(LeaseState {
                next: 1,
                ..LeaseState::default()
            })),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Ids currently leased
    pub fn outstanding(&self) -> usize {
        self.state.lock().leased.len()
    }
}

impl IdStore for LeasedIdStore {
    fn new_session(&self) -> Result<Box<dyn IdSession>, IdError> {
        let mut state = self.state.lock();

        let id = match state.free.pop() {
            Some(id) => id,
            None if state.next <= self.capacity => {
                let id = state.next;
                state.next += 1;
                id
            }
            None => {
                return Err(IdError::Exhausted {
                    capacity: self.capacity,
                });
            }
        };
        state.leased.insert(id);

        Ok(Box::new(LeasedSession {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

struct LeasedSession {
    id: u64,
    state: Arc<Mutex<LeaseState>>,
}

impl IdSession for LeasedSession {
    fn id(&self) -> Value {
        Value::from(self.id)
    }

    fn close(self: Box<Self>) -> Result<(), IdError> {
        let mut state = self.state.lock();
        if !state.leased.remove(&self.id) {
            return Err(IdError::NotLeased(self.id));
        }
        state.free.push(self.id);
        Ok(())
    }
}

/// Time-ordered UUID (v7) strings, suitable as externally visible trace ids
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdStore;

impl IdStore for UuidIdStore {
    fn new_session(&self) -> Result<Box<dyn IdSession>, IdError> {
        Ok(Box::new(UuidSession(Uuid::now_v7())))
    }
}

struct UuidSession(Uuid);

impl IdSession for UuidSession {
    fn id(&self) -> Value {
        Value::String(self.0.to_string())
    }

    fn close(self: Box<Self>) -> Result<(), IdError> {
        Ok(())
    }
}

/// Closes its session exactly once: explicitly through [`release`], or on
/// drop when the call is abandoned (cancelled, timed out, panicked).
///
/// [`release`]: SessionGuard::release
pub struct SessionGuard {
    id: Value,
    session: Option<Box<dyn IdSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn IdSession>) -> Self {
        Self {
            id: session.id(),
            session: Some(session),
        }
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn release(mut self) -> Result<(), IdError> {
        match self.session.take() {
            Some(session) => session.close(),
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(err) = session.close() {
                warn!(id = %self.id, "Failed to release abandoned id session: {}", err);
            }
        }
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("id", &self.id)
            .field("released", &self.session.is_none())
            .finish()
    }
}
