//! Fan-out of events to a dynamic set of handlers.
//!
//! Producers call [`Registry::notify`]; every handler registered at that
//! moment is invoked with a reference to the event. The handler table is
//! snapshotted before dispatch, so handlers may subscribe or unsubscribe
//! (including themselves) without deadlocking.

use std::{
  fmt,
  sync::{
    Arc,
    atomic::{
      AtomicU64,
      Ordering,
    },
  },
};

use hashbrown::HashMap;
use parking_lot::RwLock;

/// Identifies a subscription. Keys are unique per registry and strictly
/// increasing in subscription order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberKey(u64);

impl SubscriberKey {
  pub const fn get(self) -> u64 {
    self.0
  }
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub struct Registry<E> {
  next_key: AtomicU64,
  handlers: RwLock<HashMap<SubscriberKey, Handler<E>>>,
}

impl<E> Default for Registry<E> {
  fn default() -> Self {
    Self {
      next_key: AtomicU64::new(1),
      handlers: RwLock::new(HashMap::new()),
    }
  }
}

impl<E> fmt::Debug for Registry<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("subscribers", &self.len())
      .finish()
  }
}

impl<E> Registry<E> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe<F>(&self, handler: F) -> SubscriberKey
  where
    F: Fn(&E) + Send + Sync + 'static,
  {
    let key = SubscriberKey(self.next_key.fetch_add(1, Ordering::Relaxed));
    self.handlers.write().insert(key, Arc::new(handler));
    key
  }

  /// Removes a subscription. Returns false if the key was not registered.
  pub fn unsubscribe(&self, key: SubscriberKey) -> bool {
    self.handlers.write().remove(&key).is_some()
  }

  pub fn len(&self) -> usize {
    self.handlers.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Invokes every current handler. No ordering between handlers is
  /// guaranteed.
  pub fn notify(&self, event: &E) {
    let handlers: Vec<Handler<E>> = self.handlers.read().values().cloned().collect();
    for handler in handlers {
      handler(event);
    }
  }
}
