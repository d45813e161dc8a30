//! Bounded undo history over immutable snapshots.
//!
//! Unlike a transaction log, [`History`] stores whole values. That is cheap
//! because the values it is used with ([`Text`](crate::text::Text)) are
//! persistent and share almost all of their structure between versions.
//!
//! ```
//! use the_lib::history::History;
//!
//! let mut history = History::new(0, 10);
//! history.update(|v| v + 1);
//! history.update(|v| v + 1);
//! assert_eq!(*history.get(), 2);
//! history.undo();
//! assert_eq!(*history.get(), 1);
//! history.redo();
//! assert_eq!(*history.get(), 2);
//! ```

use crate::seq::Seq;

/// Stores up to `capacity` versions of a value and a cursor into them.
///
/// Committing a new version discards every version ahead of the cursor (the
/// redo branch) and, once the capacity is exceeded, silently drops the
/// oldest version. Undo depth is therefore `capacity - 1`.
#[derive(Debug, Clone)]
pub struct History<T> {
  versions: Seq<T>,
  current:  usize,
  capacity: usize,
  head:     T,
}

impl<T: Clone> History<T> {
  /// Creates a history holding only `initial`. A capacity of zero is treated
  /// as one.
  pub fn new(initial: T, capacity: usize) -> Self {
    Self {
      versions: Seq::singleton(initial.clone()),
      current:  0,
      capacity: capacity.max(1),
      head:     initial,
    }
  }

  /// The value at the cursor.
  #[inline]
  pub fn get(&self) -> &T {
    &self.head
  }

  #[inline]
  pub fn current_index(&self) -> usize {
    self.current
  }

  /// Number of retained versions.
  #[inline]
  pub fn len(&self) -> usize {
    self.versions.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.versions.is_empty()
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn can_undo(&self) -> bool {
    self.current > 0
  }

  pub fn can_redo(&self) -> bool {
    self.current + 1 < self.versions.len()
  }

  /// Commits `f(current)` as the new current version.
  pub fn update(&mut self, f: impl FnOnce(&T) -> T) {
    let next = f(&self.head);
    self.push(next);
  }

  /// Like [`History::update`], but leaves the history untouched if `f` fails.
  pub fn try_update<E>(&mut self, f: impl FnOnce(&T) -> Result<T, E>) -> Result<(), E> {
    let next = f(&self.head)?;
    self.push(next);
    Ok(())
  }

  /// Commits `value` as the new current version.
  pub fn push(&mut self, value: T) {
    let (mut versions, _redo) = self.versions.split(self.current + 1);
    versions = versions.push_back(value.clone());
    while versions.len() > self.capacity {
      versions = versions.split(1).1;
    }
    self.current = versions.len() - 1;
    self.versions = versions;
    self.head = value;
  }

  /// Moves the cursor back one version. Returns false at the oldest version.
  pub fn undo(&mut self) -> bool {
    if !self.can_undo() {
      return false;
    }
    self.seek(self.current - 1);
    true
  }

  /// Moves the cursor forward one version. Returns false at the newest
  /// version.
  pub fn redo(&mut self) -> bool {
    if !self.can_redo() {
      return false;
    }
    self.seek(self.current + 1);
    true
  }

  /// Rewrites every retained version with `f`, keeping the cursor where it
  /// is. Used for changes that must not be undoable, such as lines arriving
  /// from a background load.
  pub fn map_all<E>(&mut self, mut f: impl FnMut(&T) -> Result<T, E>) -> Result<(), E> {
    let versions = self
      .versions
      .iter()
      .map(&mut f)
      .collect::<Result<Vec<T>, E>>()?;
    self.versions = Seq::from_vec(versions);
    self.seek(self.current);
    Ok(())
  }

  fn seek(&mut self, index: usize) {
    let Some(value) = self.versions.get(index) else {
      unreachable!("history cursor {index} outside of {} versions", self.versions.len());
    };
    self.head = value.clone();
    self.current = index;
  }
}
