//! Persistent, weight-balanced sequences.
//!
//! [`Seq`] is an immutable ordered container indexed by position. Every
//! operation that "changes" a sequence returns a new one; the old value stays
//! valid and shares every subtree the operation did not touch. Cloning a
//! sequence is O(1).
//!
//! # Balancing
//!
//! The tree is a weight-balanced tree in the style of Adams, with the
//! parameters proven correct by Hirai and Yamamoto: the weight of a subtree is
//! its element count plus one, and a node is balanced when
//! `DELTA * weight(light) >= weight(heavy)`. Any node whose children were
//! rebuilt is re-balanced with a single or double rotation (chosen by
//! `GAMMA`) on the way back up, which keeps the height logarithmic.
//!
//! # Example
//!
//! ```
//! use the_lib::seq::Seq;
//!
//! let a: Seq<char> = "hello".chars().collect();
//! let b = a.insert(5, '!').unwrap();
//! assert_eq!(a.len(), 5);
//! assert_eq!(b.iter().collect::<String>(), "hello!");
//! ```

use std::{
  fmt,
  iter::FusedIterator,
  sync::Arc,
};

use thiserror::Error;

/// Maximum allowed ratio between the weights of two siblings.
pub const DELTA: usize = 3;
/// Ratio deciding between a single and a double rotation.
pub const GAMMA: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeqError {
  #[error("index {index} is out of range for a sequence of length {len}")]
  IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, SeqError>;

type Link<T> = Option<Arc<Node<T>>>;

struct Node<T> {
  size:  usize,
  left:  Link<T>,
  value: T,
  right: Link<T>,
}

/// An immutable, structurally shared sequence.
pub struct Seq<T> {
  root: Link<T>,
}

impl<T> Clone for Seq<T> {
  fn clone(&self) -> Self {
    Self {
      root: self.root.clone(),
    }
  }
}

impl<T> Default for Seq<T> {
  fn default() -> Self {
    Self { root: None }
  }
}

impl<T> Seq<T> {
  pub const fn new() -> Self {
    Self { root: None }
  }

  /// Builds a perfectly balanced sequence from a vector in O(n).
  pub fn from_vec(values: Vec<T>) -> Self {
    let len = values.len();
    let mut values = values.into_iter();
    Self {
      root: build(len, &mut values),
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    size(&self.root)
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.root.is_none()
  }

  pub fn get(&self, index: usize) -> Option<&T> {
    let mut link = self.root.as_deref();
    let mut index = index;
    while let Some(node) = link {
      let left = size(&node.left);
      if index < left {
        link = node.left.as_deref();
      } else if index == left {
        return Some(&node.value);
      } else {
        index -= left + 1;
        link = node.right.as_deref();
      }
    }
    None
  }

  pub fn first(&self) -> Option<&T> {
    self.get(0)
  }

  pub fn last(&self) -> Option<&T> {
    self.len().checked_sub(1).and_then(|i| self.get(i))
  }

  pub fn iter(&self) -> Iter<'_, T> {
    self.iter_from(0)
  }

  /// Iterates over the elements starting at position `start`. Starting at or
  /// past the end yields nothing.
  pub fn iter_from(&self, start: usize) -> Iter<'_, T> {
    let len = self.len();
    let mut iter = Iter {
      stack:     Vec::new(),
      remaining: len.saturating_sub(start),
    };
    if start >= len {
      return iter;
    }
    let mut link = self.root.as_deref();
    let mut index = start;
    while let Some(node) = link {
      let left = size(&node.left);
      if index < left {
        iter.stack.push(node);
        link = node.left.as_deref();
      } else if index == left {
        iter.stack.push(node);
        break;
      } else {
        index -= left + 1;
        link = node.right.as_deref();
      }
    }
    iter
  }

  /// Checks the balance and size invariants of every node.
  pub fn is_balanced(&self) -> bool {
    fn check<T>(link: &Link<T>) -> bool {
      let Some(node) = link else {
        return true;
      };
      node.size == size(&node.left) + size(&node.right) + 1
        && balanced(&node.left, &node.right)
        && balanced(&node.right, &node.left)
        && check(&node.left)
        && check(&node.right)
    }
    check(&self.root)
  }

  /// Height of the underlying tree, zero for an empty sequence.
  pub fn height(&self) -> usize {
    fn height<T>(link: &Link<T>) -> usize {
      link
        .as_deref()
        .map_or(0, |node| 1 + height(&node.left).max(height(&node.right)))
    }
    height(&self.root)
  }

  /// Addresses of every node in the tree, for checking structural sharing.
  #[cfg(test)]
  pub(crate) fn node_addrs(&self) -> Vec<usize> {
    let mut addrs = Vec::new();
    let mut stack: Vec<&Arc<Node<T>>> = self.root.iter().collect();
    while let Some(node) = stack.pop() {
      addrs.push(Arc::as_ptr(node) as usize);
      stack.extend(node.left.iter().chain(node.right.iter()));
    }
    addrs
  }
}

impl<T: Clone> Seq<T> {
  pub fn singleton(value: T) -> Self {
    Self {
      root: node(None, value, None),
    }
  }

  pub fn set(&self, index: usize, value: T) -> Result<Self> {
    self.check_index(index)?;
    Ok(Self {
      root: set(&self.root, index, value),
    })
  }

  /// Inserts `value` so that it ends up at `index`. `index == len` appends.
  pub fn insert(&self, index: usize, value: T) -> Result<Self> {
    let len = self.len();
    if index > len {
      return Err(SeqError::IndexOutOfRange { index, len });
    }
    Ok(Self {
      root: insert(&self.root, index, value),
    })
  }

  pub fn push_back(&self, value: T) -> Self {
    Self {
      root: insert(&self.root, self.len(), value),
    }
  }

  pub fn remove(&self, index: usize) -> Result<Self> {
    self.check_index(index)?;
    Ok(Self {
      root: remove(&self.root, index),
    })
  }

  /// Splits into `[0, index)` and `[index, len)`. An index past the end is
  /// clamped to the length.
  pub fn split(&self, index: usize) -> (Self, Self) {
    let index = index.min(self.len());
    let (left, right) = split(&self.root, index);
    (Self { root: left }, Self { root: right })
  }

  pub fn concat(&self, other: &Self) -> Self {
    Self {
      root: merge(self.root.clone(), other.root.clone()),
    }
  }

  /// Inserts every element of `other` starting at `index`.
  pub fn splice(&self, index: usize, other: &Self) -> Result<Self> {
    let len = self.len();
    if index > len {
      return Err(SeqError::IndexOutOfRange { index, len });
    }
    let (head, tail) = self.split(index);
    Ok(head.concat(other).concat(&tail))
  }

  /// Removes the elements in `[start, end)`, clamping `end` to the length.
  pub fn remove_range(&self, start: usize, end: usize) -> Result<Self> {
    let len = self.len();
    if start > len {
      return Err(SeqError::IndexOutOfRange { index: start, len });
    }
    let (head, rest) = self.split(start);
    let (_, tail) = rest.split(end.saturating_sub(start));
    Ok(head.concat(&tail))
  }

  fn check_index(&self, index: usize) -> Result<()> {
    let len = self.len();
    if index < len {
      Ok(())
    } else {
      Err(SeqError::IndexOutOfRange { index, len })
    }
  }
}

impl<T: fmt::Debug> fmt::Debug for Seq<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.iter()).finish()
  }
}

impl<T: PartialEq> PartialEq for Seq<T> {
  fn eq(&self, other: &Self) -> bool {
    self.len() == other.len() && self.iter().eq(other.iter())
  }
}

impl<T: Eq> Eq for Seq<T> {}

impl<T> FromIterator<T> for Seq<T> {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    Self::from_vec(iter.into_iter().collect())
  }
}

impl<T> From<Vec<T>> for Seq<T> {
  fn from(values: Vec<T>) -> Self {
    Self::from_vec(values)
  }
}

impl<'a, T> IntoIterator for &'a Seq<T> {
  type Item = &'a T;
  type IntoIter = Iter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

/// In-order iterator over a [`Seq`].
pub struct Iter<'a, T> {
  stack:     Vec<&'a Node<T>>,
  remaining: usize,
}

impl<T> Clone for Iter<'_, T> {
  fn clone(&self) -> Self {
    Self {
      stack:     self.stack.clone(),
      remaining: self.remaining,
    }
  }
}

impl<'a, T> Iterator for Iter<'a, T> {
  type Item = &'a T;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.stack.pop()?;
    let mut link = node.right.as_deref();
    while let Some(next) = link {
      self.stack.push(next);
      link = next.left.as_deref();
    }
    self.remaining -= 1;
    Some(&node.value)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

#[inline]
fn size<T>(link: &Link<T>) -> usize {
  link.as_ref().map_or(0, |node| node.size)
}

#[inline]
fn weight<T>(link: &Link<T>) -> usize {
  size(link) + 1
}

#[inline]
fn balanced<T>(a: &Link<T>, b: &Link<T>) -> bool {
  DELTA * weight(a) >= weight(b)
}

#[inline]
fn single<T>(a: &Link<T>, b: &Link<T>) -> bool {
  weight(a) < GAMMA * weight(b)
}

fn node<T>(left: Link<T>, value: T, right: Link<T>) -> Link<T> {
  Some(Arc::new(Node {
    size: size(&left) + size(&right) + 1,
    left,
    value,
    right,
  }))
}

fn build<T>(len: usize, values: &mut impl Iterator<Item = T>) -> Link<T> {
  if len == 0 {
    return None;
  }
  let left_len = len / 2;
  let left = build(left_len, values);
  let Some(value) = values.next() else {
    unreachable!("iterator shorter than its reported length");
  };
  let right = build(len - left_len - 1, values);
  node(left, value, right)
}

/// Rebuilds a node from children that may be off balance by one step.
fn balance<T: Clone>(left: Link<T>, value: T, right: Link<T>) -> Link<T> {
  if balanced(&left, &right) && balanced(&right, &left) {
    return node(left, value, right);
  }
  if weight(&right) > weight(&left) {
    let Some(r) = right.as_deref() else {
      unreachable!("right-heavy node without a right child");
    };
    if single(&r.left, &r.right) {
      node(
        node(left, value, r.left.clone()),
        r.value.clone(),
        r.right.clone(),
      )
    } else {
      let Some(rl) = r.left.as_deref() else {
        unreachable!("double rotation without an inner grandchild");
      };
      node(
        node(left, value, rl.left.clone()),
        rl.value.clone(),
        node(rl.right.clone(), r.value.clone(), r.right.clone()),
      )
    }
  } else {
    let Some(l) = left.as_deref() else {
      unreachable!("left-heavy node without a left child");
    };
    if single(&l.right, &l.left) {
      node(
        l.left.clone(),
        l.value.clone(),
        node(l.right.clone(), value, right),
      )
    } else {
      let Some(lr) = l.right.as_deref() else {
        unreachable!("double rotation without an inner grandchild");
      };
      node(
        node(l.left.clone(), l.value.clone(), lr.left.clone()),
        lr.value.clone(),
        node(lr.right.clone(), value, right),
      )
    }
  }
}

fn set<T: Clone>(link: &Link<T>, index: usize, value: T) -> Link<T> {
  let node_ref = link.as_deref()?;
  let left = size(&node_ref.left);
  if index < left {
    node(
      set(&node_ref.left, index, value),
      node_ref.value.clone(),
      node_ref.right.clone(),
    )
  } else if index == left {
    node(node_ref.left.clone(), value, node_ref.right.clone())
  } else {
    node(
      node_ref.left.clone(),
      node_ref.value.clone(),
      set(&node_ref.right, index - left - 1, value),
    )
  }
}

fn insert<T: Clone>(link: &Link<T>, index: usize, value: T) -> Link<T> {
  let Some(n) = link.as_deref() else {
    return node(None, value, None);
  };
  let left = size(&n.left);
  if index <= left {
    balance(insert(&n.left, index, value), n.value.clone(), n.right.clone())
  } else {
    balance(
      n.left.clone(),
      n.value.clone(),
      insert(&n.right, index - left - 1, value),
    )
  }
}

fn remove<T: Clone>(link: &Link<T>, index: usize) -> Link<T> {
  let n = link.as_deref()?;
  let left = size(&n.left);
  if index < left {
    balance(remove(&n.left, index), n.value.clone(), n.right.clone())
  } else if index == left {
    glue(n.left.clone(), n.right.clone())
  } else {
    balance(
      n.left.clone(),
      n.value.clone(),
      remove(&n.right, index - left - 1),
    )
  }
}

fn pop_min<T: Clone>(n: &Node<T>) -> (T, Link<T>) {
  match n.left.as_deref() {
    None => (n.value.clone(), n.right.clone()),
    Some(left) => {
      let (min, rest) = pop_min(left);
      (min, balance(rest, n.value.clone(), n.right.clone()))
    },
  }
}

fn pop_max<T: Clone>(n: &Node<T>) -> (T, Link<T>) {
  match n.right.as_deref() {
    None => (n.value.clone(), n.left.clone()),
    Some(right) => {
      let (max, rest) = pop_max(right);
      (max, balance(n.left.clone(), n.value.clone(), rest))
    },
  }
}

/// Joins two subtrees that are already balanced relative to each other by
/// promoting the extremal element of the heavier one.
fn glue<T: Clone>(left: Link<T>, right: Link<T>) -> Link<T> {
  match (left.as_deref(), right.as_deref()) {
    (None, _) => right,
    (_, None) => left,
    (Some(l), Some(r)) => {
      if l.size > r.size {
        let (max, rest) = pop_max(l);
        balance(rest, max, right)
      } else {
        let (min, rest) = pop_min(r);
        balance(left, min, rest)
      }
    },
  }
}

/// Concatenates two arbitrary subtrees.
fn merge<T: Clone>(left: Link<T>, right: Link<T>) -> Link<T> {
  match (left.as_deref(), right.as_deref()) {
    (None, _) => right,
    (_, None) => left,
    (Some(l), Some(r)) => {
      if DELTA * weight(&left) < weight(&right) {
        balance(
          merge(left.clone(), r.left.clone()),
          r.value.clone(),
          r.right.clone(),
        )
      } else if DELTA * weight(&right) < weight(&left) {
        balance(
          l.left.clone(),
          l.value.clone(),
          merge(l.right.clone(), right.clone()),
        )
      } else {
        glue(left.clone(), right.clone())
      }
    },
  }
}

/// Concatenates `left`, `value` and `right`.
fn link<T: Clone>(left: Link<T>, value: T, right: Link<T>) -> Link<T> {
  match (left.as_deref(), right.as_deref()) {
    (None, _) => insert(&right, 0, value),
    (Some(l), None) => insert(&left, l.size, value),
    (Some(l), Some(r)) => {
      if DELTA * weight(&left) < weight(&right) {
        balance(
          link(left.clone(), value, r.left.clone()),
          r.value.clone(),
          r.right.clone(),
        )
      } else if DELTA * weight(&right) < weight(&left) {
        balance(
          l.left.clone(),
          l.value.clone(),
          link(l.right.clone(), value, right.clone()),
        )
      } else {
        node(left.clone(), value, right.clone())
      }
    },
  }
}

fn split<T: Clone>(tree: &Link<T>, index: usize) -> (Link<T>, Link<T>) {
  let Some(n) = tree.as_deref() else {
    return (None, None);
  };
  let left = size(&n.left);
  if index < left {
    let (ll, lr) = split(&n.left, index);
    (ll, link(lr, n.value.clone(), n.right.clone()))
  } else if index == left {
    (n.left.clone(), insert(&n.right, 0, n.value.clone()))
  } else {
    let (rl, rr) = split(&n.right, index - left - 1);
    (link(n.left.clone(), n.value.clone(), rl), rr)
  }
}

#[cfg(test)]
mod test {
  use quickcheck::{
    Arbitrary,
    Gen,
  };

  use super::*;

  fn to_vec<T: Clone>(seq: &Seq<T>) -> Vec<T> {
    seq.iter().cloned().collect()
  }

  #[derive(Debug, Clone)]
  enum Op {
    Insert(usize, u8),
    Remove(usize),
    Set(usize, u8),
    SplitConcat(usize),
  }

  impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
      match u8::arbitrary(g) % 4 {
        0 => Op::Insert(usize::arbitrary(g), u8::arbitrary(g)),
        1 => Op::Remove(usize::arbitrary(g)),
        2 => Op::Set(usize::arbitrary(g), u8::arbitrary(g)),
        _ => Op::SplitConcat(usize::arbitrary(g)),
      }
    }
  }

  #[test]
  fn empty() {
    let seq: Seq<u8> = Seq::new();
    assert!(seq.is_empty());
    assert_eq!(seq.get(0), None);
    assert_eq!(
      seq.remove(0).unwrap_err(),
      SeqError::IndexOutOfRange { index: 0, len: 0 }
    );
    assert_eq!(seq.insert(0, 1).unwrap().len(), 1);
    assert!(seq.insert(1, 1).is_err());
  }

  #[test]
  fn old_versions_stay_valid() {
    let a: Seq<u32> = (0..100).collect();
    let b = a.set(50, 999).unwrap();
    let c = b.remove(0).unwrap();
    assert_eq!(a.get(50), Some(&50));
    assert_eq!(b.get(50), Some(&999));
    assert_eq!(c.get(49), Some(&999));
    assert_eq!(a.len(), 100);
    assert_eq!(c.len(), 99);
    assert_eq!(c.first(), Some(&1));
    assert_eq!(c.last(), Some(&99));
    assert_eq!(Seq::<u32>::new().last(), None);
  }

  #[test]
  fn concat_reuses_the_appended_tree() {
    let tail: Seq<u32> = (0..1_000).collect();
    let tail_nodes: std::collections::HashSet<usize> = tail.node_addrs().into_iter().collect();
    for prefix in [0u32, 1, 7, 300] {
      let head: Seq<u32> = (0..prefix).collect();
      let joined = head.concat(&tail);
      assert_eq!(joined.len(), prefix as usize + 1_000);
      let shared = joined
        .node_addrs()
        .into_iter()
        .filter(|addr| tail_nodes.contains(addr))
        .count();
      assert!(shared >= 900, "prefix {prefix}: only {shared} nodes shared");
    }
  }

  #[test]
  fn sequential_appends_stay_shallow() {
    let mut seq = Seq::new();
    for i in 0..10_000u32 {
      seq = seq.push_back(i);
    }
    assert!(seq.is_balanced());
    // log_{4/3}(10_001) is a little over 32.
    assert!(seq.height() <= 33, "height {}", seq.height());
    assert_eq!(seq.iter().copied().collect::<Vec<_>>(), (0..10_000).collect::<Vec<_>>());
  }

  #[test]
  fn iter_from_middle() {
    let seq: Seq<u32> = (0..37).collect();
    for start in 0..=40 {
      let expected: Vec<u32> = (start.min(37)..37).collect();
      let iter = seq.iter_from(start as usize);
      assert_eq!(iter.len(), expected.len());
      assert_eq!(iter.copied().collect::<Vec<_>>(), expected);
    }
  }

  #[test]
  fn splice_and_remove_range() {
    let seq: Seq<u32> = (0..10).collect();
    let other: Seq<u32> = vec![100, 101].into();
    let spliced = seq.splice(3, &other).unwrap();
    assert_eq!(to_vec(&spliced), vec![0, 1, 2, 100, 101, 3, 4, 5, 6, 7, 8, 9]);
    let removed = spliced.remove_range(3, 5).unwrap();
    assert_eq!(removed, seq);
    assert_eq!(to_vec(&seq.remove_range(8, 100).unwrap()), (0..8).collect::<Vec<_>>());
    assert!(seq.splice(11, &other).is_err());
  }

  quickcheck::quickcheck! {
    fn get_after_set(values: Vec<u8>, index: usize, value: u8) -> bool {
      let seq = Seq::from_vec(values.clone());
      if values.is_empty() {
        return seq.set(index, value).is_err();
      }
      let index = index % values.len();
      let updated = seq.set(index, value).unwrap();
      updated.get(index) == Some(&value) && seq.get(index) == Some(&values[index])
    }

    fn insert_then_remove(values: Vec<u8>, index: usize, value: u8) -> bool {
      let seq = Seq::from_vec(values.clone());
      let index = index % (values.len() + 1);
      let inserted = seq.insert(index, value).unwrap();
      let removed = inserted.remove(index).unwrap();
      inserted.len() == values.len() + 1
        && inserted.get(index) == Some(&value)
        && removed == seq
        && inserted.is_balanced()
    }

    fn split_concat_identity(values: Vec<u8>) -> bool {
      let seq = Seq::from_vec(values.clone());
      (0..=values.len()).all(|i| {
        let (a, b) = seq.split(i);
        to_vec(&a) == values[..i]
          && to_vec(&b) == values[i..]
          && a.is_balanced()
          && b.is_balanced()
          && a.concat(&b) == seq
      })
    }

    fn concat_unbalanced_inputs(a: Vec<u8>, b: Vec<u8>) -> bool {
      let mut left = Seq::new();
      for v in &a {
        left = left.push_back(*v);
      }
      let right = Seq::from_vec(b.clone());
      let joined = left.concat(&right);
      let mut expected = a;
      expected.extend(b);
      joined.is_balanced() && to_vec(&joined) == expected
    }

    fn balance_after_random_ops(ops: Vec<Op>) -> bool {
      let mut seq = Seq::new();
      let mut model: Vec<u8> = Vec::new();
      for op in ops {
        match op {
          Op::Insert(i, v) => {
            let i = i % (model.len() + 1);
            seq = seq.insert(i, v).unwrap();
            model.insert(i, v);
          },
          Op::Remove(i) if !model.is_empty() => {
            let i = i % model.len();
            seq = seq.remove(i).unwrap();
            model.remove(i);
          },
          Op::Set(i, v) if !model.is_empty() => {
            let i = i % model.len();
            seq = seq.set(i, v).unwrap();
            model[i] = v;
          },
          Op::SplitConcat(i) => {
            let (a, b) = seq.split(i % (model.len() + 1));
            seq = b.concat(&a).split(b.len()).1.concat(&b);
          },
          _ => {},
        }
        if !seq.is_balanced() {
          return false;
        }
      }
      to_vec(&seq) == model
    }
  }
}
