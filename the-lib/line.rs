use std::{
  fmt,
  sync::Arc,
};

/// One logical line of text, without its terminator.
///
/// A line is either owned, holding its Unicode scalar values, or lazy,
/// naming a byte range in the backing source of the [`Text`] it lives in.
/// Lines are immutable; editing a line always produces a new owned line.
///
/// [`Text`]: crate::text::Text
#[derive(Clone, PartialEq, Eq)]
pub enum Line {
  Owned(Arc<[char]>),
  Lazy { offset: u64, size: u64 },
}

impl Line {
  pub fn empty() -> Self {
    Self::Owned(Arc::from(Vec::new()))
  }

  pub const fn lazy(offset: u64, size: u64) -> Self {
    Self::Lazy { offset, size }
  }

  pub fn is_lazy(&self) -> bool {
    matches!(self, Self::Lazy { .. })
  }

  /// The owned characters, or `None` for a lazy line.
  pub fn chars(&self) -> Option<&[char]> {
    match self {
      Self::Owned(chars) => Some(chars),
      Self::Lazy { .. } => None,
    }
  }
}

impl Default for Line {
  fn default() -> Self {
    Self::empty()
  }
}

impl fmt::Debug for Line {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Owned(chars) => {
        let text: String = chars.iter().collect();
        f.debug_tuple("Owned").field(&text).finish()
      },
      Self::Lazy { offset, size } => {
        f.debug_struct("Lazy")
          .field("offset", offset)
          .field("size", size)
          .finish()
      },
    }
  }
}

impl From<Vec<char>> for Line {
  fn from(chars: Vec<char>) -> Self {
    Self::Owned(chars.into())
  }
}

impl From<&[char]> for Line {
  fn from(chars: &[char]) -> Self {
    Self::Owned(chars.into())
  }
}

impl From<&str> for Line {
  fn from(text: &str) -> Self {
    Self::Owned(text.chars().collect::<Vec<_>>().into())
  }
}

impl From<String> for Line {
  fn from(text: String) -> Self {
    Self::from(text.as_str())
  }
}
