//! Line-oriented text values.
//!
//! A [`Text`] is a persistent sequence of [`Line`]s plus an optional handle to
//! the byte source lazy lines point into. Every edit returns a new `Text` and
//! leaves the old one untouched, so a reader holding a snapshot never observes
//! later writes.

use std::{
  fmt,
  io::{
    self,
    Write,
  },
  sync::Arc,
};

use the_stdx::source::{
  ByteSource,
  SharedSource,
};
use thiserror::Error;

use crate::{
  line::Line,
  seq::{
    Seq,
    SeqError,
  },
};

#[derive(Debug, Error)]
pub enum TextError {
  #[error("row {row} is out of range for a text of {len} lines")]
  RowOutOfRange { row: usize, len: usize },
  #[error("lazy line at {offset}+{size} is not backed by this text's source")]
  Unbacked { offset: u64, size: u64 },
  #[error("failed to read line bytes: {0}")]
  Io(#[from] io::Error),
}

impl From<SeqError> for TextError {
  fn from(err: SeqError) -> Self {
    match err {
      SeqError::IndexOutOfRange { index, len } => Self::RowOutOfRange { row: index, len },
    }
  }
}

pub type Result<T> = std::result::Result<T, TextError>;

#[derive(Clone, Default)]
pub struct Text {
  source: Option<SharedSource>,
  lines:  Seq<Line>,
}

impl fmt::Debug for Text {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Text")
      .field("lines", &self.lines.len())
      .field("backed", &self.source.is_some())
      .finish()
  }
}

impl Text {
  pub fn new() -> Self {
    Self::default()
  }

  /// An empty text whose lazy lines will refer to `source`.
  pub fn with_source(source: SharedSource) -> Self {
    Self {
      source: Some(source),
      lines:  Seq::new(),
    }
  }

  /// Builds an owned text, one line per item.
  pub fn from_lines<I, L>(lines: I) -> Self
  where
    I: IntoIterator<Item = L>,
    L: Into<Line>,
  {
    Self {
      source: None,
      lines:  lines.into_iter().map(Into::into).collect(),
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.lines.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn source(&self) -> Option<&SharedSource> {
    self.source.as_ref()
  }

  pub fn lines(&self) -> &Seq<Line> {
    &self.lines
  }

  /// Whether `other` is backed by the same source as this text.
  pub fn shares_source(&self, other: &Text) -> bool {
    match (&self.source, &other.source) {
      (Some(a), Some(b)) => Arc::ptr_eq(a, b),
      (None, None) => true,
      _ => false,
    }
  }

  pub fn line(&self, row: usize) -> Option<&Line> {
    self.lines.get(row)
  }

  /// Materializes the characters of line `row`.
  pub fn get(&self, row: usize) -> Result<Vec<char>> {
    let line = self.lines.get(row).ok_or(TextError::RowOutOfRange {
      row,
      len: self.len(),
    })?;
    self.materialize_line(line)
  }

  pub fn get_string(&self, row: usize) -> Result<String> {
    Ok(self.get(row)?.into_iter().collect())
  }

  /// Number of characters in line `row`.
  pub fn line_len(&self, row: usize) -> Result<usize> {
    match self.lines.get(row) {
      Some(Line::Owned(chars)) => Ok(chars.len()),
      Some(line) => Ok(self.materialize_line(line)?.len()),
      None => {
        Err(TextError::RowOutOfRange {
          row,
          len: self.len(),
        })
      },
    }
  }

  pub fn set(&self, row: usize, line: impl Into<Line>) -> Result<Self> {
    let line = self.checked(line.into())?;
    Ok(self.with_lines(self.lines.set(row, line)?))
  }

  pub fn insert(&self, row: usize, line: impl Into<Line>) -> Result<Self> {
    let line = self.checked(line.into())?;
    Ok(self.with_lines(self.lines.insert(row, line)?))
  }

  pub fn remove(&self, row: usize) -> Result<Self> {
    Ok(self.with_lines(self.lines.remove(row)?))
  }

  /// Appends a line at the end. Used by the loader to publish indexed lines.
  pub fn append(&self, line: impl Into<Line>) -> Result<Self> {
    let line = self.checked(line.into())?;
    Ok(self.with_lines(self.lines.push_back(line)))
  }

  /// Appends a batch of lines in one structural edit. The batch tree is
  /// shared with the result, so appending the same batch to several versions
  /// stores it once.
  pub fn append_seq(&self, lines: &Seq<Line>) -> Result<Self> {
    for line in lines {
      self.check(line)?;
    }
    Ok(self.with_lines(self.lines.concat(lines)))
  }

  /// The lines of `other` in a form this text can hold. Lazy lines only keep
  /// their meaning against their own source, so when `other` is backed by a
  /// different one they are read and turned into owned lines.
  pub fn adopt(&self, other: &Text) -> Result<Seq<Line>> {
    if self.shares_source(other) {
      return Ok(other.lines.clone());
    }
    other
      .lines
      .iter()
      .map(|line| {
        match line {
          Line::Owned(_) => Ok(line.clone()),
          Line::Lazy { .. } => other.materialize_line(line).map(Line::from),
        }
      })
      .collect()
  }

  /// Inserts `lines` so that the first of them ends up at `row`. Lazy lines
  /// are taken to point into this text's source.
  pub fn splice(&self, row: usize, lines: &Seq<Line>) -> Result<Self> {
    for line in lines {
      self.check(line)?;
    }
    Ok(self.with_lines(self.lines.splice(row, lines)?))
  }

  /// Removes up to `count` lines starting at `row`.
  pub fn remove_lines(&self, row: usize, count: usize) -> Result<Self> {
    Ok(self.with_lines(
      self
        .lines
        .remove_range(row, row.saturating_add(count))?,
    ))
  }

  /// Lazily materialized lines, in order.
  pub fn iter(&self) -> Lines<'_> {
    self.iter_from(0)
  }

  pub fn iter_from(&self, row: usize) -> Lines<'_> {
    Lines {
      text:  self,
      inner: self.lines.iter_from(row),
    }
  }

  /// Materializes the whole text. Intended for tests and small documents.
  pub fn to_strings(&self) -> Result<Vec<String>> {
    self
      .iter()
      .map(|line| line.map(|chars| chars.into_iter().collect()))
      .collect()
  }

  /// Writes every line followed by `\n`. Lazy lines are copied byte for byte
  /// from the source without being decoded.
  pub fn write_to(&self, out: &mut dyn Write) -> Result<()> {
    let mut buf = Vec::new();
    for line in &self.lines {
      match line {
        Line::Owned(chars) => {
          let line: String = chars.iter().collect();
          out.write_all(line.as_bytes())?;
        },
        Line::Lazy { offset, size } => {
          let source = self.backing(*offset, *size)?;
          buf.resize(byte_len(*size)?, 0);
          source.read_exact_at(&mut buf, *offset)?;
          out.write_all(&buf)?;
        },
      }
      out.write_all(b"\n")?;
    }
    Ok(())
  }

  fn with_lines(&self, lines: Seq<Line>) -> Self {
    Self {
      source: self.source.clone(),
      lines,
    }
  }

  /// Materializes `line`, which need not belong to this text but must be
  /// backed by its source when lazy.
  pub fn materialize_line(&self, line: &Line) -> Result<Vec<char>> {
    match line {
      Line::Owned(chars) => Ok(chars.to_vec()),
      Line::Lazy { offset, size } => {
        let source = self.backing(*offset, *size)?;
        let mut bytes = vec![0u8; byte_len(*size)?];
        source.read_exact_at(&mut bytes, *offset)?;
        Ok(String::from_utf8_lossy(&bytes).chars().collect())
      },
    }
  }

  fn backing(&self, offset: u64, size: u64) -> Result<&dyn ByteSource> {
    match &self.source {
      Some(source) if offset.checked_add(size).is_some_and(|end| end <= source.len()) => {
        Ok(source.as_ref())
      },
      _ => Err(TextError::Unbacked { offset, size }),
    }
  }

  fn check(&self, line: &Line) -> Result<()> {
    if let Line::Lazy { offset, size } = line {
      self.backing(*offset, *size)?;
    }
    Ok(())
  }

  fn checked(&self, line: Line) -> Result<Line> {
    self.check(&line)?;
    Ok(line)
  }
}

fn byte_len(size: u64) -> Result<usize> {
  usize::try_from(size).map_err(|_| TextError::Io(io::Error::from(io::ErrorKind::OutOfMemory)))
}

/// Iterator returned by [`Text::iter`].
pub struct Lines<'a> {
  text:  &'a Text,
  inner: crate::seq::Iter<'a, Line>,
}

impl Iterator for Lines<'_> {
  type Item = Result<Vec<char>>;

  fn next(&mut self) -> Option<Self::Item> {
    let line = self.inner.next()?;
    Some(self.text.materialize_line(line))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    self.inner.size_hint()
  }
}

impl ExactSizeIterator for Lines<'_> {}
