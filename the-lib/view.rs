use unicode_width::UnicodeWidthChar;

use crate::text::{
  Lines,
  Text,
};

/// Cursor position in characters. 0-indexed as all things should be.
///
/// `col` may be one past the last character of its line, which is where
/// typing appends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
  pub row: usize,
  pub col: usize,
}

impl Cursor {
  pub const fn new(row: usize, col: usize) -> Self {
    Self { row, col }
  }
}

/// The visible part of the document. `left` is a display column, not a
/// character index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Window {
  pub top:    usize,
  pub left:   usize,
  pub height: usize,
  pub width:  usize,
}

impl Window {
  pub const fn new(height: usize, width: usize) -> Self {
    Self {
      top: 0,
      left: 0,
      height,
      width,
    }
  }

  pub fn contains(&self, row: usize, display_col: usize) -> bool {
    (self.top..self.top + self.height.max(1)).contains(&row)
      && (self.left..self.left + self.width.max(1)).contains(&display_col)
  }

  /// Scrolls the least amount needed for the given cell to be visible.
  pub fn scroll_to(&mut self, row: usize, display_col: usize) {
    let height = self.height.max(1);
    let width = self.width.max(1);
    if row < self.top {
      self.top = row;
    } else if row >= self.top + height {
      self.top = row + 1 - height;
    }
    if display_col < self.left {
      self.left = display_col;
    } else if display_col >= self.left + width {
      self.left = display_col + 1 - width;
    }
  }
}

/// Bytes indexed so far by a running load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
  pub loaded: u64,
  pub total:  u64,
}

impl Progress {
  pub fn percent(&self) -> u64 {
    if self.total == 0 {
      100
    } else {
      self.loaded.min(self.total) * 100 / self.total
    }
  }
}

/// Status line data. `extra` is owned by the embedding layer (for example a
/// modal input layer's mode name) and never interpreted by the engine.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Status<X = ()> {
  pub message:  Option<String>,
  pub progress: Option<Progress>,
  pub modified: bool,
  pub extra:    X,
}

/// A consistent snapshot of everything needed to draw the document.
#[derive(Debug, Clone)]
pub struct View<X = ()> {
  pub text:   Text,
  pub cursor: Cursor,
  pub window: Window,
  pub status: Status<X>,
}

impl<X> View<X> {
  /// Lines inside the window, materialized lazily.
  pub fn visible_lines(&self) -> std::iter::Take<Lines<'_>> {
    self.text.iter_from(self.window.top).take(self.window.height)
  }
}

/// Display column of character index `col`, expanding tabs to the next
/// multiple of `tab_size`. Zero-width and control characters take one cell.
pub fn display_col(chars: &[char], col: usize, tab_size: usize) -> usize {
  let tab_size = tab_size.max(1);
  chars.iter().take(col).fold(0, |acc, &ch| {
    if ch == '\t' {
      acc + tab_size - acc % tab_size
    } else {
      acc + ch.width().unwrap_or(1).max(1)
    }
  })
}
