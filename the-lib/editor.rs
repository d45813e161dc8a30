//! The document editor: one text with undo history, a cursor and a window.
//!
//! Every public operation runs under a single mutex. Mutating operations
//! follow the same sequence while holding it:
//!
//! 1. notify subscribers with a [`LogEntry`] carrying the cursor position at
//!    the time of the call,
//! 2. commit the new [`Text`] to the history,
//! 3. clamp the cursor into the document and scroll the window to it,
//! 4. push a [`View`] to the render queue.
//!
//! The render push in step 4 happens *before* the lock is released and blocks
//! when the queue is full. A slow renderer therefore stalls further edits and
//! background loading instead of letting snapshots pile up. Subscribers run
//! under the lock too and must not call back into the editor.
//!
//! # Example
//!
//! ```
//! use the_lib::{
//!   config::Config,
//!   editor::DocumentEditor,
//!   view::Cursor,
//! };
//!
//! let (editor, _) = DocumentEditor::<()>::new(Config::default()).unwrap();
//! editor.type_char('h').unwrap();
//! editor.type_char('i').unwrap();
//! assert_eq!(editor.text().to_strings().unwrap(), vec!["hi"]);
//! assert_eq!(editor.cursor(), Cursor::new(0, 2));
//! ```

use std::{
  io,
  path::Path,
  sync::Arc,
  thread,
};

use crossbeam::channel::{
  self,
  Receiver,
  Sender,
};
use parking_lot::Mutex;
use the_editor_event::{
  Registry,
  SubscriberKey,
  Throttle,
};
use the_stdx::source::SharedSource;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
  config::{
    Config,
    ConfigError,
  },
  history::History,
  journal::{
    JournalError,
    LogEntry,
  },
  line::Line,
  loader::{
    self,
    LoadCompletion,
    LoadError,
    LoadSummary,
    ScanOutcome,
  },
  seq::Seq,
  text::{
    self,
    Text,
    TextError,
  },
  view::{
    Cursor,
    Progress,
    Status,
    View,
    Window,
    display_col,
  },
};

#[derive(Debug, Error)]
pub enum EditorError {
  #[error("a backing source is already attached to this document")]
  AlreadyLoaded,
  #[error(transparent)]
  Text(#[from] TextError),
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Journal(#[from] JournalError),
  #[error(transparent)]
  Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Receiving end of the render queue.
pub type Renders<X = ()> = Receiver<View<X>>;

/// Handle to a document. Cloning the handle shares the document.
pub struct DocumentEditor<X = ()> {
  shared: Arc<Shared<X>>,
}

impl<X> Clone for DocumentEditor<X> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

struct Shared<X> {
  config:      Config,
  state:       Mutex<State<X>>,
  renders:     Sender<View<X>>,
  subscribers: Registry<LogEntry>,
}

struct State<X> {
  text:   History<Text>,
  cursor: Cursor,
  window: Window,
  status: Status<X>,
  loaded: bool,
}

impl<X> DocumentEditor<X>
where
  X: Clone + Send + 'static,
{
  /// Creates an empty document and the render queue it publishes to.
  pub fn new(config: Config) -> Result<(Self, Renders<X>)>
  where
    X: Default,
  {
    Self::with_extra(config, X::default())
  }

  pub fn with_extra(config: Config, extra: X) -> Result<(Self, Renders<X>)> {
    config.validate()?;
    let (tx, rx) = channel::bounded(config.render_queue_capacity);
    let state = State {
      text:   History::new(Text::new(), config.history_depth),
      cursor: Cursor::default(),
      window: Window::default(),
      status: Status {
        message: None,
        progress: None,
        modified: false,
        extra,
      },
      loaded: false,
    };
    let editor = Self {
      shared: Arc::new(Shared {
        config,
        state: Mutex::new(state),
        renders: tx,
        subscribers: Registry::new(),
      }),
    };
    Ok((editor, rx))
  }

  pub fn config(&self) -> &Config {
    &self.shared.config
  }

  /// Attaches `source` and starts indexing it in the background. Can only
  /// be done once per document.
  ///
  /// The returned completion resolves when the scan ends: successfully,
  /// cancelled through `cancel` (not an error), or with an error. Lines are
  /// appended to every retained history version as they are found, so
  /// editing during a load is safe and undo never drops loaded lines.
  pub fn load(&self, cancel: CancellationToken, source: SharedSource) -> Result<LoadCompletion> {
    self.load_with(cancel, source, |task| {
      thread::Builder::new()
        .name("document-loader".into())
        .spawn(task)
        .map(drop)
    })
  }

  /// Starts a load on whatever `spawn` runs the scan on. The document is only
  /// reset once the scan has been handed off, so a failed spawn leaves it
  /// unloaded.
  fn load_with<S>(
    &self,
    cancel: CancellationToken,
    source: SharedSource,
    spawn: S,
  ) -> Result<LoadCompletion>
  where
    S: FnOnce(Box<dyn FnOnce() + Send + 'static>) -> io::Result<()>,
  {
    let total = source.len();
    let mut state = self.shared.state.lock();
    if state.loaded {
      return Err(EditorError::AlreadyLoaded);
    }

    // The scan blocks on the state lock until the reset below is published.
    let (tx, completion) = LoadCompletion::channel();
    let shared = self.shared.clone();
    let scanned = source.clone();
    spawn(Box::new(move || {
      let outcome = shared.run_load(&scanned, &cancel);
      if tx.send(outcome).is_err() {
        log::debug!("load completion dropped before the load ended");
      }
    }))?;

    state.loaded = true;
    state.text = History::new(Text::with_source(source), self.shared.config.history_depth);
    state.cursor = Cursor::default();
    state.status.progress = Some(Progress { loaded: 0, total });
    state.fix(&self.shared.config)?;
    self.shared.publish(&state);
    Ok(completion)
  }

  /// Registers a handler called with every logged operation.
  pub fn subscribe<F>(&self, handler: F) -> SubscriberKey
  where
    F: Fn(&LogEntry) + Send + Sync + 'static,
  {
    self.shared.subscribers.subscribe(handler)
  }

  pub fn unsubscribe(&self, key: SubscriberKey) -> bool {
    self.shared.subscribers.unsubscribe(key)
  }

  /// A snapshot of the current state, bypassing the render queue.
  pub fn render(&self) -> View<X> {
    self.shared.state.lock().view()
  }

  pub fn text(&self) -> Text {
    self.shared.state.lock().text.get().clone()
  }

  pub fn cursor(&self) -> Cursor {
    self.shared.state.lock().cursor
  }

  pub fn window(&self) -> Window {
    self.shared.state.lock().window
  }

  pub fn status(&self) -> Status<X> {
    self.shared.state.lock().status.clone()
  }

  pub fn can_undo(&self) -> bool {
    self.shared.state.lock().text.can_undo()
  }

  pub fn can_redo(&self) -> bool {
    self.shared.state.lock().text.can_redo()
  }

  pub fn set_message(&self, message: impl Into<String>) {
    self.with_state(|state| state.status.message = Some(message.into()));
  }

  pub fn clear_message(&self) {
    self.with_state(|state| state.status.message = None);
  }

  /// Updates the caller-owned part of the status.
  pub fn update_extra(&self, f: impl FnOnce(&mut X)) {
    self.with_state(|state| f(&mut state.status.extra));
  }

  pub fn resize(&self, height: usize, width: usize) -> Result<()> {
    self.navigate(|state| {
      state.window.height = height;
      state.window.width = width;
    })
  }

  /// Atomically writes the current text to `path` and clears the modified
  /// flag.
  pub fn save(&self, path: &Path) -> Result<()> {
    let text = self.text();
    the_stdx::fs::write_atomic(path, |out| {
      text.write_to(out).map_err(|err| {
        match err {
          TextError::Io(err) => err,
          other => io::Error::other(other),
        }
      })
    })?;
    self.with_state(|state| {
      state.status.modified = false;
      state.status.message = Some(format!("wrote {} lines to {}", text.len(), path.display()));
    });
    Ok(())
  }

  pub fn type_char(&self, ch: char) -> Result<()> {
    self.mutate(
      |state| {
        Ok(LogEntry::Type {
          row: state.cursor.row,
          col: state.cursor.col,
          ch,
        })
      },
      |state| state.type_char(ch),
    )
  }

  pub fn backspace(&self) -> Result<()> {
    self.mutate(
      |state| {
        Ok(LogEntry::Backspace {
          row: state.cursor.row,
          col: state.cursor.col,
        })
      },
      State::backspace,
    )
  }

  pub fn delete(&self) -> Result<()> {
    self.mutate(
      |state| {
        Ok(LogEntry::Delete {
          row: state.cursor.row,
          col: state.cursor.col,
        })
      },
      State::delete,
    )
  }

  pub fn enter(&self) -> Result<()> {
    self.mutate(
      |state| {
        Ok(LogEntry::Enter {
          row: state.cursor.row,
          col: state.cursor.col,
        })
      },
      State::enter,
    )
  }

  /// Inserts the lines of `lines` above the cursor row; the cursor moves
  /// down with the line it was on. Lazy lines are read from the source of
  /// `lines`, so a paste from another document keeps its content.
  pub fn insert_lines(&self, lines: &Text) -> Result<()> {
    self.mutate(
      |state| {
        Ok(LogEntry::InsertLines {
          row:   state.cursor.row,
          lines: lines.to_strings()?,
        })
      },
      |state| state.insert_lines(lines),
    )
  }

  /// Removes up to `count` lines starting at the cursor row.
  pub fn delete_lines(&self, count: usize) -> Result<()> {
    self.mutate(
      |state| {
        Ok(LogEntry::DeleteLines {
          row: state.cursor.row,
          count,
        })
      },
      |state| state.delete_lines(count),
    )
  }

  /// Steps back one history version. The cursor stays where it was, clamped
  /// into the restored text.
  pub fn undo(&self) -> Result<()> {
    self.mutate(|_| Ok(LogEntry::Undo), |state| Ok(state.text.undo()))
  }

  pub fn redo(&self) -> Result<()> {
    self.mutate(|_| Ok(LogEntry::Redo), |state| Ok(state.text.redo()))
  }

  /// Replays a logged operation: moves the cursor to the recorded position,
  /// then performs the operation.
  pub fn apply(&self, entry: &LogEntry) -> Result<()> {
    if let Some((row, col)) = entry.position() {
      self.goto(row, col)?;
    }
    match entry {
      LogEntry::SetVersion(_) => Ok(()),
      LogEntry::Type { ch, .. } => self.type_char(*ch),
      LogEntry::Enter { .. } => self.enter(),
      LogEntry::Backspace { .. } => self.backspace(),
      LogEntry::Delete { .. } => self.delete(),
      LogEntry::Undo => self.undo(),
      LogEntry::Redo => self.redo(),
      LogEntry::InsertLines { lines, .. } => {
        self.insert_lines(&Text::from_lines(lines.iter().map(String::as_str)))
      },
      LogEntry::DeleteLines { count, .. } => self.delete_lines(*count),
    }
  }

  pub fn move_left(&self) -> Result<()> {
    self.move_by(0, -1)
  }

  pub fn move_right(&self) -> Result<()> {
    self.move_by(0, 1)
  }

  pub fn move_up(&self) -> Result<()> {
    self.move_by(-1, 0)
  }

  pub fn move_down(&self) -> Result<()> {
    self.move_by(1, 0)
  }

  pub fn move_home(&self) -> Result<()> {
    self.navigate(|state| state.cursor.col = 0)
  }

  pub fn move_end(&self) -> Result<()> {
    self.navigate(|state| state.cursor.col = usize::MAX)
  }

  pub fn page_up(&self) -> Result<()> {
    self.navigate(|state| {
      let page = state.window.height.max(1);
      state.cursor.row = state.cursor.row.saturating_sub(page);
    })
  }

  pub fn page_down(&self) -> Result<()> {
    self.navigate(|state| {
      let page = state.window.height.max(1);
      state.cursor.row = state.cursor.row.saturating_add(page);
    })
  }

  /// Moves the cursor by a relative amount. Out of range targets are
  /// clamped into the document rather than rejected.
  pub fn move_by(&self, rows: isize, cols: isize) -> Result<()> {
    self.navigate(|state| state.move_by(rows, cols))
  }

  /// Moves the cursor to an absolute position, going through the same
  /// clamping as relative moves.
  pub fn goto(&self, row: usize, col: usize) -> Result<()> {
    self.navigate(|state| {
      let rows = delta(state.cursor.row, row);
      let cols = delta(state.cursor.col, col);
      state.move_by(rows, cols);
    })
  }

  fn with_state(&self, f: impl FnOnce(&mut State<X>)) {
    let mut state = self.shared.state.lock();
    f(&mut *state);
    self.shared.publish(&state);
  }

  fn navigate(&self, f: impl FnOnce(&mut State<X>)) -> Result<()> {
    let mut state = self.shared.state.lock();
    f(&mut *state);
    state.fix(&self.shared.config)?;
    self.shared.publish(&state);
    Ok(())
  }

  fn mutate<E, F>(&self, entry: E, edit: F) -> Result<()>
  where
    E: FnOnce(&State<X>) -> Result<LogEntry>,
    F: FnOnce(&mut State<X>) -> text::Result<bool>,
  {
    let mut state = self.shared.state.lock();
    let entry = entry(&*state)?;
    self.shared.subscribers.notify(&entry);
    let changed = edit(&mut *state).inspect_err(|err| {
      log::warn!("{:?} was logged but failed: {err}", entry.command());
    })?;
    if changed {
      state.status.modified = true;
    }
    state.fix(&self.shared.config)?;
    self.shared.publish(&state);
    Ok(())
  }
}

impl<X: Clone> Shared<X> {
  /// Pushes a snapshot to the render queue, blocking while it is full. Must
  /// be called with the state lock held.
  fn publish(&self, state: &State<X>) {
    if self.renders.send(state.view()).is_err() {
      log::debug!("render queue has no receiver, dropping frame");
    }
  }

  fn run_load(
    &self,
    source: &SharedSource,
    cancel: &CancellationToken,
  ) -> std::result::Result<LoadSummary, LoadError> {
    let total = source.len();
    let mut throttle = Throttle::new(self.config.loading_interval());
    let mut lines = 0usize;
    let mut scanned = 0u64;
    log::debug!("loading {total} bytes");

    let outcome = loader::scan_lines(
      source.as_ref(),
      self.config.delimiter_byte(),
      self.config.scan_chunk_size,
      cancel,
      |batch, position| -> std::result::Result<(), LoadError> {
        let mut state = self.state.lock();
        lines += batch.len();
        scanned = position;
        if !batch.is_empty() {
          let batch = Seq::from_vec(batch);
          state.text.map_all(|text| text.append_seq(&batch))?;
        }
        state.status.progress = Some(Progress {
          loaded: position,
          total,
        });
        if throttle.ready(position, total) {
          self.publish(&state);
        }
        Ok(())
      },
    );

    let mut state = self.state.lock();
    state.status.progress = None;
    let result = match outcome {
      Ok(outcome) => {
        let cancelled = outcome == ScanOutcome::Cancelled;
        state.status.message = Some(if cancelled {
          format!("load cancelled after {lines} lines")
        } else {
          format!("loaded {lines} lines")
        });
        log::debug!("load finished: {lines} lines, {scanned} of {total} bytes, cancelled: {cancelled}");
        Ok(LoadSummary {
          lines,
          bytes: scanned,
          cancelled,
        })
      },
      Err(err) => {
        log::error!("load failed after {lines} lines: {err}");
        state.status.message = Some(format!("load failed: {err}"));
        Err(err)
      },
    };
    self.publish(&state);
    result
  }
}

impl<X: Clone> State<X> {
  fn view(&self) -> View<X> {
    View {
      text:   self.text.get().clone(),
      cursor: self.cursor,
      window: self.window,
      status: self.status.clone(),
    }
  }
}

impl<X> State<X> {
  /// Clamps the cursor into the current text and scrolls the window to it.
  fn fix(&mut self, config: &Config) -> text::Result<()> {
    let text = self.text.get();
    if text.is_empty() {
      self.cursor = Cursor::default();
      self.window.scroll_to(0, 0);
      return Ok(());
    }
    self.cursor.row = self.cursor.row.min(text.len() - 1);
    let line = text.get(self.cursor.row)?;
    self.cursor.col = self.cursor.col.min(line.len());
    let col = display_col(&line, self.cursor.col, config.tab_size);
    self.window.scroll_to(self.cursor.row, col);
    Ok(())
  }

  fn move_by(&mut self, rows: isize, cols: isize) {
    self.cursor.row = self.cursor.row.saturating_add_signed(rows);
    self.cursor.col = self.cursor.col.saturating_add_signed(cols);
  }

  /// Current line, which must exist.
  fn current_line(&self) -> text::Result<Vec<char>> {
    let Cursor { row, col } = self.cursor;
    let chars = self.text.get().get(row)?;
    assert!(
      col <= chars.len(),
      "cursor column {col} is past the end of row {row}"
    );
    Ok(chars)
  }

  fn commit(&mut self, text: Text) {
    self.text.push(text);
  }

  fn type_char(&mut self, ch: char) -> text::Result<bool> {
    let text = self.text.get();
    if text.is_empty() {
      let next = text.insert(0, vec![ch])?;
      self.commit(next);
      self.cursor = Cursor::new(0, 1);
      return Ok(true);
    }
    let Cursor { row, col } = self.cursor;
    let mut chars = self.current_line()?;
    chars.insert(col, ch);
    let next = self.text.get().set(row, chars)?;
    self.commit(next);
    self.cursor.col += 1;
    Ok(true)
  }

  fn backspace(&mut self) -> text::Result<bool> {
    let Cursor { row, col } = self.cursor;
    if self.text.get().is_empty() || (row == 0 && col == 0) {
      return Ok(false);
    }
    let mut chars = self.current_line()?;
    let text = self.text.get();
    if col == 0 {
      let mut previous = text.get(row - 1)?;
      let join_at = previous.len();
      previous.extend(chars);
      let next = text.set(row - 1, previous)?.remove(row)?;
      self.commit(next);
      self.cursor = Cursor::new(row - 1, join_at);
    } else {
      chars.remove(col - 1);
      let next = text.set(row, chars)?;
      self.commit(next);
      self.cursor.col -= 1;
    }
    Ok(true)
  }

  fn delete(&mut self) -> text::Result<bool> {
    let Cursor { row, col } = self.cursor;
    if self.text.get().is_empty() {
      return Ok(false);
    }
    let mut chars = self.current_line()?;
    let text = self.text.get();
    if col == chars.len() {
      if row + 1 == text.len() {
        return Ok(false);
      }
      chars.extend(text.get(row + 1)?);
      let next = text.set(row, chars)?.remove(row + 1)?;
      self.commit(next);
    } else {
      chars.remove(col);
      let next = text.set(row, chars)?;
      self.commit(next);
    }
    Ok(true)
  }

  fn enter(&mut self) -> text::Result<bool> {
    let text = self.text.get();
    if text.is_empty() {
      let next = text.insert(0, Line::empty())?;
      self.commit(next);
      self.cursor = Cursor::default();
      return Ok(true);
    }
    let Cursor { row, col } = self.cursor;
    let mut chars = self.current_line()?;
    let text = self.text.get();
    let next = if col == chars.len() {
      // Keeps a lazy line lazy.
      text.insert(row + 1, Line::empty())?
    } else {
      let tail = chars.split_off(col);
      text.set(row, chars)?.insert(row + 1, tail)?
    };
    self.commit(next);
    self.cursor = Cursor::new(row + 1, 0);
    Ok(true)
  }

  fn insert_lines(&mut self, lines: &Text) -> text::Result<bool> {
    if lines.is_empty() {
      return Ok(false);
    }
    let text = self.text.get();
    let row = self.cursor.row.min(text.len());
    let next = text.splice(row, &text.adopt(lines)?)?;
    self.commit(next);
    self.cursor.row += lines.len();
    Ok(true)
  }

  fn delete_lines(&mut self, count: usize) -> text::Result<bool> {
    let text = self.text.get();
    if text.is_empty() || count == 0 {
      return Ok(false);
    }
    let next = text.remove_lines(self.cursor.row, count)?;
    self.commit(next);
    Ok(true)
  }
}

fn delta(from: usize, to: usize) -> isize {
  if to >= from {
    isize::try_from(to - from).unwrap_or(isize::MAX)
  } else {
    isize::try_from(from - to).map_or(isize::MIN, |d| -d)
  }
}
