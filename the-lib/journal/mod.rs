//! Durable, replayable log of edit operations.
//!
//! Every mutating editor operation is described by a [`LogEntry`]. Entries are
//! written by a [`JournalWriter`] as length-prefixed records
//! (`[u32 little-endian length][payload]`), and read back by a
//! [`JournalReader`].
//!
//! # Versioning
//!
//! The first record of every journal is a [`LogEntry::SetVersion`] encoded
//! with the initial serializer (version [`INITIAL_VERSION`]), which must never
//! change. It names the serializer used for every following record. The
//! reader starts with the initial serializer and switches whenever it decodes
//! a `SetVersion`, so journals written by any version stay readable.

mod reader;
mod replay;
mod serializer;
mod task;
mod writer;

use std::io;

use thiserror::Error;

pub use self::{
  reader::JournalReader,
  replay::replay,
  serializer::{
    BINARY_VERSION,
    BinarySerializer,
    INITIAL_VERSION,
    Serializer,
    TEXT_VERSION,
    TextSerializer,
    serializer_for,
  },
  task::JournalTask,
  writer::JournalWriter,
};

#[derive(Debug, Error)]
pub enum JournalError {
  #[error("no serializer for journal version {0}")]
  SerializerNotFound(u32),
  #[error("malformed journal record: {0}")]
  Parse(String),
  #[error("incomplete journal record: expected {expected} bytes, found {found}")]
  Incomplete { expected: usize, found: usize },
  #[error("journal record of {0} bytes does not fit a 32-bit length prefix")]
  TooLarge(usize),
  #[error("journal writer failed earlier and accepts no more records")]
  Poisoned,
  #[error("journal writer thread panicked")]
  WriterPanicked,
  #[error(transparent)]
  Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, JournalError>;

/// A single recorded operation. Positions are the cursor position at the time
/// the operation was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
  SetVersion(u32),
  Type { row: usize, col: usize, ch: char },
  Enter { row: usize, col: usize },
  Backspace { row: usize, col: usize },
  Delete { row: usize, col: usize },
  Undo,
  Redo,
  InsertLines { row: usize, lines: Vec<String> },
  DeleteLines { row: usize, count: usize },
}

impl LogEntry {
  pub fn command(&self) -> Command {
    match self {
      Self::SetVersion(_) => Command::SetVersion,
      Self::Type { .. } => Command::Type,
      Self::Enter { .. } => Command::Enter,
      Self::Backspace { .. } => Command::Backspace,
      Self::Delete { .. } => Command::Delete,
      Self::Undo => Command::Undo,
      Self::Redo => Command::Redo,
      Self::InsertLines { .. } => Command::InsertLines,
      Self::DeleteLines { .. } => Command::DeleteLines,
    }
  }

  /// The cursor position recorded with the entry, if it carries one.
  pub fn position(&self) -> Option<(usize, usize)> {
    match *self {
      Self::Type { row, col, .. }
      | Self::Enter { row, col }
      | Self::Backspace { row, col }
      | Self::Delete { row, col } => Some((row, col)),
      Self::InsertLines { row, .. } | Self::DeleteLines { row, .. } => Some((row, 0)),
      Self::SetVersion(_) | Self::Undo | Self::Redo => None,
    }
  }
}

/// Stable command table shared by every serializer. Values and names must
/// never be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
  SetVersion = 0,
  Type = 1,
  Enter = 2,
  Backspace = 3,
  Delete = 4,
  Undo = 5,
  Redo = 6,
  InsertLines = 7,
  DeleteLines = 8,
}

impl Command {
  pub const ALL: [Command; 9] = [
    Command::SetVersion,
    Command::Type,
    Command::Enter,
    Command::Backspace,
    Command::Delete,
    Command::Undo,
    Command::Redo,
    Command::InsertLines,
    Command::DeleteLines,
  ];

  pub const fn name(self) -> &'static str {
    match self {
      Self::SetVersion => "set-version",
      Self::Type => "type",
      Self::Enter => "enter",
      Self::Backspace => "backspace",
      Self::Delete => "delete",
      Self::Undo => "undo",
      Self::Redo => "redo",
      Self::InsertLines => "insert-lines",
      Self::DeleteLines => "delete-lines",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|command| command.name() == name)
  }

  pub fn from_byte(byte: u8) -> Option<Self> {
    Self::ALL.into_iter().find(|command| *command as u8 == byte)
  }
}

/// Destination for log entries.
pub trait LogSink: Send {
  fn write(&mut self, entry: &LogEntry) -> Result<()>;
}
