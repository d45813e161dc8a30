//! Background indexing of a byte source into lazy lines.
//!
//! [`scan_lines`] walks a [`ByteSource`] front to back and reports batches of
//! [`Line::Lazy`] ranges, one per delimiter. It checks its cancellation token
//! before every chunk and simply stops when cancelled, so whatever was
//! reported up to then forms a consistent prefix of the file.
//!
//! The editor runs the scan on its own thread (see
//! [`DocumentEditor::load`](crate::editor::DocumentEditor::load)) and hands the
//! caller a [`LoadCompletion`] that resolves exactly once.

use std::{
  future::{
    Future,
    IntoFuture,
  },
  io,
  pin::Pin,
};

use the_stdx::source::ByteSource;
use thiserror::Error;
use tokio::sync::oneshot::{
  self,
  error::TryRecvError,
};
use tokio_util::sync::CancellationToken;

use crate::{
  line::Line,
  text::TextError,
};

#[derive(Debug, Error)]
pub enum LoadError {
  #[error("failed to read source: {0}")]
  Io(#[from] io::Error),
  #[error(transparent)]
  Text(#[from] TextError),
  #[error("loader stopped without reporting completion")]
  Interrupted,
}

/// How a scan ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
  Completed,
  Cancelled,
}

/// Summary delivered through a [`LoadCompletion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
  /// Lines appended to the document.
  pub lines:     usize,
  /// Bytes scanned before the load ended.
  pub bytes:     u64,
  pub cancelled: bool,
}

/// Scans `source` for `delimiter`, calling `on_batch` after every chunk with
/// the lines completed in it and the number of bytes scanned so far.
///
/// Line sizes exclude the delimiter, and for `\n` a directly preceding `\r`.
/// A non-empty tail without a delimiter becomes one last line; input ending
/// on a delimiter produces no empty trailing line.
pub fn scan_lines<E, F>(
  source: &dyn ByteSource,
  delimiter: u8,
  chunk_size: usize,
  cancel: &CancellationToken,
  mut on_batch: F,
) -> Result<ScanOutcome, E>
where
  E: From<io::Error>,
  F: FnMut(Vec<Line>, u64) -> Result<(), E>,
{
  let total = source.len();
  let mut buf = vec![0u8; chunk_size.max(1)];
  let mut pos = 0u64;
  let mut line_start = 0u64;
  let mut previous: Option<u8> = None;

  while pos < total {
    if cancel.is_cancelled() {
      return Ok(ScanOutcome::Cancelled);
    }
    let n = source.read_at(&mut buf, pos)?;
    if n == 0 {
      return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "source shrank while loading").into());
    }

    let mut batch = Vec::new();
    for (i, &byte) in buf[..n].iter().enumerate() {
      if byte == delimiter {
        let end = pos + i as u64;
        let mut size = end - line_start;
        if delimiter == b'\n' && size > 0 && previous == Some(b'\r') {
          size -= 1;
        }
        batch.push(Line::lazy(line_start, size));
        line_start = end + 1;
      }
      previous = Some(byte);
    }
    pos += n as u64;
    on_batch(batch, pos)?;
  }

  if line_start < total {
    on_batch(vec![Line::lazy(line_start, total - line_start)], total)?;
  }
  Ok(ScanOutcome::Completed)
}

/// Resolves once when a load finishes, fails or is cancelled.
///
/// Keep the byte source alive at least until this resolves.
#[derive(Debug)]
pub struct LoadCompletion {
  rx: oneshot::Receiver<Result<LoadSummary, LoadError>>,
}

impl LoadCompletion {
  pub(crate) fn channel() -> (
    oneshot::Sender<Result<LoadSummary, LoadError>>,
    Self,
  ) {
    let (tx, rx) = oneshot::channel();
    (tx, Self { rx })
  }

  /// Blocks the current thread until the load ends.
  ///
  /// # Panics
  ///
  /// Panics when called from within an asynchronous execution context; await
  /// the completion there instead.
  pub fn wait(self) -> Result<LoadSummary, LoadError> {
    self.rx.blocking_recv().map_err(|_| LoadError::Interrupted)?
  }

  /// Returns the outcome if the load has ended, without blocking. The outcome
  /// is handed out only once.
  pub fn try_wait(&mut self) -> Option<Result<LoadSummary, LoadError>> {
    match self.rx.try_recv() {
      Ok(outcome) => Some(outcome),
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Closed) => Some(Err(LoadError::Interrupted)),
    }
  }
}

impl IntoFuture for LoadCompletion {
  type Output = Result<LoadSummary, LoadError>;
  type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

  fn into_future(self) -> Self::IntoFuture {
    Box::pin(async move { self.rx.await.map_err(|_| LoadError::Interrupted)? })
  }
}
