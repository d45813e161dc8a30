use std::thread::{
  self,
  JoinHandle,
};

use crossbeam::channel::{
  self,
  Sender,
};

use super::{
  JournalError,
  LogEntry,
  LogSink,
  Result,
};

enum Message {
  Entry(LogEntry),
  Finish,
}

/// Runs a [`LogSink`] on its own thread so that producers never wait for
/// disk I/O.
///
/// Entries are written in the order they were sent. The first write error is
/// fatal: the thread stops, later entries are dropped, and the error is
/// returned from [`JournalTask::finish`].
pub struct JournalTask<S: LogSink + 'static> {
  tx:     Sender<Message>,
  handle: Option<JoinHandle<Result<S>>>,
}

impl<S: LogSink + 'static> JournalTask<S> {
  pub fn spawn(mut sink: S) -> Result<Self> {
    let (tx, rx) = channel::unbounded();
    let handle = thread::Builder::new()
      .name("journal-writer".into())
      .spawn(move || {
        for message in rx {
          match message {
            Message::Entry(entry) => {
              if let Err(err) = sink.write(&entry) {
                log::error!("journal writer stopped: {err}");
                return Err(err);
              }
            },
            Message::Finish => break,
          }
        }
        Ok(sink)
      })?;
    Ok(Self {
      tx,
      handle: Some(handle),
    })
  }

  /// A handler that forwards entries to the writer thread, suitable for
  /// [`DocumentEditor::subscribe`](crate::editor::DocumentEditor::subscribe).
  pub fn subscriber(&self) -> impl Fn(&LogEntry) + Send + Sync + 'static {
    let tx = self.tx.clone();
    move |entry: &LogEntry| {
      if tx.send(Message::Entry(entry.clone())).is_err() {
        log::debug!("journal writer is gone, dropping {:?}", entry.command());
      }
    }
  }

  /// Writes every entry sent so far, stops the thread and returns the sink.
  pub fn finish(mut self) -> Result<S> {
    if self.tx.send(Message::Finish).is_err() {
      log::debug!("journal writer stopped before finish");
    }
    match self.handle.take() {
      Some(handle) => handle.join().map_err(|_| JournalError::WriterPanicked)?,
      None => unreachable!("journal task finished twice"),
    }
  }
}

impl<S: LogSink + 'static> Drop for JournalTask<S> {
  fn drop(&mut self) {
    if self.handle.is_some() && self.tx.send(Message::Finish).is_err() {
      log::debug!("journal writer stopped before the task was dropped");
    }
  }
}
