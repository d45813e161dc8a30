use std::io::Write;

use super::{
  INITIAL_VERSION,
  JournalError,
  LogEntry,
  LogSink,
  Result,
  Serializer,
  serializer_for,
};

/// Appends length-prefixed records to an output stream.
///
/// Each record is written with a single `write_all` followed by a flush. If
/// either fails the writer is poisoned: the stream may end in a torn record,
/// but nothing is ever appended after it.
pub struct JournalWriter<W: Write> {
  out:        W,
  serializer: &'static dyn Serializer,
  frame:      Vec<u8>,
  poisoned:   bool,
}

impl<W: Write> JournalWriter<W> {
  /// Starts a journal on `out`, announcing `version` with the initial
  /// serializer and using it for every following record.
  pub fn open(out: W, version: u32) -> Result<Self> {
    serializer_for(version)?;
    let mut writer = Self {
      out,
      serializer: serializer_for(INITIAL_VERSION)?,
      frame: Vec::new(),
      poisoned: false,
    };
    writer.write(&LogEntry::SetVersion(version))?;
    Ok(writer)
  }

  pub fn version(&self) -> u32 {
    self.serializer.version()
  }

  pub fn is_poisoned(&self) -> bool {
    self.poisoned
  }

  pub fn into_inner(self) -> W {
    self.out
  }

  /// Appends one record. A `SetVersion` entry switches the serializer for
  /// the records after it, the same way the reader does.
  pub fn write(&mut self, entry: &LogEntry) -> Result<()> {
    if self.poisoned {
      return Err(JournalError::Poisoned);
    }
    let next = match entry {
      LogEntry::SetVersion(version) => Some(serializer_for(*version)?),
      _ => None,
    };

    self.frame.clear();
    self.frame.extend_from_slice(&[0; 4]);
    self.serializer.encode(entry, &mut self.frame)?;
    let len = self.frame.len() - 4;
    let len = u32::try_from(len).map_err(|_| JournalError::TooLarge(len))?;
    self.frame[..4].copy_from_slice(&len.to_le_bytes());

    if let Err(err) = self
      .out
      .write_all(&self.frame)
      .and_then(|()| self.out.flush())
    {
      self.poisoned = true;
      log::error!("journal write failed, no further records will be written: {err}");
      return Err(err.into());
    }
    if let Some(serializer) = next {
      self.serializer = serializer;
    }
    Ok(())
  }
}

impl<W: Write + Send> LogSink for JournalWriter<W> {
  fn write(&mut self, entry: &LogEntry) -> Result<()> {
    JournalWriter::write(self, entry)
  }
}
