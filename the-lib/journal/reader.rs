use std::io::{
  self,
  Read,
};

use super::{
  INITIAL_VERSION,
  JournalError,
  LogEntry,
  Result,
  Serializer,
  serializer_for,
};

/// Decodes the records of a journal, in order.
///
/// Iteration stops cleanly at end of input. A record whose declared length
/// runs past the end of input is reported as [`JournalError::Incomplete`];
/// after any error the reader yields nothing more.
pub struct JournalReader<R: Read> {
  input:      R,
  serializer: &'static dyn Serializer,
  finished:   bool,
}

impl<R: Read> JournalReader<R> {
  pub fn new(input: R) -> Self {
    Self {
      input,
      serializer: initial(),
      finished: false,
    }
  }

  /// Version of the serializer that will decode the next record.
  pub fn version(&self) -> u32 {
    self.serializer.version()
  }

  fn read_entry(&mut self) -> Result<Option<LogEntry>> {
    let mut header = [0u8; 4];
    let found = read_full(&mut self.input, &mut header)?;
    if found == 0 {
      return Ok(None);
    }
    if found < header.len() {
      return Err(JournalError::Incomplete {
        expected: header.len(),
        found,
      });
    }

    let expected = u32::from_le_bytes(header) as usize;
    let mut payload = Vec::new();
    (&mut self.input)
      .take(expected as u64)
      .read_to_end(&mut payload)?;
    if payload.len() < expected {
      return Err(JournalError::Incomplete {
        expected,
        found: payload.len(),
      });
    }

    let entry = self.serializer.decode(&payload)?;
    if let LogEntry::SetVersion(version) = entry {
      self.serializer = serializer_for(version)?;
    }
    Ok(Some(entry))
  }
}

impl<R: Read> Iterator for JournalReader<R> {
  type Item = Result<LogEntry>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    match self.read_entry() {
      Ok(Some(entry)) => Some(Ok(entry)),
      Ok(None) => {
        self.finished = true;
        None
      },
      Err(err) => {
        self.finished = true;
        Some(Err(err))
      },
    }
  }
}

fn initial() -> &'static dyn Serializer {
  match serializer_for(INITIAL_VERSION) {
    Ok(serializer) => serializer,
    Err(_) => unreachable!("the initial journal serializer is always registered"),
  }
}

/// Reads until `buf` is full or the input ends, returning the bytes read.
fn read_full(input: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
  let mut filled = 0;
  while filled < buf.len() {
    match input.read(&mut buf[filled..]) {
      Ok(0) => break,
      Ok(n) => filled += n,
      Err(err) if err.kind() == io::ErrorKind::Interrupted => {},
      Err(err) => return Err(err),
    }
  }
  Ok(filled)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::journal::JournalWriter;

  fn journal(version: u32, entries: &[LogEntry]) -> Vec<u8> {
    let mut writer = JournalWriter::open(Vec::new(), version).unwrap();
    for entry in entries {
      writer.write(entry).unwrap();
    }
    writer.into_inner()
  }

  fn read_all(bytes: &[u8]) -> Result<Vec<LogEntry>> {
    JournalReader::new(bytes).collect()
  }

  #[test]
  fn empty_input_has_no_entries() {
    assert!(read_all(&[]).unwrap().is_empty());
  }

  #[test]
  fn reads_every_version() {
    let entries = [
      LogEntry::Type {
        row: 0,
        col: 0,
        ch:  'x',
      },
      LogEntry::InsertLines {
        row:   1,
        lines: vec!["a b".into()],
      },
      LogEntry::Undo,
    ];
    for version in [0, 1] {
      let read = read_all(&journal(version, &entries)).unwrap();
      assert_eq!(read[0], LogEntry::SetVersion(version));
      assert_eq!(&read[1..], &entries);
    }
  }

  #[test]
  fn truncated_payload_is_an_error() {
    let mut bytes = journal(1, &[LogEntry::Delete { row: 1, col: 1 }]);
    bytes.pop();
    let mut reader = JournalReader::new(bytes.as_slice());
    assert!(matches!(reader.next(), Some(Ok(LogEntry::SetVersion(1)))));
    assert!(matches!(
      reader.next(),
      Some(Err(JournalError::Incomplete {
        expected: 17,
        found:    16,
      }))
    ));
    assert!(reader.next().is_none());
  }

  #[test]
  fn truncated_header_is_an_error() {
    let mut bytes = journal(0, &[]);
    bytes.extend_from_slice(&[3, 0]);
    assert!(matches!(
      read_all(&bytes),
      Err(JournalError::Incomplete {
        expected: 4,
        found:    2,
      })
    ));
  }

  #[test]
  fn unknown_version_record_is_an_error() {
    let mut bytes = Vec::new();
    let payload = b"set-version 9\n";
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    assert!(matches!(
      read_all(&bytes),
      Err(JournalError::SerializerNotFound(9))
    ));
  }
}
