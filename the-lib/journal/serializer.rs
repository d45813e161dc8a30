use std::str::FromStr;

use super::{
  Command,
  JournalError,
  LogEntry,
  Result,
};

/// Version of the serializer every journal starts with. Frozen forever.
pub const INITIAL_VERSION: u32 = TEXT_VERSION;
pub const TEXT_VERSION: u32 = 0;
pub const BINARY_VERSION: u32 = 1;

/// Encodes and decodes record payloads for one journal format version.
pub trait Serializer: Send + Sync {
  fn version(&self) -> u32;
  fn encode(&self, entry: &LogEntry, out: &mut Vec<u8>) -> Result<()>;
  fn decode(&self, payload: &[u8]) -> Result<LogEntry>;
}

static TEXT: TextSerializer = TextSerializer;
static BINARY: BinarySerializer = BinarySerializer;

pub fn serializer_for(version: u32) -> Result<&'static dyn Serializer> {
  match version {
    TEXT_VERSION => Ok(&TEXT),
    BINARY_VERSION => Ok(&BINARY),
    other => Err(JournalError::SerializerNotFound(other)),
  }
}

fn parse_error(message: impl Into<String>) -> JournalError {
  JournalError::Parse(message.into())
}

/// Human-readable records: the command name followed by space separated
/// fields and a newline. Characters are written as their scalar value and
/// inserted lines as a JSON array of strings.
///
/// ```text
/// type 0 3 97
/// insert-lines 2 ["foo","bar"]
/// undo
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSerializer;

impl Serializer for TextSerializer {
  fn version(&self) -> u32 {
    TEXT_VERSION
  }

  fn encode(&self, entry: &LogEntry, out: &mut Vec<u8>) -> Result<()> {
    let name = entry.command().name();
    let record = match entry {
      LogEntry::SetVersion(version) => format!("{name} {version}"),
      LogEntry::Type { row, col, ch } => format!("{name} {row} {col} {}", u32::from(*ch)),
      LogEntry::Enter { row, col }
      | LogEntry::Backspace { row, col }
      | LogEntry::Delete { row, col } => format!("{name} {row} {col}"),
      LogEntry::Undo | LogEntry::Redo => name.to_string(),
      LogEntry::InsertLines { row, lines } => {
        let lines = serde_json::to_string(lines).map_err(|err| parse_error(err.to_string()))?;
        format!("{name} {row} {lines}")
      },
      LogEntry::DeleteLines { row, count } => format!("{name} {row} {count}"),
    };
    out.extend_from_slice(record.as_bytes());
    out.push(b'\n');
    Ok(())
  }

  fn decode(&self, payload: &[u8]) -> Result<LogEntry> {
    let record = std::str::from_utf8(payload).map_err(|err| parse_error(err.to_string()))?;
    let record = record
      .strip_suffix('\n')
      .ok_or_else(|| parse_error("record is not newline terminated"))?;
    let (name, rest) = record.split_once(' ').unwrap_or((record, ""));
    let command =
      Command::from_name(name).ok_or_else(|| parse_error(format!("unknown command {name:?}")))?;

    if command == Command::InsertLines {
      let (row, lines) = rest
        .split_once(' ')
        .ok_or_else(|| parse_error("insert-lines needs a row and a line list"))?;
      let lines: Vec<String> =
        serde_json::from_str(lines).map_err(|err| parse_error(err.to_string()))?;
      return Ok(LogEntry::InsertLines {
        row: number(row)?,
        lines,
      });
    }

    let fields: Vec<&str> = if rest.is_empty() {
      Vec::new()
    } else {
      rest.split(' ').collect()
    };
    let expect = |count: usize| {
      if fields.len() == count {
        Ok(())
      } else {
        Err(parse_error(format!(
          "{name} takes {count} fields, found {}",
          fields.len()
        )))
      }
    };

    let entry = match command {
      Command::SetVersion => {
        expect(1)?;
        LogEntry::SetVersion(number(fields[0])?)
      },
      Command::Type => {
        expect(3)?;
        let scalar: u32 = number(fields[2])?;
        let ch = char::from_u32(scalar)
          .ok_or_else(|| parse_error(format!("{scalar} is not a Unicode scalar value")))?;
        LogEntry::Type {
          row: number(fields[0])?,
          col: number(fields[1])?,
          ch,
        }
      },
      Command::Enter => {
        expect(2)?;
        LogEntry::Enter {
          row: number(fields[0])?,
          col: number(fields[1])?,
        }
      },
      Command::Backspace => {
        expect(2)?;
        LogEntry::Backspace {
          row: number(fields[0])?,
          col: number(fields[1])?,
        }
      },
      Command::Delete => {
        expect(2)?;
        LogEntry::Delete {
          row: number(fields[0])?,
          col: number(fields[1])?,
        }
      },
      Command::Undo => {
        expect(0)?;
        LogEntry::Undo
      },
      Command::Redo => {
        expect(0)?;
        LogEntry::Redo
      },
      Command::DeleteLines => {
        expect(2)?;
        LogEntry::DeleteLines {
          row:   number(fields[0])?,
          count: number(fields[1])?,
        }
      },
      Command::InsertLines => unreachable!("insert-lines is decoded above"),
    };
    Ok(entry)
  }
}

fn number<T: FromStr>(field: &str) -> Result<T> {
  field
    .parse()
    .map_err(|_| parse_error(format!("invalid number {field:?}")))
}

/// Compact records: one command byte from the [`Command`] table followed by
/// fixed-width little-endian fields.
///
/// | command        | fields |
/// |----------------|--------|
/// | `SetVersion`   | version `u32` |
/// | `Type`         | row `u64`, col `u64`, scalar `u32` |
/// | `Enter`, `Backspace`, `Delete` | row `u64`, col `u64` |
/// | `Undo`, `Redo` | none |
/// | `InsertLines`  | row `u64`, count `u32`, then per line: length `u32`, UTF-8 bytes |
/// | `DeleteLines`  | row `u64`, count `u64` |
#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
  fn version(&self) -> u32 {
    BINARY_VERSION
  }

  fn encode(&self, entry: &LogEntry, out: &mut Vec<u8>) -> Result<()> {
    out.push(entry.command() as u8);
    match entry {
      LogEntry::SetVersion(version) => out.extend_from_slice(&version.to_le_bytes()),
      LogEntry::Type { row, col, ch } => {
        put_position(out, *row, *col);
        out.extend_from_slice(&u32::from(*ch).to_le_bytes());
      },
      LogEntry::Enter { row, col }
      | LogEntry::Backspace { row, col }
      | LogEntry::Delete { row, col } => put_position(out, *row, *col),
      LogEntry::Undo | LogEntry::Redo => {},
      LogEntry::InsertLines { row, lines } => {
        out.extend_from_slice(&(*row as u64).to_le_bytes());
        put_len(out, lines.len())?;
        for line in lines {
          put_len(out, line.len())?;
          out.extend_from_slice(line.as_bytes());
        }
      },
      LogEntry::DeleteLines { row, count } => {
        out.extend_from_slice(&(*row as u64).to_le_bytes());
        out.extend_from_slice(&(*count as u64).to_le_bytes());
      },
    }
    Ok(())
  }

  fn decode(&self, payload: &[u8]) -> Result<LogEntry> {
    let mut bytes = Bytes { rest: payload };
    let tag = bytes.u8()?;
    let command =
      Command::from_byte(tag).ok_or_else(|| parse_error(format!("unknown command byte {tag}")))?;
    let entry = match command {
      Command::SetVersion => LogEntry::SetVersion(bytes.u32()?),
      Command::Type => {
        let (row, col) = (bytes.usize()?, bytes.usize()?);
        let scalar = bytes.u32()?;
        let ch = char::from_u32(scalar)
          .ok_or_else(|| parse_error(format!("{scalar} is not a Unicode scalar value")))?;
        LogEntry::Type { row, col, ch }
      },
      Command::Enter => {
        LogEntry::Enter {
          row: bytes.usize()?,
          col: bytes.usize()?,
        }
      },
      Command::Backspace => {
        LogEntry::Backspace {
          row: bytes.usize()?,
          col: bytes.usize()?,
        }
      },
      Command::Delete => {
        LogEntry::Delete {
          row: bytes.usize()?,
          col: bytes.usize()?,
        }
      },
      Command::Undo => LogEntry::Undo,
      Command::Redo => LogEntry::Redo,
      Command::InsertLines => {
        let row = bytes.usize()?;
        let count = bytes.u32()?;
        let mut lines = Vec::new();
        for _ in 0..count {
          let len = bytes.u32()? as usize;
          let raw = bytes.take(len)?;
          let line = std::str::from_utf8(raw).map_err(|err| parse_error(err.to_string()))?;
          lines.push(line.to_string());
        }
        LogEntry::InsertLines { row, lines }
      },
      Command::DeleteLines => {
        LogEntry::DeleteLines {
          row:   bytes.usize()?,
          count: bytes.usize()?,
        }
      },
    };
    if !bytes.rest.is_empty() {
      return Err(parse_error(format!(
        "{} trailing bytes after {}",
        bytes.rest.len(),
        command.name()
      )));
    }
    Ok(entry)
  }
}

fn put_position(out: &mut Vec<u8>, row: usize, col: usize) {
  out.extend_from_slice(&(row as u64).to_le_bytes());
  out.extend_from_slice(&(col as u64).to_le_bytes());
}

fn put_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
  let len = u32::try_from(len).map_err(|_| JournalError::TooLarge(len))?;
  out.extend_from_slice(&len.to_le_bytes());
  Ok(())
}

struct Bytes<'a> {
  rest: &'a [u8],
}

impl<'a> Bytes<'a> {
  fn take(&mut self, n: usize) -> Result<&'a [u8]> {
    if self.rest.len() < n {
      return Err(parse_error(format!(
        "field needs {n} bytes, {} left",
        self.rest.len()
      )));
    }
    let (head, rest) = self.rest.split_at(n);
    self.rest = rest;
    Ok(head)
  }

  fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
    let mut array = [0u8; N];
    array.copy_from_slice(self.take(N)?);
    Ok(array)
  }

  fn u8(&mut self) -> Result<u8> {
    Ok(self.array::<1>()?[0])
  }

  fn u32(&mut self) -> Result<u32> {
    Ok(u32::from_le_bytes(self.array()?))
  }

  fn usize(&mut self) -> Result<usize> {
    let value = u64::from_le_bytes(self.array()?);
    usize::try_from(value).map_err(|_| parse_error(format!("{value} does not fit in usize")))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn samples() -> Vec<LogEntry> {
    vec![
      LogEntry::SetVersion(1),
      LogEntry::Type {
        row: 3,
        col: 7,
        ch:  'é',
      },
      LogEntry::Type {
        row: 0,
        col: 0,
        ch:  ' ',
      },
      LogEntry::Enter { row: 1, col: 2 },
      LogEntry::Backspace { row: 0, col: 0 },
      LogEntry::Delete {
        row: 10,
        col: 20,
      },
      LogEntry::Undo,
      LogEntry::Redo,
      LogEntry::InsertLines {
        row:   4,
        lines: vec!["plain".into(), "with \"quotes\" and \\".into(), String::new()],
      },
      LogEntry::InsertLines {
        row:   0,
        lines: Vec::new(),
      },
      LogEntry::DeleteLines { row: 2, count: 5 },
    ]
  }

  fn round_trip(serializer: &dyn Serializer) {
    for entry in samples() {
      let mut payload = Vec::new();
      serializer.encode(&entry, &mut payload).unwrap();
      assert_eq!(serializer.decode(&payload).unwrap(), entry, "{entry:?}");
    }
  }

  #[test]
  fn text_round_trip() {
    round_trip(&TextSerializer);
  }

  #[test]
  fn binary_round_trip() {
    round_trip(&BinarySerializer);
  }

  #[test]
  fn text_format_is_readable() {
    let mut payload = Vec::new();
    TextSerializer
      .encode(
        &LogEntry::Type {
          row: 1,
          col: 2,
          ch:  'a',
        },
        &mut payload,
      )
      .unwrap();
    assert_eq!(payload, b"type 1 2 97\n");
  }

  #[test]
  fn binary_layout_is_fixed() {
    let mut payload = Vec::new();
    BinarySerializer
      .encode(&LogEntry::Enter { row: 1, col: 2 }, &mut payload)
      .unwrap();
    assert_eq!(payload, [
      2, 1, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0
    ]);
  }

  #[test]
  fn rejects_unknown_commands() {
    assert!(matches!(
      TextSerializer.decode(b"paste 1 2\n"),
      Err(JournalError::Parse(_))
    ));
    assert!(matches!(
      BinarySerializer.decode(&[42]),
      Err(JournalError::Parse(_))
    ));
  }

  #[test]
  fn rejects_malformed_payloads() {
    assert!(TextSerializer.decode(b"type 1 2\n").is_err());
    assert!(TextSerializer.decode(b"undo").is_err());
    assert!(TextSerializer.decode(b"type 1 2 55296\n").is_err());
    assert!(BinarySerializer.decode(&[5, 0]).is_err());
    assert!(BinarySerializer.decode(&[2, 1, 0]).is_err());
  }

  #[test]
  fn unknown_version() {
    assert!(matches!(
      serializer_for(7),
      Err(JournalError::SerializerNotFound(7))
    ));
    assert_eq!(serializer_for(INITIAL_VERSION).unwrap().version(), 0);
  }
}
