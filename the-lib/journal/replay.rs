use std::io::Read;

use super::{
  JournalReader,
  LogEntry,
};
use crate::editor::{
  DocumentEditor,
  Result,
};

/// Applies every entry of `reader` to `editor`, in order, and returns how
/// many entries were applied. `SetVersion` records only steer decoding and
/// are not counted.
///
/// Stops at the first unreadable record or failed operation; entries before
/// it stay applied.
pub fn replay<X, R>(editor: &DocumentEditor<X>, reader: JournalReader<R>) -> Result<usize>
where
  X: Clone + Send + 'static,
  R: Read,
{
  let mut applied = 0;
  for entry in reader {
    let entry = entry?;
    if let LogEntry::SetVersion(_) = entry {
      continue;
    }
    editor.apply(&entry)?;
    applied += 1;
  }
  log::debug!("replayed {applied} journal entries");
  Ok(applied)
}
