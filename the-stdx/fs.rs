//! Filesystem helpers.

use std::{
  fs,
  io::{
    self,
    BufWriter,
    Write,
  },
  path::Path,
};

use tempfile::NamedTempFile;

/// Atomically replaces `path` with whatever `write` produces.
///
/// The content is written to a temporary file in the same directory, synced,
/// given the permissions of the file it replaces (if any) and then renamed
/// over the target. A failure at any point leaves the target untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> io::Result<()>
where
  F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
  let parent = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  let previous = match fs::metadata(path) {
    Ok(meta) => Some(meta.permissions()),
    Err(err) if err.kind() == io::ErrorKind::NotFound => None,
    Err(err) => return Err(err),
  };

  let mut temp = NamedTempFile::new_in(parent)?;
  {
    let mut out = BufWriter::new(temp.as_file_mut());
    write(&mut out)?;
    out.flush()?;
  }
  temp.as_file().sync_all()?;
  if let Some(permissions) = previous {
    temp.as_file().set_permissions(permissions)?;
  }
  temp.persist(path).map_err(|err| err.error)?;
  log::debug!("atomically replaced {}", path.display());
  Ok(())
}
