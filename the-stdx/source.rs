//! Random-access byte sources.
//!
//! A [`ByteSource`] is the only capability the document engine needs from
//! whatever a file was opened from. Lines loaded lazily keep an `(offset,
//! size)` pair into the source and read it back on demand, so the source
//! must stay alive for as long as any text built from it.

use std::{
  fmt,
  fs::File,
  io,
  path::Path,
  sync::Arc,
};

use memmap2::Mmap;

/// A random-access, read-only byte provider.
pub trait ByteSource: Send + Sync {
  /// Total number of bytes.
  fn len(&self) -> u64;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Reads the single byte at `index`.
  fn at(&self, index: u64) -> io::Result<u8> {
    let mut byte = [0u8; 1];
    match self.read_at(&mut byte, index)? {
      1 => Ok(byte[0]),
      _ => Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
    }
  }

  /// Reads up to `buf.len()` bytes starting at `offset` and returns how many
  /// were read. Returns `Ok(0)` at or past the end of the source.
  fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

  /// Reads exactly `buf.len()` bytes starting at `offset`.
  fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
      match self.read_at(buf, offset)? {
        0 => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
        n => {
          buf = &mut buf[n..];
          offset += n as u64;
        },
      }
    }
    Ok(())
  }
}

/// Shared handle to a byte source.
pub type SharedSource = Arc<dyn ByteSource>;

fn copy_from(bytes: &[u8], buf: &mut [u8], offset: u64) -> usize {
  let Ok(start) = usize::try_from(offset) else {
    return 0;
  };
  if start >= bytes.len() {
    return 0;
  }
  let n = buf.len().min(bytes.len() - start);
  buf[..n].copy_from_slice(&bytes[start..start + n]);
  n
}

/// An owned in-memory source.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MemorySource {
  bytes: Arc<[u8]>,
}

impl MemorySource {
  pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
    Self {
      bytes: bytes.into(),
    }
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn into_shared(self) -> SharedSource {
    Arc::new(self)
  }
}

impl fmt::Debug for MemorySource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemorySource")
      .field("len", &self.bytes.len())
      .finish()
  }
}

impl From<&str> for MemorySource {
  fn from(value: &str) -> Self {
    Self::new(value.as_bytes())
  }
}

impl From<String> for MemorySource {
  fn from(value: String) -> Self {
    Self::new(value.into_bytes())
  }
}

impl From<Vec<u8>> for MemorySource {
  fn from(value: Vec<u8>) -> Self {
    Self::new(value)
  }
}

impl ByteSource for MemorySource {
  fn len(&self) -> u64 {
    self.bytes.len() as u64
  }

  fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    Ok(copy_from(&self.bytes, buf, offset))
  }
}

/// A read-only memory-mapped view of a file.
///
/// Mapping a zero-length file is not portable, so empty files are backed by
/// an empty buffer instead.
pub struct MmapSource {
  map: Option<Mmap>,
}

impl MmapSource {
  pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
    let file = File::open(path.as_ref())?;
    if file.metadata()?.len() == 0 {
      return Ok(Self { map: None });
    }
    // SAFETY: the map is read-only. Truncating the file underneath it while
    // it is mapped is outside of what the editor supports, same as any other
    // mmap-backed reader.
    let map = unsafe { Mmap::map(&file)? };
    Ok(Self { map: Some(map) })
  }

  pub fn into_shared(self) -> SharedSource {
    Arc::new(self)
  }

  fn bytes(&self) -> &[u8] {
    self.map.as_deref().unwrap_or_default()
  }
}

impl fmt::Debug for MmapSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MmapSource")
      .field("len", &self.bytes().len())
      .finish()
  }
}

impl ByteSource for MmapSource {
  fn len(&self) -> u64 {
    self.bytes().len() as u64
  }

  fn at(&self, index: u64) -> io::Result<u8> {
    usize::try_from(index)
      .ok()
      .and_then(|i| self.bytes().get(i).copied())
      .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
  }

  fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    Ok(copy_from(self.bytes(), buf, offset))
  }
}
