//! Engine tunables.
//!
//! A [`Config`] is built once by the host (usually from a TOML file) and handed
//! to every component that needs it. Nothing in the engine reads global
//! configuration state.

use std::{
  fs,
  io,
  path::Path,
  time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::journal;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file: {0}")]
  Io(#[from] io::Error),
  #[error("failed to parse config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("`{field}` must be at least 1")]
  Zero { field: &'static str },
  #[error("line delimiter {0:?} is not a single ASCII character")]
  Delimiter(char),
  #[error("unknown journal version {0}")]
  JournalVersion(u32),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
  /// Maximum number of retained undo snapshots, current one included.
  pub history_depth:         usize,
  /// Capacity of the render snapshot queue.
  pub render_queue_capacity: usize,
  /// Minimum time between two load progress renders.
  pub loading_interval_ms:   u64,
  pub tab_size:              usize,
  /// Journal format version written after the initial record.
  pub journal_version:       u32,
  pub line_delimiter:        char,
  /// Bytes scanned between two cancellation checks while loading.
  pub scan_chunk_size:       usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      history_depth:         100,
      render_queue_capacity: 8,
      loading_interval_ms:   100,
      tab_size:              4,
      journal_version:       journal::INITIAL_VERSION,
      line_delimiter:        '\n',
      scan_chunk_size:       64 * 1024,
    }
  }
}

impl Config {
  pub fn from_toml(source: &str) -> Result<Self> {
    let config: Self = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    Self::from_toml(&fs::read_to_string(path)?)
  }

  pub fn validate(&self) -> Result<()> {
    let non_zero = [
      ("history-depth", self.history_depth),
      ("render-queue-capacity", self.render_queue_capacity),
      ("tab-size", self.tab_size),
      ("scan-chunk-size", self.scan_chunk_size),
    ];
    if let Some((field, _)) = non_zero.into_iter().find(|(_, value)| *value == 0) {
      return Err(ConfigError::Zero { field });
    }
    if !self.line_delimiter.is_ascii() {
      return Err(ConfigError::Delimiter(self.line_delimiter));
    }
    if journal::serializer_for(self.journal_version).is_err() {
      return Err(ConfigError::JournalVersion(self.journal_version));
    }
    Ok(())
  }

  pub fn loading_interval(&self) -> Duration {
    Duration::from_millis(self.loading_interval_ms)
  }

  /// The delimiter as a byte. Only meaningful after [`Config::validate`].
  pub fn delimiter_byte(&self) -> u8 {
    let mut buf = [0u8; 4];
    self.line_delimiter.encode_utf8(&mut buf).as_bytes()[0]
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    Config::default().validate().unwrap();
    assert_eq!(Config::from_toml("").unwrap(), Config::default());
  }

  #[test]
  fn parses_overrides() {
    let config = Config::from_toml(
      r#"
history-depth = 3
loading-interval-ms = 5
journal-version = 1
line-delimiter = ";"
"#,
    )
    .unwrap();
    assert_eq!(config.history_depth, 3);
    assert_eq!(config.loading_interval(), Duration::from_millis(5));
    assert_eq!(config.journal_version, 1);
    assert_eq!(config.delimiter_byte(), b';');
    assert_eq!(config.tab_size, 4);
  }

  #[test]
  fn rejects_bad_values() {
    assert!(matches!(
      Config::from_toml("history-depth = 0"),
      Err(ConfigError::Zero {
        field: "history-depth"
      })
    ));
    assert!(matches!(
      Config::from_toml("journal-version = 42"),
      Err(ConfigError::JournalVersion(42))
    ));
    assert!(matches!(
      Config::from_toml("line-delimiter = \"é\""),
      Err(ConfigError::Delimiter('é'))
    ));
    assert!(matches!(
      Config::from_toml("colour = true"),
      Err(ConfigError::Parse(_))
    ));
  }
}
