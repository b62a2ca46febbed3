use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;
use std::time::Duration;

pub const DEFAULT_SEGMENT_NAME: &str = "/pianoroll_clipboard";
pub const DEFAULT_SEMAPHORE_NAME: &str = "/pianoroll_clipboard_lock";
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;
pub const DEFAULT_MAX_EVENT_BYTES: usize = 1024;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Clipboard {
  pub segment_name: String,
  pub semaphore_name: String,
  pub capacity: usize,
  pub max_event_bytes: usize,
  /// 0 waits forever
  pub lock_timeout_ms: u64,
  pub stale_lock_ms: u64,
}

impl Default for Clipboard {
  fn default() -> Clipboard {
    Clipboard {
      segment_name: DEFAULT_SEGMENT_NAME.to_string(),
      semaphore_name: DEFAULT_SEMAPHORE_NAME.to_string(),
      capacity: DEFAULT_CAPACITY,
      max_event_bytes: DEFAULT_MAX_EVENT_BYTES,
      lock_timeout_ms: 5000,
      stale_lock_ms: 10_000,
    }
  }
}

impl Clipboard {
  pub fn lock_timeout(&self) -> Option<Duration> {
    match self.lock_timeout_ms {
      0 => None,
      ms => Some(Duration::from_millis(ms)),
    }
  }

  pub fn stale_lock(&self) -> Duration {
    Duration::from_millis(self.stale_lock_ms)
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Document {
  pub ticks_per_quarter: u16,
}

impl Default for Document {
  fn default() -> Document {
    Document {
      ticks_per_quarter: 192,
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  pub clipboard: Clipboard,
  pub document: Document,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      clipboard: Clipboard::default(),
      document: Document::default(),
    }
  }
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
  }

  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}

#[cfg(test)]
mod test {

  use super::Config;
  use std::time::Duration;

  #[test]
  pub fn defaults() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.clipboard.capacity, 1_048_576);
    assert_eq!(config.clipboard.max_event_bytes, 1024);
    assert_eq!(config.clipboard.lock_timeout(), Some(Duration::from_millis(5000)));
  }

  #[test]
  pub fn partial_sections() {
    let config = Config::from_str(
      r#"
        [clipboard]
        segment_name = "/other"
        lock_timeout_ms = 0

        [document]
        ticks_per_quarter = 480
      "#,
    )
    .unwrap();
    assert_eq!(config.clipboard.segment_name, "/other");
    assert_eq!(config.clipboard.semaphore_name, "/pianoroll_clipboard_lock");
    assert_eq!(config.clipboard.lock_timeout(), None);
    assert_eq!(config.document.ticks_per_quarter, 480);
  }

  #[test]
  pub fn invalid_content() {
    assert!(Config::from_str("[clipboard]\ncapacity = \"big\"").is_err());
  }
}
