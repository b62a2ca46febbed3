use std::time::Duration;

use log::{debug, info, warn};

use failure::{Error, Fail};

use pianoroll_core::clipboard::{ClipboardStatus, SharedClipboard};
use pianoroll_core::config::Config;
use pianoroll_core::document::Repair;
use pianoroll_core::time::TicksTime;

mod phrase;
use crate::phrase::{describe, Phrase, PHRASE_TRACK};

mod watch;
use crate::watch::{WatchEvent, Watcher};

const PIANOROLL_CLIPBOARD_CONFIG: &'static str = "PIANOROLL_CLIPBOARD_CONFIG";
const DEFAULT_PIANOROLL_CLIPBOARD_CONFIG: &'static str = "clipboard.toml";

const PIANOROLL_LOG_CONFIG: &'static str = "PIANOROLL_LOG_CONFIG";
const DEFAULT_PIANOROLL_LOG_CONFIG: &'static str = "log4rs.yaml";

const DEFAULT_WATCH_INTERVAL_MS: u64 = 500;

const USAGE: &'static str = "usage: app-clipboard <command>

commands:
  status                        show who owns the clipboard content
  copy <phrase.toml>            copy every event of the phrase
  paste <phrase.toml> <tick>    paste into the phrase at tick and print it
  watch [interval-ms]           report clipboard changes
  reset                         remove the shared segment and semaphore";

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },

  #[fail(display = "{}", usage)]
  Usage { usage: String },

  #[fail(display = "Invalid number '{}'", value)]
  InvalidNumber { value: String },

  #[fail(display = "Tick {} is beyond the last tick the clipboard can address", value)]
  TickOutOfRange { value: u64 },
}

enum Command {
  Status,
  Copy { path: String },
  Paste { path: String, cursor: TicksTime },
  Watch { interval: Duration },
  Reset,
}

fn main() -> Result<(), Error> {
  init_logging()?;

  let config = init_config()?;

  let args: Vec<String> = std::env::args().skip(1).collect();
  match parse_command(&args)? {
    Command::Status => status(&config),
    Command::Copy { path } => copy(&config, &path),
    Command::Paste { path, cursor } => paste(&config, &path, cursor),
    Command::Watch { interval } => watch(&config, interval),
    Command::Reset => reset(&config),
  }
}

fn init_logging() -> Result<(), Error> {
  let log_config_path = std::env::var(PIANOROLL_LOG_CONFIG)
    .unwrap_or_else(|_| DEFAULT_PIANOROLL_LOG_CONFIG.to_string());

  log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
    MainError::LoggingInit {
      cause: err.to_string(),
    }
  })?;

  Ok(())
}

fn init_config() -> Result<Config, Error> {
  let config_path = std::env::var(PIANOROLL_CLIPBOARD_CONFIG)
    .unwrap_or_else(|_| DEFAULT_PIANOROLL_CLIPBOARD_CONFIG.to_string());

  if !std::path::Path::new(config_path.as_str()).exists() {
    warn!("{} not found, using the default configuration", config_path);
    return Ok(Config::default());
  }

  info!("Loading clipboard configuration from {} ...", config_path);
  let config = Config::from_file(config_path.as_str())?;
  debug!("{:#?}", config);

  Ok(config)
}

fn parse_number(value: &str) -> Result<u64, MainError> {
  value.parse::<u64>().map_err(|_| MainError::InvalidNumber {
    value: value.to_string(),
  })
}

/// Cursor tick for a paste, bounded by what a clipboard record can hold.
fn parse_cursor(value: &str) -> Result<TicksTime, MainError> {
  let tick = parse_number(value)?;
  if tick > i32::max_value() as u64 {
    return Err(MainError::TickOutOfRange { value: tick });
  }
  Ok(TicksTime::new(tick))
}

fn parse_command(args: &[String]) -> Result<Command, MainError> {
  let usage = || MainError::Usage {
    usage: USAGE.to_string(),
  };
  let args: Vec<&str> = args.iter().map(String::as_str).collect();
  match args.as_slice() {
    ["status"] => Ok(Command::Status),
    ["copy", path] => Ok(Command::Copy {
      path: path.to_string(),
    }),
    ["paste", path, cursor] => Ok(Command::Paste {
      path: path.to_string(),
      cursor: parse_cursor(cursor)?,
    }),
    ["watch"] => Ok(Command::Watch {
      interval: Duration::from_millis(DEFAULT_WATCH_INTERVAL_MS),
    }),
    ["watch", interval] => Ok(Command::Watch {
      interval: Duration::from_millis(parse_number(interval)?.max(1)),
    }),
    ["reset"] => Ok(Command::Reset),
    _ => Err(usage()),
  }
}

fn describe_status(status: ClipboardStatus) -> String {
  match status {
    ClipboardStatus::Empty => "empty".to_string(),
    ClipboardStatus::Own { timestamp } => format!("own data copied at {}", timestamp),
    ClipboardStatus::Foreign {
      process_id,
      timestamp,
    } => format!("data from process {} copied at {}", process_id, timestamp),
  }
}

fn status(config: &Config) -> Result<(), Error> {
  let clipboard = SharedClipboard::initialize(&config.clipboard)?;
  println!("{}", describe_status(clipboard.status()?));
  Ok(())
}

fn copy(config: &Config, path: &str) -> Result<(), Error> {
  let phrase = Phrase::from_file(path)?;
  let (document, selection) = phrase.to_document(config.document.ticks_per_quarter)?;

  let mut clipboard = SharedClipboard::initialize(&config.clipboard)?;
  let header = clipboard.copy(&document, &selection)?;
  println!(
    "copied {} events ({} bytes)",
    header.event_count, header.payload_size
  );
  Ok(())
}

fn paste(config: &Config, path: &str, cursor: TicksTime) -> Result<(), Error> {
  let phrase = Phrase::from_file(path)?;
  let (mut document, _selection) = phrase.to_document(config.document.ticks_per_quarter)?;

  let clipboard = SharedClipboard::initialize(&config.clipboard)?;
  let report = clipboard.paste(&mut document, cursor, PHRASE_TRACK, Repair::CloseAtEnd)?;

  for line in describe(&document) {
    info!("{}", line);
  }
  if !report.load.is_clean() {
    warn!(
      "Repaired {} unresolved and {} orphaned notes",
      report.load.unresolved.len(),
      report.load.orphaned.len()
    );
  }
  print!("{}", Phrase::from_document(&document).to_toml()?);
  Ok(())
}

fn watch(config: &Config, interval: Duration) -> Result<(), Error> {
  let (watcher, events) = Watcher::start(&config.clipboard, interval)?;
  for event in events.iter() {
    match event {
      WatchEvent::Changed(status) => println!("{}", describe_status(status)),
      WatchEvent::Failed(cause) => eprintln!("{}", cause),
    }
  }
  watcher.close();
  Ok(())
}

fn reset(config: &Config) -> Result<(), Error> {
  SharedClipboard::unlink(&config.clipboard)?;
  println!(
    "removed {} and {}",
    config.clipboard.segment_name, config.clipboard.semaphore_name
  );
  Ok(())
}
