use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use failure::Error;

use pianoroll_core::clipboard::{ClipboardStatus, SharedClipboard};
use pianoroll_core::config::Clipboard as ClipboardConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
  Changed(ClipboardStatus),
  Failed(String),
}

/// Background thread polling the clipboard status and reporting changes.
pub struct Watcher {
  stop_tx: Sender<()>,
  handle: Option<thread::JoinHandle<()>>,
}

impl Watcher {
  pub fn start(
    config: &ClipboardConfig,
    interval: Duration,
  ) -> Result<(Watcher, Receiver<WatchEvent>), Error> {
    info!("Starting clipboard watcher every {:?} ...", interval);

    let clipboard = SharedClipboard::initialize(config)?;
    let (events_tx, events_rx) = crossbeam_channel::unbounded::<WatchEvent>();
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    let handle = thread::Builder::new()
      .name("clipboard-watch".into())
      .spawn(move || Self::run(clipboard, interval, events_tx, stop_rx))?;

    let watcher = Watcher {
      stop_tx,
      handle: Some(handle),
    };
    Ok((watcher, events_rx))
  }

  fn run(
    clipboard: SharedClipboard,
    interval: Duration,
    events_tx: Sender<WatchEvent>,
    stop_rx: Receiver<()>,
  ) {
    let mut last: Option<ClipboardStatus> = None;
    loop {
      let event = match clipboard.status() {
        Ok(status) if last != Some(status) => {
          last = Some(status);
          Some(WatchEvent::Changed(status))
        }
        Ok(_) => None,
        Err(err) => {
          warn!("Clipboard watch failed: {}", err);
          Some(WatchEvent::Failed(err.to_string()))
        }
      };

      if let Some(event) = event {
        if events_tx.send(event).is_err() {
          debug!("Watch receiver dropped");
          break;
        }
      }

      match stop_rx.recv_timeout(interval) {
        Err(RecvTimeoutError::Timeout) => continue,
        _ => break,
      }
    }
    debug!("Clipboard watcher stopped");
  }

  pub fn close(mut self) {
    info!("Closing clipboard watcher ...");
    drop(self.stop_tx.send(()));
    if let Some(handle) = self.handle.take() {
      drop(handle.join());
    }
  }
}
