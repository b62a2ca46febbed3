use std::convert::TryFrom;
use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::config;
use crate::document::{Document, DocumentTiming, LoadReport, Repair};
use crate::midi::{EventId, TrackId};
use crate::time::TicksTime;

use super::codec::{deserialize, serialize};
use super::header::{ClipboardHeader, HEADER_SIZE};
use super::semaphore::{process_alive, NamedSemaphore, SemaphoreGuard};
use super::shm::SharedSegment;
use super::{ClipboardError, ClipboardResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardStatus {
  Empty,
  /// Data copied by this process.
  Own { timestamp: i64 },
  Foreign { process_id: i64, timestamp: i64 },
}

impl ClipboardStatus {
  pub fn has_data(&self) -> bool {
    *self != ClipboardStatus::Empty
  }
}

#[derive(Debug, Clone)]
pub struct PasteReport {
  pub header: ClipboardHeader,
  /// Whether offsets were converted to the target tempo and resolution.
  pub retimed: bool,
  /// Records the target document could not rebuild.
  pub skipped: usize,
  pub load: LoadReport,
}

/// Cross-process clipboard slot backed by a shared memory segment and a named
/// semaphore. Every access to the segment happens while holding the semaphore.
pub struct SharedClipboard {
  config: config::Clipboard,
  segment: SharedSegment,
  lock: NamedSemaphore,
  process_id: i64,
}

fn now_millis() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis() as i64)
    .unwrap_or(0)
}

/// Acquires `lock`. On timeout the lock counts as abandoned when the last copy
/// is older than the stale threshold and the likely holder is gone. Waiters
/// then race to swap the header's lock holder slot to their own process id;
/// the single winner adopts the dead holder's permit and the others wait once
/// more.
fn acquire<'a>(
  lock: &'a NamedSemaphore,
  segment: &SharedSegment,
  config: &config::Clipboard,
  process_id: i64,
) -> ClipboardResult<SemaphoreGuard<'a>> {
  let timeout = config.lock_timeout();
  match lock.acquire(timeout) {
    Err(ClipboardError::LockTimeout) => {
      let observed = segment.lock_holder().load(Ordering::SeqCst);
      let header = ClipboardHeader::read_from(segment.as_slice()).unwrap_or_default();
      let holder = ClipboardHeader {
        lock_holder: observed,
        ..header
      }
      .likely_lock_holder();
      let age = now_millis() - header.timestamp;
      let is_stale = age >= 0 && age as u128 >= config.stale_lock().as_millis();
      if !is_stale || process_alive(holder) {
        warn!("Timed out waiting for the clipboard lock");
        return Err(ClipboardError::LockTimeout);
      }

      let claimant = match i32::try_from(process_id) {
        Ok(pid) if pid > 0 => pid,
        _ => return Err(ClipboardError::LockTimeout),
      };
      match segment
        .lock_holder()
        .compare_exchange(observed, claimant, Ordering::SeqCst, Ordering::SeqCst)
      {
        Ok(_) => {
          warn!(
            "Clipboard lock looks abandoned (holder {} gone, last copy {} ms ago), recovering",
            holder, age
          );
          Ok(lock.adopt())
        }
        Err(current) => {
          debug!("Clipboard lock already recovered by process {}", current);
          lock.acquire(timeout)
        }
      }
    }
    result => result,
  }
}

impl SharedClipboard {
  /// Attaches to the named segment and semaphore, creating them if needed.
  pub fn initialize(config: &config::Clipboard) -> ClipboardResult<SharedClipboard> {
    let segment = SharedSegment::open_or_create(&config.segment_name, config.capacity)?;
    let lock = NamedSemaphore::open_or_create(&config.semaphore_name)?;
    info!(
      "Clipboard ready on {} ({} bytes)",
      segment.name(),
      segment.capacity()
    );
    Ok(SharedClipboard {
      config: config.clone(),
      segment,
      lock,
      process_id: i64::from(std::process::id()),
    })
  }

  /// Removes the named segment and semaphore. Open handles keep working.
  pub fn unlink(config: &config::Clipboard) -> ClipboardResult<()> {
    let cleanup_error = |err: std::io::Error| ClipboardError::Init {
      cause: err.to_string(),
    };
    SharedSegment::unlink(&config.segment_name).map_err(cleanup_error)?;
    NamedSemaphore::unlink(&config.semaphore_name).map_err(cleanup_error)?;
    info!(
      "Removed {} and {}",
      config.segment_name, config.semaphore_name
    );
    Ok(())
  }

  pub fn capacity(&self) -> usize {
    self.segment.capacity()
  }

  pub fn process_id(&self) -> i64 {
    self.process_id
  }

  /// Replaces the clipboard content with `selection` from `document`. Nothing
  /// is written when the data does not fit.
  pub fn copy(&mut self, document: &Document, selection: &[EventId]) -> ClipboardResult<ClipboardHeader> {
    let tempo = document.tempo_map().tempo_at(TicksTime::zero());
    let mut encoded = serialize(
      document.events(),
      selection,
      document.ticks_per_quarter(),
      tempo,
      self.config.max_event_bytes,
    )?;
    if encoded.header.event_count == 0 {
      return Err(ClipboardError::NoData);
    }
    encoded.header.source_process_id = self.process_id;
    encoded.header.lock_holder = i32::try_from(self.process_id).unwrap_or(0);

    let required = encoded.size();
    let capacity = self.segment.capacity();
    if required > capacity {
      warn!(
        "Rejected copy of {} bytes into a {} bytes clipboard",
        required, capacity
      );
      return Err(ClipboardError::CapacityExceeded { required, capacity });
    }

    let _guard = acquire(&self.lock, &self.segment, &self.config, self.process_id)?;
    let data = self.segment.as_mut_slice();
    data[HEADER_SIZE..required].copy_from_slice(&encoded.payload);
    encoded.header.write_to(data);

    debug!(
      "Copied {} events ({} bytes)",
      encoded.header.event_count,
      encoded.payload.len()
    );
    Ok(encoded.header)
  }

  /// Reads the clipboard header and payload under the lock.
  fn snapshot(&self) -> ClipboardResult<(ClipboardHeader, Vec<u8>)> {
    let _guard = acquire(&self.lock, &self.segment, &self.config, self.process_id)?;
    let data = self.segment.as_slice();
    let header = ClipboardHeader::read_from(data).ok_or(ClipboardError::NoData)?;

    if header.format_version == 0 {
      return Err(ClipboardError::NoData);
    }
    if !header.has_supported_version() {
      return Err(ClipboardError::FormatMismatch {
        found: header.format_version,
      });
    }
    if !header.holds_data() {
      return Err(ClipboardError::NoData);
    }
    let payload_len = header.payload_len().unwrap_or(0);
    if payload_len > data.len() - HEADER_SIZE {
      return Err(ClipboardError::MalformedPayload {
        reason: format!("payload size {} exceeds the segment", payload_len),
      });
    }
    let payload = data[HEADER_SIZE..HEADER_SIZE + payload_len].to_vec();
    Ok((header, payload))
  }

  /// Inserts the clipboard content into `document` starting at `cursor`. The
  /// lock is only held while copying the bytes out of the segment.
  pub fn paste(
    &self,
    document: &mut Document,
    cursor: TicksTime,
    track: TrackId,
    repair: Repair,
  ) -> ClipboardResult<PasteReport> {
    let (header, payload) = self.snapshot()?;

    let mut decoded = deserialize(&payload, &*document, track, self.config.max_event_bytes)?;
    if usize::try_from(header.event_count).ok() != Some(decoded.records) {
      return Err(ClipboardError::MalformedPayload {
        reason: format!(
          "header announces {} events but the payload holds {} records",
          header.event_count, decoded.records
        ),
      });
    }
    let skipped = decoded.records - decoded.paired.events.len();
    let target_tempo = document.tempo_map().tempo_at(cursor);
    let retimed = decoded.place_at(cursor, &header, document.ticks_per_quarter(), target_tempo);
    let load = document.absorb(decoded.paired, repair);

    info!(
      "Pasted {} events at tick {}{}",
      load.inserted.len(),
      cursor,
      if retimed { " (retimed)" } else { "" }
    );
    Ok(PasteReport {
      header,
      retimed,
      skipped,
      load,
    })
  }

  pub fn status(&self) -> ClipboardResult<ClipboardStatus> {
    let _guard = acquire(&self.lock, &self.segment, &self.config, self.process_id)?;
    let header = ClipboardHeader::read_from(self.segment.as_slice()).unwrap_or_default();
    let status = if !header.holds_data() {
      ClipboardStatus::Empty
    } else if header.source_process_id == self.process_id {
      ClipboardStatus::Own {
        timestamp: header.timestamp,
      }
    } else {
      ClipboardStatus::Foreign {
        process_id: header.source_process_id,
        timestamp: header.timestamp,
      }
    };
    Ok(status)
  }

  pub fn has_data(&self) -> ClipboardResult<bool> {
    self.status().map(|status| status.has_data())
  }

  pub fn has_data_from_other_process(&self) -> ClipboardResult<bool> {
    self.status().map(|status| match status {
      ClipboardStatus::Foreign { .. } => true,
      _ => false,
    })
  }

  #[cfg(test)]
  fn set_process_id(&mut self, process_id: i64) {
    self.process_id = process_id;
  }

  #[cfg(test)]
  fn write_raw_header(&mut self, header: &ClipboardHeader) {
    let _guard = acquire(&self.lock, &self.segment, &self.config, self.process_id).unwrap();
    header.write_to(self.segment.as_mut_slice());
  }
}
