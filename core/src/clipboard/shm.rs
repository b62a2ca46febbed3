use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::unix::io::FromRawFd;
use std::sync::atomic::AtomicI32;

use log::{debug, info};
use memmap2::{MmapMut, MmapOptions};

use super::header::{HEADER_SIZE, LOCK_HOLDER_OFFSET};
use super::ClipboardError;

fn init_error<T: ToString>(name: &str, cause: T) -> ClipboardError {
  ClipboardError::Init {
    cause: format!("segment {}: {}", name, cause.to_string()),
  }
}

/// Named POSIX shared memory object mapped read-write into this process.
pub struct SharedSegment {
  name: String,
  mmap: MmapMut,
}

impl SharedSegment {
  /// Opens the segment, creating it with `capacity` bytes when it does not
  /// exist yet. An existing segment keeps the size it was created with.
  pub fn open_or_create(name: &str, capacity: usize) -> Result<SharedSegment, ClipboardError> {
    if capacity < HEADER_SIZE {
      return Err(init_error(
        name,
        format!("capacity {} is smaller than the header", capacity),
      ));
    }
    let c_name = CString::new(name).map_err(|err| init_error(name, err))?;
    let fd = unsafe {
      libc::shm_open(
        c_name.as_ptr(),
        libc::O_CREAT | libc::O_RDWR,
        0o600 as libc::mode_t,
      )
    };
    if fd < 0 {
      return Err(init_error(name, io::Error::last_os_error()));
    }

    let file = unsafe { File::from_raw_fd(fd) };
    let size = file.metadata().map_err(|err| init_error(name, err))?.len();
    let size = if size == 0 {
      file
        .set_len(capacity as u64)
        .map_err(|err| init_error(name, err))?;
      info!("Created shared segment {} with {} bytes", name, capacity);
      capacity
    } else if (size as usize) < HEADER_SIZE {
      return Err(init_error(name, format!("existing size {} is too small", size)));
    } else {
      debug!("Attached to shared segment {} of {} bytes", name, size);
      size as usize
    };

    let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file) }
      .map_err(|err| init_error(name, err))?;

    Ok(SharedSegment {
      name: name.to_string(),
      mmap,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn capacity(&self) -> usize {
    self.mmap.len()
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.mmap[..]
  }

  pub fn as_mut_slice(&mut self) -> &mut [u8] {
    &mut self.mmap[..]
  }

  /// The header's lock holder slot, shared with every process mapping the
  /// segment.
  pub fn lock_holder(&self) -> &AtomicI32 {
    // the mapping is page aligned and never shorter than the header
    unsafe { &*(self.mmap.as_ptr().add(LOCK_HOLDER_OFFSET) as *const AtomicI32) }
  }

  /// Removes the name. Mappings that are still open stay valid.
  pub fn unlink(name: &str) -> io::Result<()> {
    let c_name = CString::new(name).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } < 0 {
      let err = io::Error::last_os_error();
      if err.raw_os_error() != Some(libc::ENOENT) {
        return Err(err);
      }
    }
    Ok(())
  }
}
