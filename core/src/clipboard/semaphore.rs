use std::ffi::CString;
use std::io;
use std::time::Duration;

#[cfg(not(target_os = "linux"))]
use std::time::Instant;

use log::{trace, warn};

use super::ClipboardError;

#[cfg(not(target_os = "linux"))]
const POLL_INTERVAL: Duration = Duration::from_millis(1);

fn lock_error(err: io::Error) -> ClipboardError {
  ClipboardError::Lock {
    cause: err.to_string(),
  }
}

/// Named POSIX semaphore used as a mutex between processes.
pub struct NamedSemaphore {
  name: String,
  sem: *mut libc::sem_t,
}

// POSIX semaphore operations are thread safe.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
  pub fn open_or_create(name: &str) -> Result<NamedSemaphore, ClipboardError> {
    let init_error = |cause: String| ClipboardError::Init {
      cause: format!("semaphore {}: {}", name, cause),
    };
    let c_name = CString::new(name).map_err(|err| init_error(err.to_string()))?;
    let sem = unsafe {
      libc::sem_open(
        c_name.as_ptr(),
        libc::O_CREAT,
        0o600 as libc::c_uint,
        1 as libc::c_uint,
      )
    };
    if sem == libc::SEM_FAILED {
      return Err(init_error(io::Error::last_os_error().to_string()));
    }
    Ok(NamedSemaphore {
      name: name.to_string(),
      sem,
    })
  }

  /// Waits for the semaphore, forever when `timeout` is `None`.
  pub fn acquire(&self, timeout: Option<Duration>) -> Result<SemaphoreGuard, ClipboardError> {
    match timeout {
      None => self.wait()?,
      Some(timeout) => self.wait_for(timeout)?,
    }
    trace!("Acquired {}", self.name);
    Ok(SemaphoreGuard { semaphore: self })
  }

  fn wait(&self) -> Result<(), ClipboardError> {
    loop {
      if unsafe { libc::sem_wait(self.sem) } == 0 {
        return Ok(());
      }
      let err = io::Error::last_os_error();
      if err.raw_os_error() != Some(libc::EINTR) {
        return Err(lock_error(err));
      }
    }
  }

  #[cfg(target_os = "linux")]
  fn wait_for(&self, timeout: Duration) -> Result<(), ClipboardError> {
    let mut now = libc::timespec {
      tv_sec: 0,
      tv_nsec: 0,
    };
    if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } < 0 {
      return Err(lock_error(io::Error::last_os_error()));
    }
    let nanos = now.tv_nsec as u64 + u64::from(timeout.subsec_nanos());
    let deadline = libc::timespec {
      tv_sec: now.tv_sec + timeout.as_secs() as libc::time_t + (nanos / 1_000_000_000) as libc::time_t,
      tv_nsec: (nanos % 1_000_000_000) as libc::c_long,
    };
    loop {
      if unsafe { libc::sem_timedwait(self.sem, &deadline) } == 0 {
        return Ok(());
      }
      let err = io::Error::last_os_error();
      match err.raw_os_error() {
        Some(libc::EINTR) => continue,
        Some(libc::ETIMEDOUT) => return Err(ClipboardError::LockTimeout),
        _ => return Err(lock_error(err)),
      }
    }
  }

  #[cfg(not(target_os = "linux"))]
  fn wait_for(&self, timeout: Duration) -> Result<(), ClipboardError> {
    let deadline = Instant::now() + timeout;
    loop {
      if unsafe { libc::sem_trywait(self.sem) } == 0 {
        return Ok(());
      }
      let err = io::Error::last_os_error();
      match err.raw_os_error() {
        Some(libc::EINTR) => continue,
        Some(libc::EAGAIN) => {
          if Instant::now() >= deadline {
            return Err(ClipboardError::LockTimeout);
          }
          std::thread::sleep(POLL_INTERVAL);
        }
        _ => return Err(lock_error(err)),
      }
    }
  }

  fn release(&self) {
    if unsafe { libc::sem_post(self.sem) } < 0 {
      warn!("Failed to release {}: {}", self.name, io::Error::last_os_error());
    }
    trace!("Released {}", self.name);
  }

  /// Takes over the permit of a holder that died without releasing it,
  /// without waiting. Only one process may adopt a given abandoned permit,
  /// otherwise the lock stops excluding anyone.
  pub fn adopt(&self) -> SemaphoreGuard {
    warn!("Adopting the abandoned permit of {}", self.name);
    SemaphoreGuard { semaphore: self }
  }

  pub fn unlink(name: &str) -> io::Result<()> {
    let c_name = CString::new(name).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    if unsafe { libc::sem_unlink(c_name.as_ptr()) } < 0 {
      let err = io::Error::last_os_error();
      if err.raw_os_error() != Some(libc::ENOENT) {
        return Err(err);
      }
    }
    Ok(())
  }
}

impl Drop for NamedSemaphore {
  fn drop(&mut self) {
    unsafe {
      libc::sem_close(self.sem);
    }
  }
}

/// Held lock. Dropping it releases the semaphore on every exit path.
pub struct SemaphoreGuard<'a> {
  semaphore: &'a NamedSemaphore,
}

impl<'a> Drop for SemaphoreGuard<'a> {
  fn drop(&mut self) {
    self.semaphore.release();
  }
}

/// Whether a process with this id still exists.
pub fn process_alive(pid: i64) -> bool {
  if pid <= 0 || pid > i64::from(libc::pid_t::max_value()) {
    return false;
  }
  if unsafe { libc::kill(pid as libc::pid_t, 0) } == 0 {
    return true;
  }
  io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

#[cfg(test)]
mod test {

  use super::*;

  fn unique_name(tag: &str) -> String {
    format!("/pianoroll_sem_{}_{}", tag, std::process::id())
  }

  #[test]
  pub fn second_acquire_times_out_until_released() {
    let name = unique_name("timeout");
    NamedSemaphore::unlink(&name).unwrap();
    let semaphore = NamedSemaphore::open_or_create(&name).unwrap();

    let guard = semaphore.acquire(Some(Duration::from_millis(100))).unwrap();
    match semaphore.acquire(Some(Duration::from_millis(20))) {
      Err(ClipboardError::LockTimeout) => {}
      Err(other) => panic!("unexpected error {}", other),
      Ok(_) => panic!("lock acquired twice"),
    }
    drop(guard);
    assert!(semaphore.acquire(Some(Duration::from_millis(100))).is_ok());

    NamedSemaphore::unlink(&name).unwrap();
  }

  #[test]
  pub fn adopted_permit_is_released_once() {
    let name = unique_name("adopt");
    NamedSemaphore::unlink(&name).unwrap();
    let semaphore = NamedSemaphore::open_or_create(&name).unwrap();

    std::mem::forget(semaphore.acquire(None).unwrap());
    assert!(semaphore.acquire(Some(Duration::from_millis(10))).is_err());

    let adopted = semaphore.adopt();
    assert!(semaphore.acquire(Some(Duration::from_millis(10))).is_err());
    drop(adopted);

    let guard = semaphore.acquire(Some(Duration::from_millis(10))).unwrap();
    match semaphore.acquire(Some(Duration::from_millis(10))) {
      Err(ClipboardError::LockTimeout) => {}
      Err(other) => panic!("unexpected error {}", other),
      Ok(_) => panic!("lock acquired twice"),
    }
    drop(guard);

    NamedSemaphore::unlink(&name).unwrap();
  }

  #[test]
  pub fn current_process_is_alive() {
    assert!(process_alive(i64::from(std::process::id())));
    assert!(!process_alive(0));
    assert!(!process_alive(-3));
  }
}
