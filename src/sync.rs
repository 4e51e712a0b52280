/// Bounded-wait mutual exclusion.
///
/// FreeRTOS semaphores take a timeout; `std::sync::Mutex` does not. The
/// ESP-IDF `std` port maps `Mutex` onto a pthread mutex, so the bounded wait
/// is built from `try_lock` plus a one-tick sleep between attempts.
///
/// A lock that cannot be taken within its budget means the holder is wedged.
/// Callers turn `LockError` into a `FatalError` and escalate; there is no
/// retry path.
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Sleep between lock attempts; one FreeRTOS tick at 1 kHz.
const RETRY_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("timed out after {waited_ms} ms waiting for the {lock} lock")]
    Timeout { lock: &'static str, waited_ms: u64 },
    #[error("the {lock} lock was poisoned by a panicking holder")]
    Poisoned { lock: &'static str },
}

/// A mutex whose `lock` gives up after a fixed budget.
#[derive(Debug)]
pub struct TimedMutex<T> {
    name: &'static str,
    timeout: Duration,
    inner: Mutex<T>,
}

impl<T> TimedMutex<T> {
    pub const fn new(name: &'static str, timeout: Duration, value: T) -> Self {
        Self {
            name,
            timeout,
            inner: Mutex::new(value),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire the lock, waiting at most the configured timeout.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>, LockError> {
        let start = Instant::now();
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(LockError::Poisoned { lock: self.name })
                }
                Err(TryLockError::WouldBlock) => {
                    let waited = start.elapsed();
                    if waited >= self.timeout {
                        log::error!("failed to obtain {} lock", self.name);
                        return Err(LockError::Timeout {
                            lock: self.name,
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
            }
        }
    }
}
