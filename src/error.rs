/// Error taxonomy.
///
/// `DriverError` is the transient class: a collaborator rejected one command,
/// the caller logs it and moves on. `FatalError` is the class that only a full
/// restart recovers from; it is never handled locally, only passed to
/// [`crate::platform::escalate`].
use thiserror::Error;

use crate::supervisor::HealthSnapshot;
use crate::sync::LockError;

/// A rejected hardware command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Driver-specific status code.
    #[error("driver error code {0}")]
    Code(i16),
    /// Frequency outside the transceiver's synthesiser range.
    #[error("frequency out of range")]
    InvalidFrequency,
    /// SPI/I2C transfer failed.
    #[error("bus transfer failed")]
    Bus,
    /// Chip did not identify itself as expected.
    #[error("unexpected chip revision {0:#04x}")]
    ChipVersion(u8),
}

/// Conditions that end in a device restart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("free memory below threshold (min free heap {} bytes)", .0.min_free_heap)]
    ResourceExhausted(HealthSnapshot),
}

impl FatalError {
    /// Short machine-readable tag for telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            FatalError::Lock(LockError::Timeout { .. }) => "lock_timeout",
            FatalError::Lock(LockError::Poisoned { .. }) => "lock_poisoned",
            FatalError::ResourceExhausted(_) => "resource_exhausted",
        }
    }
}

/// Why the device is about to restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    Fatal(FatalError),
    /// Preventive maintenance once uptime passes the configured ceiling.
    Scheduled { uptime_ms: u64 },
}

impl RestartReason {
    pub fn kind(&self) -> &'static str {
        match self {
            RestartReason::Fatal(err) => err.kind(),
            RestartReason::Scheduled { .. } => "routine",
        }
    }
}

impl From<FatalError> for RestartReason {
    fn from(err: FatalError) -> Self {
        RestartReason::Fatal(err)
    }
}

impl From<LockError> for RestartReason {
    fn from(err: LockError) -> Self {
        RestartReason::Fatal(err.into())
    }
}
