/// Battery and USB supply monitoring.
///
/// The PMU shares the I2C bus, so every access goes through the power lock,
/// a [`TimedMutex`] with a short budget that is never held together with the
/// radio lock. The latest derived [`PowerStatus`] is cached under the same
/// lock for the display badge and the supervisor.
use std::time::Duration;

use crate::defaults::{
    POWER_LOCK_TIMEOUT_MS, POWER_LOG_INTERVAL_MS, POWER_STATUS_INTERVAL_MS,
    POWER_TASK_INTERVAL_MS,
};
use crate::error::{DriverError, FatalError};
use crate::protocol::{self, DeviceMessage};
use crate::sync::TimedMutex;

/// Battery readings below this are noise from an empty holder.
const NO_BATTERY_MV: u16 = 500;
/// Typical draw assumed when the PMU cannot measure current.
const ASSUMED_DRAW_MA: i32 = 80;

/// Currents reported by PMUs that can measure them (mA, all non-negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Currents {
    pub charge_ma: i32,
    pub discharge_ma: i32,
    pub vbus_ma: i32,
}

/// Straight register values, before any interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawPowerReading {
    pub charging: bool,
    pub batt_mv: u16,
    pub usb_mv: u16,
    pub currents: Option<Currents>,
}

/// Latched PMU interrupt causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PmuEvents {
    pub battery_inserted: bool,
    pub battery_removed: bool,
    pub charge_done: bool,
    pub key_short_press: bool,
    pub key_long_press: bool,
}

impl PmuEvents {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Power-management chip.
pub trait Pmu {
    fn read(&mut self) -> Result<RawPowerReading, DriverError>;
    /// Return and clear pending interrupt causes.
    fn take_events(&mut self) -> Result<PmuEvents, DriverError>;
    /// Cut all rails. On hardware this powers the device off.
    fn shutdown(&mut self) -> Result<(), DriverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerStatus {
    pub batt_mv: u16,
    pub usb_mv: u16,
    pub charging: bool,
    pub usb_available: bool,
    /// Into (+) or out of (-) the battery.
    pub batt_ma: i32,
    /// Drawn from whichever source is powering the device. Never negative.
    pub draw_ma: i32,
}

impl PowerStatus {
    pub fn from_raw(raw: &RawPowerReading) -> Self {
        let charging = raw.charging;
        let batt_mv = if raw.batt_mv < NO_BATTERY_MV { 0 } else { raw.batt_mv };
        let usb_mv = raw.usb_mv;

        let (batt_ma, mut draw_ma) = match raw.currents {
            Some(c) => {
                let batt = if charging { c.charge_ma } else { -c.discharge_ma };
                (batt, c.vbus_ma)
            }
            None => {
                let on_battery = batt_mv > 2000 && !charging && usb_mv < 4000;
                (if on_battery { -ASSUMED_DRAW_MA } else { 0 }, ASSUMED_DRAW_MA)
            }
        };

        // VBUS current occasionally reads 0 on USB; the battery side settles it.
        let usb_available =
            charging || batt_ma > 3 || batt_mv < 3000 || draw_ma > 3 || usb_mv > 4000;
        if !usb_available {
            draw_ma = -batt_ma;
        }
        if draw_ma < 0 {
            log::warn!("power draw reads negative ({} mA)", draw_ma);
            draw_ma = 0;
        }

        Self {
            batt_mv,
            usb_mv,
            charging,
            usb_available,
            batt_ma,
            draw_ma,
        }
    }

    /// Short source label for the status line.
    pub fn badge(&self) -> &'static str {
        if self.usb_available {
            "USB"
        } else {
            "BAT"
        }
    }

    pub fn log(&self) {
        log::info!(
            "charging: {}, usb: {}, usb {} mV, battery {} mV, battery {} mA, draw {} mA",
            self.charging,
            self.usb_available,
            self.usb_mv,
            self.batt_mv,
            self.batt_ma,
            self.draw_ma
        );
        protocol::emit(&DeviceMessage::Power {
            batt_mv: self.batt_mv,
            usb_mv: self.usb_mv,
            charging: self.charging,
            usb: self.usb_available,
            batt_ma: self.batt_ma,
            draw_ma: self.draw_ma,
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PowerConfig {
    pub lock_timeout: Duration,
    pub task_interval: Duration,
    pub status_interval: Duration,
    pub log_interval: Duration,
}

impl PowerConfig {
    pub const fn new() -> Self {
        Self {
            lock_timeout: Duration::from_millis(POWER_LOCK_TIMEOUT_MS),
            task_interval: Duration::from_millis(POWER_TASK_INTERVAL_MS),
            status_interval: Duration::from_millis(POWER_STATUS_INTERVAL_MS),
            log_interval: Duration::from_millis(POWER_LOG_INTERVAL_MS),
        }
    }

    /// Task rounds between status reads and between log lines.
    fn cadence(&self) -> (u64, u64) {
        let tick = self.task_interval.as_millis().max(1);
        let every = |d: Duration| ((d.as_millis() / tick) as u64).max(1);
        (every(self.status_interval), every(self.log_interval))
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner<P> {
    pmu: P,
    status: Option<PowerStatus>,
}

pub struct PowerMonitor<P> {
    inner: TimedMutex<Inner<P>>,
    status_every: u64,
    log_every: u64,
}

impl<P: Pmu> PowerMonitor<P> {
    pub fn new(pmu: P, config: PowerConfig) -> Self {
        let (status_every, log_every) = config.cadence();
        Self {
            inner: TimedMutex::new("power", config.lock_timeout, Inner { pmu, status: None }),
            status_every,
            log_every,
        }
    }

    /// Latest derived status, `None` until the first successful read.
    pub fn status(&self) -> Result<Option<PowerStatus>, FatalError> {
        Ok(self.inner.lock()?.status)
    }

    /// Read the PMU and cache the derived status. A failed read keeps the
    /// previous status.
    pub fn refresh(&self) -> Result<Option<PowerStatus>, FatalError> {
        let mut inner = self.inner.lock()?;
        match inner.pmu.read() {
            Ok(raw) => inner.status = Some(PowerStatus::from_raw(&raw)),
            Err(e) => log::warn!("failed to read power status: {}", e),
        }
        Ok(inner.status)
    }

    /// Log and act on pending PMU interrupts. A long key press powers off.
    pub fn handle_events(&self) -> Result<PmuEvents, FatalError> {
        let mut inner = self.inner.lock()?;
        let events = match inner.pmu.take_events() {
            Ok(events) => events,
            Err(e) => {
                log::warn!("failed to read PMU interrupts: {}", e);
                return Ok(PmuEvents::default());
            }
        };
        if events.battery_inserted {
            log::info!("battery inserted");
        }
        if events.battery_removed {
            log::info!("battery removed");
        }
        if events.charge_done {
            log::info!("battery charging completed");
        }
        if events.key_short_press {
            log::info!("power key short press");
        }
        if events.key_long_press {
            log::warn!("shutting down");
            if let Err(e) = inner.pmu.shutdown() {
                log::error!("failed to shut down PMU: {}", e);
            }
        }
        Ok(events)
    }

    /// One power-task round: periodic read, periodic log, interrupts.
    pub fn step(&self, round: u64) -> Result<(), FatalError> {
        if round % self.status_every == 0 {
            self.refresh()?;
        }
        if round % self.log_every == 0 {
            if let Some(status) = self.status()? {
                status.log();
            }
        }
        self.handle_events()?;
        Ok(())
    }
}
