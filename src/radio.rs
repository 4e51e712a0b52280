/// Radio coordinator: sole owner of the RF front-end.
///
/// Arbitrates between the periodic spectrum sweep and push-to-talk
/// transmission. The driver and the shared [`RadioState`] live together
/// behind one [`TimedMutex`]; every operation takes the lock once and runs
/// to completion, so a sweep is never interleaved with a transmit start or
/// stop, and a started transmission always wins over the next sweep.
///
/// RSSI is kept as a fixed-depth ring per channel rather than a single
/// latest value so the display can average out noise with bounded memory.
use std::time::Duration;

use crate::defaults::{
    CENTER_FREQUENCY_MHZ, CHANNEL_COUNT, RADIO_LOCK_TIMEOUT_MS, SAMPLE_DEPTH, STEP_SIZE_MHZ,
};
use crate::error::{DriverError, FatalError};
use crate::sync::TimedMutex;

/// Primitives of one physical transceiver. Single-threaded access only;
/// the coordinator's lock provides the serialization.
pub trait RfDriver {
    /// One-time configuration at boot.
    fn init(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
    fn tune(&mut self, frequency_mhz: f32) -> Result<(), DriverError>;
    fn start_continuous_transmit(&mut self) -> Result<(), DriverError>;
    fn standby(&mut self) -> Result<(), DriverError>;
    fn start_receive(&mut self) -> Result<(), DriverError>;
    /// Instantaneous RSSI in dBm.
    fn read_rssi(&mut self) -> i16;
}

/// Operating mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioMode {
    #[default]
    Idle,
    Scanning,
    Transmitting,
}

/// Fixed `channels × depth` RSSI ring. Never resized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssiHistory<const C: usize, const D: usize> {
    samples: [[i16; D]; C],
}

impl<const C: usize, const D: usize> RssiHistory<C, D> {
    pub const fn new() -> Self {
        Self {
            samples: [[0; D]; C],
        }
    }

    pub const fn channels(&self) -> usize {
        C
    }

    pub const fn depth(&self) -> usize {
        D
    }

    pub fn sample(&self, channel: usize, slot: usize) -> i16 {
        self.samples[channel][slot]
    }

    pub fn channel(&self, channel: usize) -> &[i16; D] {
        &self.samples[channel]
    }

    fn record(&mut self, channel: usize, slot: usize, rssi: i16) {
        self.samples[channel][slot] = rssi;
    }

    /// Mean of one channel's retained samples, truncated toward zero.
    pub fn channel_average(&self, channel: usize) -> i32 {
        if D == 0 {
            return 0;
        }
        let sum: i32 = self.samples[channel].iter().map(|&s| i32::from(s)).sum();
        sum / D as i32
    }

    /// Mean over every channel and slot, or `None` when there are no samples.
    pub fn global_average(&self) -> Option<i32> {
        let count = C * D;
        if count == 0 {
            return None;
        }
        let sum: i64 = self
            .samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&s| i64::from(s))
            .sum();
        Some((sum / count as i64) as i32)
    }
}

impl<const C: usize, const D: usize> Default for RssiHistory<C, D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared radio state. Only the coordinator mutates it, always under the lock.
#[derive(Debug, Clone)]
pub struct RadioState<const C: usize, const D: usize> {
    mode: RadioMode,
    center_frequency: f32,
    history: RssiHistory<C, D>,
    slot: usize,
}

impl<const C: usize, const D: usize> RadioState<C, D> {
    fn new(center_frequency: f32) -> Self {
        Self {
            mode: RadioMode::Idle,
            center_frequency,
            history: RssiHistory::new(),
            slot: 0,
        }
    }

    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    pub fn center_frequency(&self) -> f32 {
        self.center_frequency
    }

    pub fn history(&self) -> &RssiHistory<C, D> {
        &self.history
    }

    /// Ring slot the most recent sweep wrote to.
    pub fn sample_slot(&self) -> usize {
        self.slot
    }

    pub fn status(&self) -> RadioStatus {
        RadioStatus {
            mode: self.mode,
            center_frequency: self.center_frequency,
        }
    }
}

/// Mode and centre read from a single lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioStatus {
    pub mode: RadioMode,
    pub center_frequency: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RadioConfig {
    pub center_frequency_mhz: f32,
    pub step_size_mhz: f32,
    pub lock_timeout: Duration,
}

impl RadioConfig {
    pub const fn new() -> Self {
        Self {
            center_frequency_mhz: CENTER_FREQUENCY_MHZ,
            step_size_mhz: STEP_SIZE_MHZ,
            lock_timeout: Duration::from_millis(RADIO_LOCK_TIMEOUT_MS),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequency of `index` in a plan of `channels` channels centred on
/// `center`. Index `channels / 2` is the centre itself.
pub fn channel_frequency(center: f32, step: f32, index: usize, channels: usize) -> f32 {
    let offset = index as i32 - (channels / 2) as i32;
    center + step * offset as f32
}

struct Inner<R, const C: usize, const D: usize> {
    driver: R,
    state: RadioState<C, D>,
}

/// Single authority over the RF driver.
pub struct Coordinator<R, const C: usize = CHANNEL_COUNT, const D: usize = SAMPLE_DEPTH> {
    step_size: f32,
    inner: TimedMutex<Inner<R, C, D>>,
}

impl<R: RfDriver, const C: usize, const D: usize> Coordinator<R, C, D> {
    pub fn new(driver: R, config: RadioConfig) -> Self {
        Self {
            step_size: config.step_size_mhz,
            inner: TimedMutex::new(
                "radio",
                config.lock_timeout,
                Inner {
                    driver,
                    state: RadioState::new(config.center_frequency_mhz),
                },
            ),
        }
    }

    /// Configure the transceiver. Failure is logged; the device keeps running
    /// so the display and supervisor stay alive.
    pub fn init(&self) -> Result<(), FatalError> {
        log::info!("initialising radio");
        let mut inner = self.inner.lock()?;
        match inner.driver.init() {
            Ok(()) => log::info!("radio initialised successfully"),
            Err(e) => log::error!("failed to initialise radio: {}", e),
        }
        Ok(())
    }

    /// Begin continuous transmission on the centre frequency.
    ///
    /// Best effort: the mode becomes `Transmitting` even if the driver
    /// rejects the command, and nothing is retried.
    pub fn start_transmit(&self) -> Result<(), FatalError> {
        let mut guard = self.inner.lock()?;
        let Inner { driver, state } = &mut *guard;
        if state.mode == RadioMode::Transmitting {
            return Ok(());
        }
        state.mode = RadioMode::Transmitting;
        if let Err(e) = driver.tune(state.center_frequency) {
            log::error!("failed to set frequency {:.4} MHz: {}", state.center_frequency, e);
        }
        if let Err(e) = driver.start_continuous_transmit() {
            log::error!("failed to transmit: {}", e);
        }
        log::info!("radio transmission begins at {:.2} MHz", state.center_frequency);
        Ok(())
    }

    /// Put the transceiver in standby and return to scanning.
    pub fn stop_transmit(&self) -> Result<(), FatalError> {
        let mut guard = self.inner.lock()?;
        let Inner { driver, state } = &mut *guard;
        if state.mode != RadioMode::Transmitting {
            return Ok(());
        }
        if let Err(e) = driver.standby() {
            log::error!("failed to set radio to standby: {}", e);
        }
        state.mode = RadioMode::Idle;
        log::info!("radio transmission ends");
        Ok(())
    }

    /// One full sweep of the channel plan into the next ring slot.
    ///
    /// Skipped entirely while transmitting. A channel whose tune or receive
    /// command fails keeps its previous sample; the sweep carries on.
    pub fn scan_once(&self) -> Result<(), FatalError> {
        let mut guard = self.inner.lock()?;
        let Inner { driver, state } = &mut *guard;
        if D > 0 {
            state.slot = (state.slot + 1) % D;
        }
        if state.mode == RadioMode::Transmitting {
            return Ok(());
        }
        state.mode = RadioMode::Scanning;

        let slot = state.slot;
        for index in 0..C {
            let freq = channel_frequency(state.center_frequency, self.step_size, index, C);
            if let Err(e) = driver.tune(freq) {
                log::error!("failed to set frequency {:.4} MHz: {}", freq, e);
                continue;
            }
            if let Err(e) = driver.start_receive() {
                log::error!("failed to start receive at {:.4} MHz: {}", freq, e);
                continue;
            }
            let rssi = driver.read_rssi();
            if D > 0 {
                state.history.record(index, slot, rssi);
            }
        }
        Ok(())
    }

    /// Move the channel plan. An active transmission is retuned in place.
    pub fn set_center_frequency(&self, frequency_mhz: f32) -> Result<(), FatalError> {
        let mut guard = self.inner.lock()?;
        let Inner { driver, state } = &mut *guard;
        state.center_frequency = frequency_mhz;
        log::info!("centre frequency set to {:.2} MHz", frequency_mhz);
        if state.mode == RadioMode::Transmitting {
            if let Err(e) = driver.tune(frequency_mhz) {
                log::error!("failed to set frequency {:.4} MHz: {}", frequency_mhz, e);
            }
        }
        Ok(())
    }

    pub fn status(&self) -> Result<RadioStatus, FatalError> {
        self.inspect(|state| state.status())
    }

    /// Run `f` against a consistent view of the state under the lock.
    ///
    /// Keep `f` short: the sweep waits on it.
    pub fn inspect<T>(&self, f: impl FnOnce(&RadioState<C, D>) -> T) -> Result<T, FatalError> {
        let guard = self.inner.lock()?;
        Ok(f(&guard.state))
    }

    pub fn channel_frequency(&self, center: f32, index: usize) -> f32 {
        channel_frequency(center, self.step_size, index, C)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sync::LockError;
    use proptest::prelude::*;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Tune(f32),
        Transmit,
        Standby,
        Receive,
    }

    /// Records every command; `read_rssi` returns `rssi`.
    #[derive(Debug, Default)]
    pub(crate) struct FakeRf {
        pub calls: Vec<Call>,
        pub rssi: i16,
        pub reject_tune_at: Option<f32>,
        pub reject_transmit: bool,
    }

    impl FakeRf {
        pub fn with_rssi(rssi: i16) -> Self {
            Self {
                rssi,
                ..Self::default()
            }
        }
    }

    impl RfDriver for FakeRf {
        fn tune(&mut self, frequency_mhz: f32) -> Result<(), DriverError> {
            self.calls.push(Call::Tune(frequency_mhz));
            if let Some(bad) = self.reject_tune_at {
                if (bad - frequency_mhz).abs() < 1e-4 {
                    return Err(DriverError::Code(-12));
                }
            }
            Ok(())
        }

        fn start_continuous_transmit(&mut self) -> Result<(), DriverError> {
            self.calls.push(Call::Transmit);
            if self.reject_transmit {
                return Err(DriverError::Code(-2));
            }
            Ok(())
        }

        fn standby(&mut self) -> Result<(), DriverError> {
            self.calls.push(Call::Standby);
            Ok(())
        }

        fn start_receive(&mut self) -> Result<(), DriverError> {
            self.calls.push(Call::Receive);
            Ok(())
        }

        fn read_rssi(&mut self) -> i16 {
            self.rssi
        }
    }

    fn coordinator(rssi: i16) -> Coordinator<FakeRf> {
        Coordinator::new(FakeRf::with_rssi(rssi), RadioConfig::new())
    }

    pub(crate) fn calls(c: &Coordinator<FakeRf>) -> Vec<Call> {
        c.inner.lock().unwrap().driver.calls.clone()
    }

    fn history(c: &Coordinator<FakeRf>) -> RssiHistory<CHANNEL_COUNT, SAMPLE_DEPTH> {
        c.inspect(|s| s.history().clone()).unwrap()
    }

    // ── Transmit ────────────────────────────────────────────────────

    #[test]
    fn start_transmit_tunes_to_center_then_transmits() {
        let c = coordinator(-90);
        c.start_transmit().unwrap();
        assert_eq!(c.status().unwrap().mode, RadioMode::Transmitting);
        assert_eq!(
            calls(&c),
            vec![Call::Tune(CENTER_FREQUENCY_MHZ), Call::Transmit]
        );
    }

    #[test]
    fn repeated_start_transmit_is_a_no_op() {
        let c = coordinator(-90);
        c.start_transmit().unwrap();
        c.start_transmit().unwrap();
        assert_eq!(calls(&c).len(), 2);
    }

    #[test]
    fn stop_without_transmit_does_not_touch_driver() {
        let c = coordinator(-90);
        c.stop_transmit().unwrap();
        assert!(calls(&c).is_empty());
        assert_eq!(c.status().unwrap().mode, RadioMode::Idle);
    }

    #[test]
    fn stop_transmit_goes_to_standby() {
        let c = coordinator(-90);
        c.start_transmit().unwrap();
        c.stop_transmit().unwrap();
        assert_eq!(calls(&c).last(), Some(&Call::Standby));
        assert_eq!(c.status().unwrap().mode, RadioMode::Idle);
    }

    #[test]
    fn rejected_transmit_still_reports_transmitting() {
        let mut rf = FakeRf::with_rssi(-90);
        rf.reject_transmit = true;
        let c: Coordinator<FakeRf> = Coordinator::new(rf, RadioConfig::new());
        c.start_transmit().unwrap();
        assert_eq!(c.status().unwrap().mode, RadioMode::Transmitting);
        // Not retried
        assert_eq!(
            calls(&c).iter().filter(|call| **call == Call::Transmit).count(),
            1
        );
    }

    // ── Sweep ───────────────────────────────────────────────────────

    #[test]
    fn sweep_tunes_every_channel_symmetric_about_center() {
        let c = coordinator(-80);
        c.scan_once().unwrap();
        let tunes: Vec<f32> = calls(&c)
            .into_iter()
            .filter_map(|call| match call {
                Call::Tune(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(tunes.len(), CHANNEL_COUNT);
        assert_eq!(tunes[CHANNEL_COUNT / 2], CENTER_FREQUENCY_MHZ);
        assert!((tunes[0] - (CENTER_FREQUENCY_MHZ - 12.0 * STEP_SIZE_MHZ)).abs() < 1e-3);
        assert!((tunes[24] - (CENTER_FREQUENCY_MHZ + 12.0 * STEP_SIZE_MHZ)).abs() < 1e-3);
        assert_eq!(c.status().unwrap().mode, RadioMode::Scanning);
    }

    #[test]
    fn sweep_writes_only_the_current_slot() {
        let c = coordinator(-42);
        c.scan_once().unwrap();
        let slot = c.inspect(|s| s.sample_slot()).unwrap();
        assert_eq!(slot, 1);
        let h = history(&c);
        for ch in 0..CHANNEL_COUNT {
            for s in 0..SAMPLE_DEPTH {
                let expected = if s == slot { -42 } else { 0 };
                assert_eq!(h.sample(ch, s), expected, "channel {ch} slot {s}");
            }
        }
    }

    #[test]
    fn slot_wraps_modulo_depth() {
        let c = coordinator(-42);
        for _ in 0..SAMPLE_DEPTH {
            c.scan_once().unwrap();
        }
        assert_eq!(c.inspect(|s| s.sample_slot()).unwrap(), 0);
        let h = history(&c);
        assert!(h.channel(0).iter().all(|&s| s == -42));
    }

    #[test]
    fn sweep_is_skipped_while_transmitting() {
        let c = coordinator(-42);
        c.start_transmit().unwrap();
        let before = history(&c);
        let calls_before = calls(&c).len();
        c.scan_once().unwrap();
        assert_eq!(history(&c), before);
        assert_eq!(calls(&c).len(), calls_before);
        assert_eq!(c.status().unwrap().mode, RadioMode::Transmitting);
    }

    #[test]
    fn failing_channel_keeps_old_sample_and_sweep_continues() {
        let bad = channel_frequency(CENTER_FREQUENCY_MHZ, STEP_SIZE_MHZ, 3, CHANNEL_COUNT);
        let mut rf = FakeRf::with_rssi(-60);
        rf.reject_tune_at = Some(bad);
        let c: Coordinator<FakeRf> = Coordinator::new(rf, RadioConfig::new());
        c.scan_once().unwrap();
        let h = history(&c);
        assert_eq!(h.sample(3, 1), 0);
        assert_eq!(h.sample(2, 1), -60);
        assert_eq!(h.sample(4, 1), -60);
        assert_eq!(h.sample(CHANNEL_COUNT - 1, 1), -60);
    }

    #[test]
    fn center_channel_frequency_is_exact() {
        for &center in &[868.5f32, 870.4, 433.92, 915.0] {
            assert_eq!(
                channel_frequency(center, STEP_SIZE_MHZ, CHANNEL_COUNT / 2, CHANNEL_COUNT),
                center
            );
        }
    }

    #[test]
    fn center_frequency_survives_scans() {
        let c = coordinator(-70);
        c.set_center_frequency(868.5).unwrap();
        for _ in 0..10 {
            c.scan_once().unwrap();
        }
        assert_eq!(c.status().unwrap().center_frequency, 868.5);
    }

    #[test]
    fn retune_while_transmitting() {
        let c = coordinator(-70);
        c.start_transmit().unwrap();
        c.set_center_frequency(869.0).unwrap();
        assert_eq!(calls(&c).last(), Some(&Call::Tune(869.0)));
    }

    // ── Averages ────────────────────────────────────────────────────

    #[test]
    fn averages_truncate_toward_zero() {
        let mut h = RssiHistory::<2, 4>::new();
        for (slot, v) in [-90, -91, -91, -91].into_iter().enumerate() {
            h.record(0, slot, v);
        }
        // -363 / 4 = -90.75
        assert_eq!(h.channel_average(0), -90);
        assert_eq!(h.channel_average(1), 0);
        // -363 / 8 = -45.375
        assert_eq!(h.global_average(), Some(-45));
    }

    #[test]
    fn empty_history_has_no_global_average() {
        assert_eq!(RssiHistory::<0, 4>::new().global_average(), None);
    }

    // ── Locking ─────────────────────────────────────────────────────

    #[test]
    fn lock_timeout_is_fatal() {
        let config = RadioConfig {
            lock_timeout: Duration::from_millis(20),
            ..RadioConfig::new()
        };
        let c: Coordinator<FakeRf> = Coordinator::new(FakeRf::with_rssi(-90), config);
        let result = c
            .inspect(|_| thread::scope(|s| s.spawn(|| c.start_transmit()).join().unwrap()))
            .unwrap();
        assert!(matches!(
            result,
            Err(FatalError::Lock(LockError::Timeout { lock: "radio", .. }))
        ));
        // Nothing changed behind the held lock
        assert_eq!(c.status().unwrap().mode, RadioMode::Idle);
    }

    proptest! {
        #[test]
        fn mode_follows_last_transmit_request(requests in proptest::collection::vec(any::<bool>(), 1..40)) {
            let c = coordinator(-90);
            for &start in &requests {
                if start {
                    c.start_transmit().unwrap();
                } else {
                    c.stop_transmit().unwrap();
                }
            }
            let transmitting = c.status().unwrap().mode == RadioMode::Transmitting;
            prop_assert_eq!(transmitting, *requests.last().unwrap());
        }

        #[test]
        fn scans_never_touch_history_while_transmitting(scans in 1usize..10, rssi in -120i16..0) {
            let c = coordinator(rssi);
            c.scan_once().unwrap();
            c.start_transmit().unwrap();
            let before = history(&c);
            for _ in 0..scans {
                c.scan_once().unwrap();
            }
            prop_assert_eq!(history(&c), before);
        }
    }
}
