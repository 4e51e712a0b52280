/// Push-to-talk button.
///
/// Polls the button line at a fixed interval. A press starts transmission
/// on the first sample that reads held. Release is debounced: the line must
/// read released continuously for the debounce interval, measured from the
/// last held sample, before transmission stops. Contact chatter while the
/// button is held therefore never cuts the carrier.
///
/// Each physical press produces exactly one `start_transmit` and each
/// confirmed release exactly one `stop_transmit`.
use crate::board;
use crate::defaults::BUTTON_DEBOUNCE_MS;
use crate::error::FatalError;
use crate::radio::{Coordinator, RfDriver};

/// Raw digital input.
pub trait InputLine {
    fn is_high(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy)]
pub struct ButtonConfig {
    /// Released level must persist this long to confirm a release.
    pub debounce_ms: u64,
    /// Line reads low while held (external pull-up).
    pub active_low: bool,
}

impl ButtonConfig {
    pub const fn new() -> Self {
        Self {
            debounce_ms: BUTTON_DEBOUNCE_MS,
            active_low: board::BUTTON_ACTIVE_LOW,
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Released / PressConfirmed edge detector.
#[derive(Debug, Clone)]
pub struct ButtonMonitor {
    config: ButtonConfig,
    /// Set while in PressConfirmed: when the press edge was seen.
    pressed_since: Option<u64>,
    /// Most recent sample that read held.
    last_held_ms: u64,
}

impl ButtonMonitor {
    pub const fn new(config: ButtonConfig) -> Self {
        Self {
            config,
            pressed_since: None,
            last_held_ms: 0,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed_since.is_some()
    }

    pub fn pressed_since(&self) -> Option<u64> {
        self.pressed_since
    }

    /// Feed one raw sample. Returns the confirmed edge, if any.
    pub fn poll(&mut self, line_high: bool, now_ms: u64) -> Option<ButtonEvent> {
        let held = line_high != self.config.active_low;
        match (self.pressed_since, held) {
            (None, true) => {
                self.pressed_since = Some(now_ms);
                self.last_held_ms = now_ms;
                Some(ButtonEvent::Pressed)
            }
            (Some(_), true) => {
                self.last_held_ms = now_ms;
                None
            }
            (Some(_), false) => {
                if now_ms.saturating_sub(self.last_held_ms) >= self.config.debounce_ms {
                    self.pressed_since = None;
                    Some(ButtonEvent::Released)
                } else {
                    None
                }
            }
            (None, false) => None,
        }
    }

    /// Sample the line and forward any confirmed edge to the radio.
    pub fn step<L, R, const C: usize, const D: usize>(
        &mut self,
        line: &mut L,
        now_ms: u64,
        radio: &Coordinator<R, C, D>,
    ) -> Result<Option<ButtonEvent>, FatalError>
    where
        L: InputLine + ?Sized,
        R: RfDriver,
    {
        let event = self.poll(line.is_high(), now_ms);
        match event {
            Some(ButtonEvent::Pressed) => {
                log::info!("button pressed");
                radio.start_transmit()?;
            }
            Some(ButtonEvent::Released) => {
                log::info!("button released");
                radio.stop_transmit()?;
            }
            None => {}
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::tests::{calls, Call, FakeRf};
    use crate::radio::{RadioConfig, RadioMode};
    use crate::defaults::BUTTON_TASK_INTERVAL_MS;

    const INTERVAL: u64 = 50;

    fn active_high(debounce_ms: u64) -> ButtonMonitor {
        ButtonMonitor::new(ButtonConfig {
            debounce_ms,
            active_low: false,
        })
    }

    struct Script {
        levels: Vec<bool>,
        next: usize,
    }

    impl InputLine for Script {
        fn is_high(&mut self) -> bool {
            let level = self.levels[self.next];
            self.next += 1;
            level
        }
    }

    #[test]
    fn press_fires_on_first_held_sample() {
        let mut b = active_high(2 * INTERVAL);
        assert_eq!(b.poll(false, 0), None);
        assert_eq!(b.poll(true, 50), Some(ButtonEvent::Pressed));
        assert_eq!(b.pressed_since(), Some(50));
    }

    #[test]
    fn release_needs_two_consecutive_released_samples() {
        let mut b = active_high(2 * INTERVAL);
        // held, held, held, released, released
        assert_eq!(b.poll(true, 0), Some(ButtonEvent::Pressed));
        assert_eq!(b.poll(true, 50), None);
        assert_eq!(b.poll(true, 100), None);
        assert_eq!(b.poll(false, 150), None, "first released sample must not confirm");
        assert!(b.is_pressed());
        assert_eq!(b.poll(false, 200), Some(ButtonEvent::Released));
        assert_eq!(b.pressed_since(), None);
    }

    #[test]
    fn chatter_while_held_does_not_release() {
        let mut b = active_high(2 * INTERVAL);
        let samples = [true, false, true, false, true, true];
        let events: Vec<_> = samples
            .iter()
            .enumerate()
            .filter_map(|(i, &lvl)| b.poll(lvl, i as u64 * INTERVAL))
            .collect();
        assert_eq!(events, vec![ButtonEvent::Pressed]);
    }

    #[test]
    fn default_config_ignores_a_single_bounce() {
        // T-Beam line: low while held, one high bounce mid-hold
        let mut b = ButtonMonitor::new(ButtonConfig::new());
        let samples = [false, false, true, false, false];
        let events: Vec<_> = samples
            .iter()
            .enumerate()
            .filter_map(|(i, &lvl)| b.poll(lvl, i as u64 * BUTTON_TASK_INTERVAL_MS))
            .collect();
        assert_eq!(events, vec![ButtonEvent::Pressed]);
        assert!(b.is_pressed());
    }

    #[test]
    fn default_config_releases_on_second_released_sample() {
        let mut b = ButtonMonitor::new(ButtonConfig::new());
        let t = |i: u64| i * BUTTON_TASK_INTERVAL_MS;
        assert_eq!(b.poll(false, t(0)), Some(ButtonEvent::Pressed));
        assert_eq!(b.poll(false, t(1)), None);
        assert_eq!(b.poll(true, t(2)), None);
        assert_eq!(b.poll(true, t(3)), Some(ButtonEvent::Released));
    }

    #[test]
    fn steady_hold_fires_once() {
        let mut b = active_high(INTERVAL);
        let presses = (0..20)
            .filter_map(|i| b.poll(true, i * INTERVAL))
            .count();
        assert_eq!(presses, 1);
    }

    #[test]
    fn active_low_line_is_inverted() {
        let mut b = ButtonMonitor::new(ButtonConfig {
            debounce_ms: INTERVAL,
            active_low: true,
        });
        assert_eq!(b.poll(true, 0), None, "idle high is released");
        assert_eq!(b.poll(false, 50), Some(ButtonEvent::Pressed));
        assert_eq!(b.poll(true, 100), Some(ButtonEvent::Released));
    }

    #[test]
    fn step_drives_transmit_once_per_edge() {
        let radio: Coordinator<FakeRf> =
            Coordinator::new(FakeRf::with_rssi(-90), RadioConfig::new());
        let mut b = active_high(2 * INTERVAL);
        let mut line = Script {
            levels: vec![false, true, true, true, false, false, false, true],
            next: 0,
        };

        let mut t = 0;
        for _ in 0..5 {
            b.step(&mut line, t, &radio).unwrap();
            t += INTERVAL;
        }
        assert_eq!(radio.status().unwrap().mode, RadioMode::Transmitting);

        b.step(&mut line, t, &radio).unwrap();
        t += INTERVAL;
        assert_eq!(radio.status().unwrap().mode, RadioMode::Idle);

        b.step(&mut line, t, &radio).unwrap();
        t += INTERVAL;
        b.step(&mut line, t, &radio).unwrap();
        assert_eq!(radio.status().unwrap().mode, RadioMode::Transmitting);

        let transmits = calls(&radio)
            .iter()
            .filter(|c| **c == Call::Transmit)
            .count();
        assert_eq!(transmits, 2);
    }
}
