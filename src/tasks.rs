/// Periodic task bodies.
///
/// Every long-running task is the same shape: feed the watchdog, do one unit
/// of work, sleep a fixed interval. A `FatalError` out of the work goes
/// straight to [`escalate`]; nothing is retried. The firmware spawns one
/// thread per task and hands each the loop below with its own step.
use std::thread;
use std::time::Duration;

use crate::button::{ButtonMonitor, InputLine};
use crate::display::{self, DisplayConfig, DisplayDriver};
use crate::error::FatalError;
use crate::platform::{escalate, Platform, Watchdog};
use crate::power::{Pmu, PowerMonitor};
use crate::radio::{Coordinator, RfDriver};

/// One iteration: feed, run, escalate on failure.
pub fn tick<W, Pl, F>(watchdog: &mut W, platform: &Pl, step: F)
where
    W: Watchdog + ?Sized,
    Pl: Platform + ?Sized,
    F: FnOnce() -> Result<(), FatalError>,
{
    watchdog.feed();
    if let Err(e) = step() {
        escalate(platform, e.into());
    }
}

/// Run `step` forever at a fixed interval.
pub fn run_periodic<W, Pl, F>(interval: Duration, watchdog: &mut W, platform: &Pl, mut step: F) -> !
where
    W: Watchdog + ?Sized,
    Pl: Platform + ?Sized,
    F: FnMut() -> Result<(), FatalError>,
{
    loop {
        tick(watchdog, platform, &mut step);
        thread::sleep(interval);
    }
}

/// Button task body: sample once and forward edges.
pub fn button_step<L, R, Pl, const C: usize, const D: usize>(
    monitor: &mut ButtonMonitor,
    line: &mut L,
    radio: &Coordinator<R, C, D>,
    platform: &Pl,
) -> Result<(), FatalError>
where
    L: InputLine + ?Sized,
    R: RfDriver,
    Pl: Platform + ?Sized,
{
    monitor.step(line, platform.uptime_ms(), radio)?;
    Ok(())
}

/// Display task body. The power badge is read first, under the power lock
/// alone; the radio lock is taken afterwards for the frame.
pub fn display_step<R, Dd, P, const C: usize, const D: usize>(
    radio: &Coordinator<R, C, D>,
    screen: &mut Dd,
    config: &DisplayConfig,
    power: Option<&PowerMonitor<P>>,
) -> Result<(), FatalError>
where
    R: RfDriver,
    Dd: DisplayDriver + ?Sized,
    P: Pmu,
{
    let badge = match power {
        Some(monitor) => monitor.status()?.map(|s| s.badge()),
        None => None,
    };
    display::refresh(radio, screen, config, badge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::ButtonConfig;
    use crate::platform::MockPlatform;
    use crate::power::tests::{on_battery, FakePmu};
    use crate::power::PowerConfig;
    use crate::radio::tests::FakeRf;
    use crate::radio::{RadioConfig, RadioMode};
    use crate::sync::LockError;
    use core::ops::Range;

    #[derive(Default)]
    struct CountingWatchdog {
        feeds: usize,
    }

    impl Watchdog for CountingWatchdog {
        fn feed(&mut self) {
            self.feeds += 1;
        }
    }

    #[derive(Default)]
    struct TextOnly {
        status: String,
    }

    impl DisplayDriver for TextOnly {
        fn clear(&mut self) {}
        fn draw_text(&mut self, _line: u8, text: &str) {
            self.status = text.to_string();
        }
        fn draw_vertical_bar(&mut self, _x: Range<i32>, _y_top: i32, _height: i32) {}
        fn present(&mut self) -> Result<(), crate::error::DriverError> {
            Ok(())
        }
    }

    #[test]
    fn tick_feeds_watchdog_before_work() {
        let mut platform = MockPlatform::new();
        platform.expect_restart().times(0);
        let mut wd = CountingWatchdog::default();
        tick(&mut wd, &platform, || Ok(()));
        assert_eq!(wd.feeds, 1);
    }

    #[test]
    fn tick_escalates_fatal_errors() {
        let mut platform = MockPlatform::new();
        platform.expect_uptime_ms().return_const(1_000u64);
        platform
            .expect_restart()
            .withf(|r| r.kind() == "lock_timeout")
            .times(1)
            .return_const(());
        let mut wd = CountingWatchdog::default();
        tick(&mut wd, &platform, || {
            Err(LockError::Timeout {
                lock: "radio",
                waited_ms: 1000,
            }
            .into())
        });
        assert_eq!(wd.feeds, 1);
    }

    #[test]
    fn button_step_uses_platform_uptime() {
        let radio: Coordinator<FakeRf> =
            Coordinator::new(FakeRf::with_rssi(-90), RadioConfig::new());
        let mut monitor = ButtonMonitor::new(ButtonConfig {
            debounce_ms: 50,
            active_low: true,
        });
        struct Held;
        impl InputLine for Held {
            fn is_high(&mut self) -> bool {
                false
            }
        }
        let mut platform = MockPlatform::new();
        platform.expect_uptime_ms().return_const(4_200u64);

        button_step(&mut monitor, &mut Held, &radio, &platform).unwrap();
        assert_eq!(monitor.pressed_since(), Some(4_200));
        assert_eq!(radio.status().unwrap().mode, RadioMode::Transmitting);
    }

    #[test]
    fn display_step_shows_power_badge() {
        let radio: Coordinator<FakeRf> =
            Coordinator::new(FakeRf::with_rssi(-90), RadioConfig::new());
        let power = PowerMonitor::new(
            FakePmu {
                reading: on_battery(),
                ..FakePmu::default()
            },
            PowerConfig::new(),
        );
        power.refresh().unwrap();
        let mut screen = TextOnly::default();

        display_step(&radio, &mut screen, &DisplayConfig::new(), Some(&power)).unwrap();
        assert_eq!(screen.status, "Centre @ 870.40MHz BAT");
    }

    #[test]
    fn display_step_without_power_monitor() {
        let radio: Coordinator<FakeRf> =
            Coordinator::new(FakeRf::with_rssi(-90), RadioConfig::new());
        let mut screen = TextOnly::default();
        display_step::<_, _, FakePmu, 25, 4>(&radio, &mut screen, &DisplayConfig::new(), None)
            .unwrap();
        assert_eq!(screen.status, "Centre @ 870.40MHz");
    }
}
