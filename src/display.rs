/// Spectrum bar-graph renderer.
///
/// Each refresh takes the radio lock once, reduces the RSSI history to a
/// [`DisplayFrame`] (status line, display window, one bar per channel), and
/// releases the lock before anything is drawn. Mode, centre and bars in one
/// frame therefore always come from the same instant, and the sweep is held
/// off only for the reduction, never for the I2C transfer.
use core::fmt::Write;
use core::ops::Range;

use crate::defaults::{
    BAR_BASE_Y, BAR_MAX_HEIGHT, BAR_WIDTH, CENTER_MARKER_HEIGHT, CENTER_MARKER_TOP,
    MAX_LINE_LEN, WINDOW_CEILING_DBM, WINDOW_FLOOR_DBM, WINDOW_MARGIN_ABOVE,
    WINDOW_MARGIN_BELOW,
};
use crate::error::{DriverError, FatalError};
use crate::radio::{Coordinator, RadioMode, RadioState, RfDriver};

/// Monochrome text + bar canvas, double-buffered: nothing is visible until
/// `present`.
pub trait DisplayDriver {
    fn clear(&mut self);
    fn draw_text(&mut self, line: u8, text: &str);
    /// Fill columns `x` from `y_top` down `height` pixels.
    fn draw_vertical_bar(&mut self, x: Range<i32>, y_top: i32, height: i32);
    fn present(&mut self) -> Result<(), DriverError>;
}

pub type StatusLine = heapless::String<MAX_LINE_LEN>;

#[derive(Debug, Clone, Copy)]
pub struct DisplayConfig {
    pub bar_width: i32,
    pub bar_max_height: i32,
    pub bar_base_y: i32,
    pub marker_top: i32,
    pub marker_height: i32,
    pub margin_below: i32,
    pub margin_above: i32,
    pub floor_dbm: i32,
    pub ceiling_dbm: i32,
}

impl DisplayConfig {
    pub const fn new() -> Self {
        Self {
            bar_width: BAR_WIDTH,
            bar_max_height: BAR_MAX_HEIGHT,
            bar_base_y: BAR_BASE_Y,
            marker_top: CENTER_MARKER_TOP,
            marker_height: CENTER_MARKER_HEIGHT,
            margin_below: WINDOW_MARGIN_BELOW,
            margin_above: WINDOW_MARGIN_ABOVE,
            floor_dbm: WINDOW_FLOOR_DBM,
            ceiling_dbm: WINDOW_CEILING_DBM,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// RSSI range mapped onto the bar height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    pub min: i32,
    pub max: i32,
}

impl DisplayWindow {
    /// `[avg - below, avg + above]`, clamped into `[floor, ceiling]`.
    pub fn around(average: i32, config: &DisplayConfig) -> Self {
        Self {
            min: (average - config.margin_below).max(config.floor_dbm),
            max: (average + config.margin_above).min(config.ceiling_dbm),
        }
    }

    /// Linear map of `rssi` from the window to `0..=max_height`.
    ///
    /// An empty or inverted window (very strong or very weak averages)
    /// degrades to a threshold at `min`.
    pub fn bar_height(&self, rssi: i32, max_height: i32) -> i32 {
        if self.max <= self.min {
            return if rssi >= self.min { max_height } else { 0 };
        }
        let h = (rssi - self.min) * max_height / (self.max - self.min);
        h.clamp(0, max_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bar {
    pub x: i32,
    pub width: i32,
    pub y_top: i32,
    pub height: i32,
}

impl Bar {
    fn columns(&self) -> Range<i32> {
        self.x..self.x + self.width
    }
}

/// One renderable snapshot of the radio state.
#[derive(Debug, Clone)]
pub struct DisplayFrame<const C: usize> {
    pub status: StatusLine,
    pub window: DisplayWindow,
    pub bars: [Bar; C],
    /// Full-height line through the centre channel's bar.
    pub marker: Bar,
}

impl<const C: usize> DisplayFrame<C> {
    pub fn from_state<const D: usize>(
        state: &RadioState<C, D>,
        config: &DisplayConfig,
        badge: Option<&str>,
    ) -> Self {
        let history = state.history();
        let average = history.global_average().unwrap_or(config.floor_dbm);
        let window = DisplayWindow::around(average, config);

        let bars = core::array::from_fn(|index| {
            let height = window.bar_height(history.channel_average(index), config.bar_max_height);
            Bar {
                x: index as i32 * config.bar_width,
                // one blank column between bars
                width: config.bar_width - 1,
                y_top: config.bar_base_y - height,
                height,
            }
        });

        let center_x = (C / 2) as i32 * config.bar_width + config.bar_width / 2 - 1;
        let marker = Bar {
            x: center_x,
            width: 1,
            y_top: config.marker_top,
            height: config.marker_height,
        };

        Self {
            status: status_line(state.mode(), state.center_frequency(), badge),
            window,
            bars,
            marker,
        }
    }

    pub fn render<Dd: DisplayDriver + ?Sized>(&self, display: &mut Dd) -> Result<(), DriverError> {
        display.clear();
        display.draw_text(0, &self.status);
        for bar in &self.bars {
            display.draw_vertical_bar(bar.columns(), bar.y_top, bar.height);
        }
        display.draw_vertical_bar(self.marker.columns(), self.marker.y_top, self.marker.height);
        display.present()
    }
}

/// "Centre @ 870.40MHz" or "TRANSMITTING @ 870.40", plus optional badge.
pub fn status_line(mode: RadioMode, center_frequency: f32, badge: Option<&str>) -> StatusLine {
    let mut line = StatusLine::new();
    let _ = match mode {
        RadioMode::Transmitting => write!(line, "TRANSMITTING @ {:.2}", center_frequency),
        RadioMode::Idle | RadioMode::Scanning => write!(line, "Centre @ {:.2}MHz", center_frequency),
    };
    if let Some(badge) = badge {
        let _ = write!(line, " {}", badge);
    }
    line
}

/// Capture a frame under the radio lock, then draw it.
///
/// Draw failures are transient and only logged; a lock timeout is fatal.
pub fn refresh<R, Dd, const C: usize, const D: usize>(
    radio: &Coordinator<R, C, D>,
    display: &mut Dd,
    config: &DisplayConfig,
    badge: Option<&str>,
) -> Result<(), FatalError>
where
    R: RfDriver,
    Dd: DisplayDriver + ?Sized,
{
    let frame = radio.inspect(|state| DisplayFrame::from_state(state, config, badge))?;
    if let Err(e) = frame.render(display) {
        log::warn!("display refresh failed: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{CHANNEL_COUNT, SAMPLE_DEPTH};
    use crate::radio::tests::FakeRf;
    use crate::radio::RadioConfig;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Clear,
        Text(u8, String),
        Bar(Range<i32>, i32, i32),
        Present,
    }

    #[derive(Default)]
    struct FakeDisplay {
        ops: Vec<Op>,
    }

    impl DisplayDriver for FakeDisplay {
        fn clear(&mut self) {
            self.ops.push(Op::Clear);
        }
        fn draw_text(&mut self, line: u8, text: &str) {
            self.ops.push(Op::Text(line, text.to_string()));
        }
        fn draw_vertical_bar(&mut self, x: Range<i32>, y_top: i32, height: i32) {
            self.ops.push(Op::Bar(x, y_top, height));
        }
        fn present(&mut self) -> Result<(), DriverError> {
            self.ops.push(Op::Present);
            Ok(())
        }
    }

    #[test]
    fn window_clamps_to_absolute_bounds() {
        let w = DisplayWindow::around(-85, &DisplayConfig::new());
        assert_eq!(w, DisplayWindow { min: -100, max: -75 });
    }

    #[test]
    fn window_inside_bounds_is_unclamped() {
        let w = DisplayWindow::around(-78, &DisplayConfig::new());
        // -98 .. -68 → ceiling clamps the top
        assert_eq!(w, DisplayWindow { min: -98, max: -70 });
    }

    #[test]
    fn bar_height_maps_linearly_and_clamps() {
        let w = DisplayWindow { min: -100, max: -75 };
        assert_eq!(w.bar_height(-100, 50), 0);
        assert_eq!(w.bar_height(-75, 50), 50);
        assert_eq!(w.bar_height(-90, 50), 20);
        assert_eq!(w.bar_height(-120, 50), 0);
        assert_eq!(w.bar_height(-40, 50), 50);
    }

    #[test]
    fn inverted_window_degrades_to_threshold() {
        // average 0 (nothing scanned yet)
        let w = DisplayWindow::around(0, &DisplayConfig::new());
        assert!(w.max <= w.min);
        assert_eq!(w.bar_height(0, 50), 50);
        assert_eq!(w.bar_height(-90, 50), 0);
    }

    #[test]
    fn status_line_by_mode() {
        assert_eq!(
            status_line(RadioMode::Scanning, 868.5, None).as_str(),
            "Centre @ 868.50MHz"
        );
        assert_eq!(
            status_line(RadioMode::Idle, 870.4, Some("USB")).as_str(),
            "Centre @ 870.40MHz USB"
        );
        assert_eq!(
            status_line(RadioMode::Transmitting, 868.5, Some("BAT")).as_str(),
            "TRANSMITTING @ 868.50 BAT"
        );
    }

    #[test]
    fn frame_has_one_bar_per_channel_and_a_center_marker() {
        let radio: Coordinator<FakeRf> =
            Coordinator::new(FakeRf::with_rssi(-85), RadioConfig::new());
        for _ in 0..SAMPLE_DEPTH {
            radio.scan_once().unwrap();
        }
        let config = DisplayConfig::new();
        let frame = radio
            .inspect(|s| DisplayFrame::from_state(s, &config, None))
            .unwrap();

        assert_eq!(frame.window, DisplayWindow { min: -100, max: -75 });
        // -85 in [-100, -75] → 15 * 50 / 25 = 30 px
        for (i, bar) in frame.bars.iter().enumerate() {
            assert_eq!(bar.x, i as i32 * 6);
            assert_eq!(bar.width, 5);
            assert_eq!(bar.height, 30);
            assert_eq!(bar.y_top, 33);
        }
        assert_eq!(frame.marker.x, 12 * 6 + 2);
        assert_eq!(frame.marker.y_top, 14);
        assert_eq!(frame.marker.height, 50);
    }

    #[test]
    fn render_draws_status_bars_marker_then_presents() {
        let radio: Coordinator<FakeRf> =
            Coordinator::new(FakeRf::with_rssi(-85), RadioConfig::new());
        radio.start_transmit().unwrap();
        let mut display = FakeDisplay::default();
        refresh(&radio, &mut display, &DisplayConfig::new(), None).unwrap();

        let ops = &display.ops;
        assert_eq!(ops.len(), 1 + 1 + CHANNEL_COUNT + 1 + 1);
        assert_eq!(ops[0], Op::Clear);
        assert_eq!(ops[1], Op::Text(0, "TRANSMITTING @ 870.40".to_string()));
        // Nothing scanned: all-zero history fills every bar
        assert_eq!(ops[2], Op::Bar(0..5, 13, 50));
        assert_eq!(ops[ops.len() - 2], Op::Bar(74..75, 14, 50));
        assert_eq!(ops[ops.len() - 1], Op::Present);
    }
}
