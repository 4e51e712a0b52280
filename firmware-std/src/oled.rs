//! SSD1306 128x64 OLED over I2C.
//!
//! Buffered graphics mode: drawing goes to RAM, `present` flushes the frame.

use core::ops::Range;

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::i2c::I2c;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

use hzgl_radio::display::DisplayDriver;
use hzgl_radio::error::DriverError;

const LINE_HEIGHT: i32 = 10;

type Panel<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

pub struct Oled<I2C> {
    panel: Panel<I2C>,
}

impl<I2C: I2c> Oled<I2C> {
    pub fn new(i2c: I2C, addr: u8) -> Result<Self, DriverError> {
        log::info!("initialising display");
        let interface = I2CDisplayInterface::new_custom_address(i2c, addr);
        // Mounted upside down on the T-Beam
        let mut panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate180)
            .into_buffered_graphics_mode();
        panel.init().map_err(|_| DriverError::Bus)?;
        panel
            .set_brightness(Brightness::DIM)
            .map_err(|_| DriverError::Bus)?;
        log::info!("display initialised successfully");
        Ok(Self { panel })
    }
}

impl<I2C: I2c> DisplayDriver for Oled<I2C> {
    fn clear(&mut self) {
        self.panel.clear_buffer();
    }

    fn draw_text(&mut self, line: u8, text: &str) {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let origin = Point::new(0, i32::from(line) * LINE_HEIGHT);
        let _ = Text::with_baseline(text, origin, style, Baseline::Top).draw(&mut self.panel);
    }

    fn draw_vertical_bar(&mut self, x: Range<i32>, y_top: i32, height: i32) {
        if height <= 0 || x.is_empty() {
            return;
        }
        let size = Size::new(x.len() as u32, height as u32);
        let _ = Rectangle::new(Point::new(x.start, y_top), size)
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut self.panel);
    }

    fn present(&mut self) -> Result<(), DriverError> {
        self.panel.flush().map_err(|_| DriverError::Bus)
    }
}
