//! AXP192 power-management chip (LilyGO T-Beam v1.0/v1.1).

use embedded_hal::digital::InputPin;
use embedded_hal::i2c::I2c;

use hzgl_radio::error::DriverError;
use hzgl_radio::power::{Currents, PmuEvents, Pmu, RawPowerReading};

mod reg {
    pub const POWER_STATUS: u8 = 0x00;
    pub const CHARGE_STATUS: u8 = 0x01;
    pub const OUTPUT_CTRL: u8 = 0x12;
    pub const DCDC1_VOLTAGE: u8 = 0x26;
    pub const LDO23_VOLTAGE: u8 = 0x28;
    pub const VBUS_IPSOUT: u8 = 0x30;
    pub const VOFF: u8 = 0x31;
    pub const SHUTDOWN: u8 = 0x32;
    pub const CHARGE_CTRL1: u8 = 0x33;
    pub const PEK: u8 = 0x36;
    pub const IRQ_EN1: u8 = 0x40;
    pub const IRQ_EN2: u8 = 0x41;
    pub const IRQ_EN3: u8 = 0x42;
    pub const IRQ_EN4: u8 = 0x43;
    pub const IRQ_STATUS1: u8 = 0x44;
    pub const IRQ_STATUS2: u8 = 0x45;
    pub const IRQ_STATUS3: u8 = 0x46;
    pub const VBUS_VOLTAGE: u8 = 0x5A;
    pub const VBUS_CURRENT: u8 = 0x5C;
    pub const BATT_VOLTAGE: u8 = 0x78;
    pub const BATT_CHARGE_CURRENT: u8 = 0x7A;
    pub const BATT_DISCHARGE_CURRENT: u8 = 0x7C;
    pub const ADC_EN1: u8 = 0x82;
}

// IRQ status 2
const IRQ_BATT_INSERT: u8 = 1 << 7;
const IRQ_BATT_REMOVE: u8 = 1 << 6;
const IRQ_CHARGE_DONE: u8 = 1 << 2;
// IRQ status 3
const IRQ_PEK_SHORT: u8 = 1 << 1;
const IRQ_PEK_LONG: u8 = 1 << 0;

pub struct Axp192<I2C, IRQ> {
    i2c: I2C,
    addr: u8,
    /// Open-drain, low while an interrupt is pending.
    irq: IRQ,
}

impl<I2C: I2c, IRQ: InputPin> Axp192<I2C, IRQ> {
    pub fn new(i2c: I2C, addr: u8, irq: IRQ) -> Self {
        Self { i2c, addr, irq }
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, DriverError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.addr, &[reg], &mut buf)
            .map_err(|_| DriverError::Bus)?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), DriverError> {
        self.i2c
            .write(self.addr, &[reg, value])
            .map_err(|_| DriverError::Bus)
    }

    fn update(&mut self, reg: u8, clear: u8, set: u8) -> Result<(), DriverError> {
        let value = self.read_reg(reg)?;
        self.write_reg(reg, (value & !clear) | set)
    }

    /// ADC pair with 8 high bits in `reg` and `low_bits` in `reg + 1`.
    fn read_adc(&mut self, reg: u8, low_bits: u32) -> Result<u32, DriverError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.addr, &[reg], &mut buf)
            .map_err(|_| DriverError::Bus)?;
        let mask = (1u32 << low_bits) - 1;
        Ok((u32::from(buf[0]) << low_bits) | (u32::from(buf[1]) & mask))
    }

    /// Rails, charger, ADCs and interrupts for the T-Beam.
    pub fn configure(&mut self) -> Result<(), DriverError> {
        log::info!("setting up AXP192");

        // VBUS hold at 4.1 V, no current limit
        self.write_reg(reg::VBUS_IPSOUT, 0x48)?;
        // Power off below 2.8 V
        self.update(reg::VOFF, 0x07, 0x02)?;
        // Power key: 2 s on, auto power-off after a 4 s hold
        self.write_reg(reg::PEK, 0xDC)?;

        // DC1 3.3 V (OLED), LDO2 3.3 V (radio), LDO3 3.0 V (GPS)
        self.write_reg(reg::DCDC1_VOLTAGE, 0x68)?;
        self.write_reg(reg::LDO23_VOLTAGE, 0xFC)?;
        // DC1 and LDO2 on, DC2 off
        self.update(reg::OUTPUT_CTRL, 1 << 4, (1 << 0) | (1 << 2))?;

        // Charge to 4.2 V at 1 A, stop at 10 %
        self.write_reg(reg::CHARGE_CTRL1, 0xCB)?;

        // Battery V/I, VBUS V/I and APS voltage ADCs; TS off
        self.write_reg(reg::ADC_EN1, 0xCE)?;

        // VBUS insert/remove, battery insert/remove, charge start/done, PEK
        self.write_reg(reg::IRQ_EN1, 0x0C)?;
        self.write_reg(reg::IRQ_EN2, 0xCC)?;
        self.write_reg(reg::IRQ_EN3, 0x03)?;
        self.write_reg(reg::IRQ_EN4, 0x00)?;
        self.clear_irq()
    }

    fn clear_irq(&mut self) -> Result<(), DriverError> {
        for r in [reg::IRQ_STATUS1, reg::IRQ_STATUS2, reg::IRQ_STATUS3] {
            self.write_reg(r, 0xFF)?;
        }
        Ok(())
    }

    fn vbus_present(&mut self) -> Result<bool, DriverError> {
        Ok(self.read_reg(reg::POWER_STATUS)? & (1 << 5) != 0)
    }
}

impl<I2C: I2c, IRQ: InputPin> Pmu for Axp192<I2C, IRQ> {
    fn read(&mut self) -> Result<RawPowerReading, DriverError> {
        let charging = self.read_reg(reg::CHARGE_STATUS)? & (1 << 6) != 0;
        // 1.1 mV / LSB
        let batt_mv = self.read_adc(reg::BATT_VOLTAGE, 4)? * 11 / 10;
        // 1.7 mV / LSB, only meaningful with VBUS present
        let usb_mv = if self.vbus_present()? {
            self.read_adc(reg::VBUS_VOLTAGE, 4)? * 17 / 10
        } else {
            0
        };
        // 0.5 mA / LSB (13 bit) and 0.375 mA / LSB (12 bit)
        let charge_ma = self.read_adc(reg::BATT_CHARGE_CURRENT, 5)? / 2;
        let discharge_ma = self.read_adc(reg::BATT_DISCHARGE_CURRENT, 5)? / 2;
        let vbus_ma = self.read_adc(reg::VBUS_CURRENT, 4)? * 3 / 8;

        Ok(RawPowerReading {
            charging,
            batt_mv: batt_mv.min(u32::from(u16::MAX)) as u16,
            usb_mv: usb_mv.min(u32::from(u16::MAX)) as u16,
            currents: Some(Currents {
                charge_ma: charge_ma as i32,
                discharge_ma: discharge_ma as i32,
                vbus_ma: vbus_ma as i32,
            }),
        })
    }

    fn take_events(&mut self) -> Result<PmuEvents, DriverError> {
        // Nothing latched; skip the bus
        if self.irq.is_high().unwrap_or(false) {
            return Ok(PmuEvents::default());
        }
        let status2 = self.read_reg(reg::IRQ_STATUS2)?;
        let status3 = self.read_reg(reg::IRQ_STATUS3)?;
        self.clear_irq()?;
        Ok(PmuEvents {
            battery_inserted: status2 & IRQ_BATT_INSERT != 0,
            battery_removed: status2 & IRQ_BATT_REMOVE != 0,
            charge_done: status2 & IRQ_CHARGE_DONE != 0,
            key_short_press: status3 & IRQ_PEK_SHORT != 0,
            key_long_press: status3 & IRQ_PEK_LONG != 0,
        })
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        self.update(reg::SHUTDOWN, 0, 1 << 7)
    }
}
