//! SX1276 transceiver in FSK/OOK mode over SPI.
//!
//! Only what the scanner needs: tune, continuous (direct) OOK transmit,
//! standby, RX and the instantaneous RSSI register.

use std::thread;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiDevice};

use hzgl_radio::defaults::FIRST_CHANNEL_MHZ;
use hzgl_radio::error::DriverError;
use hzgl_radio::radio::RfDriver;

mod reg {
    pub const OP_MODE: u8 = 0x01;
    pub const BITRATE_MSB: u8 = 0x02;
    pub const BITRATE_LSB: u8 = 0x03;
    pub const FDEV_MSB: u8 = 0x04;
    pub const FDEV_LSB: u8 = 0x05;
    pub const FRF_MSB: u8 = 0x06;
    pub const FRF_MID: u8 = 0x07;
    pub const FRF_LSB: u8 = 0x08;
    pub const PA_CONFIG: u8 = 0x09;
    pub const PA_RAMP: u8 = 0x0A;
    pub const OCP: u8 = 0x0B;
    pub const RX_CONFIG: u8 = 0x0D;
    pub const RSSI_VALUE: u8 = 0x11;
    pub const RX_BW: u8 = 0x12;
    pub const AFC_BW: u8 = 0x13;
    pub const PREAMBLE_MSB: u8 = 0x25;
    pub const PREAMBLE_LSB: u8 = 0x26;
    pub const PACKET_CONFIG_2: u8 = 0x31;
    pub const VERSION: u8 = 0x42;
    pub const PA_DAC: u8 = 0x4D;
}

/// RegOpMode: FSK/OOK family, OOK modulation.
const OOK: u8 = 0b0010_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Mode {
    Sleep = 0,
    Standby = 1,
    FsTx = 2,
    Tx = 3,
    FsRx = 4,
    Rx = 5,
}

const CHIP_VERSION: u8 = 0x12;

/// Synthesiser limits of the SX1276 (MHz).
const FREQ_MIN_MHZ: f32 = 137.0;
const FREQ_MAX_MHZ: f32 = 1020.0;

/// Returned by `read_rssi` when the register cannot be read.
const RSSI_UNREADABLE: i16 = -128;

pub struct Sx1276<SPI, RST> {
    spi: SPI,
    reset: RST,
    mode: Mode,
}

impl<SPI, RST> Sx1276<SPI, RST>
where
    SPI: SpiDevice,
    RST: OutputPin,
{
    pub fn new(spi: SPI, reset: RST) -> Self {
        Self {
            spi,
            reset,
            mode: Mode::Sleep,
        }
    }

    fn read(&mut self, addr: u8) -> Result<u8, DriverError> {
        let mut buf = [addr & 0x7F, 0];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|_| DriverError::Bus)?;
        Ok(buf[1])
    }

    fn write(&mut self, addr: u8, value: u8) -> Result<(), DriverError> {
        self.spi
            .transaction(&mut [Operation::Write(&[addr | 0x80, value])])
            .map_err(|_| DriverError::Bus)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<(), DriverError> {
        self.write(reg::OP_MODE, OOK | mode as u8)?;
        self.mode = mode;
        Ok(())
    }

    fn hard_reset(&mut self) -> Result<(), DriverError> {
        self.reset.set_low().map_err(|_| DriverError::Bus)?;
        thread::sleep(Duration::from_millis(1));
        self.reset.set_high().map_err(|_| DriverError::Bus)?;
        thread::sleep(Duration::from_millis(10));
        Ok(())
    }

    fn write_frequency(&mut self, frequency_mhz: f32) -> Result<(), DriverError> {
        if !(FREQ_MIN_MHZ..=FREQ_MAX_MHZ).contains(&frequency_mhz) {
            return Err(DriverError::InvalidFrequency);
        }
        // Fstep = 32 MHz / 2^19, so FRF = f[MHz] * 2^14
        let frf = (frequency_mhz * 16384.0) as u32;
        self.write(reg::FRF_MSB, (frf >> 16) as u8)?;
        self.write(reg::FRF_MID, (frf >> 8) as u8)?;
        self.write(reg::FRF_LSB, frf as u8)
    }
}

impl<SPI, RST> RfDriver for Sx1276<SPI, RST>
where
    SPI: SpiDevice,
    RST: OutputPin,
{
    fn init(&mut self) -> Result<(), DriverError> {
        self.hard_reset()?;
        let version = self.read(reg::VERSION)?;
        if version != CHIP_VERSION {
            return Err(DriverError::ChipVersion(version));
        }

        // Modulation can only change in sleep
        self.write(reg::OP_MODE, Mode::Sleep as u8)?;
        self.set_mode(Mode::Sleep)?;
        self.set_mode(Mode::Standby)?;

        // 0.5 kbps, 0.6 kHz deviation
        self.write(reg::BITRATE_MSB, 0xFA)?;
        self.write(reg::BITRATE_LSB, 0x00)?;
        self.write(reg::FDEV_MSB, 0x00)?;
        self.write(reg::FDEV_LSB, 0x0A)?;

        // 2.6 kHz receiver and AFC bandwidth, AFC + AGC on
        self.write(reg::RX_BW, 0x17)?;
        self.write(reg::AFC_BW, 0x17)?;
        self.write(reg::RX_CONFIG, 0x1E)?;

        // 16-byte preamble, continuous mode for direct transmit
        self.write(reg::PREAMBLE_MSB, 0x00)?;
        self.write(reg::PREAMBLE_LSB, 0x10)?;
        self.write(reg::PACKET_CONFIG_2, 0x00)?;

        // PA_BOOST at +20 dBm, 140 mA OCP, OOK filtering at bitrate
        self.write(reg::PA_CONFIG, 0xFF)?;
        self.write(reg::PA_DAC, 0x87)?;
        self.write(reg::OCP, 0x31)?;
        self.write(reg::PA_RAMP, 0x29)?;

        self.write_frequency(FIRST_CHANNEL_MHZ)
    }

    fn tune(&mut self, frequency_mhz: f32) -> Result<(), DriverError> {
        let resume_tx = self.mode == Mode::Tx;
        if self.mode != Mode::Standby {
            self.set_mode(Mode::Standby)?;
        }
        self.write_frequency(frequency_mhz)?;
        if resume_tx {
            self.start_continuous_transmit()?;
        }
        Ok(())
    }

    fn start_continuous_transmit(&mut self) -> Result<(), DriverError> {
        self.set_mode(Mode::FsTx)?;
        self.set_mode(Mode::Tx)
    }

    fn standby(&mut self) -> Result<(), DriverError> {
        self.set_mode(Mode::Standby)
    }

    fn start_receive(&mut self) -> Result<(), DriverError> {
        self.set_mode(Mode::FsRx)?;
        self.set_mode(Mode::Rx)
    }

    fn read_rssi(&mut self) -> i16 {
        match self.read(reg::RSSI_VALUE) {
            Ok(raw) => -(i16::from(raw) / 2),
            Err(_) => RSSI_UNREADABLE,
        }
    }
}
