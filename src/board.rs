/// Hardware abstraction for supported boards.
///
/// Each board module defines pin assignments and capabilities
/// selected at compile time via feature flags.

#[cfg(feature = "board-tbeam")]
mod hw {
    // SX1276 transceiver on the VSPI bus
    pub const RADIO_NSS_PIN: u8 = 18;
    pub const RADIO_RESET_PIN: u8 = 23;
    pub const RADIO_DIO0_PIN: u8 = 26;
    pub const RADIO_DIO1_PIN: u8 = 33;
    pub const RADIO_SCK_PIN: u8 = 5;
    pub const RADIO_MISO_PIN: u8 = 19;
    pub const RADIO_MOSI_PIN: u8 = 27;

    // Shared I2C bus: SSD1306 OLED + AXP192 PMU
    pub const I2C_SDA_PIN: u8 = 21;
    pub const I2C_SCL_PIN: u8 = 22;
    pub const I2C_FREQ_HZ: u32 = 400_000;
    pub const OLED_I2C_ADDR: u8 = 0x3C;
    pub const PMU_I2C_ADDR: u8 = 0x34;
    pub const PMU_IRQ_PIN: u8 = 35;

    /// User button. GPIO38 is input-only with an external pull-up, so the
    /// line reads low while the button is held.
    pub const BUTTON_PIN: u8 = 38;
    pub const BUTTON_ACTIVE_LOW: bool = true;

    pub const BOARD_NAME: &str = "ttgo_tbeam";
}

#[cfg(not(feature = "board-tbeam"))]
mod hw {
    pub const BUTTON_ACTIVE_LOW: bool = true;
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;
