//! hzgl-radio ESP-IDF std firmware.
//!
//! One FreeRTOS thread per periodic task, each with its own stack and
//! watchdog subscription. All control logic lives in the `hzgl_radio`
//! library; this binary only wires it to the T-Beam's SX1276, SSD1306,
//! AXP192 and the ESP-IDF system services.

mod axp192;
mod oled;
mod platform;
mod sx1276;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use embedded_hal_bus::i2c::MutexDevice;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::spi::config::Config as SpiConfig;
use esp_idf_svc::hal::spi::config::DriverConfig as SpiDriverConfig;
use esp_idf_svc::hal::spi::{SpiDeviceDriver, SpiDriver};
use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;
use esp_idf_svc::hal::units::Hertz;

use hzgl_radio::button::{ButtonConfig, ButtonMonitor};
use hzgl_radio::defaults::{
    BUTTON_TASK_INTERVAL_MS, DISPLAY_TASK_INTERVAL_MS, SCAN_TASK_INTERVAL_MS, TASK_STACK_SIZE,
    WATCHDOG_TIMEOUT_SECS,
};
use hzgl_radio::display::DisplayConfig;
use hzgl_radio::platform::Watchdog;
use hzgl_radio::power::{PowerConfig, PowerMonitor};
use hzgl_radio::protocol::{self, DeviceMessage, VERSION};
use hzgl_radio::radio::{Coordinator, RadioConfig};
use hzgl_radio::supervisor::{Supervisor, SupervisorConfig, TaskId};
use hzgl_radio::{board, tasks};

use axp192::Axp192;
use oled::Oled;
use platform::{ButtonLine, EspHealthProbe, EspPlatform, TaskWatchdog};
use sx1276::Sx1276;

const RADIO_SPI_FREQ_HZ: u32 = 8_000_000;

/// Monitored tasks; the power task is watched for stack like the rest.
const MONITORED: [TaskId; 5] = [
    TaskId::Display,
    TaskId::Radio,
    TaskId::Button,
    TaskId::Supervisor,
    TaskId::Power,
];

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    // The main task is watched too: it owns the routine restart
    platform::init_watchdog(Duration::from_secs(WATCHDOG_TIMEOUT_SECS))?;
    let mut main_watchdog = TaskWatchdog::subscribe();

    log::info!("hzgl-radio v{} starting on {} (std)", VERSION, board::BOARD_NAME);
    protocol::emit(&DeviceMessage::Boot {
        board: board::BOARD_NAME,
        version: VERSION,
    });
    platform::log_wakeup_cause();

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // ── Power (the PMU feeds the OLED and radio rails) ───────────────

    log::info!("initialising power and peripherals");
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        pins.gpio21,
        pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(board::I2C_FREQ_HZ)),
    )?;
    let i2c: &'static Mutex<I2cDriver<'static>> = Box::leak(Box::new(Mutex::new(i2c)));

    let mut pmu = Axp192::new(
        MutexDevice::new(i2c),
        board::PMU_I2C_ADDR,
        PinDriver::input(pins.gpio35)?,
    );
    match pmu.configure() {
        Ok(()) => log::info!("power and peripherals initialised successfully"),
        Err(e) => log::error!("failed to initialise AXP power management chip: {}", e),
    }
    let power = Arc::new(PowerMonitor::new(pmu, PowerConfig::new()));

    // ── Display ──────────────────────────────────────────────────────

    let screen = match Oled::new(MutexDevice::new(i2c), board::OLED_I2C_ADDR) {
        Ok(screen) => Some(screen),
        Err(e) => {
            log::error!("failed to initialise display: {}", e);
            None
        }
    };

    // ── Button ───────────────────────────────────────────────────────

    log::info!("initialising button");
    let mut button_line = ButtonLine(PinDriver::input(pins.gpio38)?);
    log::info!("button initialised successfully");

    // ── Radio ────────────────────────────────────────────────────────

    let spi = SpiDriver::new(
        peripherals.spi2,
        pins.gpio5,
        pins.gpio27,
        Some(pins.gpio19),
        &SpiDriverConfig::new(),
    )?;
    let spi = SpiDeviceDriver::new(
        spi,
        Some(pins.gpio18),
        &SpiConfig::new()
            .baudrate(Hertz(RADIO_SPI_FREQ_HZ))
            .data_mode(embedded_hal::spi::MODE_0),
    )?;
    let reset = PinDriver::output(pins.gpio23)?;
    let radio: Arc<Coordinator<_>> =
        Arc::new(Coordinator::new(Sx1276::new(spi, reset), RadioConfig::new()));
    radio.init()?;

    // ── Tasks (a higher number runs at higher priority) ──────────────

    log::info!("initialising supervisor");
    let supervisor = Arc::new(Supervisor::new(SupervisorConfig::new(), &MONITORED));

    if let Some(mut screen) = screen {
        let radio = radio.clone();
        let power = power.clone();
        spawn(TaskId::Display, 1, move || {
            let mut watchdog = TaskWatchdog::subscribe();
            let config = DisplayConfig::new();
            tasks::run_periodic(
                Duration::from_millis(DISPLAY_TASK_INTERVAL_MS),
                &mut watchdog,
                &EspPlatform,
                || tasks::display_step(&*radio, &mut screen, &config, Some(&*power)),
            );
        })?;
    }

    {
        let power = power.clone();
        let interval = PowerConfig::new().task_interval;
        spawn(TaskId::Power, 1, move || {
            let mut watchdog = TaskWatchdog::subscribe();
            let mut round = 0u64;
            tasks::run_periodic(interval, &mut watchdog, &EspPlatform, || {
                let result = power.step(round);
                round += 1;
                result
            });
        })?;
    }

    {
        let radio = radio.clone();
        spawn(TaskId::Radio, 2, move || {
            let mut watchdog = TaskWatchdog::subscribe();
            tasks::run_periodic(
                Duration::from_millis(SCAN_TASK_INTERVAL_MS),
                &mut watchdog,
                &EspPlatform,
                || radio.scan_once(),
            );
        })?;
    }

    {
        let radio = radio.clone();
        spawn(TaskId::Button, 3, move || {
            let mut watchdog = TaskWatchdog::subscribe();
            let mut monitor = ButtonMonitor::new(ButtonConfig::new());
            tasks::run_periodic(
                Duration::from_millis(BUTTON_TASK_INTERVAL_MS),
                &mut watchdog,
                &EspPlatform,
                || tasks::button_step(&mut monitor, &mut button_line, &*radio, &EspPlatform),
            );
        })?;
    }

    {
        let supervisor = supervisor.clone();
        spawn(TaskId::Supervisor, 4, move || {
            let mut watchdog = TaskWatchdog::subscribe();
            let interval = supervisor.config().interval;
            tasks::run_periodic(interval, &mut watchdog, &EspPlatform, || {
                supervisor.step(&EspHealthProbe, &EspPlatform);
                Ok(())
            });
        })?;
    }

    log::info!("supervisor initialised successfully");

    // ── Main loop: watchdog + routine restart ────────────────────────

    loop {
        main_watchdog.feed();
        supervisor.maintain(&EspPlatform);
        thread::sleep(supervisor.config().interval);
    }
}

/// Spawn `body` on a FreeRTOS thread named after `task`, at `priority`,
/// with the standard task stack.
fn spawn<F>(task: TaskId, priority: u8, body: F) -> anyhow::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    ThreadSpawnConfiguration {
        name: Some(thread_name(task)),
        stack_size: TASK_STACK_SIZE,
        priority,
        ..Default::default()
    }
    .set()?;

    thread::Builder::new()
        .name(task.name().into())
        .stack_size(TASK_STACK_SIZE)
        .spawn(move || {
            platform::register_current_task(task);
            body();
        })?;

    ThreadSpawnConfiguration::default().set()?;
    log::info!("{} task spawned", task.name());
    Ok(())
}

/// NUL-terminated FreeRTOS task names.
fn thread_name(task: TaskId) -> &'static [u8] {
    match task {
        TaskId::Display => b"display\0",
        TaskId::Radio => b"radio\0",
        TaskId::Button => b"button\0",
        TaskId::Supervisor => b"supervisor\0",
        TaskId::Power => b"power\0",
    }
}
