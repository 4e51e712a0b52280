//! hzgl-radio library: control core of a handheld sub-GHz scanner.
//!
//! Sweeps a fixed channel plan around a centre frequency, keeps a short RSSI
//! history per channel, renders it as a bar graph, transmits a carrier while
//! the push-to-talk button is held, and restarts the device when memory runs
//! low or after an hour of uptime.
//!
//! Everything here is platform-independent and testable on any host with
//! `cargo test`. Hardware sits behind traits (`RfDriver`, `DisplayDriver`,
//! `Pmu`, `InputLine`, `HealthProbe`, `Platform`, `Watchdog`); the ESP-IDF
//! binary in `firmware-std/` implements them and spawns one thread per task.

pub mod board;
pub mod button;
pub mod defaults;
pub mod display;
pub mod error;
pub mod platform;
pub mod power;
pub mod protocol;
pub mod radio;
pub mod supervisor;
pub mod sync;
pub mod tasks;
