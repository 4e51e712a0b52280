/// Build-time tunables for the scanner.
///
/// Channel plan, task cadence, lock budgets, and health thresholds. Nothing
/// here is loaded at runtime; the component config structs (`RadioConfig`,
/// `ButtonConfig`, `DisplayConfig`, `SupervisorConfig`) are built from these.

// ── Channel plan ─────────────────────────────────────────────────────

/// Number of channels in one sweep.
pub const CHANNEL_COUNT: usize = 25;

/// Spacing between adjacent channels (MHz).
pub const STEP_SIZE_MHZ: f32 = 0.20;

/// Lowest channel of the default plan (MHz).
pub const FIRST_CHANNEL_MHZ: f32 = 868.0;

/// Default centre: the middle channel of the default plan (870.4 MHz).
pub const CENTER_FREQUENCY_MHZ: f32 =
    FIRST_CHANNEL_MHZ + STEP_SIZE_MHZ * (CHANNEL_COUNT / 2) as f32;

/// RSSI samples retained per channel for the moving average.
pub const SAMPLE_DEPTH: usize = 4;

// ── Task cadence (milliseconds) ──────────────────────────────────────

pub const SCAN_TASK_INTERVAL_MS: u64 = 2;
pub const BUTTON_TASK_INTERVAL_MS: u64 = 50;
pub const DISPLAY_TASK_INTERVAL_MS: u64 = 1000 / 20;
pub const POWER_TASK_INTERVAL_MS: u64 = 1000;
pub const POWER_STATUS_INTERVAL_MS: u64 = POWER_TASK_INTERVAL_MS * 3;
pub const POWER_LOG_INTERVAL_MS: u64 = POWER_TASK_INTERVAL_MS * 60;

/// Release must hold for this long before transmission stops. Two polls,
/// so a single bounced sample while held is never taken as a release.
pub const BUTTON_DEBOUNCE_MS: u64 = 2 * BUTTON_TASK_INTERVAL_MS;

// ── Locks ────────────────────────────────────────────────────────────

pub const RADIO_LOCK_TIMEOUT_MS: u64 = 1000;
pub const POWER_LOCK_TIMEOUT_MS: u64 = 10;

// ── Supervisor ───────────────────────────────────────────────────────

pub const WATCHDOG_TIMEOUT_SECS: u64 = 60;
pub const SUPERVISOR_INTERVAL_MS: u64 = WATCHDOG_TIMEOUT_SECS / 3 * 1000;
pub const ROUTINE_RESTART_MS: u64 = 60 * 60 * 1000;

/// Heap and stack margins below this many bytes force a restart.
pub const FREE_MEMORY_THRESHOLD: u32 = 2048;

pub const TASK_STACK_SIZE: usize = 16 * 1024;

// ── Display ──────────────────────────────────────────────────────────

pub const BAR_WIDTH: i32 = 6;
pub const BAR_MAX_HEIGHT: i32 = 50;
pub const BAR_BASE_Y: i32 = 63;
pub const CENTER_MARKER_TOP: i32 = 14;
pub const CENTER_MARKER_HEIGHT: i32 = 50;

/// Display window margins around the global average (dB).
pub const WINDOW_MARGIN_BELOW: i32 = 20;
pub const WINDOW_MARGIN_ABOVE: i32 = 10;

/// Absolute clamp for the display window (dBm).
pub const WINDOW_FLOOR_DBM: i32 = -100;
pub const WINDOW_CEILING_DBM: i32 = -70;

/// Maximum characters on one text line of the 128 px OLED.
pub const MAX_LINE_LEN: usize = 32;
