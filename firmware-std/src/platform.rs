//! ESP-IDF bindings for the platform seams: restart, uptime, the task
//! watchdog, heap/stack counters and the button line.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use esp_idf_svc::hal::gpio::{Input, InputPin, PinDriver};
use esp_idf_svc::sys::{
    eTaskGetState, eTaskState_eBlocked, eTaskState_eDeleted, eTaskState_eReady,
    eTaskState_eRunning, eTaskState_eSuspended, esp, esp_get_free_heap_size,
    esp_get_minimum_free_heap_size, esp_sleep_get_wakeup_cause,
    esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT0, esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT1,
    esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO, esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER,
    esp_sleep_source_t_ESP_SLEEP_WAKEUP_TOUCHPAD, esp_sleep_source_t_ESP_SLEEP_WAKEUP_UART,
    esp_sleep_source_t_ESP_SLEEP_WAKEUP_ULP, esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED,
    esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_init, esp_task_wdt_reconfigure,
    esp_task_wdt_reset, esp_timer_get_time, uxTaskGetStackHighWaterMark,
    xTaskGetCurrentTaskHandle, EspError, TaskHandle_t, ESP_ERR_INVALID_STATE,
};

use hzgl_radio::button::InputLine;
use hzgl_radio::defaults::TASK_STACK_SIZE;
use hzgl_radio::error::RestartReason;
use hzgl_radio::platform::{Platform, Watchdog};
use hzgl_radio::supervisor::{HealthProbe, TaskId, TaskState, MAX_TASKS};

// ── Restart + uptime ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct EspPlatform;

impl Platform for EspPlatform {
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_timer_get_time() } / 1000) as u64
    }

    fn restart(&self, _reason: &RestartReason) {
        esp_idf_svc::hal::reset::restart();
    }
}

// ── Task watchdog ────────────────────────────────────────────────────

/// Arm the task watchdog with `timeout`, panicking (and so restarting) on
/// expiry. ESP-IDF may already have started it from sdkconfig.
pub fn init_watchdog(timeout: Duration) -> Result<(), EspError> {
    let config = esp_task_wdt_config_t {
        timeout_ms: timeout.as_millis() as u32,
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let err = unsafe { esp_task_wdt_init(&config) };
    if err == ESP_ERR_INVALID_STATE as i32 {
        return esp!(unsafe { esp_task_wdt_reconfigure(&config) });
    }
    esp!(err)
}

/// Watchdog subscription of the calling FreeRTOS task.
pub struct TaskWatchdog;

impl TaskWatchdog {
    pub fn subscribe() -> Self {
        if let Err(e) = esp!(unsafe { esp_task_wdt_add(core::ptr::null_mut()) }) {
            log::error!("failed to subscribe task to watchdog: {}", e);
        }
        Self
    }
}

impl Watchdog for TaskWatchdog {
    fn feed(&mut self) {
        unsafe {
            esp_task_wdt_reset();
        }
    }
}

// ── Heap / stack counters ────────────────────────────────────────────

/// FreeRTOS handles of the running tasks, indexed by `TaskId`.
static TASK_HANDLES: [AtomicUsize; MAX_TASKS] = [const { AtomicUsize::new(0) }; MAX_TASKS];

/// Record the calling thread's task handle under `task`.
pub fn register_current_task(task: TaskId) {
    let handle = unsafe { xTaskGetCurrentTaskHandle() };
    TASK_HANDLES[task as usize].store(handle as usize, Ordering::Release);
}

fn task_handle(task: TaskId) -> Option<TaskHandle_t> {
    match TASK_HANDLES[task as usize].load(Ordering::Acquire) {
        0 => None,
        raw => Some(raw as TaskHandle_t),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EspHealthProbe;

impl HealthProbe for EspHealthProbe {
    fn free_heap(&self) -> u32 {
        unsafe { esp_get_free_heap_size() }
    }

    fn min_free_heap(&self) -> u32 {
        unsafe { esp_get_minimum_free_heap_size() }
    }

    fn stack_margin(&self, task: TaskId) -> u32 {
        match task_handle(task) {
            // ESP-IDF reports the high-water mark in bytes
            Some(handle) => unsafe { uxTaskGetStackHighWaterMark(handle) },
            // Not started yet: nothing used
            None => TASK_STACK_SIZE as u32,
        }
    }

    fn task_state(&self, task: TaskId) -> TaskState {
        let Some(handle) = task_handle(task) else {
            return TaskState::Unknown;
        };
        #[allow(non_upper_case_globals)]
        match unsafe { eTaskGetState(handle) } {
            eTaskState_eRunning => TaskState::Running,
            eTaskState_eReady => TaskState::Ready,
            eTaskState_eBlocked => TaskState::Blocked,
            eTaskState_eSuspended => TaskState::Suspended,
            eTaskState_eDeleted => TaskState::Deleted,
            _ => TaskState::Unknown,
        }
    }
}

// ── Boot diagnostics ─────────────────────────────────────────────────

pub fn log_wakeup_cause() {
    #[allow(non_upper_case_globals)]
    match unsafe { esp_sleep_get_wakeup_cause() } {
        esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED => {
            log::info!("wake-up reason is undefined")
        }
        esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT0 => log::info!("wake-up from RTC_IO (EXT0)"),
        esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT1 => log::info!("wake-up from RTC_CNTL (EXT1)"),
        esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => log::info!("wake-up from timer"),
        esp_sleep_source_t_ESP_SLEEP_WAKEUP_TOUCHPAD => log::info!("wake-up from touch pad"),
        esp_sleep_source_t_ESP_SLEEP_WAKEUP_ULP => log::info!("wake-up from ULP"),
        esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO => log::info!("wake-up from GPIO"),
        esp_sleep_source_t_ESP_SLEEP_WAKEUP_UART => log::info!("wake-up from UART"),
        other => log::info!("wake-up reason is {}", other),
    }
}

// ── Button line ──────────────────────────────────────────────────────

pub struct ButtonLine<'d, P: InputPin>(pub PinDriver<'d, P, Input>);

impl<P: InputPin> InputLine for ButtonLine<'_, P> {
    fn is_high(&mut self) -> bool {
        self.0.is_high()
    }
}
