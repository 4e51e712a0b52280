/// Health supervisor.
///
/// Each cycle reads free heap and the stack high-water mark of every
/// registered task. Any margin below the threshold is a resource-exhaustion
/// fault: per-task diagnostics are logged and the device restarts. Separately,
/// the main loop restarts the device once uptime passes a fixed ceiling.
use std::time::Duration;

use heapless::Vec;
use serde::Serialize;

use crate::defaults::{FREE_MEMORY_THRESHOLD, ROUTINE_RESTART_MS, SUPERVISOR_INTERVAL_MS};
use crate::error::{FatalError, RestartReason};
use crate::platform::{self, Platform};
use crate::protocol::{self, DeviceMessage};

/// Upper bound on registered tasks.
pub const MAX_TASKS: usize = 5;

/// Long-running tasks the supervisor can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskId {
    Display,
    Radio,
    Button,
    Supervisor,
    Power,
}

impl TaskId {
    /// The control-core tasks, in spawn order.
    pub const CORE: [TaskId; 4] = [
        TaskId::Display,
        TaskId::Radio,
        TaskId::Button,
        TaskId::Supervisor,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            TaskId::Display => "display",
            TaskId::Radio => "radio",
            TaskId::Button => "button",
            TaskId::Supervisor => "supervisor",
            TaskId::Power => "power",
        }
    }
}

/// Scheduler state of a task, as the RTOS reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Ready,
    Blocked,
    Suspended,
    Deleted,
    Unknown,
}

/// Process-wide resource counters.
pub trait HealthProbe {
    fn free_heap(&self) -> u32;
    /// Low-water mark of free heap since boot.
    fn min_free_heap(&self) -> u32;
    /// Minimum free stack the task has ever had, in bytes.
    fn stack_margin(&self, task: TaskId) -> u32;
    fn task_state(&self, _task: TaskId) -> TaskState {
        TaskState::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskMargin {
    pub task: TaskId,
    pub stack_free: u32,
}

/// Counters from one health cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub free_heap: u32,
    pub min_free_heap: u32,
    pub tasks: Vec<TaskMargin, MAX_TASKS>,
}

impl HealthSnapshot {
    pub fn capture<P: HealthProbe + ?Sized>(probe: &P, tasks: &[TaskId]) -> Self {
        Self {
            free_heap: probe.free_heap(),
            min_free_heap: probe.min_free_heap(),
            tasks: tasks
                .iter()
                .take(MAX_TASKS)
                .map(|&task| TaskMargin {
                    task,
                    stack_free: probe.stack_margin(task),
                })
                .collect(),
        }
    }

    /// True when the heap or any task's stack is below `threshold` bytes.
    pub fn is_critical(&self, threshold: u32) -> bool {
        self.free_heap.min(self.min_free_heap) < threshold
            || self.tasks.iter().any(|t| t.stack_free < threshold)
    }

    pub fn lowest_stack(&self) -> Option<&TaskMargin> {
        self.tasks.iter().min_by_key(|t| t.stack_free)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    pub memory_threshold: u32,
    pub interval: Duration,
    pub routine_restart_ms: u64,
}

impl SupervisorConfig {
    pub const fn new() -> Self {
        Self {
            memory_threshold: FREE_MEMORY_THRESHOLD,
            interval: Duration::from_millis(SUPERVISOR_INTERVAL_MS),
            routine_restart_ms: ROUTINE_RESTART_MS,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What the supervisor knew about one task when it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDiagnostic {
    pub task: TaskId,
    pub state: TaskState,
    pub stack_free: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy(HealthSnapshot),
    Critical {
        snapshot: HealthSnapshot,
        diagnostics: Vec<TaskDiagnostic, MAX_TASKS>,
    },
}

pub struct Supervisor {
    config: SupervisorConfig,
    tasks: Vec<TaskId, MAX_TASKS>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, tasks: &[TaskId]) -> Self {
        Self {
            config,
            tasks: tasks.iter().copied().take(MAX_TASKS).collect(),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    /// Take a snapshot, log it, and judge it against the threshold.
    pub fn check<P: HealthProbe + ?Sized>(&self, probe: &P, uptime_ms: u64) -> HealthVerdict {
        let snapshot = HealthSnapshot::capture(probe, &self.tasks);
        log::info!(
            "heap usage: free {} KB, min free {} KB, lowest stack {} bytes",
            snapshot.free_heap / 1024,
            snapshot.min_free_heap / 1024,
            snapshot.lowest_stack().map_or(0, |t| t.stack_free),
        );
        protocol::emit(&DeviceMessage::Health {
            uptime: (uptime_ms / 1000) as u32,
            heap_free: snapshot.free_heap,
            heap_min_free: snapshot.min_free_heap,
            tasks: &snapshot.tasks,
        });

        if !snapshot.is_critical(self.config.memory_threshold) {
            return HealthVerdict::Healthy(snapshot);
        }
        let diagnostics: Vec<TaskDiagnostic, MAX_TASKS> = snapshot
            .tasks
            .iter()
            .map(|margin| TaskDiagnostic {
                task: margin.task,
                state: probe.task_state(margin.task),
                stack_free: margin.stack_free,
            })
            .collect();
        for d in &diagnostics {
            log::error!(
                "{} task state: {:?}, min free stack: {} bytes",
                d.task.name(),
                d.state,
                d.stack_free
            );
        }
        HealthVerdict::Critical {
            snapshot,
            diagnostics,
        }
    }

    /// One supervisor cycle: restart on a critical verdict.
    pub fn step<P, Pl>(&self, probe: &P, platform: &Pl) -> HealthVerdict
    where
        P: HealthProbe + ?Sized,
        Pl: Platform + ?Sized,
    {
        let verdict = self.check(probe, platform.uptime_ms());
        if let HealthVerdict::Critical { snapshot, .. } = &verdict {
            platform::escalate(
                platform,
                FatalError::ResourceExhausted(snapshot.clone()).into(),
            );
        }
        verdict
    }

    pub fn routine_restart_due(&self, uptime_ms: u64) -> bool {
        uptime_ms >= self.config.routine_restart_ms
    }

    /// Main-loop maintenance. Returns true if a routine restart was requested.
    pub fn maintain<Pl: Platform + ?Sized>(&self, platform: &Pl) -> bool {
        let uptime_ms = platform.uptime_ms();
        if !self.routine_restart_due(uptime_ms) {
            return false;
        }
        platform::escalate(platform, RestartReason::Scheduled { uptime_ms });
        true
    }
}
