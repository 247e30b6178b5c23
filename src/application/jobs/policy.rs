use std::{num::NonZeroU32, time::Duration};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What happens to the rest of a batch after a generate task is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonPolicy {
    /// Keep going; the notification goes out without the missing attachment.
    #[default]
    Continue,
    /// Drop the batch's dispatch task.
    SkipDispatch,
}

impl AbandonPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            AbandonPolicy::Continue => "continue",
            AbandonPolicy::SkipDispatch => "skip_dispatch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per task, first try included.
    pub max_attempts: NonZeroU32,
    /// Upper bound for a single attempt.
    pub task_timeout: Option<Duration>,
    pub on_abandon: AbandonPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroU32::new(DEFAULT_MAX_ATTEMPTS).unwrap_or(NonZeroU32::MIN),
            task_timeout: None,
            on_abandon: AbandonPolicy::Continue,
        }
    }
}

impl From<&crate::config::QueueSettings> for RetryPolicy {
    fn from(settings: &crate::config::QueueSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            task_timeout: settings.task_timeout_seconds.map(Duration::from_secs),
            on_abandon: settings.on_abandon,
        }
    }
}

impl RetryPolicy {
    /// Whether a task that has failed `attempts` times may run again.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts.get()
    }

    pub fn with_max_attempts(mut self, max_attempts: NonZeroU32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn with_abandon_policy(mut self, on_abandon: AbandonPolicy) -> Self {
        self.on_abandon = on_abandon;
        self
    }
}
