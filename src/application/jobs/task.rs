use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Generate,
    Dispatch,
    Reclaim,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Generate => "generate",
            TaskKind::Dispatch => "dispatch",
            TaskKind::Reclaim => "reclaim",
        }
    }
}

/// Identifiers a task re-resolves when it runs. Tasks never carry record
/// contents, so a retry always sees the current form and entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskTarget {
    Generate {
        form_id: u64,
        entry_id: u64,
        settings_id: String,
    },
    Dispatch {
        form_id: u64,
        entry_id: u64,
        notification_id: String,
    },
    Reclaim {
        form_id: u64,
        entry_id: u64,
    },
}

impl TaskTarget {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskTarget::Generate { .. } => TaskKind::Generate,
            TaskTarget::Dispatch { .. } => TaskKind::Dispatch,
            TaskTarget::Reclaim { .. } => TaskKind::Reclaim,
        }
    }

    pub fn entry_id(&self) -> u64 {
        match self {
            TaskTarget::Generate { entry_id, .. }
            | TaskTarget::Dispatch { entry_id, .. }
            | TaskTarget::Reclaim { entry_id, .. } => *entry_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Stable for equal targets, so duplicates are easy to spot in logs.
    pub id: String,
    pub target: TaskTarget,
    /// Failed attempts so far.
    #[serde(default)]
    pub attempts: u32,
}

impl TaskDescriptor {
    pub fn new(target: TaskTarget) -> Self {
        let id = match &target {
            TaskTarget::Generate {
                form_id,
                entry_id,
                settings_id,
            } => format!("generate:{form_id}:{entry_id}:{settings_id}"),
            TaskTarget::Dispatch {
                form_id,
                entry_id,
                notification_id,
            } => format!("dispatch:{form_id}:{entry_id}:{notification_id}"),
            TaskTarget::Reclaim { form_id, entry_id } => format!("reclaim:{form_id}:{entry_id}"),
        };
        Self {
            id,
            target,
            attempts: 0,
        }
    }

    pub fn generate(form_id: u64, entry_id: u64, settings_id: impl Into<String>) -> Self {
        Self::new(TaskTarget::Generate {
            form_id,
            entry_id,
            settings_id: settings_id.into(),
        })
    }

    pub fn dispatch(form_id: u64, entry_id: u64, notification_id: impl Into<String>) -> Self {
        Self::new(TaskTarget::Dispatch {
            form_id,
            entry_id,
            notification_id: notification_id.into(),
        })
    }

    pub fn reclaim(form_id: u64, entry_id: u64) -> Self {
        Self::new(TaskTarget::Reclaim { form_id, entry_id })
    }

    pub fn kind(&self) -> TaskKind {
        self.target.kind()
    }
}

/// Ordered tasks executed strictly front to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBatch {
    pub id: Uuid,
    pub label: String,
    #[serde(with = "time::serde::rfc3339")]
    pub enqueued_at: OffsetDateTime,
    pub tasks: VecDeque<TaskDescriptor>,
    /// Generate tasks dropped after exhausting their attempts.
    #[serde(default)]
    pub abandoned_generations: u32,
}

impl TaskBatch {
    pub fn new(label: impl Into<String>, tasks: impl IntoIterator<Item = TaskDescriptor>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            enqueued_at: OffsetDateTime::now_utc(),
            tasks: tasks.into_iter().collect(),
            abandoned_generations: 0,
        }
    }

    /// One generate task per settings id, in order, followed by a single
    /// dispatch task for the notification.
    pub fn for_notification<'a>(
        form_id: u64,
        entry_id: u64,
        notification_id: &str,
        settings_ids: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let tasks = settings_ids
            .into_iter()
            .map(|settings_id| TaskDescriptor::generate(form_id, entry_id, settings_id))
            .chain(std::iter::once(TaskDescriptor::dispatch(
                form_id,
                entry_id,
                notification_id,
            )));
        Self::new(
            format!("notification:{form_id}:{entry_id}:{notification_id}"),
            tasks,
        )
    }

    pub fn reclaim(form_id: u64, entry_id: u64) -> Self {
        Self::new(
            format!("reclaim:{form_id}:{entry_id}"),
            [TaskDescriptor::reclaim(form_id, entry_id)],
        )
    }

    pub fn front(&self) -> Option<&TaskDescriptor> {
        self.tasks.front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
