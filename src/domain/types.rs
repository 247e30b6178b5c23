//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Host event a notification is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    #[default]
    FormSubmission,
    CompletePayment,
    RefundPayment,
    FailPayment,
    #[serde(other)]
    Other,
}

impl NotificationEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationEvent::FormSubmission => "form_submission",
            NotificationEvent::CompletePayment => "complete_payment",
            NotificationEvent::RefundPayment => "refund_payment",
            NotificationEvent::FailPayment => "fail_payment",
            NotificationEvent::Other => "other",
        }
    }
}

/// Whether matching conditional-logic rules show or hide the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicAction {
    #[default]
    Show,
    Hide,
}

/// How individual rule results combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicType {
    #[default]
    All,
    Any,
}

/// Lifecycle of a queued task as reported in logs and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Abandoned,
    Skipped,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Abandoned => "abandoned",
            TaskState::Skipped => "skipped",
        }
    }
}

impl TryFrom<&str> for NotificationEvent {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "form_submission" => Ok(NotificationEvent::FormSubmission),
            "complete_payment" => Ok(NotificationEvent::CompletePayment),
            "refund_payment" => Ok(NotificationEvent::RefundPayment),
            "fail_payment" => Ok(NotificationEvent::FailPayment),
            _ => Err(()),
        }
    }
}
