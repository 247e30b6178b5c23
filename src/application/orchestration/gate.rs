use tracing::debug;

use crate::domain::{
    entities::{EntryRecord, NotificationTarget},
    types::NotificationEvent,
};

use super::TriggerEvent;

/// Why a notification was or was not taken over for asynchronous handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Eligible,
    OtherEvent,
    MissingId,
    Inactive,
    HiddenByLogic,
    LogicError,
    HostDispatchesAsync,
}

impl GateDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            GateDecision::Eligible => "eligible",
            GateDecision::OtherEvent => "other_event",
            GateDecision::MissingId => "missing_id",
            GateDecision::Inactive => "inactive",
            GateDecision::HiddenByLogic => "hidden_by_logic",
            GateDecision::LogicError => "logic_error",
            GateDecision::HostDispatchesAsync => "host_dispatches_async",
        }
    }
}

/// Decides which notifications the queue takes over from the host.
#[derive(Debug, Clone, Copy)]
pub struct DispatchGate {
    intercepted: NotificationEvent,
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new(NotificationEvent::FormSubmission)
    }
}

impl DispatchGate {
    pub fn new(intercepted: NotificationEvent) -> Self {
        Self { intercepted }
    }

    pub fn should_handle_async(
        &self,
        event: &TriggerEvent,
        notification: &NotificationTarget,
        entry: &EntryRecord,
    ) -> bool {
        let decision = self.evaluate(event, notification, entry);
        debug!(
            target = "application::orchestration::gate",
            form_id = event.form_id,
            entry_id = entry.id,
            notification_id = %notification.id,
            decision = decision.as_str(),
            "Gate evaluated"
        );
        decision == GateDecision::Eligible
    }

    /// Checks in order; the first failing condition is reported.
    pub fn evaluate(
        &self,
        event: &TriggerEvent,
        notification: &NotificationTarget,
        entry: &EntryRecord,
    ) -> GateDecision {
        if notification.event != self.intercepted {
            return GateDecision::OtherEvent;
        }
        if notification.id.trim().is_empty() {
            return GateDecision::MissingId;
        }
        if !notification.is_active {
            return GateDecision::Inactive;
        }
        if let Some(logic) = &notification.conditional_logic {
            match logic.evaluate(entry) {
                Ok(true) => {}
                Ok(false) => return GateDecision::HiddenByLogic,
                Err(_) => return GateDecision::LogicError,
            }
        }
        if event.host_async_dispatch {
            return GateDecision::HostDispatchesAsync;
        }
        GateDecision::Eligible
    }
}
