use serde::{Deserialize, Serialize};
use std::fmt;

use crate::approval::GateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Transient message shown to the user after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            title: "Success".to_string(),
            description: description.into(),
            level: NotificationLevel::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level: NotificationLevel::Error,
        }
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level: NotificationLevel::Warning,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Result of a network-calling action handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The API accepted the mutation and cached reads were invalidated.
    Completed(Notification),
    /// The API (or the network) rejected the mutation; nothing was invalidated.
    Failed(Notification),
    /// Refused locally before any mutation was sent.
    NotPermitted(GateError),
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ActionOutcome::Completed(_))
    }

    pub fn notification(&self) -> Notification {
        match self {
            ActionOutcome::Completed(notification) | ActionOutcome::Failed(notification) => {
                notification.clone()
            }
            ActionOutcome::NotPermitted(reason) => {
                Notification::warning("Not Permitted", reason.to_string())
            }
        }
    }
}
