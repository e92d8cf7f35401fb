// Cancelled only ever comes from the server.

use std::fmt;

use thiserror::Error;

use crate::api::models::{ErrandStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrandAction {
    /// Runner offers to take a pending errand.
    Request,
    /// Customer accepts the runner (and pays).
    Confirm,
    /// Customer turns the runner down.
    Reject,
    /// Runner marks the delivery done.
    Complete,
}

impl ErrandAction {
    pub const ALL: [ErrandAction; 4] = [
        ErrandAction::Request,
        ErrandAction::Confirm,
        ErrandAction::Reject,
        ErrandAction::Complete,
    ];

    pub fn actor(self) -> Role {
        match self {
            ErrandAction::Request | ErrandAction::Complete => Role::Runner,
            ErrandAction::Confirm | ErrandAction::Reject => Role::Customer,
        }
    }

    pub fn source(self) -> ErrandStatus {
        match self {
            ErrandAction::Request => ErrandStatus::Pending,
            ErrandAction::Confirm | ErrandAction::Reject => ErrandStatus::Accepted,
            ErrandAction::Complete => ErrandStatus::InProgress,
        }
    }

    pub fn target(self) -> ErrandStatus {
        match self {
            ErrandAction::Request => ErrandStatus::Accepted,
            ErrandAction::Confirm => ErrandStatus::InProgress,
            ErrandAction::Reject => ErrandStatus::Pending,
            ErrandAction::Complete => ErrandStatus::Completed,
        }
    }
}

impl fmt::Display for ErrandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrandAction::Request => "request",
            ErrandAction::Confirm => "confirm",
            ErrandAction::Reject => "reject",
            ErrandAction::Complete => "complete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("only a {} can {action} an errand", .required.label())]
    WrongRole { action: ErrandAction, required: Role },
    #[error("cannot {action} an errand that is {status}")]
    WrongStatus { action: ErrandAction, status: ErrandStatus },
}

/// Checks `action` by `role` against the errand's `current` status and
/// returns the status to request from the server.
pub fn check(action: ErrandAction, role: Role, current: ErrandStatus) -> Result<ErrandStatus, TransitionError> {
    if action.actor() != role {
        return Err(TransitionError::WrongRole { action, required: action.actor() });
    }
    if action.source() != current {
        return Err(TransitionError::WrongStatus { action, status: current });
    }
    Ok(action.target())
}

pub fn available_actions(role: Role, current: ErrandStatus) -> Vec<ErrandAction> {
    ErrandAction::ALL
        .into_iter()
        .filter(|a| check(*a, role, current).is_ok())
        .collect()
}

/// Steps shown on the tracking screen.
pub const TRACKING_STEPS: [ErrandStatus; 3] =
    [ErrandStatus::Pending, ErrandStatus::InProgress, ErrandStatus::Completed];

/// Position on the tracking bar; statuses off the bar sit on the first step.
pub fn tracking_step(status: ErrandStatus) -> usize {
    TRACKING_STEPS.iter().position(|s| *s == status).unwrap_or(0)
}
