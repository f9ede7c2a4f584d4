//! Error taxonomy shared by the tracker, the session and the views. Every variant knows how to
//! describe itself to the person at the keyboard through [AppError::user_message]; the `Display`
//! output is what ends up in logs.

use thiserror::Error;

use crate::{identity::AuthError, store::StoreError, tracking::clock_state::TransitionError};

/// Input that is rejected before anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} can't be empty")]
    Empty { field: &'static str },
    #[error("clock-out {clock_out} precedes clock-in {clock_in}")]
    ClockOutBeforeClockIn { clock_in: String, clock_out: String },
    #[error("nothing to change")]
    NoChanges,
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::Empty { field } => format!("{field} can't be empty."),
            ValidationError::ClockOutBeforeClockIn { .. } => {
                "Clock-out time can't be earlier than clock-in time.".to_string()
            }
            ValidationError::NoChanges => "Nothing to change.".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("transition rejected: {0}")]
    Rejected(#[from] TransitionError),

    #[error("{kind} {reference} not found")]
    NotFound {
        kind: &'static str,
        reference: String,
    },

    #[error("{kind} reference {reference} is ambiguous")]
    Ambiguous {
        kind: &'static str,
        reference: String,
    },

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("live updates failed: {0}")]
    Subscription(#[source] StoreError),
}

impl AppError {
    pub fn not_found(kind: &'static str, reference: impl Into<String>) -> Self {
        AppError::NotFound {
            kind,
            reference: reference.into(),
        }
    }

    /// Message shown through the notification prompt. Store failures are deliberately generic and
    /// suggest retrying; nothing is retried automatically.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.user_message(),
            AppError::Auth(e) => e.user_message(),
            AppError::Rejected(e) => e.user_message(),
            AppError::NotFound { kind, reference } => {
                format!("Couldn't find {kind} \"{reference}\".")
            }
            AppError::Ambiguous { kind, reference } => {
                format!("\"{reference}\" matches more than one {kind}. Use the full id.")
            }
            AppError::Store(_) => {
                "Something went wrong while talking to the store. Please try again.".to_string()
            }
            AppError::Subscription(_) => {
                "Live updates stopped working. Restart the view to refresh.".to_string()
            }
        }
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use std::io;

    use crate::{identity::AuthError, store::StoreError};

    use super::{AppError, ValidationError};

    #[test]
    fn store_failures_hide_details_from_users() {
        let error = AppError::from(StoreError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "/secret/path",
        )));
        assert!(!error.user_message().contains("/secret/path"));
        assert!(error.user_message().contains("try again"));
    }

    #[test]
    fn validation_and_auth_messages_pass_through() {
        let error = AppError::from(ValidationError::Empty {
            field: "Project name",
        });
        assert_eq!(error.user_message(), "Project name can't be empty.");

        let error = AppError::from(AuthError::EmailInUse);
        assert_eq!(error.user_message(), AuthError::EmailInUse.user_message());
    }
}
