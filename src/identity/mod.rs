//! Who is using the application. The rest of the crate only sees the [IdentityProvider] trait; the
//! local implementation keeps accounts and the active session next to the user data.

pub mod local;
pub mod password;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

pub use local::LocalIdentityProvider;

/// A signed-in user. `uid` is stable for the lifetime of the account and scopes every collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("email already in use")]
    EmailInUse,
    #[error("password shorter than {min} characters")]
    WeakPassword { min: usize },
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing password")]
    MissingPassword,
    #[error("not signed in")]
    NotSignedIn,
    #[error("identity provider failure: {0}")]
    Provider(String),
}

impl AuthError {
    /// Provider code in the `auth/<reason>` form.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::EmailInUse => "auth/email-already-in-use",
            AuthError::WeakPassword { .. } => "auth/weak-password",
            AuthError::InvalidEmail => "auth/invalid-email",
            AuthError::InvalidCredentials => "auth/invalid-credential",
            AuthError::MissingPassword => "auth/missing-password",
            AuthError::NotSignedIn => "auth/no-current-user",
            AuthError::Provider(_) => "auth/internal-error",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AuthError::EmailInUse => "An account with this email already exists.".to_string(),
            AuthError::WeakPassword { min } => {
                format!("Password should be at least {min} characters.")
            }
            AuthError::InvalidEmail => "That doesn't look like a valid email address.".to_string(),
            AuthError::InvalidCredentials => "Incorrect email or password.".to_string(),
            AuthError::MissingPassword => "Please enter a password.".to_string(),
            AuthError::NotSignedIn => "You're not signed in. Run `clockbook login`.".to_string(),
            AuthError::Provider(_) => "Authentication failed. Please try again.".to_string(),
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(value: std::io::Error) -> Self {
        AuthError::Provider(value.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(value: serde_json::Error) -> Self {
        AuthError::Provider(value.to_string())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Creates an account and signs it in.
    async fn register(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn deauthenticate(&self) -> Result<(), AuthError>;

    fn current(&self) -> Option<Identity>;

    /// Receiver that observes every sign-in and sign-out.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;

    /// Picks up session changes made outside this provider, e.g. by another process.
    async fn refresh(&self) -> Result<Option<Identity>, AuthError>;
}
