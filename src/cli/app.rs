use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;

use crate::{
    config::Config,
    error,
    identity::LocalIdentityProvider,
    session::Session,
    store::file_store::FileStore,
    utils::clock::{Clock, DefaultClock},
};

/// Collaborators shared by every command for the lifetime of the process.
pub struct App {
    pub config: Config,
    pub identity: Arc<LocalIdentityProvider>,
    pub store: Arc<FileStore>,
    pub clock: Arc<dyn Clock>,
}

impl App {
    pub async fn open(config: Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
        let identity = LocalIdentityProvider::open(config.identity_dir(), config.min_password_length)
            .await
            .context("Failed to open the identity directory")?;
        let store = FileStore::new(config.users_dir(), clock.clone(), config.poll_interval)
            .context("Failed to open the data directory")?;

        Ok(Self {
            config,
            identity: Arc::new(identity),
            store: Arc::new(store),
            clock,
        })
    }

    /// Session for whoever is signed in, in the machine's local zone.
    pub async fn session(&self) -> error::Result<Session<Local>> {
        Session::open(
            self.identity.clone(),
            self.store.clone(),
            self.clock.clone(),
            Local,
            self.config.poll_interval,
        )
        .await
    }
}
