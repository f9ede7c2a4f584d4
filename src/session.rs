use std::{sync::Arc, time::Duration};

use chrono::TimeZone;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    identity::{AuthError, IdentityProvider},
    store::{subscription::Subscription, DocumentStore},
    tracking::Tracker,
    utils::clock::Clock,
};

/// Everything that exists only while a user is signed in: the tracker bound to their id and the
/// live subscriptions feeding the views. Opened on sign-in, torn down on sign-out.
pub struct Session<Tz: TimeZone> {
    tracker: Arc<Tracker<Tz>>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    subscriptions: Vec<Subscription>,
}

impl<Tz> Session<Tz>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync,
{
    /// Fails with [AuthError::NotSignedIn] when nobody is signed in.
    pub async fn open(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        zone: Tz,
        poll_interval: Duration,
    ) -> Result<Self> {
        let Some(current) = identity.current() else {
            return Err(AuthError::NotSignedIn.into());
        };
        let tracker = Tracker::new(store, current, clock.clone(), zone);
        tracker.ensure_profile().await?;
        debug!("Session opened for {}", tracker.identity().uid);

        Ok(Self {
            tracker: Arc::new(tracker),
            identity,
            clock,
            poll_interval,
            subscriptions: Vec::new(),
        })
    }

    pub fn tracker(&self) -> &Arc<Tracker<Tz>> {
        &self.tracker
    }

    /// Keeps `subscription` alive until the session closes.
    pub fn hold(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Resolves once the signed-in user is no longer the one this session belongs to. Sign-outs in
    /// other processes are picked up by re-reading the identity every poll interval.
    pub async fn ended(&self) {
        let uid = self.tracker.identity().uid.clone();
        let mut changes = self.identity.watch();
        loop {
            if changes.borrow_and_update().as_ref().map(|v| &v.uid) != Some(&uid) {
                info!("Identity changed, ending session");
                return;
            }
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = self.clock.sleep(self.poll_interval) => {
                    if let Err(e) = self.identity.refresh().await {
                        warn!("Failed to refresh identity {e}");
                    }
                }
            }
        }
    }

    /// Cancels every held subscription and waits until none of their handlers can run again.
    pub async fn close(self) {
        for subscription in self.subscriptions {
            subscription.cancel().await;
        }
    }

    pub async fn sign_out(self) -> Result<()> {
        let identity = self.identity.clone();
        self.close().await;
        identity.deauthenticate().await?;
        Ok(())
    }
}
