//! Observable identity provider.
//!
//! # Responsibility
//! - Publish the current signed-in user (or none) as an observable value.
//! - Let services read the identity at call time instead of caching it.
//!
//! # Invariants
//! - Readers always see the latest published identity.
//! - Sign-in/sign-out never blocks readers.

use crate::model::identity::UserIdentity;
use log::info;
use tokio::sync::watch;

/// Source of truth for the signed-in user.
///
/// Authentication itself lives outside the core; the host application
/// reports results through `sign_in`/`sign_out`.
#[derive(Debug)]
pub struct IdentityProvider {
    sender: watch::Sender<Option<UserIdentity>>,
}

impl IdentityProvider {
    /// Provider with nobody signed in.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Provider with `user` already signed in.
    pub fn signed_in(user: UserIdentity) -> Self {
        let (sender, _) = watch::channel(Some(user));
        Self { sender }
    }

    pub fn sign_in(&self, user: UserIdentity) {
        info!("event=identity_change module=identity status=signed_in user_id={}", user.id);
        self.sender.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        info!("event=identity_change module=identity status=signed_out");
        self.sender.send_replace(None);
    }

    /// Returns the current user, if any.
    pub fn current(&self) -> Option<UserIdentity> {
        self.sender.borrow().clone()
    }

    /// Returns a read handle that tracks every future change.
    pub fn watch(&self) -> IdentityWatch {
        IdentityWatch {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable read handle on the identity provider.
#[derive(Debug, Clone)]
pub struct IdentityWatch {
    receiver: watch::Receiver<Option<UserIdentity>>,
}

impl IdentityWatch {
    /// Returns the identity as of this call.
    pub fn current(&self) -> Option<UserIdentity> {
        self.receiver.borrow().clone()
    }

    /// Waits until the identity changes and returns the new value.
    ///
    /// Returns `None` when the provider was dropped.
    pub async fn changed(&mut self) -> Option<Option<UserIdentity>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
