use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::error::BizuError;
use crate::models::Actor;

/// Current actor, shared by every store and observable by views.
#[derive(Debug, Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Option<Actor>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    pub fn anonymous() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn signed_in(actor: Actor) -> Self {
        let session = Self::anonymous();
        session.sign_in(actor);
        session
    }

    pub fn current(&self) -> Option<Actor> {
        self.tx.borrow().clone()
    }

    pub fn require_actor(&self, action: &str) -> Result<Actor, BizuError> {
        self.current()
            .ok_or_else(|| BizuError::Unauthenticated(format!("log in to {action}")))
    }

    pub fn sign_in(&self, actor: Actor) {
        info!(user = %actor.id, role = ?actor.role, "session signed in");
        self.tx.send_replace(Some(actor));
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            info!("session signed out");
        }
    }

    /// Receiver notified on every sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<Actor>> {
        self.tx.subscribe()
    }
}
