use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::articles::ArticleStore;
use crate::backend::Backend;
use crate::error::BizuError;
use crate::models::{Bizu, BizuId};
use crate::session::Session;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LikePhase {
    #[default]
    Idle,
    /// Flag flipped locally, waiting on the backend.
    Pending,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub count: u64,
    pub phase: LikePhase,
}

fn retry_notice(e: BizuError) -> BizuError {
    match e {
        e @ (BizuError::Transient(_)
        | BizuError::Network(_)
        | BizuError::Decode(_)
        | BizuError::Storage(_)) => {
            BizuError::Transient(format!("could not update like, please try again ({e})"))
        }
        other => other,
    }
}

#[derive(Debug, Default)]
struct Entry {
    shown: LikeState,
    // last values the backend agreed to
    confirmed_liked: bool,
    confirmed_count: u64,
    ticket: u64,
}

/// Per-article liked flag and like count for the current session.
#[derive(Clone)]
pub struct LikeStore {
    backend: Arc<dyn Backend>,
    session: Session,
    entries: Arc<RwLock<HashMap<BizuId, Entry>>>,
    articles: Option<ArticleStore>,
}

impl LikeStore {
    pub fn new(backend: Arc<dyn Backend>, session: Session) -> Self {
        Self {
            backend,
            session,
            entries: Arc::default(),
            articles: None,
        }
    }

    /// Patches the list and drops its cache whenever a toggle is confirmed.
    pub fn with_articles(mut self, articles: ArticleStore) -> Self {
        self.articles = Some(articles);
        self
    }

    /// Sets server truth for one article. Ignored while a toggle is in flight.
    pub async fn seed(&self, id: BizuId, liked: bool, count: u64) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id).or_default();
        if entry.shown.phase == LikePhase::Pending {
            debug!(id = %id, "skipping seed for pending like");
            return;
        }
        entry.shown = LikeState {
            liked,
            count,
            phase: LikePhase::Idle,
        };
        entry.confirmed_liked = liked;
        entry.confirmed_count = count;
    }

    pub async fn seed_from(&self, bizus: &[Bizu]) {
        for bizu in bizus {
            self.seed(bizu.id, bizu.is_liked, bizu.likes_count).await;
        }
    }

    pub async fn is_liked(&self, id: BizuId) -> bool {
        self.state(id).await.liked
    }

    pub async fn count(&self, id: BizuId) -> u64 {
        self.state(id).await.count
    }

    pub async fn phase(&self, id: BizuId) -> LikePhase {
        self.state(id).await.phase
    }

    pub async fn state(&self, id: BizuId) -> LikeState {
        self.entries
            .read()
            .await
            .get(&id)
            .map(|e| e.shown)
            .unwrap_or_default()
    }

    /// Likes or unlikes depending on the current flag. The count shown
    /// afterwards is always the one the backend returned.
    ///
    /// While a newer toggle of the same article is in flight, an older
    /// response only moves the confirmed baseline. Once the newest toggle has
    /// settled, whichever success lands later is shown. Every failure is
    /// returned to its caller, but only the newest one rolls the display back.
    pub async fn toggle_like(&self, id: BizuId) -> Result<LikeState, BizuError> {
        let actor = self.session.require_actor("like bizus")?;

        let (was_liked, ticket) = {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(id).or_default();
            entry.ticket += 1;
            let was_liked = entry.shown.liked;
            entry.shown.liked = !was_liked;
            entry.shown.phase = LikePhase::Pending;
            (was_liked, entry.ticket)
        };

        let result = if was_liked {
            self.backend.unlike(id, actor.id).await
        } else {
            self.backend.like(id, actor.id).await
        };

        let mut entries = self.entries.write().await;
        let entry = entries.entry(id).or_default();
        let latest = entry.ticket == ticket;

        match result {
            Ok(count) => {
                entry.confirmed_liked = !was_liked;
                entry.confirmed_count = count;
                if latest || entry.shown.phase != LikePhase::Pending {
                    entry.shown = LikeState {
                        liked: !was_liked,
                        count,
                        phase: LikePhase::Confirmed,
                    };
                    info!(id = %id, liked = !was_liked, count, "like state confirmed");
                } else {
                    debug!(id = %id, ticket, "newer toggle in flight, keeping its display");
                }
                // under the entry lock so list patches land in confirmation order
                if let Some(articles) = &self.articles {
                    articles.apply_like(id, !was_liked, count).await;
                }
                Ok(entry.shown)
            }
            Err(e) => {
                if latest {
                    entry.shown = LikeState {
                        liked: entry.confirmed_liked,
                        count: entry.confirmed_count,
                        phase: LikePhase::RolledBack,
                    };
                    warn!(id = %id, error = %e, "like toggle failed, state rolled back");
                } else {
                    warn!(id = %id, ticket, error = %e, "older like toggle failed");
                }
                Err(retry_notice(e))
            }
        }
    }
}
