use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::cache::TtlCache;
use crate::error::BizuError;
use crate::models::{Actor, Bizu, BizuId, BizuPatch, EditLog, FetchParams, NewBizu, UserId};
use crate::session::Session;

pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(300);

/// How a [`ArticleStore::fetch`] call ended. Failures are also kept in
/// [`ArticleStore::error`] for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Cache,
    Network,
    /// A newer fetch took over; nothing was published.
    Superseded,
    Failed,
}

#[derive(Debug)]
pub enum AuditStatus {
    /// The editor is the author.
    NotRequired,
    Recorded,
    /// The update stands; only the audit record is missing.
    Failed(BizuError),
}

#[derive(Debug)]
pub struct UpdateReceipt {
    pub bizu: Bizu,
    pub audit: AuditStatus,
}

#[derive(Debug, Default)]
struct ListState {
    bizus: Vec<Bizu>,
    error: Option<String>,
    loading: bool,
}

/// Authenticated and either admin or the author.
pub fn can_modify(actor: Option<&Actor>, bizu: &Bizu) -> bool {
    actor.is_some_and(|a| a.is_admin() || a.id == bizu.author_id)
}

/// Edit log entry holding only the fields the patch sets.
fn audit_record(
    bizu_id: BizuId,
    editor_id: UserId,
    patch: &BizuPatch,
) -> Result<EditLog, BizuError> {
    Ok(EditLog {
        bizu_id,
        editor_id,
        changes: serde_json::to_value(patch)?,
    })
}

async fn superseded(mut rx: watch::Receiver<u64>, generation: u64) {
    loop {
        if *rx.borrow_and_update() != generation {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Visible article list plus the mutations that keep it in step with the
/// backend.
#[derive(Clone)]
pub struct ArticleStore {
    backend: Arc<dyn Backend>,
    session: Session,
    cache: TtlCache,
    list_ttl: Duration,
    state: Arc<RwLock<ListState>>,
    generation: Arc<watch::Sender<u64>>,
}

impl ArticleStore {
    pub fn new(backend: Arc<dyn Backend>, session: Session, cache: TtlCache) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            backend,
            session,
            cache,
            list_ttl: DEFAULT_LIST_TTL,
            state: Arc::default(),
            generation: Arc::new(generation),
        }
    }

    pub fn with_list_ttl(mut self, ttl: Duration) -> Self {
        self.list_ttl = ttl;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn bizus(&self) -> Vec<Bizu> {
        self.state.read().await.bizus.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub fn can_edit(&self, bizu: &Bizu) -> bool {
        can_modify(self.session.current().as_ref(), bizu)
    }

    pub fn can_delete(&self, bizu: &Bizu) -> bool {
        can_modify(self.session.current().as_ref(), bizu)
    }

    fn next_generation(&self) -> u64 {
        let mut current = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            current = *g;
        });
        current
    }

    fn is_current(&self, generation: u64) -> bool {
        *self.generation.borrow() == generation
    }

    /// Loads the list for `params`, from the cache when fresh. A later call
    /// cancels this one and its result is never published.
    pub async fn fetch(&self, params: FetchParams) -> FetchOutcome {
        let params = params.normalized();
        let key = params.cache_key();
        let generation = self.next_generation();

        if let Some(cached) = self.cache.get::<Vec<Bizu>>(&key).await {
            debug!(key = %key, count = cached.len(), "list served from cache");
            return if self.publish(generation, cached).await {
                FetchOutcome::Cache
            } else {
                FetchOutcome::Superseded
            };
        }

        {
            let mut state = self.state.write().await;
            if self.is_current(generation) {
                state.loading = true;
            }
        }

        match self.load(generation, &params).await {
            Ok(bizus) => {
                self.cache.set(&key, &bizus, self.list_ttl).await;
                if self.publish(generation, bizus).await {
                    FetchOutcome::Network
                } else {
                    FetchOutcome::Superseded
                }
            }
            Err(BizuError::Cancelled) => {
                debug!(key = %key, "fetch superseded");
                FetchOutcome::Superseded
            }
            Err(e) => {
                warn!(error = %e, key = %key, "failed to fetch bizus");
                let mut state = self.state.write().await;
                if !self.is_current(generation) {
                    return FetchOutcome::Superseded;
                }
                state.error = Some(e.to_string());
                state.loading = false;
                FetchOutcome::Failed
            }
        }
    }

    async fn load(&self, generation: u64, params: &FetchParams) -> Result<Vec<Bizu>, BizuError> {
        let rx = self.generation.subscribe();
        let viewer = self.session.current().map(|a| a.id);
        let request = self
            .backend
            .list_bizus(params.query.as_deref(), params.limit, viewer);
        tokio::select! {
            result = request => result,
            _ = superseded(rx, generation) => Err(BizuError::Cancelled),
        }
    }

    async fn publish(&self, generation: u64, bizus: Vec<Bizu>) -> bool {
        let mut state = self.state.write().await;
        if !self.is_current(generation) {
            return false;
        }
        state.bizus = bizus;
        state.error = None;
        state.loading = false;
        true
    }

    /// Local copy when listed, otherwise a single backend read.
    pub async fn find(&self, id: BizuId) -> Result<Bizu, BizuError> {
        let local = self
            .state
            .read()
            .await
            .bizus
            .iter()
            .find(|b| b.id == id)
            .cloned();
        match local {
            Some(bizu) => Ok(bizu),
            None => {
                let viewer = self.session.current().map(|a| a.id);
                self.backend.get_bizu(id, viewer).await
            }
        }
    }

    pub async fn create(&self, draft: NewBizu) -> Result<Bizu, BizuError> {
        let actor = self.session.require_actor("create bizus")?;
        let missing = draft.missing_fields();
        if !missing.is_empty() {
            return Err(BizuError::ValidationFailed(format!(
                "required fields are empty: {}",
                missing.join(", ")
            )));
        }
        let payload = NewBizu {
            title: draft.title.trim().to_string(),
            category: draft.category.trim().to_string(),
            content: draft.content.trim().to_string(),
            author_id: Some(actor.id),
            ..draft
        };

        let created = self.backend.create_bizu(&payload).await?;
        info!(id = %created.id, author = %actor.id, "bizu created");
        self.state.write().await.bizus.insert(0, created.clone());
        self.cache.clear().await;
        Ok(created)
    }

    pub async fn update(&self, id: BizuId, patch: BizuPatch) -> Result<UpdateReceipt, BizuError> {
        let actor = self.session.require_actor("edit bizus")?;
        let original = self.find(id).await?;
        if !can_modify(Some(&actor), &original) {
            return Err(BizuError::Forbidden(
                "only the author or an admin can edit this bizu".into(),
            ));
        }
        let blanked: Vec<&str> = [
            ("title", &patch.title),
            ("category", &patch.category),
            ("content", &patch.content),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_some_and(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();
        if !blanked.is_empty() {
            return Err(BizuError::ValidationFailed(format!(
                "required fields cannot be emptied: {}",
                blanked.join(", ")
            )));
        }

        let updated = self.backend.update_bizu(id, &patch).await?;
        info!(id = %id, editor = %actor.id, "bizu updated");
        {
            let mut state = self.state.write().await;
            if let Some(slot) = state.bizus.iter_mut().find(|b| b.id == id) {
                *slot = updated.clone();
            }
        }
        self.cache.clear().await;

        let audit = if actor.id == original.author_id {
            AuditStatus::NotRequired
        } else {
            let recorded = match audit_record(id, actor.id, &patch) {
                Ok(log) => self.backend.log_edit(&log).await,
                Err(e) => Err(e),
            };
            match recorded {
                Ok(()) => AuditStatus::Recorded,
                Err(e) => {
                    warn!(error = %e, id = %id, editor = %actor.id, "failed to record edit log");
                    AuditStatus::Failed(e)
                }
            }
        };

        Ok(UpdateReceipt {
            bizu: updated,
            audit,
        })
    }

    pub async fn delete(&self, id: BizuId) -> Result<(), BizuError> {
        let actor = self.session.require_actor("delete bizus")?;
        let target = self.find(id).await?;
        if !can_modify(Some(&actor), &target) {
            return Err(BizuError::Forbidden(
                "only the author or an admin can delete this bizu".into(),
            ));
        }
        self.backend.delete_bizu(id).await?;
        info!(id = %id, actor = %actor.id, "bizu deleted");
        self.state.write().await.bizus.retain(|b| b.id != id);
        self.cache.clear().await;
        Ok(())
    }

    /// Brings the listed item in line with a like the backend confirmed and
    /// drops cached lists, whose flags and counts are now stale.
    pub async fn apply_like(&self, id: BizuId, liked: bool, count: u64) {
        {
            let mut state = self.state.write().await;
            if let Some(slot) = state.bizus.iter_mut().find(|b| b.id == id) {
                slot.is_liked = liked;
                slot.likes_count = count;
            }
        }
        self.cache.clear().await;
    }

    /// Best-effort view counter bump; failures are only logged.
    pub async fn record_view(&self, id: BizuId) -> Option<u64> {
        match self.backend.increment_views(id).await {
            Ok(views) => {
                let mut state = self.state.write().await;
                if let Some(slot) = state.bizus.iter_mut().find(|b| b.id == id) {
                    slot.views_count = views;
                }
                Some(views)
            }
            Err(e) => {
                warn!(error = %e, id = %id, "failed to record view");
                None
            }
        }
    }
}
