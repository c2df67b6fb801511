use async_trait::async_trait;

use crate::error::BizuError;
use crate::models::{Bizu, BizuId, BizuPatch, EditLog, NewBizu, Profile, UserId};

/// Remote source of truth for bizus, likes and profiles.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Newest first. `viewer` scopes the `is_liked` flag.
    async fn list_bizus(
        &self,
        query: Option<&str>,
        limit: Option<usize>,
        viewer: Option<UserId>,
    ) -> Result<Vec<Bizu>, BizuError>;

    async fn get_bizu(&self, id: BizuId, viewer: Option<UserId>) -> Result<Bizu, BizuError>;

    async fn create_bizu(&self, bizu: &NewBizu) -> Result<Bizu, BizuError>;

    async fn update_bizu(&self, id: BizuId, patch: &BizuPatch) -> Result<Bizu, BizuError>;

    async fn delete_bizu(&self, id: BizuId) -> Result<(), BizuError>;

    /// Returns the authoritative like count after the call.
    async fn like(&self, id: BizuId, user: UserId) -> Result<u64, BizuError>;

    /// Returns the authoritative like count after the call.
    async fn unlike(&self, id: BizuId, user: UserId) -> Result<u64, BizuError>;

    async fn log_edit(&self, log: &EditLog) -> Result<(), BizuError>;

    /// Returns the view count after the increment.
    async fn increment_views(&self, id: BizuId) -> Result<u64, BizuError>;

    /// Profile of the session owner.
    async fn current_profile(&self) -> Result<Profile, BizuError>;
}
