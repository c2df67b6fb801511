#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use bizu_core::{
    Actor, ArticleStore, Backend, Bizu, BizuError, BizuId, BizuPatch, EditLog, LikeStore,
    MemoryStorage, NewBizu, Profile, Role, Session, TtlCache, UserId,
};

pub fn actor(role: Role) -> Actor {
    Actor {
        id: Uuid::new_v4(),
        email: format!("{}@suporte.example.com", Uuid::new_v4().simple()),
        role,
    }
}

pub fn bizu(title: &str, category: &str, content: &str, author: UserId, minute: u32) -> Bizu {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap();
    Bizu {
        id: Uuid::new_v4(),
        title: title.into(),
        category: category.into(),
        keywords: vec![],
        content: content.into(),
        image_url: None,
        author_id: author,
        likes_count: 0,
        views_count: 0,
        created_at: at,
        updated_at: at,
        is_liked: false,
    }
}

#[derive(Default)]
pub struct Calls {
    pub list: AtomicUsize,
    pub get: AtomicUsize,
    pub create: AtomicUsize,
    pub update: AtomicUsize,
    pub delete: AtomicUsize,
    pub like: AtomicUsize,
    pub unlike: AtomicUsize,
    pub log_edit: AtomicUsize,
    pub views: AtomicUsize,
}

impl Calls {
    pub fn writes(&self) -> usize {
        self.create.load(Ordering::SeqCst)
            + self.update.load(Ordering::SeqCst)
            + self.delete.load(Ordering::SeqCst)
            + self.log_edit.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.writes()
            + self.list.load(Ordering::SeqCst)
            + self.get.load(Ordering::SeqCst)
            + self.like.load(Ordering::SeqCst)
            + self.unlike.load(Ordering::SeqCst)
            + self.views.load(Ordering::SeqCst)
    }
}

/// In-memory backend honouring the search, ordering and like-count contract.
#[derive(Default)]
pub struct StubBackend {
    pub bizus: Mutex<Vec<Bizu>>,
    likes: Mutex<HashSet<(BizuId, UserId)>>,
    pub calls: Calls,
    /// Artificial latency for list requests whose query matches the key.
    pub list_delays: Mutex<HashMap<Option<String>, Duration>>,
    pub fail_lists: Mutex<bool>,
    /// Latency before a like or unlike reaches the stored likes.
    pub like_delay: Mutex<Option<Duration>>,
    pub unlike_delay: Mutex<Option<Duration>>,
    pub fail_likes: Mutex<bool>,
    pub fail_unlikes: Mutex<bool>,
    pub fail_edit_log: Mutex<bool>,
    pub edit_logs: Mutex<Vec<EditLog>>,
}

impl StubBackend {
    pub fn with_bizus(bizus: Vec<Bizu>) -> Arc<Self> {
        let stub = Self::default();
        *stub.bizus.lock().unwrap() = bizus;
        Arc::new(stub)
    }

    pub fn delay_query(&self, query: Option<&str>, delay: Duration) {
        self.list_delays
            .lock()
            .unwrap()
            .insert(query.map(str::to_string), delay);
    }

    pub fn server_like(&self, id: BizuId, user: UserId) -> (bool, u64) {
        let liked = self.likes.lock().unwrap().contains(&(id, user));
        (liked, self.count(id))
    }

    fn count(&self, id: BizuId) -> u64 {
        self.likes
            .lock()
            .unwrap()
            .iter()
            .filter(|(b, _)| *b == id)
            .count() as u64
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn list_bizus(
        &self,
        query: Option<&str>,
        limit: Option<usize>,
        viewer: Option<UserId>,
    ) -> Result<Vec<Bizu>, BizuError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .list_delays
            .lock()
            .unwrap()
            .get(&query.map(str::to_string))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_lists.lock().unwrap() {
            return Err(BizuError::Transient("service unavailable".into()));
        }
        let mut found: Vec<Bizu> = self
            .bizus
            .lock()
            .unwrap()
            .iter()
            .filter(|b| query.map_or(true, |q| b.matches(q)))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        let likes = self.likes.lock().unwrap();
        for b in &mut found {
            b.is_liked = viewer.is_some_and(|v| likes.contains(&(b.id, v)));
            b.likes_count = likes.iter().filter(|(liked, _)| *liked == b.id).count() as u64;
        }
        Ok(found)
    }

    async fn get_bizu(&self, id: BizuId, _viewer: Option<UserId>) -> Result<Bizu, BizuError> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.bizus
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| BizuError::NotFound(format!("bizu {id}")))
    }

    async fn create_bizu(&self, new: &NewBizu) -> Result<Bizu, BizuError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        let author = new
            .author_id
            .ok_or_else(|| BizuError::Unauthenticated("missing author".into()))?;
        let now = Utc::now();
        let created = Bizu {
            id: Uuid::new_v4(),
            title: new.title.clone(),
            category: new.category.clone(),
            keywords: new.keywords.clone(),
            content: new.content.clone(),
            image_url: new.image_url.clone(),
            author_id: author,
            likes_count: 0,
            views_count: 0,
            created_at: now,
            updated_at: now,
            is_liked: false,
        };
        self.bizus.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_bizu(&self, id: BizuId, patch: &BizuPatch) -> Result<Bizu, BizuError> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        let mut bizus = self.bizus.lock().unwrap();
        let slot = bizus
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| BizuError::NotFound(format!("bizu {id}")))?;
        if let Some(title) = &patch.title {
            slot.title = title.clone();
        }
        if let Some(category) = &patch.category {
            slot.category = category.clone();
        }
        if let Some(keywords) = &patch.keywords {
            slot.keywords = keywords.clone();
        }
        if let Some(content) = &patch.content {
            slot.content = content.clone();
        }
        if let Some(image_url) = &patch.image_url {
            slot.image_url = Some(image_url.clone());
        }
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn delete_bizu(&self, id: BizuId) -> Result<(), BizuError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        let mut bizus = self.bizus.lock().unwrap();
        let before = bizus.len();
        bizus.retain(|b| b.id != id);
        if bizus.len() == before {
            return Err(BizuError::NotFound(format!("bizu {id}")));
        }
        Ok(())
    }

    async fn like(&self, id: BizuId, user: UserId) -> Result<u64, BizuError> {
        self.calls.like.fetch_add(1, Ordering::SeqCst);
        let delay = *self.like_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_likes.lock().unwrap() {
            return Err(BizuError::Transient("connection reset".into()));
        }
        self.likes.lock().unwrap().insert((id, user));
        Ok(self.count(id))
    }

    async fn unlike(&self, id: BizuId, user: UserId) -> Result<u64, BizuError> {
        self.calls.unlike.fetch_add(1, Ordering::SeqCst);
        let delay = *self.unlike_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_unlikes.lock().unwrap() {
            return Err(BizuError::Transient("connection reset".into()));
        }
        self.likes.lock().unwrap().remove(&(id, user));
        Ok(self.count(id))
    }

    async fn log_edit(&self, log: &EditLog) -> Result<(), BizuError> {
        self.calls.log_edit.fetch_add(1, Ordering::SeqCst);
        if *self.fail_edit_log.lock().unwrap() {
            return Err(BizuError::Transient("edit log unavailable".into()));
        }
        self.edit_logs.lock().unwrap().push(log.clone());
        Ok(())
    }

    async fn increment_views(&self, id: BizuId) -> Result<u64, BizuError> {
        self.calls.views.fetch_add(1, Ordering::SeqCst);
        let mut bizus = self.bizus.lock().unwrap();
        let slot = bizus
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| BizuError::NotFound(format!("bizu {id}")))?;
        slot.views_count += 1;
        Ok(slot.views_count)
    }

    async fn current_profile(&self) -> Result<Profile, BizuError> {
        Err(BizuError::Unauthenticated("stub has no session".into()))
    }
}

pub fn article_store(backend: Arc<StubBackend>, session: Session) -> ArticleStore {
    let cache = TtlCache::with_namespace(Arc::new(MemoryStorage::new()), "bizus:");
    ArticleStore::new(backend, session, cache)
}

pub fn like_store(backend: Arc<StubBackend>, session: Session) -> LikeStore {
    LikeStore::new(backend, session)
}

/// List and like stores sharing one backend, with likes patched into the list.
pub fn linked_stores(backend: Arc<StubBackend>, session: Session) -> (ArticleStore, LikeStore) {
    let articles = article_store(backend.clone(), session.clone());
    let likes = LikeStore::new(backend, session).with_articles(articles.clone());
    (articles, likes)
}
