use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::backend::Backend;
use crate::config::BackendConfig;
use crate::error::BizuError;
use crate::models::{Bizu, BizuId, BizuPatch, EditLog, NewBizu, Profile, UserId};

/// JSON-over-HTTP [`Backend`].
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    access_token: Option<String>,
}

#[derive(Serialize)]
struct LikeBody {
    user_id: UserId,
}

#[derive(Deserialize)]
struct LikesCount {
    likes_count: u64,
}

#[derive(Deserialize)]
struct ViewsCount {
    views_count: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BizuError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("bizu-desk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, &config.base_url, config.api_key.clone())
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        api_key: Option<String>,
    ) -> Result<Self, BizuError> {
        // keep the base path when joining relative segments
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| BizuError::ValidationFailed(format!("invalid base url {base_url}: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BizuError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| BizuError::ValidationFailed(format!("invalid path {path}: {e}")))?;
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key);
        }
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BizuError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, body = %body, "backend returned an error");
        Err(classify(status, server_message(&body, status)))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BizuError> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn server_message(body: &str, status: StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message.or(parsed.error) {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.to_string()
    } else {
        trimmed.to_string()
    }
}

fn classify(status: StatusCode, message: String) -> BizuError {
    match status {
        StatusCode::UNAUTHORIZED => BizuError::Unauthenticated(message),
        StatusCode::FORBIDDEN => BizuError::Forbidden(message),
        StatusCode::NOT_FOUND => BizuError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BizuError::ValidationFailed(message)
        }
        _ => BizuError::Transient(message),
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn list_bizus(
        &self,
        query: Option<&str>,
        limit: Option<usize>,
        viewer: Option<UserId>,
    ) -> Result<Vec<Bizu>, BizuError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = query {
            params.push(("q", q.to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(viewer) = viewer {
            params.push(("viewer", viewer.to_string()));
        }
        let builder = self.request(Method::GET, "bizus")?.query(&params);
        self.send_json(builder).await
    }

    async fn get_bizu(&self, id: BizuId, viewer: Option<UserId>) -> Result<Bizu, BizuError> {
        let mut builder = self.request(Method::GET, &format!("bizus/{id}"))?;
        if let Some(viewer) = viewer {
            builder = builder.query(&[("viewer", viewer.to_string())]);
        }
        self.send_json(builder).await
    }

    async fn create_bizu(&self, bizu: &NewBizu) -> Result<Bizu, BizuError> {
        let builder = self.request(Method::POST, "bizus")?.json(bizu);
        self.send_json(builder).await
    }

    async fn update_bizu(&self, id: BizuId, patch: &BizuPatch) -> Result<Bizu, BizuError> {
        let builder = self
            .request(Method::PATCH, &format!("bizus/{id}"))?
            .json(patch);
        self.send_json(builder).await
    }

    async fn delete_bizu(&self, id: BizuId) -> Result<(), BizuError> {
        let builder = self.request(Method::DELETE, &format!("bizus/{id}"))?;
        self.send(builder).await?;
        Ok(())
    }

    async fn like(&self, id: BizuId, user: UserId) -> Result<u64, BizuError> {
        let builder = self
            .request(Method::POST, &format!("bizus/{id}/like"))?
            .json(&LikeBody { user_id: user });
        let count: LikesCount = self.send_json(builder).await?;
        Ok(count.likes_count)
    }

    async fn unlike(&self, id: BizuId, user: UserId) -> Result<u64, BizuError> {
        let builder = self
            .request(Method::DELETE, &format!("bizus/{id}/like"))?
            .json(&LikeBody { user_id: user });
        let count: LikesCount = self.send_json(builder).await?;
        Ok(count.likes_count)
    }

    async fn log_edit(&self, log: &EditLog) -> Result<(), BizuError> {
        let builder = self
            .request(Method::POST, &format!("bizus/{}/edits", log.bizu_id))?
            .json(log);
        self.send(builder).await?;
        Ok(())
    }

    async fn increment_views(&self, id: BizuId) -> Result<u64, BizuError> {
        let builder = self.request(Method::POST, &format!("bizus/{id}/views"))?;
        let count: ViewsCount = self.send_json(builder).await?;
        Ok(count.views_count)
    }

    async fn current_profile(&self) -> Result<Profile, BizuError> {
        if self.access_token.is_none() {
            return Err(BizuError::Unauthenticated("no access token configured".into()));
        }
        let builder = self.request(Method::GET, "auth/profile")?;
        self.send_json(builder).await
    }
}
