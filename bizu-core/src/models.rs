use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BizuId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Suporte,
}

/// A knowledge-base article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bizu {
    pub id: BizuId,
    pub title: String,
    /// Comma-joined when the article sits in several categories.
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub author_id: UserId,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub views_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Scoped to the viewer the list was requested for.
    #[serde(default)]
    pub is_liked: bool,
}

impl Bizu {
    pub fn categories(&self) -> Vec<&str> {
        self.category
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Case-insensitive match over title, category, keywords and content.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.category.to_lowercase().contains(&needle)
            || self
                .keywords
                .iter()
                .any(|k| k.to_lowercase().contains(&needle))
            || self.content.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBizu {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Filled in from the session by the article store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
}

impl NewBizu {
    pub fn new(
        title: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            keywords: Vec::new(),
            content: content.into(),
            image_url: None,
            author_id: None,
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Names of required fields that are empty after trimming.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("category", &self.category),
            ("content", &self.content),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Partial update; absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BizuPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl BizuPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authenticated user performing an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Profile> for Actor {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            role: profile.role,
        }
    }
}

/// Audit record for an edit made by someone other than the author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditLog {
    pub bizu_id: BizuId,
    pub editor_id: UserId,
    pub changes: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FetchParams {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

impl FetchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Trimmed, lower-cased query; blank queries collapse to `None`.
    pub fn normalized(&self) -> Self {
        let query = self
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        Self {
            query,
            limit: self.limit,
        }
    }

    pub fn cache_key(&self) -> String {
        let n = self.normalized();
        format!(
            "bizus?q={}&limit={}",
            n.query.unwrap_or_default(),
            n.limit.map(|l| l.to_string()).unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_ignores_case_and_padding() {
        let a = FetchParams::new().query("  Login ").limit(3);
        let b = FetchParams::new().query("login").limit(3);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), FetchParams::new().query("login").cache_key());
        assert_eq!(
            FetchParams::new().query("   ").cache_key(),
            FetchParams::new().cache_key()
        );
    }

    #[test]
    fn missing_fields_reports_blank_required_fields() {
        let draft = NewBizu::new(" ", "Acesso", "\n\t");
        assert_eq!(draft.missing_fields(), vec!["title", "content"]);
        assert!(NewBizu::new("t", "c", "b").missing_fields().is_empty());
    }

    #[test]
    fn categories_split_comma_joined_values() {
        let now = Utc::now();
        let bizu = Bizu {
            id: Uuid::new_v4(),
            title: "Reset".into(),
            category: "Acesso, Login ,".into(),
            keywords: vec![],
            content: "".into(),
            image_url: None,
            author_id: Uuid::new_v4(),
            likes_count: 0,
            views_count: 0,
            created_at: now,
            updated_at: now,
            is_liked: false,
        };
        assert_eq!(bizu.categories(), vec!["Acesso", "Login"]);
        assert!(bizu.matches("LOGIN"));
        assert!(!bizu.matches("boleto"));
    }

    #[test]
    fn role_uses_lowercase_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Suporte).unwrap(), "\"suporte\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
