use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::Profile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }

    pub fn status(&self) -> ArticleStatus {
        if self.published { ArticleStatus::Published } else { ArticleStatus::Draft }
    }
}

/// Body of create and update requests. `author_id` is accepted so clients
/// that send it are not rejected, but it is never read.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArticleInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub username: String,
    pub display_name: Option<String>,
}

impl AuthorSummary {
    /// Name shown next to an article: display name, else username.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

impl From<&Profile> for AuthorSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleWithAuthor {
    #[serde(flatten)]
    pub article: Article,
    pub author: AuthorSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardEntry {
    #[serde(flatten)]
    pub article: ArticleWithAuthor,
    pub status: ArticleStatus,
}

impl From<ArticleWithAuthor> for DashboardEntry {
    fn from(article: ArticleWithAuthor) -> Self {
        let status = article.article.status();
        Self { article, status }
    }
}
