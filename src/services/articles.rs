use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join;
use uuid::Uuid;

use super::{ServiceError, ViewContext};
use crate::config::AppConfig;
use crate::database::models::{Article, ArticleInput, ArticleWithAuthor, AuthorSummary, DashboardEntry, Profile};
use crate::database::{DatabaseError, Repository, Store, Table};
use crate::filter::FilterData;
use crate::markdown;
use crate::policy::{self, Denial};

/// Article reads and writes, each gated by the policy.
#[derive(Clone)]
pub struct ArticleService {
    articles: Repository<Article>,
    profiles: Repository<Profile>,
    config: Arc<AppConfig>,
}

impl ArticleService {
    pub fn new(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self {
            articles: Repository::new(Table::Articles, store.clone()),
            profiles: Repository::new(Table::Profiles, store),
            config,
        }
    }

    pub async fn list_published(&self, ctx: &ViewContext, limit: Option<i32>) -> Result<Vec<ArticleWithAuthor>, ServiceError> {
        let filter = policy::public_listing(self.config.page_size(limit));
        let articles = ctx.run(self.articles.select_any(filter)).await?;
        self.with_authors(ctx, articles).await
    }

    pub async fn dashboard(&self, ctx: &ViewContext) -> Result<Vec<DashboardEntry>, ServiceError> {
        let filter = policy::dashboard(&ctx.viewer)?;
        let identity = ctx.viewer.require()?;

        let (profile, articles) = ctx
            .run(try_join(
                self.profiles.select_404(FilterData::where_eq("id", identity.id.to_string())),
                self.articles.select_any(filter),
            ))
            .await?;

        let author = AuthorSummary::from(&profile);
        Ok(articles
            .into_iter()
            .map(|article| {
                DashboardEntry::from(ArticleWithAuthor {
                    article,
                    author: author.clone(),
                    content_html: None,
                })
            })
            .collect())
    }

    /// Article page: the article, its author, and rendered HTML.
    pub async fn detail(&self, ctx: &ViewContext, id: &str) -> Result<ArticleWithAuthor, ServiceError> {
        let found = self.find(ctx, id).await?;
        let article = policy::authorize_read(&ctx.viewer, found.as_ref())?.clone();

        let mut joined = self.with_authors(ctx, vec![article]).await?;
        let mut detail = joined.pop().ok_or(Denial::NotFound)?;
        detail.content_html = Some(markdown::render(&detail.article.content));
        Ok(detail)
    }

    /// Current values for the editor; only the author gets them.
    pub async fn edit_form(&self, ctx: &ViewContext, id: &str) -> Result<Article, ServiceError> {
        ctx.viewer.require()?;
        let found = self.find(ctx, id).await?;
        Ok(policy::authorize_edit(&ctx.viewer, found.as_ref())?.clone())
    }

    pub async fn create(&self, ctx: &ViewContext, input: ArticleInput) -> Result<Article, ServiceError> {
        let author = policy::authorize_create(&ctx.viewer)?;
        let article = policy::new_article(author, input, Utc::now())?;

        let created = ctx.run(self.articles.insert(&article)).await?;
        tracing::info!(article_id = %created.id, user_id = %author.id, published = created.published, "article created");
        Ok(created)
    }

    pub async fn update(&self, ctx: &ViewContext, id: &str, input: ArticleInput) -> Result<Article, ServiceError> {
        let owner = ctx.viewer.require()?;
        let found = self.find(ctx, id).await?;
        let existing = policy::authorize_edit(&ctx.viewer, found.as_ref())?;
        let patch = policy::update_patch(&ctx.viewer, existing, input, Utc::now())?;

        let guard = policy::owned_row(existing.id, owner);
        let patch = serde_json::to_value(&patch).map_err(DatabaseError::from)?;
        let changed = ctx.run(self.articles.update_where(guard.clone(), patch)).await?;
        if changed == 0 {
            // Row vanished or changed hands between the read and the write
            return Err(Denial::NotFound.into());
        }

        let updated = ctx.run(self.articles.select_404(guard)).await?;
        tracing::info!(article_id = %updated.id, user_id = %owner.id, published = updated.published, "article updated");
        Ok(updated)
    }

    /// Look an article up by its path id; malformed ids simply do not exist.
    async fn find(&self, ctx: &ViewContext, id: &str) -> Result<Option<Article>, ServiceError> {
        let id = match Uuid::parse_str(id) {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };
        ctx.run(self.articles.select_one(FilterData::where_eq("id", id.to_string())))
            .await
    }

    /// Attach `author: { username, display_name }` to each article.
    pub(crate) async fn with_authors(&self, ctx: &ViewContext, articles: Vec<Article>) -> Result<Vec<ArticleWithAuthor>, ServiceError> {
        let mut author_ids: Vec<Uuid> = articles.iter().map(|a| a.author_id).collect();
        author_ids.sort();
        author_ids.dedup();

        let profiles = ctx.run(self.profiles.select_ids(&author_ids)).await?;
        let authors: HashMap<Uuid, AuthorSummary> = profiles
            .iter()
            .map(|profile| (profile.id, AuthorSummary::from(profile)))
            .collect();

        Ok(articles
            .into_iter()
            .map(|article| {
                let author = authors.get(&article.author_id).cloned().unwrap_or_else(|| {
                    tracing::warn!(article_id = %article.id, author_id = %article.author_id, "article has no author profile");
                    AuthorSummary {
                        username: "unknown".to_string(),
                        display_name: None,
                    }
                });
                ArticleWithAuthor {
                    article,
                    author,
                    content_html: None,
                }
            })
            .collect())
    }
}
