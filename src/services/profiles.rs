use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{ArticleService, ServiceError, ViewContext};
use crate::database::models::{Article, ArticleWithAuthor, Profile, ProfilePatch};
use crate::database::{Repository, Store, Table};
use crate::filter::FilterData;
use crate::policy::{Denial, ValidationFailure};

const MAX_DISPLAY_NAME_LEN: usize = 50;
const MAX_BIO_LEN: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub profile: Profile,
    pub articles: Vec<ArticleWithAuthor>,
}

#[derive(Clone)]
pub struct ProfileService {
    profiles: Repository<Profile>,
    articles: Repository<Article>,
    joiner: ArticleService,
}

impl ProfileService {
    pub fn new(store: Arc<dyn Store>, joiner: ArticleService) -> Self {
        Self {
            profiles: Repository::new(Table::Profiles, store.clone()),
            articles: Repository::new(Table::Articles, store),
            joiner,
        }
    }

    /// Public profile page: the profile and its published articles.
    pub async fn by_username(&self, ctx: &ViewContext, username: &str) -> Result<PublicProfile, ServiceError> {
        let profile = ctx
            .run(self.profiles.select_one(FilterData::where_eq("username", username)))
            .await?
            .ok_or(Denial::NotFound)?;

        let filter = FilterData::where_json(json!({
            "author_id": profile.id.to_string(),
            "published": true,
        }))
        .order_by("created_at desc");
        let articles = ctx.run(self.articles.select_any(filter)).await?;
        let articles = self.joiner.with_authors(ctx, articles).await?;

        Ok(PublicProfile { profile, articles })
    }

    /// The viewer's own profile.
    pub async fn own(&self, ctx: &ViewContext) -> Result<Profile, ServiceError> {
        let identity = ctx.viewer.require()?;
        ctx.run(self.profiles.select_one(FilterData::where_eq("id", identity.id.to_string())))
            .await?
            .ok_or_else(|| Denial::NotFound.into())
    }

    /// Owner-only edit of display name, bio and avatar. The username stays.
    pub async fn update_own(&self, ctx: &ViewContext, patch: ProfilePatch) -> Result<Profile, ServiceError> {
        let identity = ctx.viewer.require()?;
        let changes = validate_patch(&patch)?;

        let updated = ctx.run(self.profiles.update_id(identity.id, changes)).await?;
        tracing::info!(user_id = %identity.id, "profile updated");
        Ok(updated)
    }
}

fn validate_patch(patch: &ProfilePatch) -> Result<Value, ValidationFailure> {
    if patch.is_empty() {
        return Err(ValidationFailure::new("Nothing to update"));
    }

    let mut failure = ValidationFailure::new("Please check the highlighted fields");
    let mut changes = Map::new();

    if let Some(ref name) = patch.display_name {
        if name.trim().chars().count() > MAX_DISPLAY_NAME_LEN {
            failure.add("display_name", format!("Display name must be at most {} characters", MAX_DISPLAY_NAME_LEN));
        }
        changes.insert("display_name".to_string(), optional(name));
    }
    if let Some(ref bio) = patch.bio {
        if bio.chars().count() > MAX_BIO_LEN {
            failure.add("bio", format!("Bio must be at most {} characters", MAX_BIO_LEN));
        }
        changes.insert("bio".to_string(), optional(bio));
    }
    if let Some(ref avatar) = patch.avatar_url {
        let trimmed = avatar.trim();
        if !trimmed.is_empty() {
            match url::Url::parse(trimmed) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                _ => failure.add("avatar_url", "Avatar URL must be an http(s) URL"),
            }
        }
        changes.insert("avatar_url".to_string(), optional(avatar));
    }

    failure.into_result()?;
    changes.insert("updated_at".to_string(), json!(Utc::now()));
    Ok(Value::Object(changes))
}

/// Empty strings clear the field.
fn optional(value: &str) -> Value {
    match value.trim() {
        "" => Value::Null,
        v => Value::String(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::config::AppConfig;
    use crate::database::models::ArticleInput;
    use crate::database::MemoryStore;
    use crate::policy::Viewer;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    async fn setup() -> (ProfileService, ArticleService, Identity, CancellationToken) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let articles = ArticleService::new(store.clone(), Arc::new(AppConfig::development()));
        let service = ProfileService::new(store.clone(), articles.clone());

        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            display_name: Some("alice".to_string()),
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        Repository::<Profile>::new(Table::Profiles, store).insert(&profile).await.unwrap();
        let identity = Identity {
            id: profile.id,
            email: "alice@example.com".to_string(),
        };
        (service, articles, identity, CancellationToken::new())
    }

    #[tokio::test]
    async fn public_profile_lists_only_published_articles() {
        let (service, articles, alice, root) = setup().await;
        let ctx = ViewContext::new(Viewer::Authenticated(alice), None, &root);
        for (title, published) in [("Draft", false), ("Live", true)] {
            let input = ArticleInput {
                title: title.to_string(),
                content: "body".to_string(),
                published,
                author_id: None,
            };
            articles.create(&ctx, input).await.unwrap();
        }

        let page = service.by_username(&ViewContext::anonymous(&root), "alice").await.unwrap();
        assert_eq!(page.profile.username, "alice");
        assert_eq!(page.articles.len(), 1);
        assert_eq!(page.articles[0].article.title, "Live");

        let missing = service.by_username(&ViewContext::anonymous(&root), "nobody").await;
        assert!(matches!(missing, Err(ServiceError::Denied(Denial::NotFound))));
    }

    #[tokio::test]
    async fn update_own_changes_fields_but_not_username() {
        let (service, _, alice, root) = setup().await;
        let ctx = ViewContext::new(Viewer::Authenticated(alice), None, &root);

        let patch = ProfilePatch {
            display_name: Some("Alice A.".to_string()),
            bio: Some("".to_string()),
            avatar_url: Some("https://example.com/a.png".to_string()),
        };
        let updated = service.update_own(&ctx, patch).await.unwrap();
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.display_name.as_deref(), Some("Alice A."));
        assert_eq!(updated.bio, None);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn update_own_rejects_bad_input_and_anonymous_viewers() {
        let (service, _, alice, root) = setup().await;
        let ctx = ViewContext::new(Viewer::Authenticated(alice), None, &root);

        let bad = ProfilePatch {
            avatar_url: Some("javascript:alert(1)".to_string()),
            ..Default::default()
        };
        match service.update_own(&ctx, bad).await {
            Err(ServiceError::Validation(failure)) => assert!(failure.field_errors.contains_key("avatar_url")),
            other => panic!("unexpected result {:?}", other),
        }

        let empty = service.update_own(&ctx, ProfilePatch::default()).await;
        assert!(matches!(empty, Err(ServiceError::Validation(_))));

        let anon = service
            .update_own(&ViewContext::anonymous(&root), ProfilePatch::default())
            .await;
        assert!(matches!(anon, Err(ServiceError::Denied(Denial::Unauthenticated))));
    }
}
