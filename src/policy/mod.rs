//! Who may see or change which article.
//!
//! Every access path in the services goes through these functions before it
//! touches the store. Ownership is always derived from the session identity,
//! never from fields supplied by the client.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;
use crate::database::models::{Article, ArticleInput};
use crate::filter::FilterData;

pub const SIGN_IN_PATH: &str = "/auth";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    Authenticated(Identity),
}

impl Viewer {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(identity) => Some(identity),
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.identity().map(|identity| identity.id)
    }

    pub fn require(&self) -> Result<&Identity, Denial> {
        self.identity().ok_or(Denial::Unauthenticated)
    }

    pub fn owns(&self, article: &Article) -> bool {
        self.id().is_some_and(|id| article.is_owned_by(id))
    }
}

impl From<Option<Identity>> for Viewer {
    fn from(identity: Option<Identity>) -> Self {
        identity.map_or(Viewer::Anonymous, Viewer::Authenticated)
    }
}

/// Access outcomes that end in navigation rather than an inline message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Please sign in to continue")]
    Unauthenticated,

    #[error("You do not have access to this article")]
    Unauthorized,

    #[error("Article not found")]
    NotFound,
}

impl Denial {
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            Denial::Unauthenticated => Some(SIGN_IN_PATH),
            Denial::Unauthorized => Some(DASHBOARD_PATH),
            Denial::NotFound => None,
        }
    }
}

/// One or more required fields are missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationFailure {
    pub message: String,
    pub field_errors: HashMap<String, String>,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: HashMap::new(),
        }
    }

    pub fn field(field: &str, error: impl Into<String>) -> Self {
        let mut failure = Self::new(format!("Invalid {}", field));
        failure.add(field, error);
        failure
    }

    pub fn add(&mut self, field: &str, error: impl Into<String>) {
        self.field_errors.entry(field.to_string()).or_insert_with(|| error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error(transparent)]
    Denied(#[from] Denial),

    #[error(transparent)]
    Invalid(#[from] ValidationFailure),
}

/// Fields an update may write. `author_id` has no slot here.
#[derive(Debug, Clone, Serialize)]
pub struct ArticlePatch {
    pub title: String,
    pub content: String,
    pub published: bool,
    pub updated_at: DateTime<Utc>,
}

/// Published articles only, newest first.
pub fn public_listing(limit: i32) -> FilterData {
    FilterData::where_eq("published", true)
        .order_by("created_at desc")
        .limit(limit)
}

/// All of the viewer's own articles, drafts included, newest first.
pub fn dashboard(viewer: &Viewer) -> Result<FilterData, Denial> {
    let identity = viewer.require()?;
    Ok(FilterData::where_eq("author_id", identity.id.to_string()).order_by("created_at desc"))
}

/// A draft is reported as missing to everyone except its author.
pub fn authorize_read<'a>(viewer: &Viewer, article: Option<&'a Article>) -> Result<&'a Article, Denial> {
    match article {
        None => Err(Denial::NotFound),
        Some(article) if article.published || viewer.owns(article) => Ok(article),
        Some(_) => Err(Denial::NotFound),
    }
}

pub fn authorize_edit<'a>(viewer: &Viewer, article: Option<&'a Article>) -> Result<&'a Article, Denial> {
    viewer.require()?;
    match article {
        None => Err(Denial::NotFound),
        Some(article) if viewer.owns(article) => Ok(article),
        Some(_) => Err(Denial::Unauthorized),
    }
}

pub fn authorize_create(viewer: &Viewer) -> Result<&Identity, Denial> {
    viewer.require()
}

pub fn validate_input(input: &ArticleInput) -> Result<(), ValidationFailure> {
    let mut failure = ValidationFailure::new("Title and content are required");
    if input.title.trim().is_empty() {
        failure.add("title", "Title is required");
    }
    if input.content.trim().is_empty() {
        failure.add("content", "Content is required");
    }
    failure.into_result()
}

/// Build a new article owned by `author`; any author in `input` is ignored.
pub fn new_article(author: &Identity, input: ArticleInput, now: DateTime<Utc>) -> Result<Article, ValidationFailure> {
    validate_input(&input)?;
    if input.author_id.is_some_and(|claimed| claimed != author.id) {
        tracing::warn!(user_id = %author.id, "ignoring client-supplied author_id on create");
    }

    Ok(Article {
        id: Uuid::new_v4(),
        title: input.title,
        content: input.content,
        published: input.published,
        author_id: author.id,
        created_at: now,
        updated_at: now,
    })
}

pub fn update_patch(
    viewer: &Viewer,
    article: &Article,
    input: ArticleInput,
    now: DateTime<Utc>,
) -> Result<ArticlePatch, Rejection> {
    authorize_edit(viewer, Some(article))?;
    validate_input(&input)?;

    Ok(ArticlePatch {
        title: input.title,
        content: input.content,
        published: input.published,
        // updated_at never moves backwards, even if the clock does
        updated_at: now.max(article.updated_at + Duration::microseconds(1)),
    })
}

/// Row-level guard for writes: the row must still belong to the viewer.
pub fn owned_row(article_id: Uuid, owner: &Identity) -> FilterData {
    FilterData::where_json(json!({
        "id": article_id.to_string(),
        "author_id": owner.id.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::matcher;

    fn identity(name: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name),
        }
    }

    fn article(author: &Identity, published: bool) -> Article {
        let now = Utc::now();
        Article {
            id: Uuid::new_v4(),
            title: "Title".to_string(),
            content: "# Body".to_string(),
            published,
            author_id: author.id,
            created_at: now,
            updated_at: now,
        }
    }

    fn input(title: &str, content: &str, published: bool) -> ArticleInput {
        ArticleInput {
            title: title.to_string(),
            content: content.to_string(),
            published,
            author_id: None,
        }
    }

    #[test]
    fn public_listing_never_contains_drafts() {
        let alice = identity("alice");
        let rows: Vec<_> = vec![article(&alice, true), article(&alice, false), article(&alice, true)]
            .into_iter()
            .map(|a| serde_json::to_value(a).unwrap())
            .collect();

        let listed = matcher::apply(&rows, &public_listing(20)).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|row| row["published"] == true));
    }

    #[test]
    fn dashboard_requires_a_session_and_scopes_to_the_viewer() {
        assert_eq!(dashboard(&Viewer::Anonymous).unwrap_err(), Denial::Unauthenticated);

        let alice = identity("alice");
        let bob = identity("bob");
        let rows: Vec<_> = vec![article(&alice, false), article(&bob, true), article(&alice, true)]
            .into_iter()
            .map(|a| serde_json::to_value(a).unwrap())
            .collect();

        let filter = dashboard(&Viewer::Authenticated(alice.clone())).unwrap();
        let own = matcher::apply(&rows, &filter).unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|row| row["author_id"] == alice.id.to_string()));
    }

    #[test]
    fn drafts_read_as_not_found_for_everyone_but_the_author() {
        let alice = identity("alice");
        let bob = identity("bob");
        let draft = article(&alice, false);

        assert_eq!(authorize_read(&Viewer::Anonymous, Some(&draft)), Err(Denial::NotFound));
        assert_eq!(
            authorize_read(&Viewer::Authenticated(bob.clone()), Some(&draft)),
            Err(Denial::NotFound)
        );
        assert!(authorize_read(&Viewer::Authenticated(alice), Some(&draft)).is_ok());

        let published = article(&identity("carol"), true);
        assert!(authorize_read(&Viewer::Anonymous, Some(&published)).is_ok());
        assert!(authorize_read(&Viewer::Authenticated(bob), Some(&published)).is_ok());

        assert_eq!(authorize_read(&Viewer::Anonymous, None), Err(Denial::NotFound));
    }

    #[test]
    fn edit_checks_session_then_existence_then_ownership() {
        let alice = identity("alice");
        let bob = identity("bob");
        let theirs = article(&alice, true);

        assert_eq!(authorize_edit(&Viewer::Anonymous, Some(&theirs)), Err(Denial::Unauthenticated));
        assert_eq!(authorize_edit(&Viewer::Anonymous, None), Err(Denial::Unauthenticated));
        assert_eq!(authorize_edit(&Viewer::Authenticated(bob.clone()), None), Err(Denial::NotFound));
        assert_eq!(
            authorize_edit(&Viewer::Authenticated(bob), Some(&theirs)),
            Err(Denial::Unauthorized)
        );
        assert!(authorize_edit(&Viewer::Authenticated(alice), Some(&theirs)).is_ok());

        assert_eq!(Denial::Unauthorized.redirect(), Some(DASHBOARD_PATH));
        assert_eq!(Denial::Unauthenticated.redirect(), Some(SIGN_IN_PATH));
        assert_eq!(Denial::NotFound.redirect(), None);
    }

    #[test]
    fn new_article_is_always_owned_by_the_creator() {
        let alice = identity("alice");
        let mut body = input("Hello", "World", false);
        body.author_id = Some(Uuid::new_v4());

        let created = new_article(&alice, body, Utc::now()).unwrap();
        assert_eq!(created.author_id, alice.id);
        assert!(!created.published);
        assert_eq!(created.created_at, created.updated_at);
    }

    #[test]
    fn blank_fields_are_rejected_per_field() {
        let alice = identity("alice");
        let failure = new_article(&alice, input("  ", "", true), Utc::now()).unwrap_err();
        assert!(failure.field_errors.contains_key("title"));
        assert!(failure.field_errors.contains_key("content"));
    }

    #[test]
    fn update_patch_refreshes_timestamp_and_omits_author() {
        let alice = identity("alice");
        let existing = article(&alice, false);
        let viewer = Viewer::Authenticated(alice);

        let mut body = input("New", "Text", true);
        body.author_id = Some(Uuid::new_v4());
        let patch = update_patch(&viewer, &existing, body, existing.updated_at).unwrap();

        assert!(patch.updated_at > existing.updated_at);
        assert!(patch.published);
        let value = serde_json::to_value(&patch).unwrap();
        assert!(value.get("author_id").is_none());
    }

    #[test]
    fn update_patch_denies_other_users() {
        let existing = article(&identity("alice"), true);
        let viewer = Viewer::Authenticated(identity("bob"));
        let result = update_patch(&viewer, &existing, input("x", "y", true), Utc::now());
        assert_eq!(result.unwrap_err(), Rejection::Denied(Denial::Unauthorized));
    }
}
