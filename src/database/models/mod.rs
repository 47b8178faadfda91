pub mod article;
pub mod auth_user;
pub mod profile;

pub use article::{Article, ArticleInput, ArticleStatus, ArticleWithAuthor, AuthorSummary, DashboardEntry};
pub use auth_user::AuthUser;
pub use profile::{Profile, ProfilePatch};
