pub mod article;
pub mod auth;
pub mod profile;
pub mod server;
