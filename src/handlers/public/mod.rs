// handlers/public/mod.rs - Public handlers (no session required)
//
// A session is still resolved when a bearer token is sent, so an author
// reading their own draft through the public detail route is allowed.
pub mod articles;
pub mod auth;
pub mod profiles;
