// handlers/protected/mod.rs - Handlers that need a signed-in viewer
//
// Every service call here starts with a policy check, so an anonymous
// request is answered with 401 + redirect to /auth before storage is touched.
pub mod articles;
pub mod auth;
pub mod dashboard;
pub mod profile;
