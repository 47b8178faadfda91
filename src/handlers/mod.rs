// handlers/mod.rs - Two handler tiers
//
// Public: no session needed (listing, article pages, profiles, sign-in/up).
// Protected: the policy demands a session; without one the response is a
// 401 with a redirect to the sign-in page.
//
// Both tiers receive the same resolved ViewContext; the tier split only
// documents intent; access decisions are made by the policy module.
pub mod protected;
pub mod public;
