//! Request extractors.
//!
//! - [`auth::AuthUser`] -- bearer token plus a fresh read of the user row.
//! - [`auth::OptionalAuthUser`] -- same, but anonymous requests pass through.
//! - [`rbac::RequireStaff`] -- staff only.
//! - [`context::Ctx`] -- the full [`RequestContext`](meowl_core::context::RequestContext)
//!   for core operations, including gate credentials and client hashes.

pub mod auth;
pub mod context;
pub mod rbac;
