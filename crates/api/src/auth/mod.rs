//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and strength rules.
//! - [`jwt`] -- access-token signing and opaque refresh tokens.

pub mod jwt;
pub mod password;
