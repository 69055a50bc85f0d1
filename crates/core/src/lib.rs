pub mod activity;
pub mod audit;
pub mod comment;
pub mod context;
pub mod email_link;
pub mod error;
pub mod gate;
pub mod guards;
pub mod hashing;
pub mod location;
pub mod meowl;
pub mod moderation;
pub mod points;
pub mod policy;
pub mod roles;
pub mod scan;
pub mod store;
pub mod token_gate;
pub mod types;
pub mod users;
