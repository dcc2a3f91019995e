//! Credential and identity persistence: password hashing, field validation,
//! and a PostgreSQL user store with optimistic concurrency.

pub mod config;
pub mod db;
pub mod users;
