// Shared infrastructure: configuration and caching.

pub mod cache;
pub mod config;
