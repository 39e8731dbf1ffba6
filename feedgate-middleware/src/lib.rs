#![doc = include_str!("../README.md")]
//! feedgate-middleware
//!
//! Re-exports for the shared stores.

mod cache;
mod rate_limit;

pub use crate::cache::{TtlCache, cache_key};
pub use crate::rate_limit::RateLimiter;
