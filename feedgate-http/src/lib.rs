#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod fetcher;

pub use fetcher::{HttpFetcher, HttpFetcherBuilder};
