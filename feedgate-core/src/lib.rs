//! feedgate-core
//!
//! Contracts and per-provider state shared across the feedgate workspace.
//!
//! - `fetcher`: the `Fetcher` capability trait and the optional `ProbeTarget`.
//! - `sink`: the `HealthSink` persistence seam for probe records.
//! - `breaker`: circuit-breaker policy and state.
//! - `provider` / `registry`: provider identity plus mutable health, grouped
//!   by category.
//! - `handle`: `TaskHandle` for background loops.
//!
//! Async runtime (Tokio)
//! ---------------------
//! `TaskHandle` wraps a `tokio::task::JoinHandle<()>` and a
//! `tokio::sync::watch::Sender<bool>` stop signal, so background loops must
//! run under a Tokio 1.x runtime.
#![warn(missing_docs)]

/// Circuit-breaker policy and per-provider breaker state.
pub mod breaker;
/// Provider capability traits.
pub mod fetcher;
/// Background task handle with cooperative shutdown.
pub mod handle;
/// A registered provider: static identity plus mutable health.
pub mod provider;
/// Category to ordered provider list.
pub mod registry;
/// Persistence seam for probe records.
pub mod sink;

pub use breaker::{BreakerPolicy, BreakerState, FailureOutcome};
pub use fetcher::{Fetcher, ProbeReply, ProbeTarget};
pub use handle::TaskHandle;
pub use provider::Provider;
pub use registry::ProviderRegistry;
pub use sink::{HealthSink, NoopSink};

pub use feedgate_types::*;
