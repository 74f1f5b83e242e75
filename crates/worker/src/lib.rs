//! The offcache worker: request interception with policy-driven caching.
//!
//! Every intercepted request flows classifier -> strategy engine (reading
//! and writing the partitioned store) -> fallback provider on total
//! failure. A lifecycle manager provisions the static partition at install
//! time and garbage-collects superseded generations at activation.

pub mod classify;
pub mod fallback;
pub mod lifecycle;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use classify::{Route, StrategyTag, classify};
pub use fallback::FallbackProvider;
pub use lifecycle::{Generation, LifecycleManager, LifecycleState};
pub use strategy::StrategyEngine;
pub use worker::{CacheWorker, Command};
