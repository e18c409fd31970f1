//! # Rayo Core
//!
//! Core engine for the Rayo caching library: a thread-safe, in-process
//! key-to-value cache whose defining guarantee is **single-flight
//! execution** - concurrent callers that miss on the same key cause the
//! producer to run exactly once, and all of them receive that one result.
//!
//! ## Features
//!
//! - **Single-flight misses**: per-key binary locks serialize producer
//!   runs; a background sweeper reclaims idle lock slots
//! - **TTL expiration**: absolute per-entry deadlines, adjustable per call
//!   and per producer run (via [`Nuances`])
//! - **Capacity enforcement**: approximate byte accounting with
//!   deterministic `SmallestFirst`/`LargestFirst` eviction
//! - **Statistics**: optional hit/miss/eviction counters plus bounded
//!   slowest-producer and heaviest-entry collections
//! - **Sync and async**: every operation has a blocking form and a
//!   suspending `_async` twin sharing the same semantics
//!
//! ## Module Organization
//!
//! - [`engine`] - [`RayoCache`], the public surface
//! - [`keyed_lock`] - per-key lock registry and its sweeper
//! - [`entry_store`] - the concurrent entry map and eviction callback
//! - [`sizer`] - [`ByteSized`] and the mode-driven [`ValueSizer`]
//! - [`stats`] - counters, top-N collections, snapshots
//! - [`capacity`] - the byte-limit enforcer
//! - [`keys`] - call-site key derivation
//!
//! Most users depend on the `rayo` facade crate instead, which re-exports
//! everything here and adds the `auto_key!` macro and the process-wide
//! holder.

mod cache_entry;
mod capacity;
mod config;
mod engine;
mod entry_store;
mod error;
mod nuances;
mod sizer;
mod stats;

pub mod keyed_lock;
pub mod keys;

pub use cache_entry::{CacheEntry, EvictionReason};
pub use config::{CacheConfig, EvictionStrategy, SizeMode};
pub use engine::RayoCache;
pub use error::CacheError;
pub use keyed_lock::{KeyedLockRegistry, LockHandle};
pub use keys::derive_call_site_key;
pub use nuances::Nuances;
pub use sizer::{ByteSized, SizeProbe, ValueSizer};
pub use stats::{StatisticsSnapshot, TopHeavyEntry, TopSlowQuery};
