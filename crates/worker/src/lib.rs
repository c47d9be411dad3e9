//! Request interception for shellcache.
//!
//! This crate provides the network fetch pipeline, the routing of intercepted
//! requests, the cache-first and network-first strategies, and the worker
//! lifecycle that precaches and garbage-collects versioned stores.

pub mod config;
pub mod fetch;
pub mod intercept;
pub mod lifecycle;
pub mod request;
pub mod response;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use config::WorkerConfig;
pub use fetch::{FetchClient, FetchConfig, Network};
pub use intercept::{Route, route};
pub use lifecycle::{ClientId, Clients, FetchOutcome, Registration, Worker, WorkerMessage, WorkerState};
pub use request::{CacheMode, Request, RequestMode};
pub use response::{Response, ResponseSource};
