//! Per-client admission control and a per-resource read-through /
//! write-through cache, plus the HTTP surface that serves them.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod rate_limit;
pub mod service;
pub mod state;
pub mod store;

pub use cache::Cache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ApiError, ConfigError, ErrorType, StoreError};
pub use rate_limit::{AccessDecision, RateLimiter, ThrottleSettings};
pub use service::ApiService;
pub use store::{HttpStore, JsonStore, MemoryStore, Store};
