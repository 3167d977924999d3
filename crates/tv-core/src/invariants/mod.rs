//! Property libraries, one checker per domain.

pub mod bounded_queue;
pub mod liveness;
pub mod lru_cache;
pub mod rate_limiter;

pub use bounded_queue::BoundedQueuePropertyChecker;
pub use lru_cache::LruCachePropertyChecker;
pub use rate_limiter::RateLimiterPropertyChecker;
