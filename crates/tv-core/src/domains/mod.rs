//! Built-in verification domains.

pub mod bounded_queue;
pub mod lru_cache;
pub mod rate_limiter;

pub use bounded_queue::BoundedQueue;
pub use lru_cache::LruCache;
pub use rate_limiter::RateLimiter;
