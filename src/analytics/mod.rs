pub mod aggregate;
pub mod cache;
pub mod handler;
pub mod service;

pub use cache::{AnalyticsCache, CacheBackend, MemoryCacheBackend};
pub use service::AnalyticsService;
