pub mod handler;
pub mod identity;
pub mod rate_limit;
