pub mod analytics;
pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod registry;
pub mod routes;
pub mod storage;
pub mod types;
