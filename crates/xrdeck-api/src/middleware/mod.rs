pub mod rate_limit;

pub use rate_limit::ingest_rate_limit_middleware;
