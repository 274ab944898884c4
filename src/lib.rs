pub mod error;
pub mod types;
pub mod log_parser;
pub mod query_analyzer;
pub mod plan_provider;
pub mod report;
pub mod advisor;
pub mod monitoring;
