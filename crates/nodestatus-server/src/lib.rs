//! Outer loop around the `nodestatus` engine: environment configuration,
//! scheduled runs, atomic publishing of one document per chain, and the HTTP
//! server that republishes them.

pub mod config;
pub mod publish;
pub mod routes;
pub mod runner;

pub use config::{ServerConfig, ServerConfigError};
pub use publish::{publish_report, PublishError};
