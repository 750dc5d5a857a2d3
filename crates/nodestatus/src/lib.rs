//! Block producer infrastructure verification.
//!
//! Producers publish a `bp.json` describing the nodes they run. This crate
//! fetches that manifest, classifies the declared endpoints, probes each one
//! with the check its service type calls for, and folds the outcomes into a
//! per-producer report and a chain-wide document of healthy endpoints.
//!
//! ```no_run
//! use nodestatus::{ChainInfo, MetricsConfig, Verifier};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = ChainInfo::new("WAX", "1064487b3cd1a897ce03ae5b6a865651747e2e152090f99c1d19d44e01aea5a4", "https://wax.api.example");
//! let verifier = Verifier::new(Verifier::http_client()?, MetricsConfig::disabled());
//! let report = verifier.verify_chain(&chain).await?;
//! println!("{} healthy api endpoints", report.healthy_api_endpoints.len());
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod classify;
pub mod error;
pub mod manifest;
pub mod metrics;
pub mod onchain;
pub mod probe;
pub mod producer;
pub mod report;
pub mod retry;
pub mod verifier;

pub use chain::{load_chains, parse_chains, ChainInfo, ExclusionRule, TestnetInfo};
pub use error::{ConfigError, DiscoveryError, FetchError, ManifestError};
pub use metrics::{MetricsConfig, MetricsPusher};
pub use producer::{discover_producers, ProducerInfo};
pub use report::{ChainReport, OnchainCheck, ProducerReport, ProducerSummary, ServiceKind, Status};
pub use retry::{Criticality, Operation, Retrier};
pub use verifier::Verifier;
