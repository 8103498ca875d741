//! Gantry Core Library
//!
//! BOM generation and deployment orchestration for multi-cloud
//! environments: dependency-aware execution ordering across platforms
//! and clouds, primary/secondary failover validation, release lifecycle
//! management, and per-environment concurrency control.

pub mod cloud_order;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod orchestrator;
pub mod processor;
pub mod secondary;
pub mod telemetry;

pub use cloud_order::ordered_batches;
pub use config::EngineConfig;
pub use context::EnvContext;
pub use engine::{BomEngine, BomOutcome, DeployOutcome};
pub use error::{GantryError, Result};
pub use graph::order_platforms;
pub use lifecycle::ReleaseLifecycle;
pub use orchestrator::{DeployDescriptor, Orchestrator, ERROR_PREFIX, SUCCESS_PREFIX};
pub use processor::{BindingProcessor, FlexProcessor};
pub use secondary::check_secondary;
pub use telemetry::init_tracing;

/// Gantry version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
