//! # Clausewise Core
//!
//! Core library for the Clausewise contract-analysis client.
//! Provides the analysis backend client, guarded key/value storage,
//! per-selector result persistence, the dashboard controller, configuration,
//! and fundamental types.

pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod persistence;
pub mod render;
pub mod storage;
pub mod types;
pub mod view_store;

// Re-export commonly used types at the crate root.
pub use client::{AnalysisBackend, HealthStatus, HttpAnalysisClient, MockAnalysisBackend};
pub use config::{ClientConfig, config_exists, load_config};
pub use dashboard::{Dashboard, DashboardSnapshot, DashboardState};
pub use error::{AnalysisError, ClausewiseError, DashboardError, Result};
pub use storage::{FileBackend, MemoryBackend, StorageAdapter, StorageBackend};
pub use types::{
    AnalysisKind, AnalysisRequest, AnalysisResult, ContractFile, Credentials, DisplayTab,
    RiskLevel,
};
pub use view_store::{SavedSelection, ViewStore, key_for};
