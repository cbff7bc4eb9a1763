//! API client module
//!
//! This module provides:
//! - `client`: The `VisionClient` facade, one method per endpoint
//! - `credentials`: Shared API key slot
//! - `types`: Request builders and typed response records

mod client;
mod credentials;
mod types;

pub use client::{ClientConfig, VisionClient};
pub use credentials::{mask_key, CredentialStore};
pub use types::{
    CategoryChange, CategoryFile, CategoryPage, CategorySearch, Classification, Extra,
    GeneratedKey, HealthStatus, KeyInfo, KeyRequest, KeyRevocation, KeyUsageStats, KeyValidation,
    ModelDescriptor, ModelInfo, ModelList, Prediction, SecureKeyRequest, ServiceInfo, Stats,
    UsageInfo,
};
