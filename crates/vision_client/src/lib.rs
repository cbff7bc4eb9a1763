//! vision_client: typed client for the VisionAI Pro classification API
//!
//! This library provides:
//! - `VisionClient`, a facade with one async method per REST endpoint
//! - API key management (generation, validation, usage, revocation)
//! - Zero-shot image classification with top-k predictions
//! - Category listing, search and administration
//! - Image upload preparation and on-disk result persistence
//!
//! # Example
//!
//! ```no_run
//! use vision_client::{ImageUpload, KeyRequest, VisionClient};
//!
//! #[tokio::main]
//! async fn main() -> vision_client::Result<()> {
//!     let client = VisionClient::with_base_url("http://localhost:8002")?;
//!
//!     let key = client
//!         .generate_key(KeyRequest::new("MyApp").with_email("user@example.com"))
//!         .await?;
//!     println!("API key: {:?}", key.api_key);
//!
//!     let image = ImageUpload::from_path("cat.jpg").await?;
//!     let result = client.classify_image(image, Some(5)).await?;
//!     for prediction in &result.predictions {
//!         println!("{}: {:.1}%", prediction.category, prediction.percent());
//!     }
//!     Ok(())
//! }
//! ```

// Core modules
pub mod error;

// Configuration module
pub mod config;

// Core functionality
pub mod api;
pub mod result_saver;
pub mod upload;

// Re-export commonly used types and functions
pub use error::{Result, VisionError};

// Config re-exports
pub use config::{
    mime_for_extension, supported_extensions, RequestDefaults, IMAGE_MIME_TYPES,
    REQUEST_DEFAULTS,
};

// API re-exports
pub use api::{
    mask_key, CategoryChange, CategoryFile, CategoryPage, CategorySearch, Classification,
    ClientConfig, CredentialStore, GeneratedKey, HealthStatus, KeyInfo, KeyRequest,
    KeyRevocation, KeyUsageStats, KeyValidation, ModelDescriptor, ModelInfo, ModelList,
    Prediction, SecureKeyRequest, ServiceInfo, Stats, UsageInfo, VisionClient,
};

pub use result_saver::ResultSaver;
pub use upload::ImageUpload;
