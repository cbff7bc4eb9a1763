//! Configuration module for vision_client
//!
//! This module contains:
//! - `defaults`: Default request parameters (overridable via environment)
//! - `formats`: Image file extension to MIME type mappings

mod defaults;
mod formats;

pub use defaults::{RequestDefaults, REQUEST_DEFAULTS};
pub use formats::{mime_for_extension, supported_extensions, IMAGE_MIME_TYPES};
