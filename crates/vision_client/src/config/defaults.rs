//! Default request parameters for API operations

use lazy_static::lazy_static;
use std::env;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Defaults applied when an operation's optional argument is `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefaults {
    /// Number of predictions requested from `/api/classify`
    pub top_k: u32,
    /// Page size for `/api/categories`
    pub category_limit: u32,
    /// Page offset for `/api/categories`
    pub category_offset: u32,
    /// Result count for `/api/categories/search`
    pub search_limit: u32,
    /// Reporting window for `/api/keys/stats`
    pub usage_days: u32,
}

impl RequestDefaults {
    /// Built-in defaults, ignoring the environment
    pub const fn builtin() -> Self {
        Self {
            top_k: 5,
            category_limit: 20,
            category_offset: 0,
            search_limit: 10,
            usage_days: 30,
        }
    }

    /// Defaults read from `VISIONAI_*` environment variables
    pub fn from_env() -> Self {
        let builtin = Self::builtin();
        Self {
            top_k: env_or("VISIONAI_TOP_K", builtin.top_k),
            category_limit: env_or("VISIONAI_CATEGORY_LIMIT", builtin.category_limit),
            category_offset: env_or("VISIONAI_CATEGORY_OFFSET", builtin.category_offset),
            search_limit: env_or("VISIONAI_SEARCH_LIMIT", builtin.search_limit),
            usage_days: env_or("VISIONAI_USAGE_DAYS", builtin.usage_days),
        }
    }
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self::from_env()
    }
}

lazy_static! {
    /// Global request defaults, read from the environment once
    pub static ref REQUEST_DEFAULTS: RequestDefaults = RequestDefaults::from_env();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let defaults = RequestDefaults::builtin();
        assert_eq!(defaults.top_k, 5);
        assert_eq!(defaults.category_limit, 20);
        assert_eq!(defaults.category_offset, 0);
        assert_eq!(defaults.search_limit, 10);
        assert_eq!(defaults.usage_days, 30);
    }

    #[test]
    fn test_env_or_ignores_garbage() {
        assert_eq!(env_or("VISIONAI_TEST_UNSET_VARIABLE", 7u32), 7);
    }
}
