//! Request builders and typed response records for each endpoint
//!
//! Every response record keeps fields it does not model in `extra`, so
//! nothing the server sends is dropped on decode.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields not covered by a typed record
pub type Extra = Map<String, Value>;

/// Parameters for `/api/keys/generate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
    pub client_name: String,
    pub email: Option<String>,
    pub description: Option<String>,
}

impl KeyRequest {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            email: None,
            description: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Parameters for `/api/keys/generate-secure`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureKeyRequest {
    pub client_name: String,
    pub permissions: Vec<String>,
    pub expires_days: u32,
    pub ip_whitelist: Vec<String>,
}

impl SecureKeyRequest {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            permissions: vec!["classify".to_string()],
            expires_days: 365,
            ip_whitelist: Vec::new(),
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expires_days(mut self, days: u32) -> Self {
        self.expires_days = days;
        self
    }

    pub fn with_ip_whitelist<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ip_whitelist = ips.into_iter().map(Into::into).collect();
        self
    }
}

/// Limits attached to an issued key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub rate_limit: Option<String>,
    #[serde(default)]
    pub max_image_size: Option<String>,
    #[serde(default)]
    pub supported_formats: Vec<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `/api/keys/generate` and `/api/keys/generate-secure`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedKey {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub usage_info: Option<UsageInfo>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub expires_days: Option<u32>,
    #[serde(default)]
    pub ip_whitelist: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Metadata the server keeps about a key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_used: Option<String>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(flatten)]
    pub extra: Extra,
}

fn parse_iso_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

impl KeyInfo {
    /// Creation time, if the server sent a parseable ISO-8601 timestamp
    pub fn created_at_time(&self) -> Option<NaiveDateTime> {
        self.created_at.as_deref().and_then(parse_iso_timestamp)
    }

    /// Last-use time, if the server sent a parseable ISO-8601 timestamp
    pub fn last_used_time(&self) -> Option<NaiveDateTime> {
        self.last_used.as_deref().and_then(parse_iso_timestamp)
    }
}

/// Response of `/api/keys/validate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValidation {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub key_info: Option<KeyInfo>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `/api/keys/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyUsageStats {
    #[serde(default)]
    pub success: bool,
    /// Masked key as echoed by the server
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub period_days: Option<u32>,
    #[serde(default)]
    pub stats: Value,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `/api/keys/revoke`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyRevocation {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub revoked_count: u64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Classifier model description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_words_file: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// One classification label with its confidence in `0.0..=1.0`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub category: String,
    pub confidence: f64,
}

impl Prediction {
    /// Confidence as a percentage
    pub fn percent(&self) -> f64 {
        self.confidence * 100.0
    }
}

/// Response of `/api/classify`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    /// Server-side processing time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Classification {
    /// Highest-confidence prediction
    pub fn top_prediction(&self) -> Option<&Prediction> {
        self.predictions
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

/// Response of `/api/categories`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub total_count: Option<usize>,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `/api/categories/search`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySearch {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, alias = "categories")]
    pub results: Vec<String>,
    #[serde(default)]
    pub count: usize,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `/api/categories/add` and `/api/categories/remove`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryChange {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub total_categories: Option<usize>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `/api/categories/save` and `/api/categories/load`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryFile {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub categories_count: Option<usize>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `/api/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub model_info: Option<ModelInfo>,
    #[serde(default)]
    pub total_categories: Option<usize>,
    #[serde(default)]
    pub base_words_file: Option<String>,
    #[serde(default)]
    pub supported_formats: Vec<String>,
    #[serde(default)]
    pub max_image_size: Option<String>,
    #[serde(default)]
    pub processing_time_avg: Option<String>,
    #[serde(default)]
    pub learning_method: Option<String>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `/health`, held exactly as the server sent it
///
/// Deployments disagree on the body: the timestamp is epoch seconds on some
/// and `YYYY-MM-DD HH:MM:SS.ffffff` text on others, and `model_info` or even
/// `status` may be missing. Typed accessors read from the raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthStatus(Value);

impl From<Value> for HealthStatus {
    fn from(body: Value) -> Self {
        Self(body)
    }
}

impl HealthStatus {
    /// Raw body
    pub fn body(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }

    pub fn error(&self) -> Option<&str> {
        self.get("error").and_then(Value::as_str)
    }

    /// Timestamp field as sent (number or text)
    pub fn timestamp(&self) -> Option<&Value> {
        self.get("timestamp")
    }

    /// `model_info`, when present and shaped like [`ModelInfo`]
    pub fn model_info(&self) -> Option<ModelInfo> {
        self.get("model_info")
            .cloned()
            .and_then(|info| serde_json::from_value(info).ok())
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == Some("healthy")
    }

    /// Server timestamp as a UTC datetime
    ///
    /// Numbers are Unix epoch seconds. Text is RFC 3339, or a naive
    /// `YYYY-MM-DD HH:MM:SS[.f]` read as UTC.
    pub fn checked_at(&self) -> Option<DateTime<Utc>> {
        match self.timestamp()? {
            Value::Number(n) => {
                let ts = n.as_f64()?;
                let secs = ts.trunc() as i64;
                let nanos = (ts.fract() * 1e9).round() as u32;
                DateTime::from_timestamp(secs, nanos.min(999_999_999))
            }
            Value::String(text) => DateTime::parse_from_rfc3339(text)
                .map(|at| at.with_timezone(&Utc))
                .ok()
                .or_else(|| parse_iso_timestamp(text).map(|at| at.and_utc())),
            _ => None,
        }
    }
}

/// Response of `/`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Entry of `/api/models`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub accuracy: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Response of `/api/models`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_request_builder() {
        let req = KeyRequest::new("MyApp")
            .with_email("user@example.com")
            .with_description("web app");
        assert_eq!(req.client_name, "MyApp");
        assert_eq!(req.email.as_deref(), Some("user@example.com"));
        assert_eq!(req.description.as_deref(), Some("web app"));
    }

    #[test]
    fn test_secure_key_request_defaults() {
        let req = SecureKeyRequest::new("svc");
        assert_eq!(req.permissions, vec!["classify".to_string()]);
        assert_eq!(req.expires_days, 365);
        assert!(req.ip_whitelist.is_empty());
    }

    #[test]
    fn test_classification_deserialization() {
        let body = json!({
            "success": true,
            "image_name": "cat.jpg",
            "processing_time": 0.412,
            "predictions": [
                {"category": "cat", "confidence": 0.91},
                {"category": "tiger", "confidence": 0.73}
            ],
            "model_info": {"model_type": "zero_shot_clip", "device": "cuda", "categories_count": 1200}
        });

        let result: Classification = serde_json::from_value(body).unwrap();
        assert!(result.success);
        assert_eq!(result.predictions.len(), 2);
        assert_eq!(result.top_prediction().unwrap().category, "cat");
        assert_eq!(
            result.model_info.unwrap().categories_count,
            Some(1200)
        );
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let body = json!({"success": true, "total_categories": 12, "uptime": 42});
        let stats: Stats = serde_json::from_value(body).unwrap();
        assert_eq!(stats.total_categories, Some(12));
        assert_eq!(stats.extra.get("uptime"), Some(&json!(42)));
        assert_eq!(serde_json::to_value(&stats).unwrap()["uptime"], json!(42));
    }

    #[test]
    fn test_health_epoch_timestamp() {
        let health = HealthStatus::from(json!({
            "status": "healthy",
            "model_info": {"model_type": "zero_shot_clip", "categories_count": 1200, "base_words_file": null},
            "timestamp": 1_700_000_000.25
        }));
        assert!(health.is_healthy());
        assert_eq!(health.model_info().unwrap().categories_count, Some(1200));

        let at = health.checked_at().unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_health_text_timestamp() {
        let body = json!({
            "status": "healthy",
            "classifier_loaded": true,
            "timestamp": "2024-05-01 08:00:00.123456",
            "version": "1.0.0"
        });
        let health: HealthStatus = serde_json::from_value(body.clone()).unwrap();

        let at = health.checked_at().unwrap();
        assert_eq!(at.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-05-01 08:00:00");
        assert_eq!(at.timestamp_subsec_micros(), 123_456);
        assert_eq!(serde_json::to_value(&health).unwrap(), body);
    }

    #[test]
    fn test_health_without_status() {
        let body = json!({"ok": true});
        let health: HealthStatus = serde_json::from_value(body.clone()).unwrap();

        assert!(health.status().is_none());
        assert!(!health.is_healthy());
        assert!(health.checked_at().is_none());
        assert_eq!(serde_json::to_value(&health).unwrap(), body);
    }

    #[test]
    fn test_search_accepts_categories_alias() {
        let search: CategorySearch =
            serde_json::from_value(json!({"success": true, "categories": ["dog", "cat"]}))
                .unwrap();
        assert_eq!(search.results, vec!["dog", "cat"]);
    }

    #[test]
    fn test_key_info_timestamps() {
        let info: KeyInfo = serde_json::from_value(json!({
            "client_name": "MyApp",
            "created_at": "2024-03-01T10:15:30.123456",
            "last_used": "not a date",
            "usage_count": 12
        }))
        .unwrap();
        let created = info.created_at_time().unwrap();
        assert_eq!(created.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 10:15");
        assert!(info.last_used_time().is_none());
        assert_eq!(info.usage_count, 12);
    }

    #[test]
    fn test_validation_invalid_key() {
        let v: KeyValidation =
            serde_json::from_value(json!({"valid": false, "message": "Invalid API key"})).unwrap();
        assert!(!v.valid);
        assert!(v.key_info.is_none());
    }
}
