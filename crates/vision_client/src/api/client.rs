//! HTTP client for the VisionAI Pro zero-shot classification API

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::credentials::{mask_key, CredentialStore};
use super::types::{
    CategoryChange, CategoryFile, CategoryPage, CategorySearch, Classification, GeneratedKey,
    HealthStatus, KeyRequest, KeyRevocation, KeyUsageStats, KeyValidation, ModelList,
    SecureKeyRequest, ServiceInfo, Stats,
};
use crate::config::REQUEST_DEFAULTS;
use crate::error::{Result, VisionError};
use crate::upload::ImageUpload;

const DEFAULT_CATEGORY_FILE: &str = "custom_categories.json";

type Query = Vec<(&'static str, String)>;

/// Configuration for the API client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds; `None` waits indefinitely
    pub timeout_ms: Option<u64>,
    /// Multipart field name carrying the image on `/api/classify`
    pub image_field: String,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            api_key: None,
            timeout_ms: None,
            image_field: "image".to_string(),
            user_agent: format!("visionai-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new ClientConfig for the given server
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Configured request timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Set the multipart field name used for the image upload
    pub fn with_image_field(mut self, field: impl Into<String>) -> Self {
        self.image_field = field.into();
        self
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Pull a readable message out of an error body (`{"detail": ...}` or raw text)
fn error_message(body: &str) -> String {
    let message = match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("detail").or_else(|| value.get("message")) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.trim().to_string(),
        },
        Err(_) => body.trim().to_string(),
    };

    if message.is_empty() {
        "Unknown error".to_string()
    } else {
        message
    }
}

/// Client facade over the classification service
///
/// Holds the base URL and a credential slot. Authenticated operations read
/// the stored key once at the start of the call and fail with
/// [`VisionError::MissingCredential`] before any request is sent when no key
/// is stored. Clones share the HTTP connection pool and the credential slot.
#[derive(Clone)]
pub struct VisionClient {
    config: ClientConfig,
    base_url: Url,
    http: Client,
    credentials: CredentialStore,
}

impl fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.config.timeout())
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl VisionClient {
    /// Create a new client from configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut base_url = Url::parse(config.base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(VisionError::InvalidInput(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }
        // Keep any path prefix when joining endpoint paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let credentials = CredentialStore::new(config.api_key.clone());

        info!(
            base_url = %base_url,
            timeout_ms = ?config.timeout_ms,
            has_api_key = config.api_key.is_some(),
            "Created VisionAI client"
        );

        Ok(Self {
            config,
            base_url,
            http,
            credentials,
        })
    }

    /// Create a client with default settings for the given server
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Normalized base URL (always ends with `/`)
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Currently stored API key
    pub async fn api_key(&self) -> Option<String> {
        self.credentials.get().await
    }

    /// Store an API key for subsequent authenticated calls
    pub async fn set_api_key(&self, api_key: impl Into<String>) {
        self.credentials.set(api_key).await;
    }

    /// Forget the stored API key
    pub async fn clear_api_key(&self) {
        self.credentials.clear().await;
    }

    pub async fn has_api_key(&self) -> bool {
        self.credentials.is_set().await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.endpoint(path)?;
        debug!(method = %method, url = %url, "Sending request");
        Ok(self.http.request(method, url))
    }

    /// Append the stored key to a query when one is present
    async fn with_optional_key(&self, mut query: Query) -> Query {
        if let Some(key) = self.credentials.get().await {
            query.push(("api_key", key));
        }
        query
    }

    /// Attach query parameters, leaving the URL bare when there are none
    fn with_query(request: RequestBuilder, query: &Query) -> RequestBuilder {
        if query.is_empty() {
            request
        } else {
            request.query(query)
        }
    }

    async fn send<T>(&self, request: RequestBuilder, endpoint: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        Self::decode(response, endpoint).await
    }

    async fn decode<T>(response: Response, endpoint: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body);
            warn!(status = %status, endpoint, error = %message, "Request failed");
            return Err(VisionError::api(status.as_u16(), message));
        }

        let decoded = serde_json::from_str(&body).map_err(|source| VisionError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;
        debug!(endpoint, status = %status, "Request completed");
        Ok(decoded)
    }

    /// Post a key-issuing form and store the returned key on success
    async fn issue_key(&self, path: &str, form: Form) -> Result<GeneratedKey> {
        let request = self.request(Method::POST, path)?.multipart(form);
        let response = request.send().await?;

        let result: GeneratedKey = match Self::decode(response, path).await {
            Ok(result) => result,
            Err(VisionError::Api { status, message }) => {
                return Err(VisionError::KeyGeneration(format!(
                    "HTTP {}: {}",
                    status, message
                )))
            }
            Err(e) => return Err(e),
        };

        let issued = result
            .api_key
            .clone()
            .filter(|key| result.success && !key.is_empty());

        match issued {
            Some(key) => {
                info!(
                    api_key = %mask_key(&key),
                    client_name = ?result.client_name,
                    "Issued API key"
                );
                self.credentials.set(key).await;
                Ok(result)
            }
            _ => Err(VisionError::KeyGeneration(
                result
                    .message
                    .clone()
                    .unwrap_or_else(|| "server reported failure".to_string()),
            )),
        }
    }

    /// Generate an API key and store it for subsequent calls
    ///
    /// POST /api/keys/generate
    pub async fn generate_key(&self, request: KeyRequest) -> Result<GeneratedKey> {
        let mut form = Form::new().text("client_name", request.client_name);
        if let Some(email) = request.email.filter(|e| !e.is_empty()) {
            form = form.text("email", email);
        }
        if let Some(description) = request.description.filter(|d| !d.is_empty()) {
            form = form.text("description", description);
        }

        self.issue_key("/api/keys/generate", form).await
    }

    /// Generate a key with permissions, expiry and an IP whitelist, and store it
    ///
    /// POST /api/keys/generate-secure
    pub async fn generate_secure_key(&self, request: SecureKeyRequest) -> Result<GeneratedKey> {
        let form = Form::new()
            .text("client_name", request.client_name)
            .text("permissions", request.permissions.join(","))
            .text("expires_days", request.expires_days.to_string())
            .text("ip_whitelist", request.ip_whitelist.join(","));

        self.issue_key("/api/keys/generate-secure", form).await
    }

    /// Check whether a key is valid
    ///
    /// GET /api/keys/validate
    ///
    /// An explicit `api_key` is used as given and the stored key is left
    /// untouched. With `None`, the stored key is validated.
    pub async fn validate_key(&self, api_key: Option<&str>) -> Result<KeyValidation> {
        let key = match api_key {
            Some(key) => key.to_string(),
            None => self.credentials.require().await?,
        };

        let request = self
            .request(Method::GET, "/api/keys/validate")?
            .query(&[("api_key", key)]);
        self.send(request, "/api/keys/validate").await
    }

    /// Usage statistics for the stored key
    ///
    /// GET /api/keys/stats
    pub async fn key_usage_stats(&self, days: Option<u32>) -> Result<KeyUsageStats> {
        let api_key = self.credentials.require().await?;
        let days = days.unwrap_or(REQUEST_DEFAULTS.usage_days);

        let request = self
            .request(Method::GET, "/api/keys/stats")?
            .query(&[("api_key", api_key), ("days", days.to_string())]);
        self.send(request, "/api/keys/stats").await
    }

    /// Revoke every key belonging to `user_id`
    ///
    /// POST /api/keys/revoke
    pub async fn revoke_keys(&self, user_id: &str) -> Result<KeyRevocation> {
        let api_key = self.credentials.require().await?;

        let form = Form::new()
            .text("api_key", api_key)
            .text("user_id", user_id.to_string());
        let request = self
            .request(Method::POST, "/api/keys/revoke")?
            .multipart(form);
        self.send(request, "/api/keys/revoke").await
    }

    /// Classify an image, returning the `top_k` best labels
    ///
    /// POST /api/classify
    pub async fn classify_image(
        &self,
        image: ImageUpload,
        top_k: Option<u32>,
    ) -> Result<Classification> {
        let api_key = self.credentials.require().await?;
        let top_k = top_k.unwrap_or(REQUEST_DEFAULTS.top_k);

        debug!(
            file_name = %image.file_name(),
            mime_type = %image.mime_type(),
            size = image.len(),
            top_k,
            "Classifying image"
        );

        let form = Form::new()
            .part(self.config.image_field.clone(), image.into_part()?)
            .text("api_key", api_key)
            .text("top_k", top_k.to_string());
        let request = self.request(Method::POST, "/api/classify")?.multipart(form);
        self.send(request, "/api/classify").await
    }

    /// Page through the category list
    ///
    /// GET /api/categories
    pub async fn list_categories(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<CategoryPage> {
        let query = self
            .with_optional_key(vec![
                (
                    "limit",
                    limit.unwrap_or(REQUEST_DEFAULTS.category_limit).to_string(),
                ),
                (
                    "offset",
                    offset
                        .unwrap_or(REQUEST_DEFAULTS.category_offset)
                        .to_string(),
                ),
            ])
            .await;

        let request = self.request(Method::GET, "/api/categories")?.query(&query);
        self.send(request, "/api/categories").await
    }

    /// Find categories semantically close to `query`
    ///
    /// GET /api/categories/search
    pub async fn search_categories(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<CategorySearch> {
        let params = self
            .with_optional_key(vec![
                ("query", query.to_string()),
                (
                    "limit",
                    limit.unwrap_or(REQUEST_DEFAULTS.search_limit).to_string(),
                ),
            ])
            .await;

        let request = self
            .request(Method::GET, "/api/categories/search")?
            .query(&params);
        self.send(request, "/api/categories/search").await
    }

    async fn post_category(
        &self,
        category: &str,
        description: Option<&str>,
    ) -> Result<CategoryChange> {
        let api_key = self.credentials.require().await?;

        let mut form = Form::new().text("category", category.to_string());
        if let Some(description) = description {
            form = form.text("description", description.to_string());
        }
        form = form.text("api_key", api_key);

        let request = self
            .request(Method::POST, "/api/categories/add")?
            .multipart(form);
        let change: CategoryChange = self.send(request, "/api/categories/add").await?;

        info!(category, total = ?change.total_categories, "Added category");
        Ok(change)
    }

    /// Add a custom category
    ///
    /// POST /api/categories/add
    pub async fn add_category(&self, category: &str) -> Result<CategoryChange> {
        self.post_category(category, None).await
    }

    /// Add a custom category with a description used for its text embedding
    pub async fn add_category_with_description(
        &self,
        category: &str,
        description: &str,
    ) -> Result<CategoryChange> {
        self.post_category(category, Some(description)).await
    }

    /// Remove a category
    ///
    /// DELETE /api/categories/remove
    pub async fn remove_category(&self, category: &str) -> Result<CategoryChange> {
        let api_key = self.credentials.require().await?;

        let form = Form::new()
            .text("category", category.to_string())
            .text("api_key", api_key);
        let request = self
            .request(Method::DELETE, "/api/categories/remove")?
            .multipart(form);
        let change: CategoryChange = self.send(request, "/api/categories/remove").await?;

        info!(category, total = ?change.total_categories, "Removed category");
        Ok(change)
    }

    /// Ask the server to write its category set to a file
    ///
    /// POST /api/categories/save
    pub async fn save_categories(&self, filepath: Option<&str>) -> Result<CategoryFile> {
        let api_key = self.credentials.require().await?;

        let form = Form::new()
            .text(
                "filepath",
                filepath.unwrap_or(DEFAULT_CATEGORY_FILE).to_string(),
            )
            .text("api_key", api_key);
        let request = self
            .request(Method::POST, "/api/categories/save")?
            .multipart(form);
        self.send(request, "/api/categories/save").await
    }

    /// Ask the server to replace its category set from a file
    ///
    /// POST /api/categories/load
    pub async fn load_categories(&self, filepath: &str) -> Result<CategoryFile> {
        let api_key = self.credentials.require().await?;

        let form = Form::new()
            .text("filepath", filepath.to_string())
            .text("api_key", api_key);
        let request = self
            .request(Method::POST, "/api/categories/load")?
            .multipart(form);
        self.send(request, "/api/categories/load").await
    }

    /// Service statistics
    ///
    /// GET /api/stats
    pub async fn get_stats(&self) -> Result<Stats> {
        let query = self.with_optional_key(Vec::new()).await;
        let request = Self::with_query(self.request(Method::GET, "/api/stats")?, &query);
        self.send(request, "/api/stats").await
    }

    /// Available classifier models
    ///
    /// GET /api/models
    pub async fn list_models(&self) -> Result<ModelList> {
        let query = self.with_optional_key(Vec::new()).await;
        let request = Self::with_query(self.request(Method::GET, "/api/models")?, &query);
        self.send(request, "/api/models").await
    }

    /// Service banner
    ///
    /// GET /
    pub async fn service_info(&self) -> Result<ServiceInfo> {
        let request = self.request(Method::GET, "/")?;
        self.send(request, "/").await
    }

    /// Server health
    ///
    /// GET /health
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let request = self.request(Method::GET, "/health")?;
        self.send(request, "/health").await
    }
}
