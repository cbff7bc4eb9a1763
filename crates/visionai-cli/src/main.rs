//! VisionAI CLI - Command-line interface for the VisionAI Pro classification API
//!
//! Usage:
//!     visionai [OPTIONS] <COMMAND>
//!
//! Environment Variables:
//!     VISIONAI_BASE_URL: API server base URL (default: http://localhost:8002)
//!     VISIONAI_API_KEY: API key for authenticated endpoints
//!     VISIONAI_TIMEOUT_SECS: Per-request timeout in seconds (default: none)
//!     VISIONAI_TOP_K / VISIONAI_CATEGORY_LIMIT / VISIONAI_SEARCH_LIMIT: request defaults

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vision_client::{
    mask_key, Classification, ClientConfig, ImageUpload, KeyRequest, ResultSaver,
    SecureKeyRequest, VisionClient,
};

/// VisionAI Pro - zero-shot image classification client
#[derive(Parser, Debug)]
#[command(name = "visionai")]
#[command(about = "VisionAI Pro - zero-shot image classification client")]
#[command(after_help = r#"Examples:
    # Check the server
    visionai health

    # Create an API key (printed so it can be exported as VISIONAI_API_KEY)
    visionai keygen MyApp --email user@example.com

    # Classify images with a key
    visionai --api-key <KEY> classify cat.jpg dog.png --top-k 3

    # Save classification results to disk
    visionai classify photos/*.jpg --save-dir results

    # Search categories
    visionai search "animal"

    # Add and remove a custom category
    visionai add my_custom_category --description "hand-made furniture"
    visionai remove my_custom_category
"#)]
struct Cli {
    /// API server base URL
    #[arg(long, env = "VISIONAI_BASE_URL", default_value = "http://localhost:8002", global = true)]
    base_url: String,

    /// API key for authenticated endpoints
    #[arg(long, env = "VISIONAI_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "VISIONAI_TIMEOUT_SECS", global = true)]
    timeout: Option<u64>,

    /// Multipart field name for image uploads
    #[arg(long, env = "VISIONAI_IMAGE_FIELD", default_value = "image", global = true)]
    image_field: String,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Suppress everything except results and errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new API key
    Keygen {
        /// Client application name
        client_name: String,
        /// Contact email
        #[arg(long)]
        email: Option<String>,
        /// Key description
        #[arg(long)]
        description: Option<String>,
    },

    /// Generate a key with permissions, expiry and IP whitelist
    SecureKeygen {
        /// Client application name
        client_name: String,
        /// Comma-separated permissions
        #[arg(long, value_delimiter = ',', default_value = "classify")]
        permissions: Vec<String>,
        /// Days until the key expires
        #[arg(long, default_value = "365")]
        expires_days: u32,
        /// Comma-separated IP addresses allowed to use the key
        #[arg(long, value_delimiter = ',')]
        ip_whitelist: Vec<String>,
    },

    /// Validate an API key (the configured key if none given)
    Validate {
        /// Key to validate
        key: Option<String>,
    },

    /// Classify one or more images
    Classify {
        /// Image files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Number of predictions per image
        #[arg(long)]
        top_k: Option<u32>,
        /// Directory to save results (creates timestamped subdirectory per session)
        #[arg(long, env = "VISIONAI_SAVE_DIR")]
        save_dir: Option<PathBuf>,
        /// Maximum uploads in flight at once
        #[arg(long, env = "VISIONAI_CONCURRENCY", default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: u16,
    },

    /// List categories
    Categories {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },

    /// Search categories
    Search {
        query: String,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Add a custom category
    Add {
        category: String,
        /// Description used for the category's text embedding
        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a category
    Remove { category: String },

    /// Show service statistics
    Stats,

    /// Check server health
    Health,

    /// Show the service banner
    Info,

    /// List available models
    Models,

    /// Show usage statistics for the configured key
    KeyStats {
        #[arg(long)]
        days: Option<u32>,
    },

    /// Revoke all keys of a user
    Revoke { user_id: String },

    /// Save the server's categories to a file on the server
    SaveCategories { filepath: Option<String> },

    /// Load the server's categories from a file on the server
    LoadCategories { filepath: String },
}

/// Initialize tracing, honouring RUST_LOG when set
fn init_tracing(args: &Cli) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the API client from command-line options
fn build_client(args: &Cli) -> Result<VisionClient> {
    let mut config = ClientConfig::new(&args.base_url).with_image_field(&args.image_field);
    if let Some(key) = args.api_key.as_deref().filter(|k| !k.is_empty()) {
        config = config.with_api_key(key);
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    VisionClient::new(config).with_context(|| format!("Invalid base URL: {}", args.base_url))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a classification result as a ranked list
fn print_classification(name: &str, result: &Classification) {
    println!("{}", "=".repeat(50));
    println!("Image: {}", name);
    if let Some(time) = result.processing_time {
        println!("Processing time: {:.3}s", time);
    }
    println!("{}", "-".repeat(50));
    if result.predictions.is_empty() {
        println!("  (no predictions)");
    }
    for (i, prediction) in result.predictions.iter().enumerate() {
        println!(
            "  {}. {:<30} {:>6.2}%",
            i + 1,
            prediction.category,
            prediction.percent()
        );
    }
}

/// Print a list of names, numbered
fn print_names(names: &[String], start: usize) {
    for (i, name) in names.iter().enumerate() {
        println!("  {:>4}. {}", start + i + 1, name);
    }
}

/// Classify several files concurrently, optionally saving each result
async fn run_classify(
    client: &VisionClient,
    files: &[PathBuf],
    top_k: Option<u32>,
    save_dir: Option<&PathBuf>,
    concurrency: usize,
    json: bool,
) -> Result<()> {
    if !client.has_api_key().await {
        return Err(anyhow!(
            "An API key is required. Run `visionai keygen <NAME>` and pass it with --api-key or VISIONAI_API_KEY."
        ));
    }

    let mut saver = match save_dir {
        Some(dir) => Some(
            ResultSaver::new(dir)
                .await
                .with_context(|| format!("Cannot create result directory {}", dir.display()))?,
        ),
        None => None,
    };

    // Images are read lazily so at most `concurrency` are held in memory
    let mut results = stream::iter(files)
        .map(|path| async move {
            let upload = ImageUpload::from_path(path)
                .await
                .with_context(|| format!("Cannot read {}", path.display()))?;
            debug!(path = %path.display(), mime = upload.mime_type(), "Uploading image");
            let classification = client
                .classify_image(upload, top_k)
                .await
                .with_context(|| format!("Classification failed for {}", path.display()))?;
            Ok::<_, anyhow::Error>((path, classification))
        })
        .buffered(concurrency);

    let mut failures = 0;
    while let Some(result) = results.next().await {
        match result {
            Ok((path, classification)) => {
                let name = path.display().to_string();
                if json {
                    print_json(&classification)?;
                } else {
                    print_classification(&name, &classification);
                }
                if let Some(saver) = saver.as_mut() {
                    let saved = saver.save(&name, &classification).await?;
                    if !json {
                        println!("Saved: {}", saved.display());
                    }
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("\u{2717} {:#}", e);
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} of {} image(s) failed", failures, files.len()));
    }
    Ok(())
}

async fn run(args: &Cli, client: &VisionClient) -> Result<()> {
    match &args.command {
        Command::Keygen {
            client_name,
            email,
            description,
        } => {
            let mut request = KeyRequest::new(client_name);
            if let Some(email) = email {
                request = request.with_email(email);
            }
            if let Some(description) = description {
                request = request.with_description(description);
            }

            let result = client.generate_key(request).await?;
            if args.json {
                return print_json(&result);
            }
            println!("\u{2713} API key generated for {}", client_name);
            println!("  Key: {}", result.api_key.as_deref().unwrap_or_default());
            if let Some(info) = &result.usage_info {
                if let Some(rate) = &info.rate_limit {
                    println!("  Rate limit: {}", rate);
                }
                if let Some(size) = &info.max_image_size {
                    println!("  Max image size: {}", size);
                }
            }
            println!("\nExport it for later commands:");
            println!(
                "  export VISIONAI_API_KEY={}",
                result.api_key.as_deref().unwrap_or_default()
            );
        }

        Command::SecureKeygen {
            client_name,
            permissions,
            expires_days,
            ip_whitelist,
        } => {
            let request = SecureKeyRequest::new(client_name)
                .with_permissions(permissions.iter().cloned())
                .with_expires_days(*expires_days)
                .with_ip_whitelist(ip_whitelist.iter().cloned());

            let result = client.generate_secure_key(request).await?;
            if args.json {
                return print_json(&result);
            }
            println!("\u{2713} Secure API key generated for {}", client_name);
            println!("  Key: {}", result.api_key.as_deref().unwrap_or_default());
            println!("  Permissions: {}", permissions.join(", "));
            println!("  Expires in: {} days", expires_days);
        }

        Command::Validate { key } => {
            let result = client.validate_key(key.as_deref()).await?;
            if args.json {
                return print_json(&result);
            }
            if result.valid {
                println!("\u{2713} API key is valid");
                if let Some(info) = &result.key_info {
                    if let Some(name) = &info.client_name {
                        println!("  Client: {}", name);
                    }
                    if let Some(created) = info.created_at_time() {
                        println!("  Created: {}", created.format("%Y-%m-%d %H:%M:%S"));
                    }
                    if let Some(used) = info.last_used_time() {
                        println!("  Last used: {}", used.format("%Y-%m-%d %H:%M:%S"));
                    }
                    println!("  Usage count: {}", info.usage_count);
                }
            } else {
                println!(
                    "\u{2717} API key is not valid: {}",
                    result.message.as_deref().unwrap_or("no reason given")
                );
            }
        }

        Command::Classify {
            files,
            top_k,
            save_dir,
            concurrency,
        } => {
            run_classify(
                client,
                files,
                *top_k,
                save_dir.as_ref(),
                usize::from(*concurrency),
                args.json,
            )
            .await?;
        }

        Command::Categories { limit, offset } => {
            let page = client.list_categories(*limit, *offset).await?;
            if args.json {
                return print_json(&page);
            }
            let start = offset.unwrap_or(vision_client::REQUEST_DEFAULTS.category_offset) as usize;
            match page.total_count {
                Some(total) => println!("Categories ({} of {}):", page.categories.len(), total),
                None => println!("Categories ({}):", page.categories.len()),
            }
            print_names(&page.categories, start);
        }

        Command::Search { query, limit } => {
            let search = client.search_categories(query, *limit).await?;
            if args.json {
                return print_json(&search);
            }
            println!("Results for \"{}\" ({}):", query, search.results.len());
            print_names(&search.results, 0);
        }

        Command::Add {
            category,
            description,
        } => {
            let change = match description {
                Some(description) => {
                    client
                        .add_category_with_description(category, description)
                        .await?
                }
                None => client.add_category(category).await?,
            };
            if args.json {
                return print_json(&change);
            }
            println!("\u{2713} Added category '{}'", category);
            if let Some(total) = change.total_categories {
                println!("  Total categories: {}", total);
            }
        }

        Command::Remove { category } => {
            let change = client.remove_category(category).await?;
            if args.json {
                return print_json(&change);
            }
            println!("\u{2713} Removed category '{}'", category);
            if let Some(total) = change.total_categories {
                println!("  Total categories: {}", total);
            }
        }

        Command::Stats => {
            let stats = client.get_stats().await?;
            if args.json {
                return print_json(&stats);
            }
            println!("{}", "=".repeat(50));
            println!("Service statistics");
            println!("{}", "-".repeat(50));
            if let Some(total) = stats.total_categories {
                println!("Total categories: {}", total);
            }
            if let Some(model) = stats.model_type.as_deref() {
                println!("Model: {}", model);
            }
            if let Some(method) = stats.learning_method.as_deref() {
                println!("Learning method: {}", method);
            }
            if !stats.supported_formats.is_empty() {
                println!("Formats: {}", stats.supported_formats.join(", "));
            }
            if let Some(size) = stats.max_image_size.as_deref() {
                println!("Max image size: {}", size);
            }
            if let Some(info) = &stats.model_info {
                if let Some(device) = info.device.as_deref() {
                    println!("Device: {}", device);
                }
            }
        }

        Command::Health => {
            let health = client.health_check().await?;
            if args.json {
                return print_json(&health);
            }
            let status = health.status().unwrap_or("unknown");
            if health.is_healthy() {
                println!("\u{2713} Server is healthy ({})", client.base_url());
            } else {
                println!(
                    "\u{2717} Server is {} ({})",
                    status,
                    health.error().unwrap_or("no error reported")
                );
            }
            if let Some(info) = health.model_info() {
                if let Some(model) = info.model_type.as_deref() {
                    println!("  Model: {}", model);
                }
                if let Some(count) = info.categories_count {
                    println!("  Categories: {}", count);
                }
            }
            if let Some(at) = health.checked_at() {
                println!("  Checked at: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if !health.is_healthy() {
                return Err(anyhow!("Server health check reported '{}'", status));
            }
        }

        Command::Info => {
            let info = client.service_info().await?;
            if args.json {
                return print_json(&info);
            }
            println!("{}", info.message.as_deref().unwrap_or("VisionAI service"));
            if let Some(version) = info.version.as_deref() {
                println!("  Version: {}", version);
            }
            if let Some(status) = info.status.as_deref() {
                println!("  Status: {}", status);
            }
            for feature in &info.features {
                println!("  - {}", feature);
            }
        }

        Command::Models => {
            let models = client.list_models().await?;
            if args.json {
                return print_json(&models);
            }
            for model in &models.models {
                println!(
                    "  - {}: {}",
                    model.name,
                    model.description.as_deref().unwrap_or("")
                );
            }
        }

        Command::KeyStats { days } => {
            let usage = client.key_usage_stats(*days).await?;
            if args.json {
                return print_json(&usage);
            }
            println!(
                "Usage for {} over {} day(s):",
                usage.api_key.as_deref().unwrap_or("key"),
                usage.period_days.unwrap_or_default()
            );
            println!("{}", serde_json::to_string_pretty(&usage.stats)?);
        }

        Command::Revoke { user_id } => {
            let revoked = client.revoke_keys(user_id).await?;
            if args.json {
                return print_json(&revoked);
            }
            println!(
                "\u{2713} Revoked {} key(s) for {}",
                revoked.revoked_count, user_id
            );
        }

        Command::SaveCategories { filepath } => {
            let saved = client.save_categories(filepath.as_deref()).await?;
            if args.json {
                return print_json(&saved);
            }
            println!(
                "\u{2713} Saved {} categories to {}",
                saved.categories_count.unwrap_or_default(),
                saved.filepath.as_deref().unwrap_or("server file")
            );
        }

        Command::LoadCategories { filepath } => {
            let loaded = client.load_categories(filepath).await?;
            if args.json {
                return print_json(&loaded);
            }
            println!(
                "\u{2713} Loaded {} categories from {}",
                loaded.categories_count.unwrap_or_default(),
                filepath
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args);

    let client = build_client(&args)?;
    if let Some(key) = client.api_key().await {
        debug!(api_key = %mask_key(&key), "Using configured API key");
    }

    run(&args, &client).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_classify() {
        let args = Cli::try_parse_from([
            "visionai",
            "--base-url",
            "http://vision:8002",
            "classify",
            "a.jpg",
            "b.png",
            "--top-k",
            "3",
        ])
        .unwrap();

        assert_eq!(args.base_url, "http://vision:8002");
        match args.command {
            Command::Classify { files, top_k, .. } => {
                assert_eq!(files.len(), 2);
                assert_eq!(top_k, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_secure_keygen_lists() {
        let args = Cli::try_parse_from([
            "visionai",
            "secure-keygen",
            "Backend",
            "--permissions",
            "classify,admin",
            "--ip-whitelist",
            "10.0.0.1,10.0.0.2",
        ])
        .unwrap();

        match args.command {
            Command::SecureKeygen {
                permissions,
                ip_whitelist,
                expires_days,
                ..
            } => {
                assert_eq!(permissions, vec!["classify", "admin"]);
                assert_eq!(ip_whitelist, vec!["10.0.0.1", "10.0.0.2"]);
                assert_eq!(expires_days, 365);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_classify_concurrency() {
        let args = Cli::try_parse_from(["visionai", "classify", "a.jpg"]).unwrap();
        match args.command {
            Command::Classify { concurrency, .. } => assert_eq!(concurrency, 4),
            other => panic!("unexpected command: {:?}", other),
        }

        let args =
            Cli::try_parse_from(["visionai", "classify", "--concurrency", "16", "a.jpg"]).unwrap();
        match args.command {
            Command::Classify { concurrency, .. } => assert_eq!(concurrency, 16),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(
            Cli::try_parse_from(["visionai", "classify", "--concurrency", "0", "a.jpg"]).is_err()
        );
    }

    #[test]
    fn test_classify_requires_files() {
        assert!(Cli::try_parse_from(["visionai", "classify"]).is_err());
    }

    #[tokio::test]
    async fn test_build_client_with_key() {
        let args = Cli::try_parse_from([
            "visionai",
            "--api-key",
            "cli-key-12345678",
            "--timeout",
            "5",
            "health",
        ])
        .unwrap();

        let client = build_client(&args).unwrap();
        assert_eq!(client.api_key().await.as_deref(), Some("cli-key-12345678"));
        assert_eq!(client.config().timeout(), Some(Duration::from_secs(5)));
    }

    async fn health_run(body: serde_json::Value) -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let uri = server.uri();
        let args = Cli::try_parse_from(["visionai", "--base-url", uri.as_str(), "health"]).unwrap();
        let client = build_client(&args).unwrap();
        run(&args, &client).await
    }

    #[tokio::test]
    async fn test_health_command_exit_status() {
        assert!(health_run(json!({"status": "healthy", "timestamp": "2024-05-01 08:00:00.123456"}))
            .await
            .is_ok());

        let err = health_run(json!({"status": "unhealthy", "error": "model not loaded"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unhealthy"));
    }
}
