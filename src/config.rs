//! Configuration management for herakles-app-metrics.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use ahash::AHashSet as HashSet;
use herakles_app_metrics::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{Args, ConfigFormat, StoreBackend};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_MAX_LABEL_SETS: usize = 10_000;
pub const DEFAULT_DISK_MIN_FREE_RATIO: f64 = 0.1;

/// Shared store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory" (single process) or "file" (shared across processes)
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Store file path, required for the file backend
    pub path: Option<PathBuf>,

    /// Give up acquiring the file lock after this many milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Application identity reported under `application`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_app_description")]
    pub description: String,
    #[serde(default = "default_app_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}
fn default_app_description() -> String {
    env!("CARGO_PKG_DESCRIPTION").to_string()
}
fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
fn default_environment() -> String {
    "prod".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            description: default_app_description(),
            version: default_app_version(),
            environment: default_environment(),
        }
    }
}

/// Which status report section a dependency probe feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencySection {
    Database,
    Cache,
    /// Health component only
    Other,
}

/// A TCP reachability probe for an external dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    pub name: String,
    pub section: DependencySection,
    /// `host:port`
    pub address: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging
    pub log_level: Option<String>,

    // Registry
    pub max_label_sets: Option<usize>,

    // Output
    pub default_format: Option<OutputFormat>,
    /// Families whose name starts with this prefix form the JSON `http` section
    pub status_prefix: Option<String>,

    // Disk health
    pub disk_path: Option<PathBuf>,
    pub disk_min_free_ratio: Option<f64>,

    // Nested sections (kept last for TOML output)
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            log_level: Some("info".into()),
            max_label_sets: Some(DEFAULT_MAX_LABEL_SETS),
            default_format: Some(OutputFormat::Prometheus),
            status_prefix: Some(herakles_app_metrics::status::DEFAULT_STATUS_PREFIX.to_string()),
            disk_path: Some(PathBuf::from("/")),
            disk_min_free_ratio: Some(DEFAULT_DISK_MIN_FREE_RATIO),
            store: StoreConfig::default(),
            application: ApplicationConfig::default(),
            dependencies: Vec::new(),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // Store validation
    if cfg.store.backend == StoreBackend::File {
        match cfg.store.path.as_deref() {
            None => return Err("store backend is 'file' but store.path is not set".into()),
            Some(p) if p.as_os_str().is_empty() => {
                return Err("store backend is 'file' but store.path is empty".into());
            }
            Some(_) => {}
        }
    }
    if cfg.store.lock_timeout_ms == 0 {
        return Err("store.lock_timeout_ms must be greater than 0".into());
    }

    if let Some(ratio) = cfg.disk_min_free_ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(format!(
                "disk_min_free_ratio must be between 0 and 1, got {}",
                ratio
            )
            .into());
        }
    }

    if cfg.application.name.trim().is_empty() {
        return Err("application.name must not be empty".into());
    }

    // Dependency validation
    let mut seen = HashSet::new();
    for dep in &cfg.dependencies {
        if !seen.insert(dep.name.as_str()) {
            return Err(format!("Duplicate dependency name '{}'", dep.name).into());
        }
        if !is_host_port(&dep.address) {
            return Err(format!(
                "Dependency '{}' has invalid address '{}', expected host:port",
                dep.name, dep.address
            )
            .into());
        }
        if dep.timeout_ms == 0 {
            return Err(format!("Dependency '{}' has timeout_ms = 0", dep.name).into());
        }
    }

    Ok(())
}

/// Accepts `ip:port`, `[v6]:port` and `hostname:port`.
fn is_host_port(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Store overrides
    if let Some(backend) = args.store {
        config.store.backend = backend;
    }
    if let Some(path) = &args.store_path {
        config.store.path = Some(path.clone());
    }

    if let Some(limit) = args.max_label_sets {
        config.max_label_sets = Some(limit);
    }
    if let Some(env) = &args.environment {
        config.application.environment = env.clone();
    }
    if let Some(format) = args.default_format {
        config.default_format = Some(format);
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/app-metrics.yaml",
            "/etc/herakles/app-metrics.yml",
            "/etc/herakles/app-metrics.json",
            "./herakles-app-metrics.yaml",
            "./herakles-app-metrics.yml",
            "./herakles-app-metrics.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str, address: &str) -> DependencyConfig {
        DependencyConfig {
            name: name.into(),
            section: DependencySection::Database,
            address: address.into(),
            timeout_ms: 100,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_file_backend_requires_path() {
        let mut cfg = Config::default();
        cfg.store.backend = StoreBackend::File;
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("store.path is not set"));

        cfg.store.path = Some(PathBuf::from("/tmp/metrics.json"));
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn test_disk_ratio_bounds() {
        let mut cfg = Config::default();
        cfg.disk_min_free_ratio = Some(1.5);
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_dependency_validation() {
        let mut cfg = Config::default();
        cfg.dependencies = vec![dep("db", "db.internal:5432"), dep("cache", "[::1]:6379")];
        assert!(validate_effective_config(&cfg).is_ok());

        cfg.dependencies.push(dep("db", "127.0.0.1:5432"));
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("Duplicate dependency name 'db'"));

        cfg.dependencies = vec![dep("db", "no-port")];
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "port: 9300\nstore:\n  backend: file\n  path: /tmp/m.json\napplication:\n  name: shop\n",
        )
        .unwrap();
        assert_eq!(cfg.port, Some(9300));
        assert_eq!(cfg.store.backend, StoreBackend::File);
        assert_eq!(cfg.store.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
        assert_eq!(cfg.application.name, "shop");
        assert_eq!(cfg.application.environment, "prod");
        assert!(cfg.dependencies.is_empty());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut cfg = Config::default();
        cfg.dependencies = vec![dep("db", "db:5432")];
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.dependencies.len(), 1);
        assert_eq!(back.port, Some(DEFAULT_PORT));
    }
}
