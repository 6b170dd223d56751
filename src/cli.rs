//! CLI arguments and subcommands for herakles-app-metrics.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use herakles_app_metrics::OutputFormat;
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Shared store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-app-metrics",
    about = "Application metrics with Prometheus exposition and a JSON status report",
    long_about = "Application metrics with Prometheus exposition and a JSON status report.\n\n\
                  Request, process and runtime metrics are aggregated in a shared store so \
                  that several worker processes can record into the same counters, gauges and \
                  histograms. /metrics serves Prometheus text or, on request, an actuator-style \
                  JSON report with health, system and memory sections.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version,
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-app-metrics - Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Shared store backend
    #[arg(long, value_enum)]
    pub store: Option<StoreBackend>,

    /// Path of the shared store file (file backend)
    #[arg(long)]
    pub store_path: Option<PathBuf>,

    /// Maximum distinct label sets per metric family (0 = unlimited)
    #[arg(long)]
    pub max_label_sets: Option<usize>,

    /// Deployment environment reported in the status report
    #[arg(long)]
    pub environment: Option<String>,

    /// Format served by /metrics when the request does not ask for one
    #[arg(long)]
    pub default_format: Option<OutputFormat>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one collection cycle and print the rendered output
    Render {
        /// Output format
        #[arg(long, default_value = "prometheus")]
        format: OutputFormat,

        /// Print only this top-level key of the JSON report
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Record one completed request into the shared store
    Record {
        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Route pattern (keep it bounded, e.g. /users/{id})
        #[arg(long)]
        endpoint: String,

        /// Final HTTP status code
        #[arg(long, default_value_t = 200)]
        status: u16,

        /// Request duration in milliseconds
        #[arg(long, default_value_t = 0)]
        duration_ms: u64,
    },
}
