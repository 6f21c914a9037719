//! Runtime configuration.
//!
//! Everything the API client, the grade loader and the upload pipeline need is
//! collected once at start-up into a `Config` and handed to constructors. Values
//! come from the process environment (optionally seeded from a `.env` file).

use crate::error::{AppError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_ALLOWED_EXTENSIONS: [&str; 8] = [
    ".pdf", ".md", ".txt", ".docx", ".png", ".jpg", ".mp3", ".wav",
];

/// Top-level configuration for a shell session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Canvas instance root, e.g. `https://school.instructure.com` (no trailing slash).
    pub base_url: String,
    /// Bearer token sent with every API call.
    pub token: String,
    /// Timeout applied to ordinary API requests.
    pub request_timeout: Duration,
    pub upload: UploadLimits,
    pub polling: PollSettings,
    pub converter: ConverterSettings,
}

/// Checks applied to a file before it is sent to the file store.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_file_size_mb: u64,
    /// Lowercase extensions including the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Timeout for the multipart transfer itself.
    pub timeout: Duration,
}

/// How the grade submission job is polled.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    /// Multiplier applied to the interval after each poll; `1.0` keeps it fixed.
    pub backoff: f64,
    pub max_interval: Duration,
    /// Total time to wait for a terminal state before giving up.
    pub timeout: Duration,
}

/// External Markdown to PDF converter.
#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub program: String,
    pub pdf_engine: Option<String>,
    pub timeout: Duration,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl UploadLimits {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Whether `extension` (with or without leading dot, any case) may be uploaded.
    pub fn allows(&self, extension: &str) -> bool {
        let normalized = format!(".{}", extension.trim_start_matches('.').to_lowercase());
        self.allowed_extensions.iter().any(|ext| *ext == normalized)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            backoff: 1.0,
            max_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
        }
    }
}

impl PollSettings {
    /// Rejects a zero interval and a cap below the starting interval.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(AppError::Config(
                "CANVAS_POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        if self.max_interval < self.interval {
            return Err(AppError::Config(format!(
                "CANVAS_POLL_MAX_INTERVAL_SECS ({}s) must not be below CANVAS_POLL_INTERVAL_SECS ({}s)",
                self.max_interval.as_secs(),
                self.interval.as_secs()
            )));
        }
        Ok(())
    }

    /// Interval to wait before the poll following one that waited `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff <= 1.0 {
            return current;
        }
        current.mul_f64(self.backoff).min(self.max_interval)
    }
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
            pdf_engine: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Builds a configuration with defaults for everything except the connection.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            request_timeout: Duration::from_secs(30),
            upload: UploadLimits::default(),
            polling: PollSettings::default(),
            converter: ConverterSettings::default(),
        }
    }

    /// Loads the configuration from `CANVAS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        // Load environment variables
        dotenv::dotenv().ok();

        let base_url = env::var("CANVAS_BASE_URL").map_err(|e| {
            error!("CANVAS_BASE_URL environment variable not set: {}", e);
            AppError::Env(e)
        })?;
        let token = env::var("CANVAS_TOKEN").map_err(|e| {
            error!("CANVAS_TOKEN environment variable not set: {}", e);
            AppError::Env(e)
        })?;

        let mut config = Config::new(base_url, token);

        if let Some(secs) = parse_var::<u64>("CANVAS_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(mb) = parse_var::<u64>("CANVAS_MAX_FILE_SIZE_MB")? {
            config.upload.max_file_size_mb = mb;
        }
        if let Some(list) = optional_var("CANVAS_ALLOWED_EXTENSIONS") {
            config.upload.allowed_extensions = parse_extensions(&list);
        }
        if let Some(secs) = parse_var::<u64>("CANVAS_UPLOAD_TIMEOUT_SECS")? {
            config.upload.timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64>("CANVAS_POLL_INTERVAL_SECS")? {
            config.polling.interval = Duration::from_secs(secs);
        }
        if let Some(factor) = parse_var::<f64>("CANVAS_POLL_BACKOFF")? {
            if !factor.is_finite() || factor < 1.0 {
                return Err(AppError::Config(format!(
                    "CANVAS_POLL_BACKOFF must be >= 1.0, got {}",
                    factor
                )));
            }
            config.polling.backoff = factor;
        }
        if let Some(secs) = parse_var::<u64>("CANVAS_POLL_MAX_INTERVAL_SECS")? {
            config.polling.max_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("CANVAS_POLL_TIMEOUT_SECS")? {
            config.polling.timeout = Duration::from_secs(secs);
        }
        config.polling.validate()?;

        if let Some(program) = optional_var("CANVAS_PANDOC") {
            config.converter.program = program;
        }
        config.converter.pdf_engine = optional_var("CANVAS_PDF_ENGINE");
        if let Some(secs) = parse_var::<u64>("CANVAS_CONVERT_TIMEOUT_SECS")? {
            config.converter.timeout = Duration::from_secs(secs);
        }

        debug!("Loaded configuration for {}", config.base_url);
        Ok(config)
    }
}

/// Reads a variable, treating unset and blank the same.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match optional_var(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has an invalid value: '{}'", name, raw))),
    }
}

/// Splits a comma separated extension list into normalized `.ext` entries.
fn parse_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
        .collect()
}
