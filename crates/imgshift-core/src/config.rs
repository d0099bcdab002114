use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_FILE_SIZE_MB: u64 = 10;
/// Largest accepted MAX_FILE_SIZE_MB; each upload is read whole into memory for decoding.
const MAX_FILE_SIZE_MB_CEILING: u64 = 1024;
const SERVER_PORT: u16 = 3000;
const SCRATCH_DIR: &str = "./tmp";
const STRIPE_API_BASE: &str = "https://api.stripe.com";
const PAYMENT_CURRENCY: &str = "usd";
const PUBLIC_BASE_URL: &str = "http://localhost:3000";
const TRANSCODE_TIMEOUT_SECS: u64 = 30;
const PAYMENT_TIMEOUT_SECS: u64 = 15;
const HTTP_CONCURRENCY_LIMIT: usize = 1024;

/// Process-wide configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    server_port: u16,
    environment: String,
    cors_origins: Vec<String>,
    max_file_size_mb: u64,
    scratch_dir: PathBuf,
    stripe_secret_key: String,
    stripe_api_base: String,
    payment_currency: String,
    public_base_url: String,
    transcode_timeout_secs: u64,
    payment_timeout_secs: u64,
    http_concurrency_limit: usize,
}

impl Config {
    /// Load configuration from the process environment (and `.env`, when present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// `from_env` is a thin wrapper over this; tests feed a map instead of mutating
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port = lookup("PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(SERVER_PORT);

        let max_file_size_mb = lookup("MAX_FILE_SIZE_MB")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(MAX_FILE_SIZE_MB);

        let scratch_dir = lookup("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(SCRATCH_DIR));

        let stripe_secret_key = lookup("STRIPE_SECRET_KEY")
            .ok_or_else(|| anyhow::anyhow!("STRIPE_SECRET_KEY environment variable not set"))?;

        let stripe_api_base = lookup("STRIPE_API_BASE")
            .unwrap_or_else(|| STRIPE_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let payment_currency = lookup("PAYMENT_CURRENCY")
            .unwrap_or_else(|| PAYMENT_CURRENCY.to_string())
            .to_lowercase();

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| PUBLIC_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let transcode_timeout_secs = lookup("TRANSCODE_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(TRANSCODE_TIMEOUT_SECS);

        let payment_timeout_secs = lookup("PAYMENT_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(PAYMENT_TIMEOUT_SECS);

        let http_concurrency_limit = lookup("HTTP_CONCURRENCY_LIMIT")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(HTTP_CONCURRENCY_LIMIT)
            .max(1);

        Ok(Config {
            server_port,
            environment,
            cors_origins,
            max_file_size_mb,
            scratch_dir,
            stripe_secret_key,
            stripe_api_base,
            payment_currency,
            public_base_url,
            transcode_timeout_secs,
            payment_timeout_secs,
            http_concurrency_limit,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.stripe_secret_key.trim().is_empty() {
            return Err(anyhow::anyhow!("STRIPE_SECRET_KEY must not be empty"));
        }

        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_file_size_mb > MAX_FILE_SIZE_MB_CEILING {
            return Err(anyhow::anyhow!(
                "MAX_FILE_SIZE_MB must be at most {}",
                MAX_FILE_SIZE_MB_CEILING
            ));
        }

        if self.transcode_timeout_secs == 0 || self.payment_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "TRANSCODE_TIMEOUT_SECS and PAYMENT_TIMEOUT_SECS must be greater than 0"
            ));
        }

        for (name, url) in [
            ("STRIPE_API_BASE", &self.stripe_api_base),
            ("PUBLIC_BASE_URL", &self.public_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!("{} must be an http(s) URL", name));
            }
        }

        if self.is_production() && !self.stripe_api_base.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "STRIPE_API_BASE must use https in production"
            ));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn stripe_secret_key(&self) -> &str {
        &self.stripe_secret_key
    }

    pub fn stripe_api_base(&self) -> &str {
        &self.stripe_api_base
    }

    pub fn payment_currency(&self) -> &str {
        &self.payment_currency
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.http_concurrency_limit
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field("environment", &self.environment)
            .field("cors_origins", &self.cors_origins)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("scratch_dir", &self.scratch_dir)
            .field("stripe_secret_key", &"[REDACTED]")
            .field("stripe_api_base", &self.stripe_api_base)
            .field("payment_currency", &self.payment_currency)
            .field("public_base_url", &self.public_base_url)
            .field("transcode_timeout_secs", &self.transcode_timeout_secs)
            .field("payment_timeout_secs", &self.payment_timeout_secs)
            .field("http_concurrency_limit", &self.http_concurrency_limit)
            .finish()
    }
}
