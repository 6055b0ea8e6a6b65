use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; CLI wins.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub s3: S3Settings,
    /// Lifetime of presigned upload URLs.
    pub upload_url_ttl: Duration,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Email of the account every request acts as.
    pub local_user_email: String,
}

/// Connection details for the S3-compatible photo bucket.
#[derive(Clone)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    pub force_path_style: bool,
    /// Upper bound on any single store request.
    pub timeout: Duration,
}

// Keeps the secret key out of the startup log line.
impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("bucket", &self.bucket)
            .field("force_path_style", &self.force_path_style)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo catalogue and album API")]
pub struct Args {
    /// Host to bind to (overrides MOMENTS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MOMENTS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides MOMENTS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// S3 endpoint, e.g. a local MinIO (overrides MOMENTS_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// S3 region (overrides MOMENTS_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// S3 access key (overrides MOMENTS_S3_ACCESS_KEY)
    #[arg(long)]
    pub s3_access_key: Option<String>,

    /// S3 secret key (overrides MOMENTS_S3_SECRET_KEY)
    #[arg(long)]
    pub s3_secret_key: Option<String>,

    /// Photo bucket name (overrides MOMENTS_S3_BUCKET_PHOTOS)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Path-style bucket addressing, `true` or `false` (overrides MOMENTS_S3_FORCE_PATH_STYLE)
    #[arg(long)]
    pub s3_force_path_style: Option<bool>,

    /// Per-request object store timeout in seconds (overrides MOMENTS_S3_TIMEOUT_SECS)
    #[arg(long)]
    pub s3_timeout_secs: Option<u64>,

    /// Presigned upload URL lifetime in seconds (overrides MOMENTS_UPLOAD_URL_TTL_SECS)
    #[arg(long)]
    pub upload_url_ttl_secs: Option<u64>,

    /// Comma-separated allowed CORS origins (overrides MOMENTS_CORS_ORIGINS)
    #[arg(long)]
    pub cors_origins: Option<String>,

    /// Email of the local account (overrides MOMENTS_LOCAL_USER_EMAIL)
    #[arg(long)]
    pub local_user_email: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    /// CLI values win; environment values fill the gaps; then defaults.
    fn merge(args: Args) -> Result<Self> {
        let s3 = S3Settings {
            endpoint: args.s3_endpoint.or_else(|| env_opt("MOMENTS_S3_ENDPOINT")),
            region: args
                .s3_region
                .unwrap_or_else(|| env_or("MOMENTS_S3_REGION", "us-east-1")),
            access_key: args.s3_access_key.or_else(|| env_opt("MOMENTS_S3_ACCESS_KEY")),
            secret_key: args.s3_secret_key.or_else(|| env_opt("MOMENTS_S3_SECRET_KEY")),
            bucket: args
                .s3_bucket
                .unwrap_or_else(|| env_or("MOMENTS_S3_BUCKET_PHOTOS", "photos")),
            force_path_style: match args.s3_force_path_style {
                Some(value) => value,
                None => env_parse("MOMENTS_S3_FORCE_PATH_STYLE", true)?,
            },
            timeout: Duration::from_secs(match args.s3_timeout_secs {
                Some(secs) => secs,
                None => env_parse("MOMENTS_S3_TIMEOUT_SECS", 5u64)?,
            }),
        };

        let cors_origins = args
            .cors_origins
            .or_else(|| env_opt("MOMENTS_CORS_ORIGINS"))
            .map(|raw| split_origins(&raw))
            .unwrap_or_default();

        Ok(Self {
            host: args
                .host
                .unwrap_or_else(|| env_or("MOMENTS_HOST", "127.0.0.1")),
            port: match args.port {
                Some(port) => port,
                None => env_parse("MOMENTS_PORT", 8173u16)?,
            },
            database_url: args
                .database_url
                .unwrap_or_else(|| env_or("MOMENTS_DATABASE_URL", "sqlite://data/app.db")),
            s3,
            upload_url_ttl: Duration::from_secs(match args.upload_url_ttl_secs {
                Some(secs) => secs,
                None => env_parse("MOMENTS_UPLOAD_URL_TTL_SECS", 600u64)?,
            }),
            cors_origins,
            local_user_email: args
                .local_user_email
                .unwrap_or_else(|| env_or("MOMENTS_LOCAL_USER_EMAIL", "local@example.com")),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `*` or an empty list means any origin.
fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty() && *o != "*")
        .map(String::from)
        .collect()
}

/// Non-empty value of `key`, if set.
fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(default),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {key} value `{value}`")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {key}")),
    }
}
