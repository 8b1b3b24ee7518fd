use crate::services::storage_service::DEFAULT_CHUNK_SIZE;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub chunk_size: usize,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
}

// The secret stays out of the startup log.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("chunk_size", &self.chunk_size)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Authenticated chunked audio store")]
pub struct Args {
    /// Host to bind to (overrides AUDIO_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides AUDIO_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides AUDIO_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// HS256 secret for access tokens (overrides AUDIO_STORE_JWT_SECRET / JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Chunk size in bytes for new uploads (overrides AUDIO_STORE_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Largest accepted upload body (overrides AUDIO_STORE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Per-request timeout in seconds (overrides AUDIO_STORE_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args(args)?, migrate))
    }

    /// Merge parsed CLI args over environment values and defaults.
    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("AUDIO_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_db = env::var("AUDIO_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/audio_store.db".into());
        let env_secret = env::var("AUDIO_STORE_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .ok();

        // --- Merge ---
        let jwt_secret = match args.jwt_secret.or(env_secret) {
            Some(secret) if !secret.is_empty() => secret,
            _ => bail!("a JWT secret is required (--jwt-secret or AUDIO_STORE_JWT_SECRET)"),
        };

        let chunk_size = match args.chunk_size {
            Some(value) => value,
            None => env_parse("AUDIO_STORE_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
        };
        if chunk_size == 0 {
            bail!("chunk size must be greater than zero");
        }

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: match args.port {
                Some(port) => port,
                None => env_parse("AUDIO_STORE_PORT", 4000)?,
            },
            database_url: args.database_url.unwrap_or(env_db),
            jwt_secret,
            chunk_size,
            max_upload_bytes: match args.max_upload_bytes {
                Some(value) => value,
                None => env_parse("AUDIO_STORE_MAX_UPLOAD_BYTES", 64 * 1024 * 1024)?,
            },
            request_timeout: Duration::from_secs(match args.request_timeout_secs {
                Some(value) => value,
                None => env_parse("AUDIO_STORE_REQUEST_TIMEOUT_SECS", 30)?,
            }),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<AppConfig> {
        let mut full = vec!["audio-store"];
        full.extend_from_slice(argv);
        AppConfig::from_args(Args::try_parse_from(full)?)
    }

    #[test]
    fn cli_values_win() {
        let cfg = parse(&[
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--database-url",
            "sqlite::memory:",
            "--jwt-secret",
            "s3cret",
            "--chunk-size",
            "4",
            "--max-upload-bytes",
            "100",
            "--request-timeout-secs",
            "5",
        ])
        .unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.chunk_size, 4);
        assert_eq!(cfg.max_upload_bytes, 100);
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(parse(&["--jwt-secret", "s", "--chunk-size", "0"]).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(parse(&["--jwt-secret", ""]).is_err());
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let cfg = parse(&["--jwt-secret", "hunter2", "--port", "1"]).unwrap();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
