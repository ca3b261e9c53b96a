//! Config & bootstrap: environment variables and `clap`-derived CLI
//! flags merged into one `Config`, flags winning over env vars. A missing
//! bucket after merge is `MegError::ConfigError`, which `main` turns into
//! `exit(1)`.

use crate::error::{MegError, Result};
use crate::store::aws::parse_bucket_url;
use clap::Parser;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Which `CacheProvider` backend to construct. Only `InMemory` is wired
/// up to an actual implementation in this crate; `Redis` is parsed so the
/// flag's documented surface is exposed either way, but constructing one
/// requires a redis client this crate does not depend on, so selecting it
/// is a `ConfigError` rather than a silently-substituted in-memory cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    InMemory,
    Redis(String),
}

impl CacheBackend {
    fn parse(raw: &str) -> Result<Self> {
        if raw == "in-memory" {
            return Ok(CacheBackend::InMemory);
        }
        if let Some(url) = raw.strip_prefix("redis:") {
            return Ok(CacheBackend::Redis(url.to_string()));
        }
        Err(MegError::ConfigError(format!(
            "unrecognized --cache value {raw:?}; expected \"in-memory\" or \"redis:<url>\""
        )))
    }
}

/// CLI flags. Environment variables are read separately in
/// `Config::load` and filled in only where the corresponding flag was
/// not passed.
#[derive(Parser, Debug)]
#[command(name = "meg", about = "Serve files inside archives on an S3-compatible store over HTTP")]
struct Cli {
    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    access_key: Option<String>,

    #[arg(long)]
    secret_key: Option<String>,

    #[arg(long)]
    bucket: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long, default_value = "in-memory")]
    cache: String,

    #[arg(long, default_value_t = false)]
    force_download: bool,

    #[arg(long)]
    endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    pub host: String,
    pub port: u16,
    pub cache: CacheBackend,
    pub force_download: bool,
    /// Custom S3-compatible endpoint, derived from `S3_URL` when it names
    /// a host other than AWS's own `s3.amazonaws.com`.
    pub endpoint_url: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

impl Config {
    /// Parse CLI flags and merge with environment variables, flags
    /// winning. `S3_URL` is consulted two ways: as an explicit custom
    /// endpoint, and (when `--bucket`/`S3_BUCKET` is absent) to recover a
    /// bucket name from its recognized URL forms.
    pub fn load() -> Result<Self> {
        let cli = Cli::parse();
        Self::from_cli(cli)
    }

    fn from_cli(cli: Cli) -> Result<Self> {
        let s3_url = env_var("S3_URL");

        let bucket = cli
            .bucket
            .or_else(|| env_var("S3_BUCKET"))
            .or_else(|| s3_url.as_deref().and_then(parse_bucket_url))
            .ok_or_else(|| {
                MegError::ConfigError(
                    "no bucket configured: pass --bucket, set S3_BUCKET, or supply a bucket-bearing S3_URL"
                        .to_string(),
                )
            })?;

        let host = cli
            .host
            .or_else(|| env_var("MEG_HOST"))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli
            .port
            .or_else(|| env_var("MEG_PORT").and_then(|p| p.parse().ok()))
            .or_else(|| env_var("PORT").and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT);

        let region = cli.region.or_else(|| env_var("S3_REGION"));
        let access_key = cli.access_key.or_else(|| env_var("S3_ACCESS_KEY"));
        let secret_key = cli.secret_key.or_else(|| env_var("S3_SECRET_KEY"));

        let cache = CacheBackend::parse(&cli.cache)?;

        let endpoint_url = cli.endpoint.or(s3_url).filter(|url| {
            // A bare `s3://bucket/...` URL names no real endpoint to dial;
            // only an `http(s)://` form is a usable custom endpoint.
            url.starts_with("http://") || url.starts_with("https://")
        });

        Ok(Config {
            region,
            access_key,
            secret_key,
            bucket,
            host,
            port,
            cache,
            force_download: cli.force_download,
            endpoint_url,
        })
    }
}
