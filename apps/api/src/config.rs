use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::render::TocPlacement;

/// Where section images are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetBackend {
    Fs,
    S3,
}

impl FromStr for AssetBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fs" => Ok(AssetBackend::Fs),
            "s3" => Ok(AssetBackend::S3),
            other => Err(anyhow!("unknown asset backend '{other}' (expected fs or s3)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub prefix: Option<String>,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    /// Overrides the messages endpoint (proxies, local mocks).
    pub anthropic_api_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub asset_backend: AssetBackend,
    pub asset_root: PathBuf,
    /// Present only when `asset_backend` is S3.
    pub s3: Option<S3Settings>,
    pub output_dir: PathBuf,
    pub generation_concurrency: usize,
    pub toc_placement: TocPlacement,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let asset_backend: AssetBackend = or_default("ASSET_BACKEND", "fs")
            .parse()
            .context("ASSET_BACKEND must be fs or s3")?;
        let s3 = match asset_backend {
            AssetBackend::Fs => None,
            AssetBackend::S3 => Some(S3Settings {
                bucket: require("S3_BUCKET")?,
                endpoint: require("S3_ENDPOINT")?,
                prefix: lookup("S3_PREFIX").filter(|p| !p.trim().is_empty()),
                aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
                aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            }),
        };

        Ok(Config {
            anthropic_api_key: require("ANTHROPIC_API_KEY")?,
            anthropic_api_url: lookup("ANTHROPIC_API_URL").filter(|u| !u.trim().is_empty()),
            port: or_default("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: or_default("RUST_LOG", "info"),
            asset_backend,
            asset_root: PathBuf::from(or_default("ASSET_ROOT", "assets")),
            s3,
            output_dir: PathBuf::from(or_default("OUTPUT_DIR", "output")),
            generation_concurrency: or_default("GENERATION_CONCURRENCY", "4")
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .context("GENERATION_CONCURRENCY must be a positive integer")?,
            toc_placement: or_default("TOC_PLACEMENT", "front")
                .parse::<TocPlacement>()
                .map_err(|e| anyhow!(e))
                .context("TOC_PLACEMENT is invalid")?,
        })
    }
}
