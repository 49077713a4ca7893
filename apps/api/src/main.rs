mod assets;
mod config;
mod errors;
mod generation;
mod layout;
mod llm_client;
mod models;
mod render;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::assets::{AssetStore, FsAssetStore, S3AssetStore};
use crate::config::{AssetBackend, Config, S3Settings};
use crate::generation::fetch::Fetcher;
use crate::layout::default_page_config;
use crate::llm_client::LlmClient;
use crate::render::ComposeOptions;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting report API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the asset store (local directory or S3 / MinIO)
    let assets: Arc<dyn AssetStore> = match (config.asset_backend, &config.s3) {
        (AssetBackend::S3, Some(settings)) => {
            let client = build_s3_client(settings).await;
            let mut store = S3AssetStore::new(client, settings.bucket.clone());
            if let Some(prefix) = &settings.prefix {
                store = store.with_prefix(prefix.clone());
            }
            info!("S3 asset store initialized (bucket: {})", settings.bucket);
            Arc::new(store)
        }
        _ => {
            info!("Filesystem asset store at {}", config.asset_root.display());
            Arc::new(FsAssetStore::new(config.asset_root.clone()))
        }
    };

    // Initialize LLM client
    let mut llm = LlmClient::new(config.anthropic_api_key.clone())?;
    if let Some(url) = &config.anthropic_api_url {
        llm = llm.with_endpoint(url.clone());
        info!("LLM endpoint overridden: {url}");
    }
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let fetcher = Fetcher::new(Arc::new(llm), assets, config.generation_concurrency);

    // A4 portrait, 50pt margins, 11pt body
    let compose = ComposeOptions {
        page: default_page_config(),
        placement: config.toc_placement,
        output_dir: config.output_dir.clone(),
    };
    tokio::fs::create_dir_all(&compose.output_dir).await?;
    info!(
        "Reports written to {} (TOC placement: {:?})",
        compose.output_dir.display(),
        compose.placement
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        fetcher,
        compose,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(settings: &S3Settings) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &settings.aws_access_key_id,
        &settings.aws_secret_access_key,
        None,
        None,
        "report-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&settings.endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
