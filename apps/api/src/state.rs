use crate::config::Config;
use crate::generation::fetch::Fetcher;
use crate::render::ComposeOptions;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Loaded settings, kept for handlers that need them beyond compose options.
    #[allow(dead_code)]
    pub config: Config,
    /// Worker pool over the text generator and the asset store.
    pub fetcher: Fetcher,
    /// Page geometry, TOC placement and output directory for every report.
    pub compose: ComposeOptions,
}
