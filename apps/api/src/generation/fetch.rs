//! Fetch stage: resolves every section's text and image bytes before layout.
//!
//! Sections are fetched on a bounded worker pool. Results come back in
//! completion order and are re-sorted by section index, so layout always
//! applies them in request order.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::assets::{AssetError, AssetStore};
use crate::generation::prompts::{build_section_prompt, SECTION_SYSTEM};
use crate::llm_client::{GenerationError, TextGenerator};
use crate::models::report::SectionRequest;
use crate::render::ComposeError;

/// Additional attempts after the first failed generation call.
pub const MAX_GENERATION_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_GENERATION_RETRIES,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Same retry count, no waiting. Used by tests.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Exponential backoff: base, 2 × base, 4 × base, ...
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Per-report generation accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub calls: u32,
    pub failed_calls: u32,
    pub placeholders: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageTotals {
    pub fn merge(&mut self, other: &UsageTotals) {
        self.calls += other.calls;
        self.failed_calls += other.failed_calls;
        self.placeholders += other.placeholders;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Text substituted for a section whose generation failed.
pub fn placeholder(section_title: &str) -> String {
    format!("{section_title} could not be generated.")
}

/// Calls the generator up to `1 + max_retries` times, then falls back to the placeholder.
pub async fn generate_with_fallback(
    generator: &dyn TextGenerator,
    section_title: &str,
    prompt: &str,
    policy: &RetryPolicy,
    usage: &mut UsageTotals,
) -> String {
    let mut last_error: Option<GenerationError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            warn!(
                section = section_title,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "generation attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }

        usage.calls += 1;
        match generator.generate(SECTION_SYSTEM, prompt).await {
            Ok(generated) => {
                if let Some(tokens) = generated.usage {
                    usage.input_tokens += tokens.input_tokens;
                    usage.output_tokens += tokens.output_tokens;
                }
                return generated.text;
            }
            Err(err) => {
                usage.failed_calls += 1;
                last_error = Some(err);
            }
        }
    }

    usage.placeholders += 1;
    warn!(
        section = section_title,
        error = %last_error.map(|e| e.to_string()).unwrap_or_default(),
        "generation failed, using placeholder"
    );
    placeholder(section_title)
}

/// Text and image bytes for one section, ready for layout.
#[derive(Debug)]
pub struct FetchedSection {
    pub index: usize,
    pub text: String,
    pub image: Option<Result<Bytes, AssetError>>,
    pub usage: UsageTotals,
}

/// Worker pool over a text generator and an asset store.
#[derive(Clone)]
pub struct Fetcher {
    generator: Arc<dyn TextGenerator>,
    assets: Arc<dyn AssetStore>,
    concurrency: usize,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        assets: Arc<dyn AssetStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            generator,
            assets,
            concurrency: concurrency.max(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches every section, at most `concurrency` at a time. Output is in input order.
    pub async fn fetch_all(
        &self,
        sections: &[SectionRequest],
    ) -> Result<Vec<FetchedSection>, ComposeError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();

        for (index, section) in sections.iter().cloned().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let generator = self.generator.clone();
            let assets = self.assets.clone();
            let retry = self.retry.clone();
            workers.spawn(async move {
                let _permit = permit;
                fetch_section(index, &section, generator.as_ref(), assets.as_ref(), &retry).await
            });
        }

        let mut fetched = Vec::with_capacity(sections.len());
        while let Some(joined) = workers.join_next().await {
            fetched.push(joined?);
        }
        fetched.sort_by_key(|f| f.index);

        debug!(sections = fetched.len(), concurrency = self.concurrency, "fetch stage complete");
        Ok(fetched)
    }
}

async fn fetch_section(
    index: usize,
    section: &SectionRequest,
    generator: &dyn TextGenerator,
    assets: &dyn AssetStore,
    retry: &RetryPolicy,
) -> FetchedSection {
    let mut usage = UsageTotals::default();

    let text = match (&section.text, &section.prompt) {
        (Some(text), _) => text.clone(),
        (None, Some(prompt)) => {
            let prompt = build_section_prompt(&section.title, prompt, &section.context);
            generate_with_fallback(generator, &section.title, &prompt, retry, &mut usage).await
        }
        (None, None) => {
            warn!(index, section = %section.title, "section has neither text nor prompt");
            usage.placeholders += 1;
            placeholder(&section.title)
        }
    };

    let image = match &section.image {
        Some(spec) => {
            let result = assets.fetch(&spec.source).await;
            if let Err(err) = &result {
                warn!(index, asset = %spec.source, error = %err, "asset fetch failed");
            }
            Some(result)
        }
        None => None,
    };

    FetchedSection {
        index,
        text,
        image,
        usage,
    }
}
