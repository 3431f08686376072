//! The scraper contract and the built-in sources.
//!
//! Every source implements [`Scraper`]: build a request from the record,
//! fetch it through [`fetch_with_fallback`], parse the body back into the
//! record. The generic driver [`scrape`] sequences the three steps; sources
//! that compose other sources override [`Scraper::scrape`].

mod dblp;
mod doi;
mod gating;
mod pipeline;

pub use dblp::{DBLP_PREFERENCE, DblpScraper, DblpVenueScraper, USE_DBLP_FOR_VENUE, UnmatchedVenuePolicy};
pub use doi::{DOI_PREFERENCE, DoiScraper};
pub use gating::{Gate, GatingPolicy, Requirement};
pub use pipeline::{fetch_with_fallback, scrape};

use std::sync::Arc;

use serde::Deserialize;

use crate::client::{Headers, Transport};
use crate::error::ScrapeResult;
use crate::logging::{LogSink, TracingSink};
use crate::preferences::{PreferenceStore, ScraperPreferences};
use crate::record::PaperRecord;

/// Request built by [`Scraper::pre_process`]. Lives for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperRequest {
    /// Target URL on the primary host.
    pub url: String,
    /// Headers sent with both the primary and the mirror attempt.
    pub headers: Headers,
    /// Whether the source should run for this record.
    pub enabled: bool,
}

impl ScraperRequest {
    /// An enabled request with no headers.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), headers: Headers::new(), enabled: true }
    }

    /// Builder-style header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Builder-style gate.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// What a pipeline run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// Gating closed the source; nothing was fetched.
    Skipped,
    /// The source fetched and parsed a response.
    Fetched,
}

/// Collaborators handed to every pipeline run.
#[derive(Clone)]
pub struct ScrapeContext {
    pub transport: Arc<dyn Transport>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub log: Arc<dyn LogSink>,
}

impl ScrapeContext {
    /// Context with default preferences and a `tracing` log sink.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            preferences: Arc::new(ScraperPreferences::new()),
            log: Arc::new(TracingSink),
        }
    }

    #[must_use]
    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = preferences;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }
}

impl std::fmt::Debug for ScrapeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeContext").finish_non_exhaustive()
    }
}

/// One external metadata source.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    /// Registry name of the source (e.g. "dblp").
    fn name(&self) -> &str;

    /// Build the request for `record`.
    ///
    /// Never fails: any disqualifying condition yields a disabled request.
    fn pre_process(&self, record: &PaperRecord, preferences: &dyn PreferenceStore) -> ScraperRequest;

    /// Host substituted into the request URL when the primary fetch fails.
    fn mirror_host(&self) -> Option<&str> {
        None
    }

    /// Merge a response body into `record`.
    ///
    /// Malformed bodies and zero matches leave the record as it is.
    fn parse(&self, body: &str, record: &mut PaperRecord);

    /// Run the source over `record`.
    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        record: &mut PaperRecord,
        force: bool,
    ) -> ScrapeResult<ScrapeOutcome> {
        pipeline::scrape(self, ctx, record, force).await
    }
}

/// JSON scalar that sources return either as text, as a number, or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum TextValue {
    Text(String),
    Number(serde_json::Number),
    List(Vec<TextValue>),
}

impl TextValue {
    /// First textual value, trimmed; `None` when blank.
    pub(crate) fn first(&self) -> Option<String> {
        let text = match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
            Self::List(items) => return items.iter().find_map(Self::first),
        };
        (!text.is_empty()).then_some(text)
    }
}
