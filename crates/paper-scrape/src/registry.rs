//! Named sources and ordered enrichment runs.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::config::Config;
use crate::extension::ExtensionManager;
use crate::logging::{LogEvent, LogLevel};
use crate::record::{Field, PaperRecord};
use crate::scraper::{
    DblpScraper, DblpVenueScraper, DoiScraper, ScrapeContext, ScrapeOutcome, Scraper,
};

const LOG_TAG: &str = "scraperRegistry";

/// A source that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// What an enrichment run did to one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentReport {
    /// Sources that fetched and parsed a response.
    pub ran: Vec<String>,
    /// Sources whose gate was closed.
    pub skipped: Vec<String>,
    pub failed: Vec<SourceFailure>,
    /// Requested names with no registered source.
    pub missing: Vec<String>,
    /// Keys of fields whose value changed.
    pub fields_updated: Vec<String>,
}

impl EnrichmentReport {
    /// Whether any source failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Sources by name.
#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the DOI and DBLP sources.
    ///
    /// The venue resolver delegates to a preference-free DOI lookup.
    #[must_use]
    pub fn with_builtin(config: &Config) -> Self {
        let mut registry = Self::new();
        let doi_inner: Arc<dyn Scraper> = Arc::new(DoiScraper::inner(config));

        registry.register(Arc::new(DoiScraper::new(config)));
        registry.register(Arc::new(DblpScraper::new(config)));
        registry.register(Arc::new(DblpScraper::by_time(config, 0)));
        registry.register(Arc::new(DblpScraper::by_time(config, 1)));
        registry.register(Arc::new(DblpVenueScraper::new(config, doi_inner)));
        registry
    }

    /// Add a source under its own name, returning the one it replaces.
    pub fn register(&mut self, scraper: Arc<dyn Scraper>) -> Option<Arc<dyn Scraper>> {
        let name = scraper.name().to_string();
        tracing::debug!(source = %name, "Registered source");
        self.scrapers.insert(name, scraper)
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Scraper>> {
        self.scrapers.remove(name)
    }

    /// Register every source contributed by installed extensions.
    ///
    /// Returns how many were added.
    pub async fn register_extensions(&mut self, manager: &ExtensionManager) -> usize {
        let scrapers = manager.scrapers().await;
        let count = scrapers.len();
        for scraper in scrapers {
            if let Some(previous) = self.register(scraper) {
                tracing::warn!(source = previous.name(), "Extension source replaced a registered source");
            }
        }
        count
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Scraper>> {
        self.scrapers.get(name).cloned()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scrapers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }

    /// Run the named sources over `record`, one after another.
    ///
    /// A failing source is reported to the log sink and the run moves on.
    pub async fn run<S>(
        &self,
        ctx: &ScrapeContext,
        record: &mut PaperRecord,
        order: &[S],
        force: bool,
    ) -> EnrichmentReport
    where
        S: AsRef<str> + Sync,
    {
        let before: Vec<Option<String>> = Field::ALL.iter().map(|f| record.get(*f)).collect();
        let mut report = EnrichmentReport::default();

        for name in order.iter().map(AsRef::as_ref) {
            let Some(scraper) = self.scrapers.get(name) else {
                tracing::warn!(source = name, "No such source");
                report.missing.push(name.to_string());
                continue;
            };

            match scraper.scrape(ctx, record, force).await {
                Ok(ScrapeOutcome::Fetched) => {
                    tracing::info!(source = name, title = record.title(), "Source ran");
                    report.ran.push(name.to_string());
                }
                Ok(ScrapeOutcome::Skipped) => report.skipped.push(name.to_string()),
                Err(err) => {
                    ctx.log.log(LogEvent {
                        level: LogLevel::Warn,
                        ..LogEvent::error(format!("Failed to scrape metadata with {name}"), &err, LOG_TAG)
                    });
                    report.failed.push(SourceFailure { source: name.to_string(), error: err.to_string() });
                }
            }
        }

        report.fields_updated = Field::ALL
            .iter()
            .zip(before)
            .filter(|(field, old)| record.get(**field) != *old)
            .map(|(field, _)| field.key().to_string())
            .collect();
        report
    }

    /// Enrich several records, at most `concurrency` at a time.
    ///
    /// Each record is still enriched sequentially; results keep input order.
    pub async fn enrich_all<S>(
        &self,
        ctx: &ScrapeContext,
        records: Vec<PaperRecord>,
        order: &[S],
        force: bool,
        concurrency: usize,
    ) -> Vec<(PaperRecord, EnrichmentReport)>
    where
        S: AsRef<str> + Sync,
    {
        stream::iter(records)
            .map(|mut record| async move {
                let report = self.run(ctx, &mut record, order, force).await;
                (record, report)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

impl std::fmt::Debug for ScraperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperRegistry").field("sources", &self.names()).finish()
    }
}
