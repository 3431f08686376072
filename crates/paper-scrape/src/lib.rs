//! Paper Scrape
//!
//! Enriches bibliographic records from independent metadata sources (DBLP,
//! DOI content negotiation, extension-provided sources) without overwriting
//! fields that are already trusted.
//!
//! # Features
//!
//! - **Uniform sources**: build request, fetch with one mirror retry, parse
//! - **Field provenance**: user- and source-written values are never clobbered
//! - **Delegation**: venue resolution can hand off to a DOI lookup
//! - **Extensions**: install, reload and call extensions; register their sources
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paper_scrape::{Config, HttpTransport, PaperRecord, ScrapeContext, ScraperRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let ctx = ScrapeContext::new(Arc::new(HttpTransport::new(&config)?));
//!     let registry = ScraperRegistry::with_builtin(&config);
//!
//!     let mut record = PaperRecord::new("Attention Is All You Need");
//!     let report = registry.run(&ctx, &mut record, paper_scrape::config::DEFAULT_ORDER, false).await;
//!     println!("{} -> {:?}", record.publication(), report.fields_updated);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extension;
pub mod logging;
pub mod normalize;
pub mod preferences;
pub mod record;
pub mod registry;
pub mod scraper;

pub use client::{HttpTransport, Transport};
pub use config::Config;
pub use error::{ClientError, ExtensionError, ScrapeError};
pub use extension::{CatalogLoader, ExtensionManager};
pub use logging::{LogEvent, LogSink, TracingSink};
pub use preferences::{PreferenceStore, ScraperPreference, ScraperPreferences};
pub use record::{DBLP_VENUE_SCHEME, Field, PaperRecord, Provenance, PubType, WriteOutcome};
pub use registry::{EnrichmentReport, ScraperRegistry};
pub use scraper::{
    DblpScraper, DblpVenueScraper, DoiScraper, ScrapeContext, ScrapeOutcome, Scraper, ScraperRequest,
};
