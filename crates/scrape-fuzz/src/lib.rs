//! Fuzzing library for paper-scrape.
//!
//! Fuzz targets feed arbitrary bytes to the response parsers, the record
//! deserializer and the text normalizer. None of them may panic.
//!
//! # Usage
//!
//! ```bash
//! cd crates/scrape-fuzz
//! cargo +nightly fuzz run fuzz_dblp_parse -- -max_total_time=60
//! ```

use std::sync::Arc;

use paper_scrape::{Config, DblpScraper, DblpVenueScraper, DoiScraper, PaperRecord, Scraper};

/// Record every target parses into.
#[must_use]
pub fn seed_record() -> PaperRecord {
    PaperRecord::new("Attention Is All You Need")
}

/// Sources under test, configured without network access.
#[must_use]
pub fn parsers() -> Vec<Arc<dyn Scraper>> {
    let config = Config::for_testing("http://127.0.0.1:1");
    let doi: Arc<dyn Scraper> = Arc::new(DoiScraper::inner(&config));
    vec![
        Arc::new(DblpScraper::new(&config)),
        Arc::new(DblpVenueScraper::new(&config, Arc::clone(&doi))),
        doi,
    ]
}
