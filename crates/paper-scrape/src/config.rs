//! Configuration for paper-scrape.

use std::time::Duration;

/// Endpoint and transport constants.
pub mod api {
    use std::time::Duration;

    /// Primary DBLP host.
    pub const DBLP_HOST: &str = "dblp.org";

    /// Alternate DBLP host used when the primary fails.
    pub const DBLP_MIRROR_HOST: &str = "dblp.uni-trier.de";

    /// DBLP publication search endpoint.
    pub const DBLP_PUBL_API: &str = "https://dblp.org/search/publ/api";

    /// DBLP venue search endpoint.
    pub const DBLP_VENUE_API: &str = "https://dblp.org/search/venue/api";

    /// DOI resolver base URL.
    pub const DOI_API: &str = "https://doi.org";

    /// Alternate DOI resolver host.
    pub const DOI_MIRROR_HOST: &str = "dx.doi.org";

    /// CSL-JSON content type requested from the DOI resolver.
    pub const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

    /// Request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Transport-level retries before the mirror is tried.
    pub const MAX_RETRIES: u32 = 2;

    /// Cache TTL (10 minutes).
    pub const CACHE_TTL: Duration = Duration::from_secs(600);

    /// Maximum cache size.
    pub const CACHE_MAX_SIZE: u64 = 1000;

    /// Maximum keepalive connections.
    pub const MAX_KEEPALIVE: usize = 10;

    /// Keepalive expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);

    /// Records enriched concurrently by `enrich_all`.
    pub const CONCURRENT_RECORDS: usize = 4;
}

/// Default order in which built-in sources run over one record.
pub const DEFAULT_ORDER: &[&str] = &["doi", "dblp", "dblp-by-time-0", "dblp-by-time-1", "dblp-venue"];

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// DBLP publication search URL.
    pub dblp_publ_url: String,

    /// DBLP venue search URL.
    pub dblp_venue_url: String,

    /// Host substituted into DBLP URLs on primary failure.
    pub dblp_mirror_host: String,

    /// DOI resolver base URL.
    pub doi_url: String,

    /// Host substituted into DOI URLs on primary failure.
    pub doi_mirror_host: String,

    /// Request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Transport-level retries per attempt.
    pub max_retries: u32,

    /// Cache TTL.
    pub cache_ttl: Duration,

    /// Maximum cache size.
    pub cache_max_size: u64,

    /// Records enriched concurrently.
    pub concurrency: usize,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Config {
    /// Create the default production configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dblp_publ_url: api::DBLP_PUBL_API.to_string(),
            dblp_venue_url: api::DBLP_VENUE_API.to_string(),
            dblp_mirror_host: api::DBLP_MIRROR_HOST.to_string(),
            doi_url: api::DOI_API.to_string(),
            doi_mirror_host: api::DOI_MIRROR_HOST.to_string(),
            request_timeout: api::REQUEST_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
            max_retries: api::MAX_RETRIES,
            cache_ttl: api::CACHE_TTL,
            cache_max_size: api::CACHE_MAX_SIZE,
            concurrency: api::CONCURRENT_RECORDS,
            user_agent: format!("paper-scrape/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Create a test configuration pointing every source at a mock server.
    ///
    /// Mirror hosts are set to `localhost` while `base_url` uses `127.0.0.1`,
    /// so both addresses reach the same mock server but remain distinguishable.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            dblp_publ_url: format!("{}/search/publ/api", base_url),
            dblp_venue_url: format!("{}/search/venue/api", base_url),
            dblp_mirror_host: "localhost".to_string(),
            doi_url: base_url.to_string(),
            doi_mirror_host: "localhost".to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            max_retries: 0, // Mirror behavior is under test, not transport retries
            cache_ttl: Duration::from_secs(0), // No caching in tests
            cache_max_size: 0,
            concurrency: 2,
            user_agent: "paper-scrape-test".to_string(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Recognized: `PAPER_SCRAPE_DBLP_URL`, `PAPER_SCRAPE_DBLP_MIRROR`,
    /// `PAPER_SCRAPE_DOI_URL`, `PAPER_SCRAPE_TIMEOUT_SECS`, `PAPER_SCRAPE_CONCURRENCY`.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new();

        if let Ok(base) = std::env::var("PAPER_SCRAPE_DBLP_URL") {
            let base = base.trim_end_matches('/');
            config.dblp_publ_url = format!("{}/search/publ/api", base);
            config.dblp_venue_url = format!("{}/search/venue/api", base);
        }
        if let Ok(host) = std::env::var("PAPER_SCRAPE_DBLP_MIRROR") {
            config.dblp_mirror_host = host;
        }
        if let Ok(url) = std::env::var("PAPER_SCRAPE_DOI_URL") {
            config.doi_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(secs) = std::env::var("PAPER_SCRAPE_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs.parse()?);
        }
        if let Ok(n) = std::env::var("PAPER_SCRAPE_CONCURRENCY") {
            config.concurrency = n.parse::<usize>()?.max(1);
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
