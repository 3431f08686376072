//! DBLP publication search, search by year, and venue resolution.
//!
//! The publication search writes an unresolved `dblp://<key>` marker into
//! `publication`; [`DblpVenueScraper`] later replaces it with the venue name,
//! either through the DBLP venue API or by delegating to a DOI lookup.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use url::Url;

use super::{
    Gate, GatingPolicy, Requirement, ScrapeContext, ScrapeOutcome, Scraper, ScraperRequest,
    TextValue, pipeline,
};
use crate::config::Config;
use crate::error::ScrapeResult;
use crate::normalize::{NormalizeOptions, normalize};
use crate::preferences::PreferenceStore;
use crate::record::{DBLP_VENUE_SCHEME, Field, PaperRecord, PubType};

/// Preference key shared by every DBLP source.
pub const DBLP_PREFERENCE: &str = "dblp";

/// `dblp` preference argument that forces venue lookup through DBLP even when a DOI is known.
pub const USE_DBLP_FOR_VENUE: &str = "use-dblp";

/// Key prefix of arXiv mirror entries.
const CORR_KEY: &str = "journals/corr";

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").expect("valid regex"));

// --- DBLP API Response Structures ---

#[derive(Debug, Deserialize)]
struct DblpResponse<T> {
    result: DblpResult<T>,
}

#[derive(Debug, Deserialize)]
struct DblpResult<T> {
    #[serde(default = "DblpHits::empty")]
    hits: DblpHits<T>,
}

#[derive(Debug, Deserialize)]
struct DblpHits<T> {
    /// DBLP sends this as a string or a number.
    #[serde(rename = "@sent", default)]
    sent: Option<TextValue>,
    #[serde(default = "Vec::new")]
    hit: Vec<DblpHit<T>>,
}

impl<T> DblpHits<T> {
    const fn empty() -> Self {
        Self { sent: None, hit: Vec::new() }
    }

    /// Infos of the sent hits, in server order.
    fn infos(self) -> impl Iterator<Item = T> {
        let sent = self
            .sent
            .and_then(|s| s.first())
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(self.hit.len());
        self.hit.into_iter().take(sent).filter_map(|h| h.info)
    }
}

#[derive(Debug, Deserialize)]
struct DblpHit<T> {
    #[serde(default = "Option::default")]
    info: Option<T>,
}

/// Publication entry of a search hit.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PublInfo {
    title: Option<TextValue>,
    authors: Option<DblpAuthors>,
    venue: Option<TextValue>,
    year: Option<TextValue>,
    #[serde(rename = "type")]
    kind: Option<String>,
    key: Option<String>,
    volume: Option<TextValue>,
    pages: Option<TextValue>,
    number: Option<TextValue>,
    publisher: Option<TextValue>,
    doi: Option<String>,
}

/// DBLP returns a single object for one author and an array for several.
#[derive(Debug, Deserialize)]
struct DblpAuthors {
    author: AuthorField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuthorField {
    Single(DblpAuthor),
    Multiple(Vec<DblpAuthor>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DblpAuthor {
    Struct { text: String },
    Name(String),
}

impl DblpAuthor {
    /// Name without DBLP's numeric homonym suffix ("Wei Li 0001").
    fn clean_name(&self) -> String {
        let raw = match self {
            Self::Struct { text } | Self::Name(text) => text,
        };
        DIGITS_RE.replace_all(raw, "").trim().to_string()
    }
}

impl AuthorField {
    fn joined(&self) -> String {
        let names: Vec<String> = match self {
            Self::Single(author) => vec![author.clean_name()],
            Self::Multiple(authors) => authors.iter().map(DblpAuthor::clean_name).collect(),
        };
        names.into_iter().filter(|n| !n.is_empty()).collect::<Vec<_>>().join(", ")
    }
}

/// Venue entry of a venue search hit.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VenueInfo {
    url: String,
    venue: String,
}

// --- Publication search ---

/// DBLP publication search by title, optionally pinned to a year.
#[derive(Debug, Clone)]
pub struct DblpScraper {
    name: String,
    publ_url: String,
    mirror_host: String,
    year_offset: Option<i32>,
    gate: GatingPolicy,
}

impl DblpScraper {
    /// Title search over all years.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::build(config, DBLP_PREFERENCE.to_string(), None)
    }

    /// Title search restricted to `pubTime + offset`.
    ///
    /// Used for retry passes over neighboring years; disabled when the
    /// record's `pubTime` is not a year.
    #[must_use]
    pub fn by_time(config: &Config, offset: i32) -> Self {
        Self::build(config, format!("dblp-by-time-{offset}"), Some(offset))
    }

    fn build(config: &Config, name: String, year_offset: Option<i32>) -> Self {
        let gate = GatingPolicy::new()
            .require(Requirement::NonEmptyQuery)
            .require(Requirement::Preprint)
            .require(Requirement::Enabled(DBLP_PREFERENCE));

        Self {
            name,
            publ_url: config.dblp_publ_url.clone(),
            mirror_host: config.dblp_mirror_host.clone(),
            year_offset,
            gate,
        }
    }

    /// Search text derived from the title.
    fn title_query(record: &PaperRecord) -> String {
        normalize(record.title(), &NormalizeOptions::removing(["&amp", "&"])).replace('—', "-")
    }

    /// Copy a matched hit into the record.
    fn apply(info: PublInfo, title: &str, record: &mut PaperRecord) {
        let key = info.key.unwrap_or_default();
        let pub_key = key.split('/').take(2).collect::<Vec<_>>().join("/");
        let venue = info.venue.as_ref().and_then(TextValue::first).unwrap_or_default();

        // The arXiv mirror entry carries no venue information.
        if pub_key == CORR_KEY && venue == "CoRR" {
            tracing::debug!(%key, "Matched an unpublished CoRR entry");
            return;
        }

        if let Some(doi) = info.doi {
            record.set_value(Field::Doi, doi, false);
        }
        record.set_value(Field::Title, title.replace("&amp;", "&"), false);
        if let Some(authors) = &info.authors {
            record.set_value(Field::Authors, authors.author.joined(), false);
        }
        if let Some(year) = info.year.as_ref().and_then(TextValue::first) {
            record.set_value(Field::PubTime, year, false);
        }
        record.set_pub_type(PubType::classify(info.kind.as_deref().unwrap_or_default()), false);

        let marker = if pub_key == CORR_KEY { venue.as_str() } else { pub_key.as_str() };
        record.set_venue_marker(DBLP_VENUE_SCHEME, marker, false);

        for (field, value) in [
            (Field::Volume, &info.volume),
            (Field::Pages, &info.pages),
            (Field::Number, &info.number),
            (Field::Publisher, &info.publisher),
        ] {
            if let Some(value) = value.as_ref().and_then(TextValue::first) {
                record.set_value(field, value, false);
            }
        }
    }
}

#[async_trait::async_trait]
impl Scraper for DblpScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_process(&self, record: &PaperRecord, preferences: &dyn PreferenceStore) -> ScraperRequest {
        let title_query = Self::title_query(record);
        let mut enabled = self.gate.evaluate(record, &title_query, preferences).is_open();

        let query = match self.year_offset {
            None => title_query,
            Some(offset) => match record.year().and_then(|year| year.checked_add(offset)) {
                Some(year) => format!("{title_query} year:{year}"),
                None => {
                    enabled = false;
                    title_query
                }
            },
        };

        let url = Url::parse_with_params(&self.publ_url, &[("q", query.as_str()), ("format", "json")])
            .map(String::from);

        match url {
            Ok(url) => ScraperRequest::new(url).enabled(enabled),
            Err(_) => ScraperRequest::new(self.publ_url.clone()).enabled(false),
        }
    }

    fn mirror_host(&self) -> Option<&str> {
        Some(&self.mirror_host)
    }

    fn parse(&self, body: &str, record: &mut PaperRecord) {
        let response: DblpResponse<PublInfo> = match serde_json::from_str(body) {
            Ok(r) => r,
            Err(err) => {
                tracing::debug!(source = %self.name, error = %err, "Unparseable DBLP response");
                return;
            }
        };

        let options = NormalizeOptions::title_match();
        let wanted = normalize(record.title(), &options);

        for info in response.result.hits.infos() {
            let Some(title) = info.title.as_ref().and_then(TextValue::first) else {
                continue;
            };
            if normalize(&title, &options) != wanted {
                continue;
            }
            Self::apply(info, &title, record);
            break;
        }
    }
}

// --- Venue resolution ---

/// What [`DblpVenueScraper`] does when no venue matches the marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmatchedVenuePolicy {
    /// Force-clear `publication`, dropping the marker and any earlier value.
    #[default]
    Clear,
    /// Leave `publication` untouched.
    Keep,
}

/// Replaces a `dblp://<key>` marker with the venue's name.
///
/// When the record has a DOI, the whole run is handed to the held delegate
/// instead, unless the `dblp` preference argument is `use-dblp`. The choice
/// is made on every call.
pub struct DblpVenueScraper {
    venue_url: String,
    mirror_host: String,
    delegate: Arc<dyn Scraper>,
    unmatched: UnmatchedVenuePolicy,
    gate: GatingPolicy,
}

impl DblpVenueScraper {
    #[must_use]
    pub fn new(config: &Config, delegate: Arc<dyn Scraper>) -> Self {
        Self {
            venue_url: config.dblp_venue_url.clone(),
            mirror_host: config.dblp_mirror_host.clone(),
            delegate,
            unmatched: UnmatchedVenuePolicy::default(),
            gate: GatingPolicy::new().require(Requirement::VenueMarker(DBLP_VENUE_SCHEME)),
        }
    }

    #[must_use]
    pub const fn with_unmatched_policy(mut self, policy: UnmatchedVenuePolicy) -> Self {
        self.unmatched = policy;
        self
    }

    /// Whether this call goes to the delegate.
    #[must_use]
    pub fn delegates(&self, record: &PaperRecord, preferences: &dyn PreferenceStore) -> bool {
        let has_doi = Gate::Open
            == GatingPolicy::new().require(Requirement::Doi).evaluate(record, "", preferences);
        has_doi && preferences.scraper(DBLP_PREFERENCE).args.as_deref() != Some(USE_DBLP_FOR_VENUE)
    }

    fn venue_key(record: &PaperRecord) -> &str {
        record.publication().strip_prefix(DBLP_VENUE_SCHEME).unwrap_or_default()
    }

    fn unmatched(&self, record: &mut PaperRecord) {
        match self.unmatched {
            UnmatchedVenuePolicy::Clear => {
                record.set_value(Field::Publication, "", true);
            }
            UnmatchedVenuePolicy::Keep => {}
        }
    }
}

impl std::fmt::Debug for DblpVenueScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DblpVenueScraper")
            .field("venue_url", &self.venue_url)
            .field("delegate", &self.delegate.name())
            .field("unmatched", &self.unmatched)
            .finish()
    }
}

#[async_trait::async_trait]
impl Scraper for DblpVenueScraper {
    fn name(&self) -> &str {
        "dblp-venue"
    }

    fn pre_process(&self, record: &PaperRecord, preferences: &dyn PreferenceStore) -> ScraperRequest {
        let key = Self::venue_key(record);
        let enabled = self.gate.evaluate(record, key, preferences).is_open();

        match Url::parse_with_params(&self.venue_url, &[("q", key), ("format", "json")]) {
            Ok(url) => ScraperRequest::new(url).enabled(enabled),
            Err(_) => ScraperRequest::new(self.venue_url.clone()).enabled(false),
        }
    }

    fn mirror_host(&self) -> Option<&str> {
        Some(&self.mirror_host)
    }

    fn parse(&self, body: &str, record: &mut PaperRecord) {
        let response: DblpResponse<VenueInfo> = match serde_json::from_str(body) {
            Ok(r) => r,
            Err(err) => {
                tracing::debug!(error = %err, "Unparseable DBLP venue response");
                self.unmatched(record);
                return;
            }
        };

        let venue_id = format!("{}/", Self::venue_key(record)).to_lowercase();
        let found = response
            .result
            .hits
            .infos()
            .find(|info| info.url.contains(&venue_id) && !info.venue.trim().is_empty());

        match found {
            Some(info) => {
                record.set_value(Field::Publication, info.venue.trim(), false);
            }
            None => self.unmatched(record),
        }
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        record: &mut PaperRecord,
        force: bool,
    ) -> ScrapeResult<ScrapeOutcome> {
        if self.delegates(record, ctx.preferences.as_ref()) {
            tracing::debug!(delegate = self.delegate.name(), "Resolving venue through delegate");
            return self.delegate.scrape(ctx, record, force).await;
        }
        pipeline::scrape(self, ctx, record, force).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::preferences::{ScraperPreference, ScraperPreferences};
    use crate::record::Provenance;

    fn config() -> Config {
        Config::for_testing("http://127.0.0.1:1")
    }

    fn hit(title: &str, key: &str, venue: &str, kind: &str) -> serde_json::Value {
        json!({
            "info": {
                "authors": {"author": [
                    {"@pid": "1", "text": "Ashish Vaswani"},
                    {"@pid": "2", "text": "Wei Li 0001"}
                ]},
                "title": title,
                "venue": venue,
                "pages": "5998-6008",
                "year": "2017",
                "type": kind,
                "key": key
            }
        })
    }

    fn body(hits: Vec<serde_json::Value>) -> String {
        json!({"result": {"hits": {"@sent": hits.len().to_string(), "hit": hits}}}).to_string()
    }

    #[test]
    fn test_query_strips_ampersands_and_em_dash() {
        let record = PaperRecord::new("Sense &amp; Sensibility — Revisited");
        assert_eq!(DblpScraper::title_query(&record), "Sense ; Sensibility - Revisited");
    }

    #[test]
    fn test_pre_process_builds_encoded_url() {
        let scraper = DblpScraper::new(&config());
        let req = scraper.pre_process(&PaperRecord::new("Deep Learning"), &ScraperPreferences::new());
        assert!(req.enabled);
        assert!(req.url.ends_with("/search/publ/api?q=Deep+Learning&format=json"));
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_pre_process_gating() {
        let scraper = DblpScraper::new(&config());
        let prefs = ScraperPreferences::new();
        assert!(!scraper.pre_process(&PaperRecord::default(), &prefs).enabled);

        let published = PaperRecord::new("T").with(Field::Publication, "Nature");
        assert!(!scraper.pre_process(&published, &prefs).enabled);

        let disabled = ScraperPreferences::new().disable(DBLP_PREFERENCE);
        assert!(!scraper.pre_process(&PaperRecord::new("T"), &disabled).enabled);
    }

    #[test]
    fn test_by_time_appends_offset_year() {
        let scraper = DblpScraper::by_time(&config(), 1);
        let record = PaperRecord::new("Graph Nets").with(Field::PubTime, "2018");
        let req = scraper.pre_process(&record, &ScraperPreferences::new());
        assert!(req.enabled);
        assert!(req.url.contains("q=Graph+Nets+year%3A2019"));
        assert_eq!(scraper.name(), "dblp-by-time-1");
    }

    #[test]
    fn test_by_time_without_year_is_disabled() {
        let scraper = DblpScraper::by_time(&config(), 0);
        let req = scraper.pre_process(&PaperRecord::new("Graph Nets"), &ScraperPreferences::new());
        assert!(!req.enabled);
    }

    #[test]
    fn test_by_time_overflowing_year_is_disabled() {
        let record = PaperRecord::new("Graph Nets").with(Field::PubTime, "2147483647");
        let req = DblpScraper::by_time(&config(), 1).pre_process(&record, &ScraperPreferences::new());
        assert!(!req.enabled);
        assert!(!req.url.contains("year"));
    }

    #[test]
    fn test_parse_first_matching_hit_wins() {
        let scraper = DblpScraper::new(&config());
        let mut record = PaperRecord::new("Attention Is All You Need");
        scraper.parse(
            &body(vec![
                hit("Attention Is Not All You Need.", "conf/icml/X21", "ICML", "Conference and Workshop Papers"),
                hit("Attention is All you Need.", "conf/nips/VaswaniSPUJGKP17", "NIPS", "Conference and Workshop Papers"),
                hit("Attention is all you need", "journals/x/Y", "X", "Journal Articles"),
            ]),
            &mut record,
        );

        assert_eq!(record.pub_type(), PubType::Conference);
        assert_eq!(record.publication(), "dblp://conf/nips");
        assert_eq!(record.provenance(Field::Publication), Provenance::Marker);
        assert_eq!(record.authors(), "Ashish Vaswani, Wei Li");
        assert_eq!(record.pub_time(), "2017");
        assert_eq!(record.pages(), Some("5998-6008"));
        assert_eq!(record.title(), "Attention Is All You Need");
    }

    #[test]
    fn test_parse_single_author_object() {
        let scraper = DblpScraper::new(&config());
        let mut record = PaperRecord::new("Solo");
        let response = json!({"result": {"hits": {"@sent": 1, "hit": [{"info": {
            "title": "Solo.",
            "authors": {"author": {"@pid": "9", "text": "Jane Doe 0002"}},
            "type": "Journal Articles",
            "key": "journals/jmlr/Doe20",
            "venue": "J. Mach. Learn. Res.",
            "year": "2020",
            "doi": "10.5555/solo"
        }}]}}});
        scraper.parse(&response.to_string(), &mut record);

        assert_eq!(record.authors(), "Jane Doe");
        assert_eq!(record.pub_type(), PubType::Journal);
        assert_eq!(record.doi(), Some("10.5555/solo"));
        assert_eq!(record.publication(), "dblp://journals/jmlr");
    }

    #[test]
    fn test_parse_skips_corr_preprint() {
        let scraper = DblpScraper::new(&config());
        let mut record = PaperRecord::new("Attention Is All You Need");
        let before = record.clone();
        scraper.parse(
            &body(vec![hit("Attention is All you Need.", "journals/corr/VaswaniSPUJGKP17", "CoRR", "Informal Publications")]),
            &mut record,
        );
        assert_eq!(record, before);
    }

    #[test]
    fn test_parse_corr_key_with_real_venue_uses_venue() {
        let scraper = DblpScraper::new(&config());
        let mut record = PaperRecord::new("Attention Is All You Need");
        scraper.parse(
            &body(vec![hit("Attention is All you Need.", "journals/corr/abs-1", "ICLR", "Conference and Workshop Papers")]),
            &mut record,
        );
        assert_eq!(record.publication(), "dblp://ICLR");
    }

    #[test]
    fn test_parse_garbage_is_no_match() {
        let scraper = DblpScraper::new(&config());
        let mut record = PaperRecord::new("T");
        let before = record.clone();
        for garbage in ["", "not json", "{}", r#"{"result": {}}"#, r#"{"result": {"hits": {"@sent": "0"}}}"#] {
            scraper.parse(garbage, &mut record);
        }
        assert_eq!(record, before);
    }

    struct NamedDelegate;

    #[async_trait::async_trait]
    impl Scraper for NamedDelegate {
        fn name(&self) -> &str {
            "delegate"
        }

        fn pre_process(&self, _: &PaperRecord, _: &dyn PreferenceStore) -> ScraperRequest {
            ScraperRequest::new("http://127.0.0.1:1/").enabled(false)
        }

        fn parse(&self, _: &str, _: &mut PaperRecord) {}
    }

    fn venue_scraper() -> DblpVenueScraper {
        DblpVenueScraper::new(&config(), Arc::new(NamedDelegate))
    }

    fn with_marker(key: &str) -> PaperRecord {
        let mut record = PaperRecord::new("T");
        record.set_venue_marker(DBLP_VENUE_SCHEME, key, false);
        record
    }

    #[test]
    fn test_delegation_decision() {
        let scraper = venue_scraper();
        let prefs = ScraperPreferences::new();
        assert!(!scraper.delegates(&with_marker("conf/nips"), &prefs));

        let with_doi = with_marker("conf/nips").with(Field::Doi, "10.1/x");
        assert!(scraper.delegates(&with_doi, &prefs));

        let use_dblp = ScraperPreferences::new().with_scraper(
            DBLP_PREFERENCE,
            ScraperPreference { enable: true, args: Some(USE_DBLP_FOR_VENUE.to_string()) },
        );
        assert!(!scraper.delegates(&with_doi, &use_dblp));
    }

    #[test]
    fn test_venue_pre_process() {
        let scraper = venue_scraper();
        let prefs = ScraperPreferences::new();
        let req = scraper.pre_process(&with_marker("conf/nips"), &prefs);
        assert!(req.enabled);
        assert!(req.url.ends_with("/search/venue/api?q=conf%2Fnips&format=json"));

        assert!(!scraper.pre_process(&PaperRecord::new("T"), &prefs).enabled);
    }

    #[test]
    fn test_venue_parse_match() {
        let scraper = venue_scraper();
        let mut record = with_marker("conf/NIPS");
        let response = json!({"result": {"hits": {"@sent": "2", "hit": [
            {"info": {"venue": "Something Else", "url": "https://dblp.org/db/conf/other/"}},
            {"info": {"venue": "Neural Information Processing Systems (NeurIPS)", "url": "https://dblp.org/db/conf/nips/"}}
        ]}}});
        scraper.parse(&response.to_string(), &mut record);
        assert_eq!(record.publication(), "Neural Information Processing Systems (NeurIPS)");
        assert_eq!(record.provenance(Field::Publication), Provenance::Scraper);
    }

    #[test]
    fn test_venue_parse_no_match_policies() {
        let no_hits = json!({"result": {"hits": {"@sent": "0"}}}).to_string();

        let mut record = with_marker("conf/nips");
        venue_scraper().parse(&no_hits, &mut record);
        assert_eq!(record.publication(), "");
        assert_eq!(record.provenance(Field::Publication), Provenance::Unset);

        let mut record = with_marker("conf/nips");
        venue_scraper().with_unmatched_policy(UnmatchedVenuePolicy::Keep).parse(&no_hits, &mut record);
        assert_eq!(record.publication(), "dblp://conf/nips");
    }

    #[test]
    fn test_venue_resolves_marker_loaded_from_json() {
        let mut record: PaperRecord = serde_json::from_value(json!({
            "title": "Attention Is All You Need",
            "publication": "dblp://conf/nips"
        }))
        .unwrap();
        assert!(venue_scraper().pre_process(&record, &ScraperPreferences::new()).enabled);

        let response = json!({"result": {"hits": {"@sent": "1", "hit": [
            {"info": {"venue": "NeurIPS", "url": "https://dblp.org/db/conf/nips/"}}
        ]}}});
        venue_scraper().parse(&response.to_string(), &mut record);
        assert_eq!(record.publication(), "NeurIPS");
    }
}
