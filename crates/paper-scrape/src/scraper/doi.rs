//! DOI lookup through content negotiation (CSL-JSON).

use serde::Deserialize;
use url::Url;

use super::{GatingPolicy, Requirement, Scraper, ScraperRequest, TextValue};
use crate::config::{Config, api};
use crate::normalize::{NormalizeOptions, normalize};
use crate::preferences::PreferenceStore;
use crate::record::{Field, PaperRecord, PubType};

/// Preference key of the standalone DOI source.
pub const DOI_PREFERENCE: &str = "doi";

/// Subset of a CSL-JSON item.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CslItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<TextValue>,
    author: Vec<CslName>,
    issued: Option<CslDate>,
    #[serde(rename = "container-title")]
    container_title: Option<TextValue>,
    volume: Option<TextValue>,
    page: Option<TextValue>,
    issue: Option<TextValue>,
    publisher: Option<TextValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CslName {
    given: Option<String>,
    family: Option<String>,
    literal: Option<String>,
}

impl CslName {
    fn display(&self) -> String {
        if let Some(literal) = &self.literal {
            return literal.trim().to_string();
        }
        [self.given.as_deref(), self.family.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CslDate {
    #[serde(rename = "date-parts")]
    date_parts: Vec<Vec<TextValue>>,
}

impl CslDate {
    fn year(&self) -> Option<String> {
        self.date_parts.first()?.first()?.first()
    }
}

/// CSL item types mapped onto [`PubType`].
fn csl_pub_type(kind: &str) -> PubType {
    match kind {
        "journal-article" => PubType::Journal,
        "proceedings-article" | "paper-conference" => PubType::Conference,
        "book" | "book-chapter" | "monograph" | "edited-book" => PubType::Book,
        _ => PubType::Other,
    }
}

/// Looks a record's DOI up at the DOI resolver.
///
/// The standalone source honors the `doi` preference; the inner variant,
/// used as a delegate by other sources, only needs a DOI on the record.
#[derive(Debug, Clone)]
pub struct DoiScraper {
    name: &'static str,
    base_url: String,
    mirror_host: String,
    gate: GatingPolicy,
}

impl DoiScraper {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let gate = GatingPolicy::new()
            .require(Requirement::Doi)
            .require(Requirement::Enabled(DOI_PREFERENCE));
        Self::build(config, "doi", gate)
    }

    /// Variant without a preference check.
    #[must_use]
    pub fn inner(config: &Config) -> Self {
        Self::build(config, "doi-inner", GatingPolicy::new().require(Requirement::Doi))
    }

    fn build(config: &Config, name: &'static str, gate: GatingPolicy) -> Self {
        Self {
            name,
            base_url: config.doi_url.trim_end_matches('/').to_string(),
            mirror_host: config.doi_mirror_host.clone(),
            gate,
        }
    }
}

impl DoiScraper {
    /// Resolver URL for `doi`, escaping `#`, `?` and friends inside each segment.
    fn doi_url(&self, doi: &str) -> Option<String> {
        let mut url = Url::parse(&self.base_url).ok()?;
        url.path_segments_mut().ok()?.pop_if_empty().extend(doi.split('/'));
        Some(url.into())
    }
}

#[async_trait::async_trait]
impl Scraper for DoiScraper {
    fn name(&self) -> &str {
        self.name
    }

    fn pre_process(&self, record: &PaperRecord, preferences: &dyn PreferenceStore) -> ScraperRequest {
        let doi = record.doi().map(str::trim).unwrap_or_default();
        let enabled = self.gate.evaluate(record, doi, preferences).is_open();

        match self.doi_url(doi) {
            Some(url) => ScraperRequest::new(url).header("Accept", api::CSL_JSON).enabled(enabled),
            None => ScraperRequest::new(self.base_url.clone()).enabled(false),
        }
    }

    fn mirror_host(&self) -> Option<&str> {
        Some(&self.mirror_host)
    }

    fn parse(&self, body: &str, record: &mut PaperRecord) {
        let item: CslItem = match serde_json::from_str(body) {
            Ok(item) => item,
            Err(err) => {
                tracing::debug!(source = self.name, error = %err, "Unparseable CSL-JSON response");
                return;
            }
        };

        // A resolver answering for another DOI is a miss.
        if let (Some(found), Some(wanted)) = (item.doi.as_deref(), record.doi()) {
            if !found.trim().eq_ignore_ascii_case(wanted.trim()) {
                tracing::debug!(%found, %wanted, "DOI mismatch");
                return;
            }
        }

        let Some(title) = item.title.as_ref().and_then(TextValue::first) else {
            return;
        };
        let title = normalize(&title, &NormalizeOptions::removing(["\n", "\r"]));
        record.set_value(Field::Title, title.trim(), false);

        let authors: Vec<String> =
            item.author.iter().map(CslName::display).filter(|a| !a.is_empty()).collect();
        record.set_value(Field::Authors, authors.join(", "), false);

        if let Some(year) = item.issued.as_ref().and_then(CslDate::year) {
            record.set_value(Field::PubTime, year, false);
        }
        if let Some(kind) = item.kind.as_deref() {
            record.set_pub_type(csl_pub_type(kind), false);
        }

        for (field, value) in [
            (Field::Publication, &item.container_title),
            (Field::Volume, &item.volume),
            (Field::Pages, &item.page),
            (Field::Number, &item.issue),
            (Field::Publisher, &item.publisher),
        ] {
            if let Some(value) = value.as_ref().and_then(TextValue::first) {
                record.set_value(field, value, false);
            }
        }
    }
}
