//! The bibliographic record being enriched, with field-level write protection.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix marking a publication that still needs venue resolution.
pub const DBLP_VENUE_SCHEME: &str = "dblp://";

/// Closed classification of a publication's venue kind.
///
/// Discriminants match the persisted integer encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PubType {
    /// Journal article
    Journal = 0,
    /// Conference or workshop paper
    Conference = 1,
    /// Anything else (preprints, theses, reports)
    #[default]
    Other = 2,
    /// Book or book chapter
    Book = 3,
}

impl PubType {
    /// Classify a free-text type label.
    ///
    /// Checks are ordered and non-exclusive: a label naming both a journal
    /// and a conference is a journal.
    #[must_use]
    pub fn classify(label: &str) -> Self {
        if label.contains("Journal") {
            Self::Journal
        } else if label.contains("Conference") {
            Self::Conference
        } else if label.contains("Book") {
            Self::Book
        } else {
            Self::Other
        }
    }
}

impl From<PubType> for u8 {
    fn from(value: PubType) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for PubType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Journal),
            1 => Ok(Self::Conference),
            2 => Ok(Self::Other),
            3 => Ok(Self::Book),
            other => Err(format!("unknown pubType {other}")),
        }
    }
}

/// Writable string fields of a [`PaperRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Authors,
    PubTime,
    PubType,
    Publication,
    Doi,
    Volume,
    Pages,
    Number,
    Publisher,
}

impl Field {
    /// Every field, in display order.
    pub const ALL: [Self; 10] = [
        Self::Title,
        Self::Authors,
        Self::PubTime,
        Self::PubType,
        Self::Publication,
        Self::Doi,
        Self::Volume,
        Self::Pages,
        Self::Number,
        Self::Publisher,
    ];

    /// Persisted key of the field.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Authors => "authors",
            Self::PubTime => "pubTime",
            Self::PubType => "pubType",
            Self::Publication => "publication",
            Self::Doi => "doi",
            Self::Volume => "volume",
            Self::Pages => "pages",
            Self::Number => "number",
            Self::Publisher => "publisher",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Who wrote a field's current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provenance {
    /// Never written, or cleared.
    #[default]
    Unset,
    /// Entered by the user.
    User,
    /// Written by a source.
    Scraper,
    /// Speculative placeholder written by a source; later writes may replace it.
    Marker,
}

impl Provenance {
    /// Whether a non-forced write may replace a value with this provenance.
    #[must_use]
    pub const fn is_overwritable(self) -> bool {
        matches!(self, Self::Unset | Self::Marker)
    }
}

/// Outcome of a write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was stored.
    Written,
    /// The field already held a trusted value.
    Protected,
    /// A non-forced write carried no value.
    Empty,
}

impl WriteOutcome {
    /// Whether the value was stored.
    #[must_use]
    pub const fn is_written(self) -> bool {
        matches!(self, Self::Written)
    }
}

/// A bibliographic record under enrichment.
///
/// Owned by one enrichment pass at a time; sources mutate it in place through
/// [`PaperRecord::set_value`], which enforces provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordSnapshot", into = "RecordSnapshot")]
pub struct PaperRecord {
    title: String,
    authors: String,
    pub_time: String,
    pub_type: PubType,
    publication: String,
    doi: Option<String>,
    volume: Option<String>,
    pages: Option<String>,
    number: Option<String>,
    publisher: Option<String>,
    provenance: BTreeMap<Field, Provenance>,
}

impl PaperRecord {
    /// Create a record with a user-entered title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let mut record = Self::default();
        record.set_user_value(Field::Title, title);
        record
    }

    /// Builder-style user write.
    #[must_use]
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set_user_value(field, value);
        self
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn authors(&self) -> &str {
        &self.authors
    }

    /// Author names split back out of the joined rendering.
    #[must_use]
    pub fn author_list(&self) -> Vec<&str> {
        self.authors.split(", ").map(str::trim).filter(|a| !a.is_empty()).collect()
    }

    #[must_use]
    pub fn pub_time(&self) -> &str {
        &self.pub_time
    }

    /// Publication year, if `pub_time` is numeric.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.pub_time.trim().parse().ok()
    }

    #[must_use]
    pub const fn pub_type(&self) -> PubType {
        self.pub_type
    }

    #[must_use]
    pub fn publication(&self) -> &str {
        &self.publication
    }

    #[must_use]
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref()
    }

    #[must_use]
    pub fn volume(&self) -> Option<&str> {
        self.volume.as_deref()
    }

    #[must_use]
    pub fn pages(&self) -> Option<&str> {
        self.pages.as_deref()
    }

    #[must_use]
    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    #[must_use]
    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }

    /// Current value of a field, `None` when empty.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<String> {
        let value = match field {
            Field::Title => self.title.clone(),
            Field::Authors => self.authors.clone(),
            Field::PubTime => self.pub_time.clone(),
            Field::PubType => u8::from(self.pub_type).to_string(),
            Field::Publication => self.publication.clone(),
            Field::Doi => self.doi.clone().unwrap_or_default(),
            Field::Volume => self.volume.clone().unwrap_or_default(),
            Field::Pages => self.pages.clone().unwrap_or_default(),
            Field::Number => self.number.clone().unwrap_or_default(),
            Field::Publisher => self.publisher.clone().unwrap_or_default(),
        };
        (!value.is_empty()).then_some(value)
    }

    /// Provenance of a field's current value.
    #[must_use]
    pub fn provenance(&self, field: Field) -> Provenance {
        self.provenance.get(&field).copied().unwrap_or_default()
    }

    /// Whether the record still looks like an unpublished preprint.
    ///
    /// True when no venue is known or the venue is a preprint server. An
    /// unresolved marker is not a preprint: a search already matched it.
    #[must_use]
    pub fn is_preprint(&self) -> bool {
        const PREPRINT_VENUES: &[&str] =
            &["arxiv", "openreview", "biorxiv", "medrxiv", "chemrxiv", "corr"];

        let venue = self.publication.trim().to_lowercase();
        if venue.starts_with(DBLP_VENUE_SCHEME) {
            return false;
        }
        venue.is_empty() || PREPRINT_VENUES.iter().any(|p| venue.contains(p))
    }

    /// Write a value on behalf of a source.
    ///
    /// Non-forced writes are rejected when the value is empty or the field
    /// already holds a user- or source-written value. Forced writes always
    /// succeed; forcing an empty value clears the field back to `Unset`.
    pub fn set_value(&mut self, field: Field, value: impl Into<String>, force: bool) -> WriteOutcome {
        self.write(field, value.into(), force, Provenance::Scraper)
    }

    /// Write a `pubType` on behalf of a source, with the same rules as [`Self::set_value`].
    pub fn set_pub_type(&mut self, pub_type: PubType, force: bool) -> WriteOutcome {
        if !force && !self.provenance(Field::PubType).is_overwritable() {
            return WriteOutcome::Protected;
        }
        self.pub_type = pub_type;
        self.provenance.insert(Field::PubType, Provenance::Scraper);
        WriteOutcome::Written
    }

    /// Write an unresolved-venue marker such as `dblp://conf/nips`.
    ///
    /// The marker takes `Marker` provenance so a later resolver can replace it
    /// with a non-forced write.
    pub fn set_venue_marker(&mut self, scheme: &str, key: &str, force: bool) -> WriteOutcome {
        self.write(Field::Publication, format!("{scheme}{key}"), force, Provenance::Marker)
    }

    /// Write a value as entered by the user. Always succeeds.
    pub fn set_user_value(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        if field == Field::PubType {
            if let Some(pub_type) = value.trim().parse::<u8>().ok().and_then(|v| PubType::try_from(v).ok()) {
                self.pub_type = pub_type;
                self.provenance.insert(field, Provenance::User);
            }
            return;
        }
        let _ = self.write(field, value, true, Provenance::User);
    }

    fn write(&mut self, field: Field, value: String, force: bool, provenance: Provenance) -> WriteOutcome {
        if !force {
            if value.is_empty() {
                return WriteOutcome::Empty;
            }
            if !self.provenance(field).is_overwritable() {
                return WriteOutcome::Protected;
            }
        }

        if field == Field::PubType {
            let parsed = value.trim().parse::<u8>().ok().and_then(|v| PubType::try_from(v).ok());
            self.pub_type = parsed.unwrap_or_default();
        } else {
            self.store(field, value.clone());
        }

        let provenance = if value.is_empty() { Provenance::Unset } else { provenance };
        if provenance == Provenance::Unset {
            self.provenance.remove(&field);
        } else {
            self.provenance.insert(field, provenance);
        }
        WriteOutcome::Written
    }

    fn store(&mut self, field: Field, value: String) {
        let optional = (!value.is_empty()).then(|| value.clone());
        match field {
            Field::Title => self.title = value,
            Field::Authors => self.authors = value,
            Field::PubTime => self.pub_time = value,
            Field::Publication => self.publication = value,
            Field::Doi => self.doi = optional,
            Field::Volume => self.volume = optional,
            Field::Pages => self.pages = optional,
            Field::Number => self.number = optional,
            Field::Publisher => self.publisher = optional,
            Field::PubType => {}
        }
    }
}

/// Plain persisted shape of a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RecordSnapshot {
    title: String,
    authors: String,
    pub_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub_type: Option<PubType>,
    publication: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
}

impl From<RecordSnapshot> for PaperRecord {
    /// Every value present in persisted input counts as user-entered, except an
    /// unresolved venue marker, which stays replaceable.
    fn from(snapshot: RecordSnapshot) -> Self {
        let mut record = Self::default();
        record.set_user_value(Field::Title, snapshot.title);
        record.set_user_value(Field::Authors, snapshot.authors);
        record.set_user_value(Field::PubTime, snapshot.pub_time);
        match snapshot.publication.strip_prefix(DBLP_VENUE_SCHEME) {
            Some(key) => {
                record.set_venue_marker(DBLP_VENUE_SCHEME, key, true);
            }
            None => record.set_user_value(Field::Publication, snapshot.publication),
        }
        record.set_user_value(Field::Doi, snapshot.doi.unwrap_or_default());
        record.set_user_value(Field::Volume, snapshot.volume.unwrap_or_default());
        record.set_user_value(Field::Pages, snapshot.pages.unwrap_or_default());
        record.set_user_value(Field::Number, snapshot.number.unwrap_or_default());
        record.set_user_value(Field::Publisher, snapshot.publisher.unwrap_or_default());
        if let Some(pub_type) = snapshot.pub_type {
            record.pub_type = pub_type;
            record.provenance.insert(Field::PubType, Provenance::User);
        }
        record
    }
}

impl From<PaperRecord> for RecordSnapshot {
    fn from(record: PaperRecord) -> Self {
        Self {
            title: record.title,
            authors: record.authors,
            pub_time: record.pub_time,
            pub_type: Some(record.pub_type),
            publication: record.publication,
            doi: record.doi,
            volume: record.volume,
            pages: record.pages,
            number: record.number,
            publisher: record.publisher,
        }
    }
}
