//! Decides whether a source should run for a record.

use crate::preferences::PreferenceStore;
use crate::record::PaperRecord;

/// One condition a source needs before it fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// The query derived from the record is not blank.
    NonEmptyQuery,
    /// The record has no confirmed venue yet.
    Preprint,
    /// The record carries a DOI.
    Doi,
    /// The publication starts with this unresolved-venue scheme.
    VenueMarker(&'static str),
    /// The preference under this key is enabled.
    Enabled(&'static str),
}

/// Result of evaluating a [`GatingPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Open,
    /// Closed by the first unmet requirement.
    Closed(Requirement),
}

impl Gate {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Ordered set of requirements; all must hold for the gate to open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatingPolicy {
    requirements: Vec<Requirement>,
}

impl GatingPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn require(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Evaluate against a record and the query derived from it.
    #[must_use]
    pub fn evaluate(&self, record: &PaperRecord, query: &str, preferences: &dyn PreferenceStore) -> Gate {
        self.requirements
            .iter()
            .find(|req| !Self::holds(req, record, query, preferences))
            .map_or(Gate::Open, |req| Gate::Closed(req.clone()))
    }

    fn holds(
        requirement: &Requirement,
        record: &PaperRecord,
        query: &str,
        preferences: &dyn PreferenceStore,
    ) -> bool {
        match requirement {
            Requirement::NonEmptyQuery => !query.trim().is_empty(),
            Requirement::Preprint => record.is_preprint(),
            Requirement::Doi => record.doi().is_some_and(|d| !d.trim().is_empty()),
            Requirement::VenueMarker(scheme) => record.publication().starts_with(scheme),
            Requirement::Enabled(key) => preferences.scraper(key).enable,
        }
    }
}
