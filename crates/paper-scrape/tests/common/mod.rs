//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use paper_scrape::client::{Headers, Transport};
use paper_scrape::error::{ClientError, ClientResult};
use paper_scrape::{PaperRecord, PreferenceStore, ScrapeContext, Scraper, ScraperRequest};

type Responder = Box<dyn Fn(&Url) -> ClientResult<String> + Send + Sync>;

/// In-process transport that records every call.
pub struct MockTransport {
    calls: Mutex<Vec<(Url, Headers)>>,
    respond: Responder,
}

impl MockTransport {
    pub fn new(respond: impl Fn(&Url) -> ClientResult<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), respond: Box::new(respond) })
    }

    /// Answers every request with `body`.
    pub fn always(body: &str) -> Arc<Self> {
        let body = body.to_string();
        Self::new(move |_| Ok(body.clone()))
    }

    /// Fails every request.
    pub fn failing() -> Arc<Self> {
        Self::new(|_| Err(ClientError::server(503, "unavailable")))
    }

    pub fn calls(&self) -> Vec<(Url, Headers)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &Url, headers: &Headers) -> ClientResult<String> {
        self.calls.lock().unwrap().push((url.clone(), headers.clone()));
        (self.respond)(url)
    }
}

pub fn context(transport: Arc<MockTransport>) -> ScrapeContext {
    ScrapeContext::new(transport)
}

/// Source that counts runs and records the `force` flag it was given.
pub struct CountingScraper {
    pub name: String,
    pub runs: Mutex<Vec<bool>>,
    pub enabled: bool,
}

impl CountingScraper {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self { name: name.to_string(), runs: Mutex::new(Vec::new()), enabled: true })
    }

    pub fn runs(&self) -> Vec<bool> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scraper for CountingScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_process(&self, _: &PaperRecord, _: &dyn PreferenceStore) -> ScraperRequest {
        ScraperRequest::new("http://counting.invalid/").enabled(self.enabled)
    }

    fn parse(&self, _: &str, _: &mut PaperRecord) {}

    async fn scrape(
        &self,
        _ctx: &ScrapeContext,
        _record: &mut PaperRecord,
        force: bool,
    ) -> paper_scrape::error::ScrapeResult<paper_scrape::ScrapeOutcome> {
        self.runs.lock().unwrap().push(force);
        Ok(paper_scrape::ScrapeOutcome::Fetched)
    }
}

/// DBLP search response with one hit per `(title, key, venue, type)`.
pub fn dblp_hits(hits: &[(&str, &str, &str, &str)]) -> serde_json::Value {
    let hit: Vec<serde_json::Value> = hits
        .iter()
        .map(|(title, key, venue, kind)| {
            serde_json::json!({
                "@score": "7",
                "info": {
                    "authors": {"author": [
                        {"@pid": "13/3049", "text": "Ashish Vaswani"},
                        {"@pid": "68/1716", "text": "Noam Shazeer"},
                        {"@pid": "41/7785", "text": "Niki Parmar 0001"}
                    ]},
                    "title": title,
                    "venue": venue,
                    "pages": "5998-6008",
                    "year": "2017",
                    "type": kind,
                    "key": key,
                    "url": format!("https://dblp.org/rec/{key}")
                }
            })
        })
        .collect();

    serde_json::json!({
        "result": {
            "query": "attention*",
            "status": {"@code": "200", "text": "OK"},
            "hits": {"@total": hit.len().to_string(), "@sent": hit.len().to_string(), "@first": "0", "hit": hit}
        }
    })
}

/// DBLP venue response.
pub fn dblp_venues(venues: &[(&str, &str)]) -> serde_json::Value {
    let hit: Vec<serde_json::Value> = venues
        .iter()
        .map(|(venue, url)| serde_json::json!({"info": {"venue": venue, "url": url, "type": "Conference or Workshop"}}))
        .collect();
    serde_json::json!({"result": {"hits": {"@sent": hit.len().to_string(), "hit": hit}}})
}
