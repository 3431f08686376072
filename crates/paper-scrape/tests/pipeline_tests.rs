//! Pipeline, mirror fallback and delegation tests against an in-process transport.

mod common;

use std::sync::Arc;

use common::{CountingScraper, MockTransport, context, dblp_hits};
use paper_scrape::error::{ClientError, ScrapeError};
use paper_scrape::scraper::{UnmatchedVenuePolicy, fetch_with_fallback, scrape};
use paper_scrape::{
    Config, DBLP_VENUE_SCHEME, DblpScraper, DblpVenueScraper, DoiScraper, Field, PaperRecord,
    Provenance, PubType, ScrapeContext, ScrapeOutcome, Scraper, ScraperPreference,
    ScraperPreferences, ScraperRequest,
};

fn config() -> Config {
    Config::for_testing("http://127.0.0.1:9")
}

// =============================================================================
// Gating
// =============================================================================

#[tokio::test]
async fn test_disabled_unforced_scrape_touches_nothing() {
    let transport = MockTransport::always("{}");
    let ctx = context(transport.clone());
    let scraper = DblpScraper::new(&config());

    let mut record = PaperRecord::new("Attention Is All You Need").with(Field::Publication, "Nature");
    let before = record.clone();

    let outcome = scraper.scrape(&ctx, &mut record, false).await.unwrap();

    assert_eq!(outcome, ScrapeOutcome::Skipped);
    assert_eq!(record, before);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_force_runs_a_disabled_source() {
    let transport = MockTransport::always(&dblp_hits(&[]).to_string());
    let ctx = context(transport.clone());
    let scraper = DblpScraper::new(&config());

    let mut record = PaperRecord::new("Attention Is All You Need").with(Field::Publication, "Nature");
    let outcome = scraper.scrape(&ctx, &mut record, true).await.unwrap();

    assert_eq!(outcome, ScrapeOutcome::Fetched);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_force_bypasses_gating_but_keeps_trusted_fields() {
    let body = dblp_hits(&[(
        "Attention is All you Need.",
        "conf/nips/VaswaniSPUJGKP17",
        "NIPS",
        "Conference and Workshop Papers",
    )]);
    let ctx = context(MockTransport::always(&body.to_string()));

    let mut record = PaperRecord::new("Attention Is All You Need").with(Field::Publication, "Nature");
    let outcome = DblpScraper::new(&config()).scrape(&ctx, &mut record, true).await.unwrap();

    assert_eq!(outcome, ScrapeOutcome::Fetched);
    assert_eq!(record.publication(), "Nature");
    assert_eq!(record.provenance(Field::Publication), Provenance::User);
    assert_eq!(record.pub_time(), "2017");
}

#[tokio::test]
async fn test_disabled_preference_skips_source() {
    let transport = MockTransport::always("{}");
    let ctx = context(transport.clone())
        .with_preferences(Arc::new(ScraperPreferences::new().disable("dblp")));

    let mut record = PaperRecord::new("Attention Is All You Need");
    let outcome = DblpScraper::new(&config()).scrape(&ctx, &mut record, false).await.unwrap();

    assert_eq!(outcome, ScrapeOutcome::Skipped);
    assert_eq!(transport.call_count(), 0);
}

// =============================================================================
// Mirror fallback
// =============================================================================

#[tokio::test]
async fn test_primary_success_makes_one_call() {
    let transport = MockTransport::always("body");
    let request = ScraperRequest::new("https://dblp.org/search/publ/api?q=x&format=json");

    let body = fetch_with_fallback(transport.as_ref(), &request, Some("dblp.uni-trier.de")).await.unwrap();

    assert_eq!(body, "body");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_primary_failure_retries_mirror_once_with_same_request() {
    let transport = MockTransport::new(|url| match url.host_str() {
        Some("dblp.org") => Err(ClientError::server(500, "down")),
        _ => Ok("mirror body".to_string()),
    });
    let request = ScraperRequest::new("https://dblp.org/search/publ/api?q=a+b&format=json")
        .header("Accept", "application/json");

    let body = fetch_with_fallback(transport.as_ref(), &request, Some("dblp.uni-trier.de")).await.unwrap();
    assert_eq!(body, "mirror body");

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    let (primary, primary_headers) = &calls[0];
    let (mirror, mirror_headers) = &calls[1];
    assert_eq!(mirror.host_str(), Some("dblp.uni-trier.de"));
    assert_eq!(mirror.path(), primary.path());
    assert_eq!(mirror.query(), primary.query());
    assert_eq!(mirror_headers, primary_headers);
}

#[tokio::test]
async fn test_empty_primary_body_falls_back() {
    let transport = MockTransport::new(|url| match url.host_str() {
        Some("doi.org") => Ok("   ".to_string()),
        _ => Ok("{\"title\": \"x\"}".to_string()),
    });
    let request = ScraperRequest::new("https://doi.org/10.1/x");

    let body = fetch_with_fallback(transport.as_ref(), &request, Some("dx.doi.org")).await.unwrap();

    assert!(body.contains("title"));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_mirror_error_propagates_unchanged() {
    let transport = MockTransport::new(|url| match url.host_str() {
        Some("dblp.org") => Err(ClientError::server(500, "primary down")),
        _ => Err(ClientError::server(502, "mirror down")),
    });
    let request = ScraperRequest::new("https://dblp.org/search/venue/api?q=conf%2Fnips&format=json");

    let err = fetch_with_fallback(transport.as_ref(), &request, Some("dblp.uni-trier.de")).await.unwrap_err();

    match err {
        ScrapeError::Network(ClientError::Server { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "mirror down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_no_mirror_returns_primary_error() {
    let transport = MockTransport::failing();
    let request = ScraperRequest::new("https://example.org/x");

    let err = fetch_with_fallback(transport.as_ref(), &request, None).await.unwrap_err();

    assert!(err.is_network());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_fetch_error_propagates_from_pipeline() {
    let transport = MockTransport::failing();
    let ctx = context(transport.clone());
    let mut record = PaperRecord::new("Attention Is All You Need");
    let before = record.clone();

    let result = scrape(&DblpScraper::new(&config()), &ctx, &mut record, false).await;

    assert!(matches!(result, Err(ScrapeError::Network(_))));
    assert_eq!(record, before);
    assert_eq!(transport.call_count(), 2);
}

// =============================================================================
// DBLP parse through the pipeline
// =============================================================================

#[tokio::test]
async fn test_dblp_search_fills_record() {
    let body = dblp_hits(&[(
        "Attention is All you Need.",
        "conf/nips/VaswaniSPUJGKP17",
        "NIPS",
        "Conference and Workshop Papers",
    )]);
    let transport = MockTransport::always(&body.to_string());
    let ctx = context(transport.clone());

    let mut record = PaperRecord::new("Attention Is All You Need");
    DblpScraper::new(&config()).scrape(&ctx, &mut record, false).await.unwrap();

    assert_eq!(record.pub_type(), PubType::Conference);
    assert_eq!(record.publication(), "dblp://conf/nips");
    assert_eq!(record.author_list(), vec!["Ashish Vaswani", "Noam Shazeer", "Niki Parmar"]);
    assert_eq!(record.pub_time(), "2017");

    let (url, _) = &transport.calls()[0];
    assert_eq!(url.path(), "/search/publ/api");
    assert!(url.query().unwrap().contains("format=json"));
}

#[tokio::test]
async fn test_by_time_variant_queries_year() {
    let transport = MockTransport::always(&dblp_hits(&[]).to_string());
    let ctx = context(transport.clone());

    let mut record = PaperRecord::new("Graph Attention Networks").with(Field::PubTime, "2017");
    DblpScraper::by_time(&config(), 1).scrape(&ctx, &mut record, false).await.unwrap();

    let (url, _) = &transport.calls()[0];
    let q: String = url.query_pairs().find(|(k, _)| k == "q").map(|(_, v)| v.into_owned()).unwrap();
    assert_eq!(q, "Graph Attention Networks year:2018");
}

// =============================================================================
// Delegation
// =============================================================================

fn marked_record(doi: Option<&str>) -> PaperRecord {
    let mut record = PaperRecord::new("Attention Is All You Need");
    record.set_venue_marker(DBLP_VENUE_SCHEME, "conf/nips", false);
    if let Some(doi) = doi {
        record.set_value(Field::Doi, doi, false);
    }
    record
}

#[tokio::test]
async fn test_venue_delegates_when_doi_present() {
    let transport = MockTransport::always("{}");
    let ctx = context(transport.clone());
    let delegate = CountingScraper::new("doi-inner");
    let venue = DblpVenueScraper::new(&config(), delegate.clone());

    let mut record = marked_record(Some("10.5555/3295222.3295349"));
    venue.scrape(&ctx, &mut record, false).await.unwrap();
    venue.scrape(&ctx, &mut record, true).await.unwrap();

    assert_eq!(delegate.runs(), vec![false, true]);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_venue_uses_dblp_when_requested() {
    let body = common::dblp_venues(&[(
        "Neural Information Processing Systems (NeurIPS)",
        "https://dblp.org/db/conf/nips/",
    )]);
    let transport = MockTransport::always(&body.to_string());
    let prefs = ScraperPreferences::new().with_scraper(
        "dblp",
        ScraperPreference { enable: true, args: Some("use-dblp".to_string()) },
    );
    let ctx = context(transport.clone()).with_preferences(Arc::new(prefs));
    let delegate = CountingScraper::new("doi-inner");
    let venue = DblpVenueScraper::new(&config(), delegate.clone());

    let mut record = marked_record(Some("10.5555/3295222.3295349"));
    venue.scrape(&ctx, &mut record, false).await.unwrap();

    assert!(delegate.runs().is_empty());
    assert_eq!(transport.call_count(), 1);
    assert_eq!(record.publication(), "Neural Information Processing Systems (NeurIPS)");
}

#[tokio::test]
async fn test_delegation_is_decided_per_call() {
    let transport = MockTransport::always(&common::dblp_venues(&[]).to_string());
    let ctx = context(transport.clone());
    let delegate = CountingScraper::new("doi-inner");
    let venue = DblpVenueScraper::new(&config(), delegate.clone());

    let mut without_doi = marked_record(None);
    venue.scrape(&ctx, &mut without_doi, false).await.unwrap();
    let mut with_doi = marked_record(Some("10.1/x"));
    venue.scrape(&ctx, &mut with_doi, false).await.unwrap();

    assert_eq!(transport.call_count(), 1);
    assert_eq!(delegate.runs(), vec![false]);
}

#[tokio::test]
async fn test_venue_delegate_doi_lookup_replaces_marker() {
    let csl = serde_json::json!({
        "DOI": "10.5555/3295222.3295349",
        "type": "paper-conference",
        "title": "Attention is all you need",
        "container-title": "Advances in Neural Information Processing Systems"
    });
    let transport = MockTransport::always(&csl.to_string());
    let ctx = context(transport.clone());
    let venue = DblpVenueScraper::new(&config(), Arc::new(DoiScraper::inner(&config())));

    let mut record = marked_record(Some("10.5555/3295222.3295349"));
    venue.scrape(&ctx, &mut record, false).await.unwrap();

    assert_eq!(record.publication(), "Advances in Neural Information Processing Systems");
    assert_eq!(record.provenance(Field::Publication), Provenance::Scraper);
    let (url, headers) = &transport.calls()[0];
    assert_eq!(url.path(), "/10.5555/3295222.3295349");
    assert_eq!(
        headers.get("Accept").map(String::as_str),
        Some("application/vnd.citationstyles.csl+json")
    );
}

#[tokio::test]
async fn test_unmatched_venue_policies() {
    let transport = MockTransport::always(&common::dblp_venues(&[("Other", "https://dblp.org/db/conf/icml/")]).to_string());
    let ctx: ScrapeContext = context(transport);

    let mut cleared = marked_record(None);
    DblpVenueScraper::new(&config(), CountingScraper::new("d"))
        .scrape(&ctx, &mut cleared, false)
        .await
        .unwrap();
    assert_eq!(cleared.publication(), "");

    let mut kept = marked_record(None);
    DblpVenueScraper::new(&config(), CountingScraper::new("d"))
        .with_unmatched_policy(UnmatchedVenuePolicy::Keep)
        .scrape(&ctx, &mut kept, false)
        .await
        .unwrap();
    assert_eq!(kept.publication(), "dblp://conf/nips");
}
