//! Generic driver and host-fallback fetch.

use url::Url;

use super::{ScrapeContext, ScrapeOutcome, Scraper, ScraperRequest};
use crate::client::Transport;
use crate::error::{ClientError, ScrapeResult};
use crate::record::PaperRecord;

/// Run `scraper` over `record`: gate, fetch, parse.
///
/// A disabled request returns immediately unless `force` is set. Fetch errors
/// propagate to the caller; parsing never fails.
pub async fn scrape<S>(
    scraper: &S,
    ctx: &ScrapeContext,
    record: &mut PaperRecord,
    force: bool,
) -> ScrapeResult<ScrapeOutcome>
where
    S: Scraper + ?Sized,
{
    let request = scraper.pre_process(record, ctx.preferences.as_ref());

    if !request.enabled && !force {
        tracing::trace!(source = scraper.name(), "Gated off");
        return Ok(ScrapeOutcome::Skipped);
    }

    let body = fetch_with_fallback(ctx.transport.as_ref(), &request, scraper.mirror_host()).await?;
    scraper.parse(&body, record);
    Ok(ScrapeOutcome::Fetched)
}

/// Fetch `request`, retrying once against `mirror_host` if the primary fails.
///
/// The mirror attempt reuses the path, query and headers of the primary
/// request. If it fails too, its error is returned unchanged. Without a mirror
/// the primary error is returned.
pub async fn fetch_with_fallback(
    transport: &dyn Transport,
    request: &ScraperRequest,
    mirror_host: Option<&str>,
) -> ScrapeResult<String> {
    let url = Url::parse(&request.url).map_err(|_| ClientError::invalid_url(&request.url))?;

    let primary_error = match transport.get(&url, &request.headers).await {
        Ok(body) if !body.trim().is_empty() => return Ok(body),
        Ok(_) => ClientError::empty_body(url.as_str()),
        Err(err) => err,
    };

    let Some(host) = mirror_host else {
        return Err(primary_error.into());
    };

    tracing::debug!(%url, mirror = host, error = %primary_error, "Primary fetch failed, trying mirror");

    let mirror_url = with_host(&url, host)?;
    let body = transport.get(&mirror_url, &request.headers).await?;
    if body.trim().is_empty() {
        return Err(ClientError::empty_body(mirror_url.as_str()).into());
    }
    Ok(body)
}

fn with_host(url: &Url, host: &str) -> Result<Url, ClientError> {
    let mut mirror = url.clone();
    mirror.set_host(Some(host)).map_err(|_| ClientError::invalid_url(format!("{url} -> {host}")))?;
    Ok(mirror)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_host_keeps_path_and_query() {
        let url = Url::parse("https://dblp.org/search/publ/api?q=a%20b&format=json").unwrap();
        let mirror = with_host(&url, "dblp.uni-trier.de").unwrap();
        assert_eq!(mirror.as_str(), "https://dblp.uni-trier.de/search/publ/api?q=a%20b&format=json");
    }

    #[test]
    fn test_with_host_keeps_port() {
        let url = Url::parse("http://127.0.0.1:8080/search?q=x").unwrap();
        let mirror = with_host(&url, "localhost").unwrap();
        assert_eq!(mirror.as_str(), "http://localhost:8080/search?q=x");
    }

    #[test]
    fn test_with_host_rejects_garbage() {
        let url = Url::parse("https://dblp.org/x").unwrap();
        assert!(with_host(&url, "bad host").is_err());
    }
}
