//! Blocking HTTP fetcher run off the async event loop.

use std::io::Read;

use meshcrop::{FetchedBytes, Fetcher};
use meshcrop_io::SourceError;

/// Upper bound on a downloaded model.
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

/// Fetches `http(s)` URLs with `ureq` on tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, SourceError> {
        let owned = url.to_string();
        tokio::task::spawn_blocking(move || get(&owned))
            .await
            .map_err(|e| SourceError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?
    }
}

fn get(url: &str) -> Result<FetchedBytes, SourceError> {
    let fail = |reason: String| SourceError::Fetch {
        url: url.to_string(),
        reason,
    };

    tracing::debug!(%url, "GET");
    let response = ureq::get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, response) => fail(format!("HTTP {code} {}", response.status_text())),
        other => fail(other.to_string()),
    })?;

    let content_type = response.header("Content-Type").map(str::to_string);
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|e| fail(e.to_string()))?;
    Ok(FetchedBytes {
        bytes,
        content_type,
    })
}
