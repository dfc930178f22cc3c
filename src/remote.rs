//! Remote artifact retrieval
//!
//! Provenance sources only ever need one thing from the network: the bytes behind
//! a URL, or a definitive "not there". The [`Fetcher`] trait captures exactly that
//! so sources can be exercised against in-memory fetchers in tests.

use crate::error::{ProvenantError, Result};
use std::time::Instant;
use tracing::{debug, info};

/// "Fetch bytes from URL"
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, following redirects
    ///
    /// Returns `Ok(None)` when the server answered but the resource is not
    /// available (any non-success status). Transport failures are errors.
    fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

/// Blocking HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the crate user agent
    ///
    /// Downloads run to completion: the blocking client's default total timeout
    /// is lifted so large archives over slow links are not cut off.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("provenant/", env!("CARGO_PKG_VERSION")))
            .timeout(None)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ProvenantError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        info!("Downloading {}...", url);
        let start = Instant::now();

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            debug!("{} returned {}", url, status);
            return Ok(None);
        }

        let body = response.bytes()?;
        debug!("Downloaded {} bytes from {} in {:?}", body.len(), url, start.elapsed());
        Ok(Some(body.to_vec()))
    }
}
