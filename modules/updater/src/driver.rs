use crate::error::Error;
use scandium_common::{enrichment::EnrichmentRecord, update::Fingerprint, vuln::Vulnerability};
use std::collections::HashMap;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// A fetched feed and the fingerprint describing the remote state it was
/// taken from.
pub type Fetched = (Pin<Box<dyn AsyncRead + Send>>, Fingerprint);

/// A named source of vulnerability data.
#[async_trait::async_trait]
pub trait Updater: Send + Sync {
    /// Stable across runs; tags every operation this updater produces.
    fn name(&self) -> &str;

    /// Fetch the remote feed.
    ///
    /// `prior` is the fingerprint returned by the previous successful fetch,
    /// if any. Returns [`Error::Unchanged`] when it still describes the
    /// remote state.
    async fn fetch(&self, prior: Option<&Fingerprint>) -> Result<Fetched, Error>;

    /// Parse a previously fetched feed into vulnerability records.
    async fn parse(
        &self,
        feed: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Result<Vec<Vulnerability>, Error>;
}

/// A named source of enrichment data, the enrichment-side twin of
/// [`Updater`].
#[async_trait::async_trait]
pub trait Enricher: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the remote enrichment feed; same fingerprint contract as
    /// [`Updater::fetch`].
    async fn fetch_enrichment(&self, prior: Option<&Fingerprint>) -> Result<Fetched, Error>;

    /// Decode a feed: a length-unframed sequence of JSON records.
    async fn parse_enrichment(
        &self,
        feed: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Result<Vec<EnrichmentRecord>, Error>;

    /// Look up enrichments for the given vulnerabilities through `getter`,
    /// keyed by vulnerability name.
    async fn enrich(
        &self,
        getter: &dyn EnrichmentGetter,
        vulns: &[Vulnerability],
    ) -> Result<HashMap<String, Vec<serde_json::Value>>, Error>;
}

/// Retrieval side of the enrichment storage contract, as seen by enrichers.
#[async_trait::async_trait]
pub trait EnrichmentGetter: Send + Sync {
    async fn get_enrichment(&self, tags: &[String]) -> Result<Vec<EnrichmentRecord>, Error>;
}
