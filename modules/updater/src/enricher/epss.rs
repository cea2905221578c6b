use crate::{
    driver::{Enricher, EnrichmentGetter, Fetched},
    error::Error,
};
use flate2::read::GzDecoder;
use scandium_common::{enrichment::EnrichmentRecord, update::Fingerprint, vuln::Vulnerability};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::instrument;
use url::Url;

/// Default location of the daily exploit-prediction scores.
pub const DEFAULT_FEED_URL: &str = "https://epss.cyentia.com/epss_scores-current.csv.gz";

pub const NAME: &str = "epss";

/// Enriches vulnerabilities with EPSS exploit-prediction scores.
///
/// The feed is one gzipped CSV refreshed daily; the fingerprint is the
/// export's ETag, so an unmodified feed short-circuits with a conditional
/// request.
pub struct EpssEnricher {
    client: reqwest::Client,
    url: Url,
}

impl EpssEnricher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_feed_url(client, DEFAULT_FEED_URL).expect("default feed url is valid")
    }

    pub fn with_feed_url(client: reqwest::Client, url: &str) -> Result<Self, Error> {
        Ok(Self {
            client,
            url: Url::parse(url)?,
        })
    }
}

#[async_trait::async_trait]
impl Enricher for EpssEnricher {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip_all, err)]
    async fn fetch_enrichment(&self, prior: Option<&Fingerprint>) -> Result<Fetched, Error> {
        let mut request = self.client.get(self.url.clone());
        if let Some(prior) = prior {
            request = request.header(reqwest::header::IF_NONE_MATCH, prior.as_str());
        }

        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Err(Error::Unchanged);
        }
        let response = response.error_for_status()?;

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| Error::Metadata("scores export without an ETag".into()))?;

        let compressed = response.bytes().await?;
        let mut body = Vec::new();
        GzDecoder::new(compressed.as_ref()).read_to_end(&mut body)?;

        let mut buf = Vec::new();
        for record in parse_scores(&body)? {
            serde_json::to_writer(&mut buf, &record)?;
        }

        Ok((Box::pin(std::io::Cursor::new(buf)), Fingerprint(etag)))
    }

    async fn parse_enrichment(
        &self,
        mut feed: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Result<Vec<EnrichmentRecord>, Error> {
        let mut buf = Vec::new();
        feed.read_to_end(&mut buf).await?;

        serde_json::Deserializer::from_slice(&buf)
            .into_iter()
            .collect::<Result<Vec<EnrichmentRecord>, _>>()
            .map_err(Error::from)
    }

    /// Same matching rule as the CVSS enricher: tags come from CVE mentions
    /// anywhere in the vulnerability's text.
    async fn enrich(
        &self,
        getter: &dyn EnrichmentGetter,
        vulns: &[Vulnerability],
    ) -> Result<HashMap<String, Vec<serde_json::Value>>, Error> {
        let mut out = HashMap::new();

        for vuln in vulns {
            let tags = super::cve_tags(vuln);
            if tags.is_empty() {
                continue;
            }

            let records = getter.get_enrichment(&tags).await?;
            if records.is_empty() {
                continue;
            }

            out.insert(
                vuln.name.clone(),
                records.into_iter().map(|record| record.enrichment).collect(),
            );
        }

        Ok(out)
    }
}

/// A row of the scores CSV. Score and percentile stay strings; the model
/// emits fixed-point decimals and consumers compare, not compute.
#[derive(Debug, Deserialize, serde::Serialize)]
struct Score {
    cve: String,
    epss: String,
    percentile: String,
}

fn parse_scores(body: &[u8]) -> Result<Vec<EnrichmentRecord>, Error> {
    // the export opens with a `#model_version:…` comment line
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_reader(body);

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let score: Score = row?;
        records.push(EnrichmentRecord {
            tags: vec![score.cve.clone()],
            enrichment: serde_json::to_value(&score)?,
        });
    }

    Ok(records)
}
