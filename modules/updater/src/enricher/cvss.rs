use super::cve_tags;
use crate::{
    driver::{Enricher, EnrichmentGetter, Fetched},
    error::Error,
};
use flate2::read::GzDecoder;
use scandium_common::{enrichment::EnrichmentRecord, update::Fingerprint, vuln::Vulnerability};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::pin::Pin;
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::instrument;
use url::Url;

/// Default feed location; the only process-wide constant of this module.
pub const DEFAULT_FEED_ROOT: &str = "https://nvd.nist.gov/feeds/json/cve/1.1/";

/// Operation lifecycle tag for this enricher.
pub const NAME: &str = "cvss";

/// First year the yearly feeds exist for.
const FIRST_FEED_YEAR: i32 = 2002;

/// Enriches vulnerabilities with CVSS scoring data from the NVD yearly
/// feeds.
///
/// The fingerprint is a JSON map of feed year to the SHA-256 advertised in
/// that year's `.meta` file; a fetch where every year still matches reports
/// [`Error::Unchanged`].
pub struct CvssEnricher {
    client: reqwest::Client,
    root: Url,
}

impl CvssEnricher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_feed_root(client, DEFAULT_FEED_ROOT).expect("default feed root is valid")
    }

    /// Use a different feed root, e.g. a mirror. The root must end in a
    /// trailing slash, as URL joining drops the last segment otherwise.
    pub fn with_feed_root(client: reqwest::Client, root: &str) -> Result<Self, Error> {
        if !root.ends_with('/') {
            return Err(Error::InvalidRoot(root.to_string()));
        }

        Ok(Self {
            client,
            root: Url::parse(root)?,
        })
    }

    async fn feed_checksum(&self, year: i32) -> Result<String, Error> {
        let url = self.root.join(&format!("nvdcve-1.1-{year}.meta"))?;
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_meta_checksum(&body)
    }

    async fn feed_items(&self, year: i32) -> Result<Vec<EnrichmentRecord>, Error> {
        let url = self.root.join(&format!("nvdcve-1.1-{year}.json.gz"))?;
        let compressed = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let mut body = Vec::new();
        GzDecoder::new(compressed.as_ref()).read_to_end(&mut body)?;
        let feed: Feed = serde_json::from_slice(&body)?;

        Ok(feed
            .cve_items
            .into_iter()
            .filter_map(|item| {
                let score = item
                    .impact
                    .get("baseMetricV3")
                    .and_then(|metric| metric.get("cvssV3"))
                    .filter(|score| !score.is_null())?;

                Some(EnrichmentRecord {
                    tags: vec![item.cve.meta.id],
                    enrichment: score.clone(),
                })
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl Enricher for CvssEnricher {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip_all, err)]
    async fn fetch_enrichment(&self, prior: Option<&Fingerprint>) -> Result<Fetched, Error> {
        let prior: BTreeMap<i32, String> = prior
            .and_then(|fp| serde_json::from_str(fp.as_str()).ok())
            .unwrap_or_default();

        let mut checksums = BTreeMap::new();
        let mut changed = Vec::new();
        for year in FIRST_FEED_YEAR..=OffsetDateTime::now_utc().year() {
            let checksum = self.feed_checksum(year).await?;
            if prior.get(&year) != Some(&checksum) {
                changed.push(year);
            }
            checksums.insert(year, checksum);
        }

        if changed.is_empty() {
            return Err(Error::Unchanged);
        }
        log::debug!("{} of {} yearly feeds changed", changed.len(), checksums.len());

        let mut buf = Vec::new();
        for year in changed {
            for record in self.feed_items(year).await? {
                serde_json::to_writer(&mut buf, &record)?;
            }
        }

        let fingerprint = Fingerprint(serde_json::to_string(&checksums)?);
        Ok((Box::pin(std::io::Cursor::new(buf)), fingerprint))
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

    /// Match stored CVSS data to vulnerabilities by scanning their text for
    /// CVE ids. Results are keyed by vulnerability name; vulnerabilities
    /// mentioning no CVE produce no entry.
    async fn enrich(
        &self,
        getter: &dyn EnrichmentGetter,
        vulns: &[Vulnerability],
    ) -> Result<HashMap<String, Vec<serde_json::Value>>, Error> {
        let mut out = HashMap::new();

        for vuln in vulns {
            let tags = cve_tags(vuln);
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

fn parse_meta_checksum(body: &str) -> Result<String, Error> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("sha256:"))
        .map(|checksum| checksum.trim().to_uppercase())
        .next()
        .ok_or_else(|| Error::Metadata("meta file carries no sha256 line".into()))
}

#[derive(Deserialize)]
struct Feed {
    #[serde(rename = "CVE_Items", default)]
    cve_items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    cve: Cve,
    #[serde(default)]
    impact: serde_json::Value,
}

#[derive(Deserialize)]
struct Cve {
    #[serde(rename = "CVE_data_meta")]
    meta: CveMeta,
}

#[derive(Deserialize)]
struct CveMeta {
    #[serde(rename = "ID")]
    id: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn feed_root_requires_trailing_slash() {
        let client = reqwest::Client::new();

        match CvssEnricher::with_feed_root(client.clone(), "http://example") {
            Err(Error::InvalidRoot(root)) => assert_eq!(root, "http://example"),
            other => panic!("expected InvalidRoot, got {:?}", other.err()),
        }

        assert!(CvssEnricher::with_feed_root(client, "http://example/").is_ok());
    }

    #[test]
    fn meta_checksum_parses() -> Result<(), Error> {
        let body = "lastModifiedDate:2024-01-01T00:00:00-05:00\r\nsize:123\r\nsha256:ABC123\r\n";
        assert_eq!(parse_meta_checksum(body)?, "ABC123");

        assert!(parse_meta_checksum("size:123\r\n").is_err());

        Ok(())
    }

    #[test]
    fn feed_items_extract_cvss_v3() -> Result<(), anyhow::Error> {
        let feed: Feed = serde_json::from_value(serde_json::json!({
            "CVE_Items": [
                {
                    "cve": { "CVE_data_meta": { "ID": "CVE-2016-2781" } },
                    "impact": { "baseMetricV3": { "cvssV3": { "baseScore": 6.5 } } }
                },
                {
                    "cve": { "CVE_data_meta": { "ID": "CVE-2016-0001" } },
                    "impact": {}
                }
            ]
        }))?;

        let scored: Vec<_> = feed
            .cve_items
            .into_iter()
            .filter(|item| {
                item.impact
                    .get("baseMetricV3")
                    .and_then(|metric| metric.get("cvssV3"))
                    .is_some()
            })
            .collect();

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].cve.meta.id, "CVE-2016-2781");

        Ok(())
    }
}
