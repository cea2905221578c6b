use crate::{
    driver::{Fetched, Updater},
    error::Error,
};
use scandium_common::{
    distribution::Distribution,
    package::Package,
    repository::Repository,
    update::Fingerprint,
    vuln::Vulnerability,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::pin::Pin;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::instrument;
use url::Url;

/// Default export bucket; the per-ecosystem archives live below it.
pub const DEFAULT_FEED_ROOT: &str = "https://osv-vulnerabilities.storage.googleapis.com/";

/// Ecosystems mirrored by default. Callers needing more supply their own
/// list.
pub const DEFAULT_ECOSYSTEMS: &[&str] = &["Debian", "Alpine", "PyPI", "crates.io", "Go", "npm"];

pub const NAME: &str = "osv";

/// Imports the OSV per-ecosystem `all.zip` exports.
///
/// The fingerprint is a JSON map of ecosystem to the export's ETag; a fetch
/// where every archive answers `304 Not Modified` reports
/// [`Error::Unchanged`]. The fetched feed is re-framed as a length-unframed
/// sequence of raw advisory objects, one per archive member.
pub struct OsvUpdater {
    client: reqwest::Client,
    root: Url,
    ecosystems: Vec<String>,
}

impl OsvUpdater {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_feed_root(client, DEFAULT_FEED_ROOT, DEFAULT_ECOSYSTEMS)
            .expect("default feed root is valid")
    }

    /// Use a different export root and ecosystem set. The root must end in a
    /// trailing slash.
    pub fn with_feed_root(
        client: reqwest::Client,
        root: &str,
        ecosystems: &[&str],
    ) -> Result<Self, Error> {
        if !root.ends_with('/') {
            return Err(Error::InvalidRoot(root.to_string()));
        }

        Ok(Self {
            client,
            root: Url::parse(root)?,
            ecosystems: ecosystems.iter().map(ToString::to_string).collect(),
        })
    }

    /// Fetch one ecosystem's archive, honoring the previous ETag. Returns
    /// the new ETag and the archive body, or `None` when unmodified.
    async fn fetch_archive(
        &self,
        ecosystem: &str,
        etag: Option<&str>,
    ) -> Result<Option<(String, Vec<u8>)>, Error> {
        let url = self.root.join(&format!("{ecosystem}/all.zip"))?;

        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        let response = response.error_for_status()?;

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| Error::Metadata(format!("{ecosystem}: export without an ETag")))?;

        Ok(Some((etag, response.bytes().await?.to_vec())))
    }
}

#[async_trait::async_trait]
impl Updater for OsvUpdater {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip_all, err)]
    async fn fetch(&self, prior: Option<&Fingerprint>) -> Result<Fetched, Error> {
        let prior: BTreeMap<String, String> = prior
            .and_then(|fp| serde_json::from_str(fp.as_str()).ok())
            .unwrap_or_default();

        let mut etags = BTreeMap::new();
        let mut buf = Vec::new();
        let mut changed = 0usize;

        for ecosystem in &self.ecosystems {
            let known = prior.get(ecosystem).map(String::as_str);
            match self.fetch_archive(ecosystem, known).await? {
                None => {
                    // 304 only happens when we sent an etag, so this is set
                    if let Some(etag) = known {
                        etags.insert(ecosystem.clone(), etag.to_string());
                    }
                }
                Some((etag, archive)) => {
                    changed += 1;
                    etags.insert(ecosystem.clone(), etag);

                    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive))?;
                    for index in 0..archive.len() {
                        let mut advisory = Vec::new();
                        archive.by_index(index)?.read_to_end(&mut advisory)?;
                        buf.extend_from_slice(&advisory);
                    }
                }
            }
        }

        if changed == 0 {
            return Err(Error::Unchanged);
        }
        log::debug!("{changed} of {} ecosystem exports changed", self.ecosystems.len());

        let fingerprint = Fingerprint(serde_json::to_string(&etags)?);
        Ok((Box::pin(std::io::Cursor::new(buf)), fingerprint))
    }

    async fn parse(
        &self,
        mut feed: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Result<Vec<Vulnerability>, Error> {
        let mut buf = Vec::new();
        feed.read_to_end(&mut buf).await?;

        let mut vulns = Vec::new();
        for advisory in serde_json::Deserializer::from_slice(&buf).into_iter() {
            let advisory: Advisory = advisory?;
            if advisory.withdrawn.is_some() {
                continue;
            }
            vulns.extend(advisory.into_vulnerabilities());
        }

        Ok(vulns)
    }
}

/// The subset of the OSV schema this updater consumes.
#[derive(Debug, Deserialize)]
struct Advisory {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    withdrawn: Option<String>,
    #[serde(default)]
    affected: Vec<Affected>,
    #[serde(default)]
    references: Vec<Reference>,
    #[serde(default)]
    severity: Vec<Severity>,
}

#[derive(Debug, Deserialize)]
struct Affected {
    package: Option<OsvPackage>,
    #[serde(default)]
    ranges: Vec<Range>,
}

#[derive(Debug, Deserialize)]
struct OsvPackage {
    ecosystem: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Range {
    #[serde(default)]
    events: Vec<Event>,
}

/// Range events keyed by their single field.
#[derive(Debug, Deserialize)]
enum Event {
    #[serde(rename = "introduced")]
    Introduced(String),
    #[serde(rename = "fixed")]
    Fixed(String),
    #[serde(rename = "last_affected")]
    LastAffected(String),
    #[serde(rename = "limit")]
    Limit(String),
}

#[derive(Debug, Deserialize)]
struct Reference {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Severity {
    score: String,
}

impl Advisory {
    /// One vulnerability per affected package.
    fn into_vulnerabilities(self) -> Vec<Vulnerability> {
        let issued = self
            .published
            .as_deref()
            .and_then(|date| OffsetDateTime::parse(date, &Rfc3339).ok());

        let links = self
            .references
            .iter()
            .map(|reference| reference.url.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let severity = self
            .severity
            .first()
            .map(|severity| severity.score.clone())
            .unwrap_or_default();

        let description = self
            .summary
            .or(self.details)
            .unwrap_or_default();

        self.affected
            .into_iter()
            .filter_map(|affected| {
                let package = affected.package?;

                let fixed_in_version = affected
                    .ranges
                    .iter()
                    .flat_map(|range| &range.events)
                    .find_map(|event| match event {
                        Event::Fixed(version) => Some(version.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();

                Some(Vulnerability {
                    updater: NAME.to_string(),
                    name: self.id.clone(),
                    description: description.clone(),
                    issued,
                    links: links.clone(),
                    severity: severity.clone(),
                    package: Package {
                        name: package.name,
                        kind: "binary".into(),
                        ..Default::default()
                    },
                    // the export is keyed by ecosystem, not OS release
                    dist: Distribution {
                        did: package.ecosystem.to_lowercase(),
                        name: package.ecosystem.clone(),
                        ..Default::default()
                    },
                    repo: Repository {
                        name: format!("osv:{}", package.ecosystem),
                        uri: DEFAULT_FEED_ROOT.to_string(),
                        ..Default::default()
                    },
                    fixed_in_version,
                    ..Default::default()
                })
            })
            .collect()
    }
}
