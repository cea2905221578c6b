#![allow(clippy::expect_used)]

use flate2::{Compression, write::GzEncoder};
use scandium_common::{enrichment::EnrichmentRecord, vuln::Vulnerability};
use scandium_module_updater::{
    Enricher, EnrichmentGetter, Error,
    enricher::cvss::CvssEnricher,
};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use test_log::test;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path_regex},
};

fn yearly_feed() -> Vec<u8> {
    let feed = json!({
        "CVE_Items": [{
            "cve": { "CVE_data_meta": { "ID": "CVE-2016-2781" } },
            "impact": { "baseMetricV3": { "cvssV3": { "baseScore": 6.5 } } }
        }]
    });

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(feed.to_string().as_bytes())
        .expect("write feed");
    encoder.finish().expect("finish gzip")
}

async fn mock_feed_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/nvdcve-1\.1-\d{4}\.meta$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "lastModifiedDate:2024-01-01T00:00:00-05:00\r\nsize:1\r\nsha256:FEEDFACE\r\n",
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/nvdcve-1\.1-\d{4}\.json\.gz$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(yearly_feed()))
        .mount(&server)
        .await;

    server
}

#[test(tokio::test)]
async fn second_fetch_with_same_checksums_is_unchanged() -> Result<(), anyhow::Error> {
    let server = mock_feed_server().await;
    let root = format!("{}/", server.uri());
    let enricher = CvssEnricher::with_feed_root(reqwest::Client::new(), &root)?;

    let (feed, fingerprint) = enricher.fetch_enrichment(None).await?;

    let records = enricher.parse_enrichment(feed).await?;
    assert!(!records.is_empty());
    assert!(
        records
            .iter()
            .all(|record| record.tags == vec!["CVE-2016-2781"])
    );

    match enricher.fetch_enrichment(Some(&fingerprint)).await {
        Err(Error::Unchanged) => {}
        Err(err) => panic!("expected Unchanged, got {err:?}"),
        Ok(_) => panic!("expected Unchanged, got records"),
    }

    Ok(())
}

struct FakeGetter {
    by_tag: HashMap<String, EnrichmentRecord>,
}

#[async_trait::async_trait]
impl EnrichmentGetter for FakeGetter {
    async fn get_enrichment(&self, tags: &[String]) -> Result<Vec<EnrichmentRecord>, Error> {
        Ok(tags
            .iter()
            .filter_map(|tag| self.by_tag.get(tag).cloned())
            .collect())
    }
}

#[test(tokio::test)]
async fn enrich_matches_by_cve_mention() -> Result<(), anyhow::Error> {
    let enricher = CvssEnricher::new(reqwest::Client::new());

    let getter = FakeGetter {
        by_tag: HashMap::from([(
            "CVE-2016-2781".to_string(),
            EnrichmentRecord {
                tags: vec!["CVE-2016-2781".to_string()],
                enrichment: json!({ "baseScore": 6.5 }),
            },
        )]),
    };

    let named = Vulnerability {
        name: "CVE-2016-2781".into(),
        ..Default::default()
    };
    let mentioned = Vulnerability {
        name: "GO-001".into(),
        description: "tracked upstream as CVE-2016-2781".into(),
        ..Default::default()
    };
    let unrelated = Vulnerability {
        name: "GO-007".into(),
        description: "a go stdlib defect".into(),
        ..Default::default()
    };

    let enriched = enricher
        .enrich(&getter, &[named, mentioned, unrelated])
        .await?;

    assert_eq!(enriched.len(), 2);
    assert_eq!(enriched["CVE-2016-2781"], vec![json!({ "baseScore": 6.5 })]);
    assert_eq!(enriched["GO-001"], vec![json!({ "baseScore": 6.5 })]);
    assert!(!enriched.contains_key("GO-007"));

    Ok(())
}
