#![allow(clippy::expect_used)]

use scandium_common::{
    enrichment::EnrichmentRecord,
    update::{Fingerprint, UpdateKind},
    vuln::Vulnerability,
};
use scandium_entity::updater_status;
use scandium_module_updater::{
    Enricher, Error, Fetched, UpdateRunner, Updater,
};
use scandium_module_vulnstore::StoreService;
use scandium_test_context::{ScandiumContext, sample_vulnerability};
use sea_orm::EntityTrait;
use serde_json::json;
use std::io::Cursor;
use std::pin::Pin;
use test_context::test_context;
use test_log::test;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Serves a fixed set of vulnerabilities under a fixed fingerprint.
struct FakeUpdater {
    fingerprint: Fingerprint,
    vulns: Vec<Vulnerability>,
}

#[async_trait::async_trait]
impl Updater for FakeUpdater {
    fn name(&self) -> &str {
        "fake-updater"
    }

    async fn fetch(&self, prior: Option<&Fingerprint>) -> Result<Fetched, Error> {
        if prior == Some(&self.fingerprint) {
            return Err(Error::Unchanged);
        }

        let body = serde_json::to_vec(&self.vulns)?;
        Ok((Box::pin(Cursor::new(body)), self.fingerprint.clone()))
    }

    async fn parse(
        &self,
        mut feed: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Result<Vec<Vulnerability>, Error> {
        let mut buf = Vec::new();
        feed.read_to_end(&mut buf).await?;
        Ok(serde_json::from_slice(&buf)?)
    }
}

/// Always fails to fetch.
struct BrokenUpdater;

#[async_trait::async_trait]
impl Updater for BrokenUpdater {
    fn name(&self) -> &str {
        "broken-updater"
    }

    async fn fetch(&self, _prior: Option<&Fingerprint>) -> Result<Fetched, Error> {
        Err(Error::Metadata("feed fell over".into()))
    }

    async fn parse(
        &self,
        _feed: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Result<Vec<Vulnerability>, Error> {
        unreachable!("fetch never succeeds")
    }
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn run_ingests_then_short_circuits(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());
    let runner = UpdateRunner::new(store.clone());

    let updater = FakeUpdater {
        fingerprint: "fp-1".into(),
        vulns: (0..3).map(|n| sample_vulnerability("fake-updater", n)).collect(),
    };

    let r#ref = runner.run(&updater).await?.expect("first run ingests");

    let ops = store
        .get_update_operations(UpdateKind::Vulnerability, &["fake-updater"])
        .await?;
    assert_eq!(ops["fake-updater"].len(), 1);
    assert_eq!(ops["fake-updater"][0].r#ref, r#ref);
    assert_eq!(ops["fake-updater"][0].fingerprint, "fp-1".into());

    // second run sees its own fingerprint and stops early
    assert!(runner.run(&updater).await?.is_none());
    let ops = store
        .get_update_operations(UpdateKind::Vulnerability, &["fake-updater"])
        .await?;
    assert_eq!(ops["fake-updater"].len(), 1);

    let status = updater_status::Entity::find_by_id("fake-updater")
        .one(&ctx.db)
        .await?
        .expect("status row");
    assert_eq!(status.last_run_succeeded, Some(true));
    assert_eq!(status.last_attempt_fingerprint.as_deref(), Some("fp-1"));

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn fetch_failures_land_in_the_status_table(
    ctx: &ScandiumContext,
) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());
    let runner = UpdateRunner::new(store);

    assert!(runner.run(&BrokenUpdater).await.is_err());

    let status = updater_status::Entity::find_by_id("broken-updater")
        .one(&ctx.db)
        .await?
        .expect("status row");
    assert_eq!(status.last_run_succeeded, Some(false));
    assert_eq!(status.last_error.as_deref(), Some("malformed feed metadata: feed fell over"));
    assert!(status.last_success.is_none());

    Ok(())
}

/// Serves one enrichment record under a fixed fingerprint.
struct FakeEnricher;

#[async_trait::async_trait]
impl Enricher for FakeEnricher {
    fn name(&self) -> &str {
        "fake-enricher"
    }

    async fn fetch_enrichment(&self, prior: Option<&Fingerprint>) -> Result<Fetched, Error> {
        if prior == Some(&Fingerprint("fp-1".into())) {
            return Err(Error::Unchanged);
        }

        let record = EnrichmentRecord {
            tags: vec!["CVE-2016-2781".to_string()],
            enrichment: json!({ "baseScore": 6.5 }),
        };
        Ok((
            Box::pin(Cursor::new(serde_json::to_vec(&record)?)),
            "fp-1".into(),
        ))
    }

    async fn parse_enrichment(
        &self,
        mut feed: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Result<Vec<EnrichmentRecord>, Error> {
        let mut buf = Vec::new();
        feed.read_to_end(&mut buf).await?;

        serde_json::Deserializer::from_slice(&buf)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    async fn enrich(
        &self,
        getter: &dyn scandium_module_updater::EnrichmentGetter,
        vulns: &[Vulnerability],
    ) -> Result<std::collections::HashMap<String, Vec<serde_json::Value>>, Error> {
        let mut out = std::collections::HashMap::new();
        for vuln in vulns {
            let records = getter.get_enrichment(std::slice::from_ref(&vuln.name)).await?;
            if !records.is_empty() {
                out.insert(
                    vuln.name.clone(),
                    records.into_iter().map(|record| record.enrichment).collect(),
                );
            }
        }
        Ok(out)
    }
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn enrichments_round_trip_through_the_store(
    ctx: &ScandiumContext,
) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());
    let runner = UpdateRunner::new(store);

    assert!(runner.run_enricher(&FakeEnricher).await?.is_some());
    assert!(runner.run_enricher(&FakeEnricher).await?.is_none());

    let getter = runner.getter(&FakeEnricher);
    let vuln = Vulnerability {
        name: "CVE-2016-2781".into(),
        ..Default::default()
    };

    let enriched = FakeEnricher.enrich(&getter, std::slice::from_ref(&vuln)).await?;
    assert_eq!(enriched["CVE-2016-2781"], vec![json!({ "baseScore": 6.5 })]);

    Ok(())
}
