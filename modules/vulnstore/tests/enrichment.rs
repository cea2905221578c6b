#![allow(clippy::expect_used)]

use scandium_common::enrichment::EnrichmentRecord;
use scandium_entity::enrichment;
use scandium_module_vulnstore::StoreService;
use scandium_test_context::ScandiumContext;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use test_context::test_context;
use test_log::test;

fn record(tag: &str, score: f64) -> EnrichmentRecord {
    EnrichmentRecord {
        tags: vec![tag.to_string()],
        enrichment: json!({ "baseScore": score }),
    }
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn tag_intersection_round_trip(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    store
        .update_enrichments(
            "cvss",
            "fp-1".into(),
            &[
                record("CVE-2016-2781", 6.5),
                record("CVE-2020-0001", 9.8),
            ],
        )
        .await?;

    let hits = store
        .get_enrichment(
            "cvss",
            &["CVE-2016-2781".to_string(), "CVE-1999-0001".to_string()],
        )
        .await?;

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].tags, vec!["CVE-2016-2781"]);
    assert_eq!(hits[0].enrichment, json!({ "baseScore": 6.5 }));

    assert!(
        store
            .get_enrichment("cvss", &["CVE-1999-0001".to_string()])
            .await?
            .is_empty()
    );

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn only_the_latest_operation_serves(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    store
        .update_enrichments("cvss", "fp-1".into(), &[record("CVE-2016-2781", 6.5)])
        .await?;
    store
        .update_enrichments("cvss", "fp-2".into(), &[record("CVE-2020-0001", 9.8)])
        .await?;

    // the old record still exists, but the newest operation wins
    assert!(
        store
            .get_enrichment("cvss", &["CVE-2016-2781".to_string()])
            .await?
            .is_empty()
    );
    assert_eq!(
        store
            .get_enrichment("cvss", &["CVE-2020-0001".to_string()])
            .await?
            .len(),
        1
    );

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn reingest_deduplicates_rows(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    let records = [record("CVE-2016-2781", 6.5)];
    store
        .update_enrichments("cvss", "fp-1".into(), &records)
        .await?;
    store
        .update_enrichments("cvss", "fp-2".into(), &records)
        .await?;

    assert_eq!(enrichment::Entity::find().count(&ctx.db).await?, 1);

    Ok(())
}
