#![allow(clippy::expect_used)]

use scandium_common::update::UpdateKind;
use scandium_entity::{uo_vuln, vulnerability};
use scandium_module_vulnstore::StoreService;
use scandium_test_context::{ScandiumContext, sample_vulnerability};
use sea_orm::{EntityTrait, PaginatorTrait};
use test_context::test_context;
use test_log::test;

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn reingest_allocates_no_new_rows(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());
    let vulns: Vec<_> = (0..5).map(|n| sample_vulnerability("test-updater", n)).collect();

    let first = store
        .update_vulnerabilities("test-updater", "fp-1".into(), &vulns)
        .await?;
    let second = store
        .update_vulnerabilities("test-updater", "fp-2".into(), &vulns)
        .await?;

    assert_ne!(first, second, "every ingest mints a fresh ref");

    // identical content deduplicates to one row per identity, while each
    // operation keeps its own associations
    assert_eq!(vulnerability::Entity::find().count(&ctx.db).await?, 5);
    assert_eq!(uo_vuln::Entity::find().count(&ctx.db).await?, 10);

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn unnamed_records_are_skipped(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    let mut nameless_package = sample_vulnerability("test-updater", 0);
    nameless_package.package.name.clear();

    let mut nameless_dist = sample_vulnerability("test-updater", 1);
    nameless_dist.dist.name.clear();

    let valid = sample_vulnerability("test-updater", 2);

    store
        .update_vulnerabilities(
            "test-updater",
            "fp-1".into(),
            &[nameless_package, nameless_dist, valid],
        )
        .await?;

    assert_eq!(vulnerability::Entity::find().count(&ctx.db).await?, 1);

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn delete_counts_operations_not_cascades(
    ctx: &ScandiumContext,
) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());
    let vulns: Vec<_> = (0..3).map(|n| sample_vulnerability("test-updater", n)).collect();

    let r#ref = store
        .update_vulnerabilities("test-updater", "fp-1".into(), &vulns)
        .await?;

    assert_eq!(store.delete_update_operations(&[r#ref]).await?, 1);

    // associations cascade away, the vulnerability rows stay for GC
    assert_eq!(uo_vuln::Entity::find().count(&ctx.db).await?, 0);
    assert_eq!(vulnerability::Entity::find().count(&ctx.db).await?, 3);

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn directory_is_ordered_and_capped(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());
    let vuln = [sample_vulnerability("test-updater", 0)];

    let mut refs = Vec::new();
    for n in 0..12 {
        refs.push(
            store
                .update_vulnerabilities("test-updater", format!("fp-{n}").into(), &vuln)
                .await?,
        );
    }

    let ops = store
        .get_update_operations(UpdateKind::Vulnerability, &[])
        .await?;
    let ops = &ops["test-updater"];

    assert_eq!(ops.len(), 10, "history depth is capped");
    let newest_first: Vec<_> = refs.iter().rev().take(10).copied().collect();
    let listed: Vec<_> = ops.iter().map(|op| op.r#ref).collect();
    assert_eq!(listed, newest_first);

    assert_eq!(
        store.get_latest_update_ref(UpdateKind::Vulnerability).await?,
        *refs.last().expect("refs recorded"),
    );

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn latest_refs_per_updater(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    let vuln_a = [sample_vulnerability("updater-a", 0)];
    let vuln_b = [sample_vulnerability("updater-b", 1)];

    store
        .update_vulnerabilities("updater-a", "fp-1".into(), &vuln_a)
        .await?;
    let newest_a = store
        .update_vulnerabilities("updater-a", "fp-2".into(), &vuln_a)
        .await?;
    let newest_b = store
        .update_vulnerabilities("updater-b", "fp-1".into(), &vuln_b)
        .await?;

    let latest = store
        .get_latest_update_refs(UpdateKind::Vulnerability)
        .await?;

    assert_eq!(latest.len(), 2);
    assert_eq!(latest["updater-a"], newest_a);
    assert_eq!(latest["updater-b"], newest_b);

    Ok(())
}
