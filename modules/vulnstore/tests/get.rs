#![allow(clippy::expect_used)]

use scandium_common::{
    distribution::Distribution,
    index::IndexRecord,
    package::Package,
    version::{Version, VersionRange},
};
use scandium_module_vulnstore::{
    StoreService,
    service::{GetOpts, MatchConstraint},
};
use scandium_test_context::{ScandiumContext, sample_distribution, sample_vulnerability};
use test_context::test_context;
use test_log::test;

fn record_for(package: &str) -> IndexRecord {
    IndexRecord {
        package: Package {
            id: format!("{package}-id"),
            name: package.to_string(),
            ..Default::default()
        },
        distribution: Some(sample_distribution()),
        repository: None,
    }
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn candidates_match_package_and_constraints(
    ctx: &ScandiumContext,
) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    let mut debian = sample_vulnerability("test-updater", 0);
    debian.package.name = "coreutils".into();

    let mut other_dist = sample_vulnerability("test-updater", 1);
    other_dist.package.name = "coreutils".into();
    other_dist.dist = Distribution {
        did: "rhel".into(),
        name: "Red Hat Enterprise Linux".into(),
        version_id: "9".into(),
        ..Default::default()
    };

    let mut other_package = sample_vulnerability("test-updater", 2);
    other_package.package.name = "bash".into();

    store
        .update_vulnerabilities(
            "test-updater",
            "fp-1".into(),
            &[debian, other_dist, other_package],
        )
        .await?;

    let record = record_for("coreutils");
    let opts = GetOpts {
        matchers: vec![MatchConstraint::DistributionDID],
        version_filtering: false,
    };

    let results = store.get(std::slice::from_ref(&record), &opts).await?;
    let hits = &results["coreutils-id"];

    assert_eq!(hits.len(), 1, "constraint should drop the rhel row: {hits:#?}");
    assert_eq!(hits[0].dist.did, "debian");
    assert_eq!(hits[0].name, "CVE-2024-0000");

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn source_package_name_matches(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    let mut vuln = sample_vulnerability("test-updater", 0);
    vuln.package.name = "coreutils-src".into();
    store
        .update_vulnerabilities("test-updater", "fp-1".into(), &[vuln])
        .await?;

    let mut record = record_for("coreutils");
    record.package.source = Some(Box::new(Package {
        name: "coreutils-src".into(),
        ..Default::default()
    }));

    let results = store.get(&[record], &GetOpts::default()).await?;

    assert_eq!(results["coreutils-id"].len(), 1);

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn version_filtering_matches_ranges(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    let mut vuln = sample_vulnerability("test-updater", 0);
    vuln.package.name = "urllib3".into();
    vuln.range = Some(VersionRange {
        lower: Version::from_parts("pep440", [0, 1, 0, 0]),
        upper: Version::from_parts("pep440", [0, 2, 0, 0]),
    });

    store
        .update_vulnerabilities("test-updater", "fp-1".into(), &[vuln])
        .await?;

    let opts = GetOpts {
        matchers: vec![],
        version_filtering: true,
    };

    let mut inside = record_for("urllib3");
    inside.package.normalized_version = Some(Version::from_parts("pep440", [0, 1, 20, 3]));
    let results = store.get(std::slice::from_ref(&inside), &opts).await?;
    assert_eq!(results["urllib3-id"].len(), 1, "1.20.3 is inside [1,2)");

    let mut outside = record_for("urllib3");
    outside.package.normalized_version = Some(Version::from_parts("pep440", [0, 2, 0, 1]));
    let results = store.get(std::slice::from_ref(&outside), &opts).await?;
    assert!(
        results.get("urllib3-id").is_none_or(|hits| hits.is_empty()),
        "2.0.1 is outside [1,2)"
    );

    let mut unversioned = record_for("urllib3");
    unversioned.package.normalized_version = None;
    let results = store.get(std::slice::from_ref(&unversioned), &opts).await?;
    assert_eq!(
        results["urllib3-id"].len(),
        1,
        "records without a version scheme skip the filter"
    );

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn invalid_records_do_not_abort_siblings(
    ctx: &ScandiumContext,
) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    let mut vuln = sample_vulnerability("test-updater", 0);
    vuln.package.name = "coreutils".into();
    store
        .update_vulnerabilities("test-updater", "fp-1".into(), &[vuln])
        .await?;

    let mut invalid = record_for("unnamed");
    invalid.package.name.clear();
    let valid = record_for("coreutils");

    let results = store.get(&[invalid, valid], &GetOpts::default()).await?;

    assert!(results.get("unnamed-id").is_none());
    assert_eq!(results["coreutils-id"].len(), 1);

    Ok(())
}

#[test_context(ScandiumContext)]
#[test(tokio::test)]
async fn results_key_on_package_id(ctx: &ScandiumContext) -> Result<(), anyhow::Error> {
    let store = StoreService::new(ctx.db.clone());

    let mut first = sample_vulnerability("test-updater", 0);
    first.package.name = "coreutils".into();
    let mut second = sample_vulnerability("test-updater", 1);
    second.package.name = "bash".into();

    store
        .update_vulnerabilities("test-updater", "fp-1".into(), &[first, second])
        .await?;

    let records = [record_for("coreutils"), record_for("bash")];
    let results = store.get(&records, &GetOpts::default()).await?;

    assert_eq!(results.len(), 2);
    assert_eq!(results["coreutils-id"].len(), 1);
    assert_eq!(results["bash-id"].len(), 1);

    Ok(())
}
