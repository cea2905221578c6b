#![allow(clippy::expect_used)]

use postgresql_embedded::PostgreSQL;
use scandium_common::{
    db::Database,
    distribution::Distribution,
    package::Package,
    vuln::{Severity, Vulnerability},
};
use test_context::AsyncTestContext;
use tracing::instrument;

/// Test context backed by a freshly bootstrapped, embedded PostgreSQL
/// instance. The instance is temporary and torn down with the context.
pub struct ScandiumContext {
    pub db: Database,
    _postgresql: PostgreSQL,
}

impl AsyncTestContext for ScandiumContext {
    #[instrument]
    async fn setup() -> Self {
        let (db, postgresql) = scandium_db::embedded::create()
            .await
            .expect("create an embedded database");

        Self {
            db,
            _postgresql: postgresql,
        }
    }
}

/// A deterministic vulnerability for fixtures; `n` varies the identity.
pub fn sample_vulnerability(updater: &str, n: usize) -> Vulnerability {
    Vulnerability {
        updater: updater.to_string(),
        name: format!("CVE-2024-{n:04}"),
        description: format!("synthetic defect {n}"),
        links: format!("https://example.com/CVE-2024-{n:04}"),
        severity: "Important".into(),
        normalized_severity: Severity::High,
        package: Package {
            name: format!("package-{n}"),
            version: "1.0.0".into(),
            kind: "binary".into(),
            ..Default::default()
        },
        dist: sample_distribution(),
        fixed_in_version: "1.0.1".into(),
        ..Default::default()
    }
}

pub fn sample_distribution() -> Distribution {
    Distribution {
        did: "debian".into(),
        name: "Debian GNU/Linux".into(),
        version: "11 (bullseye)".into(),
        version_code_name: "bullseye".into(),
        version_id: "11".into(),
        pretty_name: "Debian GNU/Linux 11 (bullseye)".into(),
        ..Default::default()
    }
}
