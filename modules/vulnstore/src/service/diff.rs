use super::StoreService;
use crate::error::Error;
use scandium_common::{update::UpdateDiff, vuln::Vulnerability};
use scandium_entity::vulnerability;
use sea_orm::{DbBackend, FromQueryResult, Statement};
use tracing::instrument;
use uuid::Uuid;

/// Everything the entity maps, so rows decode straight into models.
const VULN_COLUMNS: &str = r#"
    id, hash_kind, hash, updater, name, description, issued, links, severity,
    normalized_severity, package_name, package_version, package_module,
    package_arch, package_kind, dist_id, dist_name, dist_version,
    dist_version_code_name, dist_version_id, dist_arch, dist_cpe,
    dist_pretty_name, repo_name, repo_key, repo_uri, fixed_in_version,
    arch_operation, version_kind
"#;

/// One direction of the symmetric difference: vulnerabilities associated
/// with `$2` but not with `$1`.
fn side_query() -> String {
    format!(
        r#"
WITH
lhs AS (SELECT id FROM update_operation WHERE ref = $1),
rhs AS (SELECT id FROM update_operation WHERE ref = $2)
SELECT {VULN_COLUMNS}
FROM vuln
WHERE id IN (
    SELECT vuln FROM uo_vuln WHERE uo IN (SELECT id FROM rhs)
    EXCEPT ALL
    SELECT vuln FROM uo_vuln WHERE uo IN (SELECT id FROM lhs)
)
"#
    )
}

/// The full association set of one operation.
fn full_query() -> String {
    format!(
        r#"
SELECT {VULN_COLUMNS}
FROM vuln
WHERE id IN (
    SELECT vuln FROM uo_vuln
    WHERE uo IN (SELECT id FROM update_operation WHERE ref = $1)
)
"#
    )
}

impl StoreService {
    /// Compute the set difference between two update operations.
    ///
    /// `added` holds vulnerabilities associated with `cur` but not `prev`;
    /// `removed` the reverse. A nil `prev` reads as the empty set, so the
    /// whole of `cur` is reported as added. A nil `cur` is an error, as is a
    /// non-nil ref that does not exist.
    #[instrument(skip(self), err)]
    pub async fn get_update_diff(&self, prev: Uuid, cur: Uuid) -> Result<UpdateDiff, Error> {
        if cur.is_nil() {
            return Err(Error::InvalidEndpoint);
        }

        if prev.is_nil() {
            let (cur_op, added) =
                tokio::try_join!(self.get_update_operation(cur), self.operation_members(cur))?;
            return Ok(UpdateDiff {
                prev: None,
                cur: cur_op,
                added,
                removed: Vec::new(),
            });
        }

        let (prev_op, cur_op, added, removed) = tokio::try_join!(
            self.get_update_operation(prev),
            self.get_update_operation(cur),
            self.diff_side(prev, cur),
            self.diff_side(cur, prev),
        )?;

        Ok(UpdateDiff {
            prev: Some(prev_op),
            cur: cur_op,
            added,
            removed,
        })
    }

    async fn diff_side(&self, without: Uuid, within: Uuid) -> Result<Vec<Vulnerability>, Error> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            side_query(),
            [without.into(), within.into()],
        );

        Ok(vulnerability::Model::find_by_statement(stmt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn operation_members(&self, r#ref: Uuid) -> Result<Vec<Vulnerability>, Error> {
        let stmt =
            Statement::from_sql_and_values(DbBackend::Postgres, full_query(), [r#ref.into()]);

        Ok(vulnerability::Model::find_by_statement(stmt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }
}
