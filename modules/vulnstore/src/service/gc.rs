use super::StoreService;
use crate::error::Error;
use futures::{StreamExt, stream};
use scandium_entity::vulnerability;
use sea_orm::{ConnectionTrait, DbBackend, EntityTrait, QuerySelect, Statement};
use tracing::instrument;
use uuid::Uuid;

/// Upper bound on operations deleted per GC call, capping the cascade load a
/// single call can put on the database.
const GC_THROTTLE: u64 = 50;

/// Page size of the reference sweep.
const SWEEP_PAGE_SIZE: u64 = 10_000;

const ELIGIBLE_COUNT: &str = r#"
SELECT COUNT(*) AS eligible FROM (
    SELECT ROW_NUMBER() OVER (PARTITION BY updater ORDER BY id DESC) AS rank
    FROM update_operation
    WHERE kind = 'vulnerability'
) ranked
WHERE ranked.rank > $1
"#;

const ELIGIBLE_REFS: &str = r#"
SELECT ref FROM (
    SELECT ref, ROW_NUMBER() OVER (PARTITION BY updater ORDER BY id DESC) AS rank
    FROM update_operation
    WHERE kind = 'vulnerability'
) ranked
WHERE ranked.rank > $1
ORDER BY ranked.rank DESC
LIMIT $2
"#;

const SWEEP_PAGE: &str = r#"
SELECT id FROM vuln
WHERE updater = $1 AND id > $2
ORDER BY id
LIMIT $3
"#;

/// The reference re-check lives inside the DELETE, so a vulnerability newly
/// associated between page scan and delete survives.
const SWEEP_DELETE: &str = r#"
DELETE FROM vuln
WHERE id = ANY($1)
  AND NOT EXISTS (SELECT 1 FROM uo_vuln WHERE uo_vuln.vuln = vuln.id)
"#;

impl StoreService {
    /// Retain the `keep` newest vulnerability operations per updater and
    /// delete older ones, then drop vulnerability rows no surviving
    /// operation references.
    ///
    /// Deletion is throttled; the return value is the number of operations
    /// that exceeded retention but were not deleted this call. Callers loop
    /// until it reaches zero.
    #[instrument(skip(self), err)]
    pub async fn gc(&self, keep: u64) -> Result<i64, Error> {
        let eligible = self.eligible_count(keep).await?;
        if eligible == 0 {
            return Ok(0);
        }

        let refs = self.eligible_refs(keep).await?;
        let deleted = self.delete_update_operations(&refs).await?;
        log::debug!("gc deleted {deleted} of {eligible} eligible operations");

        self.sweep_vulnerabilities().await?;

        Ok(eligible - deleted as i64)
    }

    async fn eligible_count(&self, keep: u64) -> Result<i64, Error> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            ELIGIBLE_COUNT,
            [(keep as i64).into()],
        );

        match self.db.query_one(stmt).await? {
            Some(row) => Ok(row.try_get("", "eligible")?),
            None => Ok(0),
        }
    }

    async fn eligible_refs(&self, keep: u64) -> Result<Vec<Uuid>, Error> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            ELIGIBLE_REFS,
            [(keep as i64).into(), (GC_THROTTLE as i64).into()],
        );

        self.db
            .query_all(stmt)
            .await?
            .into_iter()
            .map(|row| row.try_get("", "ref").map_err(Error::from))
            .collect()
    }

    /// Sweep all updaters concurrently, bounded by the host parallelism.
    ///
    /// Every sweep runs to completion before this returns, errors included;
    /// per-updater failures are collected and joined rather than aborting
    /// the others.
    async fn sweep_vulnerabilities(&self) -> Result<(), Error> {
        let updaters: Vec<String> = vulnerability::Entity::find()
            .select_only()
            .column(vulnerability::Column::Updater)
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await?;

        let errors: Vec<Error> = stream::iter(updaters)
            .map(|updater| {
                let store = self.clone();
                async move { store.sweep_updater(&updater).await }
            })
            .buffer_unordered(num_cpus::get().max(1))
            .filter_map(|result| async move { result.err() })
            .collect()
            .await;

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Sweep(errors))
        }
    }

    /// Page through one updater's rows in id order and delete the
    /// unreferenced ones.
    async fn sweep_updater(&self, updater: &str) -> Result<u64, Error> {
        let mut cursor = Uuid::nil();
        let mut removed = 0u64;

        loop {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                SWEEP_PAGE,
                [
                    updater.into(),
                    cursor.into(),
                    (SWEEP_PAGE_SIZE as i64).into(),
                ],
            );

            let page: Vec<Uuid> = self
                .db
                .query_all(stmt)
                .await?
                .into_iter()
                .map(|row| row.try_get("", "id").map_err(Error::from))
                .collect::<Result<_, _>>()?;

            let Some(last) = page.last() else {
                break;
            };
            cursor = *last;
            let short_page = (page.len() as u64) < SWEEP_PAGE_SIZE;

            let stmt =
                Statement::from_sql_and_values(DbBackend::Postgres, SWEEP_DELETE, [page.into()]);
            removed += self.db.execute(stmt).await?.rows_affected();

            if short_page {
                break;
            }
        }

        if removed > 0 {
            log::debug!("{updater}: removed {removed} unreferenced vulnerabilities");
        }

        Ok(removed)
    }
}
