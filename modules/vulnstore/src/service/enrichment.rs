use super::StoreService;
use crate::error::Error;
use scandium_common::enrichment::EnrichmentRecord;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use tracing::instrument;

/// Latest-wins: only the newest enrichment operation of the updater is
/// consulted, and rows match on tag intersection.
const GET_ENRICHMENT: &str = r#"
WITH latest AS (
    SELECT MAX(id) AS id
    FROM update_operation
    WHERE updater = $1 AND kind = 'enrichment'
)
SELECT e.tags AS tags, e.data AS data
FROM enrichment e
JOIN uo_enrich uo ON e.id = uo.enrich
JOIN latest ON uo.uo = latest.id
WHERE e.tags && $2::text[]
"#;

impl StoreService {
    /// Fetch enrichment payloads whose tags intersect `tags`, from the
    /// newest enrichment operation of `updater`.
    #[instrument(skip(self, tags), fields(num = tags.len()), err)]
    pub async fn get_enrichment(
        &self,
        updater: &str,
        tags: &[String],
    ) -> Result<Vec<EnrichmentRecord>, Error> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            GET_ENRICHMENT,
            [updater.into(), tags.to_vec().into()],
        );

        self.db
            .query_all(stmt)
            .await?
            .into_iter()
            .map(|row| {
                Ok(EnrichmentRecord {
                    tags: row.try_get("", "tags")?,
                    enrichment: row.try_get("", "data")?,
                })
            })
            .collect()
    }
}
