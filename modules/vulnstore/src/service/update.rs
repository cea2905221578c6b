use super::{StoreService, digest, microbatch::Microbatcher};
use crate::error::Error;
use scandium_common::{
    db::chunk::EntityChunkedIter, enrichment::EnrichmentRecord, update::Fingerprint,
    vuln::Vulnerability,
};
use scandium_entity::{
    enrichment,
    update_operation::{self, UpdateKind},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DbBackend, EntityTrait, QueryFilter,
    Statement, TransactionTrait,
};
use sea_query::OnConflict;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

const INSERT_VULNERABILITY: &str = r#"
INSERT INTO vuln (
    id, hash_kind, hash, updater, name, description, issued, links, severity,
    normalized_severity, package_name, package_version, package_module,
    package_arch, package_kind, dist_id, dist_name, dist_version,
    dist_version_code_name, dist_version_id, dist_arch, dist_cpe,
    dist_pretty_name, repo_name, repo_key, repo_uri, fixed_in_version,
    arch_operation, version_kind, vulnerable_range
) VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29,
    CASE WHEN $30::int[] IS NULL THEN NULL
         ELSE versionrange($30::int[], $31::int[], '[)')
    END
)
ON CONFLICT (hash_kind, hash) DO NOTHING
"#;

const ASSOCIATE_VULNERABILITY: &str = r#"
INSERT INTO uo_vuln (uo, vuln)
VALUES ($1, (SELECT id FROM vuln WHERE hash_kind = $2 AND hash = $3))
ON CONFLICT DO NOTHING
"#;

const ASSOCIATE_ENRICHMENT: &str = r#"
INSERT INTO uo_enrich (uo, enrich)
VALUES ($1, (SELECT id FROM enrichment WHERE hash_kind = $2 AND hash = $3))
ON CONFLICT DO NOTHING
"#;

impl StoreService {
    /// Create a new update operation for `updater` and associate every valid
    /// vulnerability with it.
    ///
    /// Records are content-addressed: a vulnerability whose identity digest
    /// is already stored only gains a new association, never a new row. The
    /// whole ingest is one transaction; on any error no trace of the
    /// operation remains.
    #[instrument(skip(self, vulns), fields(num = vulns.len()), err)]
    pub async fn update_vulnerabilities(
        &self,
        updater: &str,
        fingerprint: Fingerprint,
        vulns: &[Vulnerability],
    ) -> Result<Uuid, Error> {
        let tx = self.db.begin().await?;

        let op = update_operation::ActiveModel {
            r#ref: Set(Uuid::new_v4()),
            updater: Set(updater.to_string()),
            fingerprint: Set(fingerprint.to_string()),
            kind: Set(UpdateKind::Vulnerability),
            date: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        }
        .insert(&tx)
        .await?;

        let mut batcher = Microbatcher::new(&tx);
        let mut skipped = 0usize;

        for vuln in vulns {
            // unmatchable records are an observability event, not an error
            if vuln.package.name.is_empty() || vuln.dist.name.is_empty() {
                skipped += 1;
                continue;
            }

            let hash = digest::vuln_digest(vuln);
            batcher
                .queue(insert_vulnerability(updater, &hash, vuln))
                .await?;
            batcher.queue(associate_vulnerability(op.id, &hash)).await?;
        }

        batcher.done().await?;
        tx.commit().await?;

        if skipped > 0 {
            log::debug!(
                "{updater}: skipped {skipped} records with an empty package or distribution name"
            );
        }

        Ok(op.r#ref)
    }

    /// The enrichment-side twin of [`Self::update_vulnerabilities`].
    #[instrument(skip(self, records), fields(num = records.len()), err)]
    pub async fn update_enrichments(
        &self,
        updater: &str,
        fingerprint: Fingerprint,
        records: &[EnrichmentRecord],
    ) -> Result<Uuid, Error> {
        let tx = self.db.begin().await?;

        let op = update_operation::ActiveModel {
            r#ref: Set(Uuid::new_v4()),
            updater: Set(updater.to_string()),
            fingerprint: Set(fingerprint.to_string()),
            kind: Set(UpdateKind::Enrichment),
            date: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        }
        .insert(&tx)
        .await?;

        // deduplicate by identity up front, then bulk-insert in chunks
        let mut models = BTreeMap::new();
        let mut hashes = Vec::with_capacity(records.len());
        for record in records {
            let hash = digest::enrichment_digest(record);
            models
                .entry(digest::enrichment_id(&hash))
                .or_insert_with(|| enrichment::ActiveModel {
                    id: Set(digest::enrichment_id(&hash)),
                    hash_kind: Set(digest::HASH_KIND.to_string()),
                    hash: Set(hash.clone()),
                    updater: Set(updater.to_string()),
                    tags: Set(record.tags.clone()),
                    data: Set(record.enrichment.clone()),
                });
            hashes.push(hash);
        }

        for batch in &models.into_values().chunked() {
            enrichment::Entity::insert_many(batch)
                .on_conflict(OnConflict::new().do_nothing().to_owned())
                .do_nothing()
                .exec_without_returning(&tx)
                .await?;
        }

        let mut batcher = Microbatcher::new(&tx);
        for hash in &hashes {
            batcher.queue(associate_enrichment(op.id, hash)).await?;
        }

        batcher.done().await?;
        tx.commit().await?;

        Ok(op.r#ref)
    }

    /// Remove update operations by ref.
    ///
    /// The returned count is the number of *operations* deleted; association
    /// rows removed by the cascade are not counted.
    #[instrument(skip(self), err)]
    pub async fn delete_update_operations(&self, refs: &[Uuid]) -> Result<u64, Error> {
        if refs.is_empty() {
            return Ok(0);
        }

        let result = update_operation::Entity::delete_many()
            .filter(update_operation::Column::Ref.is_in(refs.iter().copied()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

fn insert_vulnerability(updater: &str, hash: &[u8], vuln: &Vulnerability) -> Statement {
    let (version_kind, range_lower, range_upper): (
        Option<String>,
        Option<Vec<i32>>,
        Option<Vec<i32>>,
    ) = match &vuln.range {
        Some(range) => (
            Some(range.kind().to_string()),
            Some(range.lower.v.to_vec()),
            Some(range.upper.v.to_vec()),
        ),
        None => (None, None, None),
    };

    Statement::from_sql_and_values(
        DbBackend::Postgres,
        INSERT_VULNERABILITY,
        [
            digest::vuln_id(hash).into(),
            digest::HASH_KIND.into(),
            hash.to_vec().into(),
            updater.into(),
            vuln.name.clone().into(),
            vuln.description.clone().into(),
            vuln.issued.into(),
            vuln.links.clone().into(),
            vuln.severity.clone().into(),
            vuln.normalized_severity.to_string().into(),
            vuln.package.name.clone().into(),
            vuln.package.version.clone().into(),
            vuln.package.module.clone().into(),
            vuln.package.arch.clone().into(),
            vuln.package.kind.clone().into(),
            vuln.dist.did.clone().into(),
            vuln.dist.name.clone().into(),
            vuln.dist.version.clone().into(),
            vuln.dist.version_code_name.clone().into(),
            vuln.dist.version_id.clone().into(),
            vuln.dist.arch.clone().into(),
            vuln.dist.cpe.clone().into(),
            vuln.dist.pretty_name.clone().into(),
            vuln.repo.name.clone().into(),
            vuln.repo.key.clone().into(),
            vuln.repo.uri.clone().into(),
            vuln.fixed_in_version.clone().into(),
            vuln.arch_operation
                .map(|op| op.to_string())
                .unwrap_or_default()
                .into(),
            version_kind.into(),
            range_lower.into(),
            range_upper.into(),
        ],
    )
}

fn associate_vulnerability(op_id: i64, hash: &[u8]) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        ASSOCIATE_VULNERABILITY,
        [
            op_id.into(),
            digest::HASH_KIND.into(),
            hash.to_vec().into(),
        ],
    )
}

fn associate_enrichment(op_id: i64, hash: &[u8]) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        ASSOCIATE_ENRICHMENT,
        [
            op_id.into(),
            digest::HASH_KIND.into(),
            hash.to_vec().into(),
        ],
    )
}
