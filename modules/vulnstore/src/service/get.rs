use super::StoreService;
use crate::error::Error;
use scandium_common::{index::IndexRecord, vuln::Vulnerability};
use scandium_entity::vulnerability::{self, Column};
use sea_orm::{
    AccessMode, DbBackend, FromQueryResult, IsolationLevel, Statement, TransactionTrait,
};
use sea_query::{Cond, Expr, PostgresQueryBuilder, Query};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

/// Deadline for one whole `get` batch.
const GET_DEADLINE: Duration = Duration::from_secs(30);

/// The closed enumeration of predicates a matcher may request.
///
/// Each variant pins one column of the vulnerability table to the matching
/// field of the index record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchConstraint {
    DistributionDID,
    DistributionName,
    DistributionVersion,
    DistributionVersionCodeName,
    DistributionVersionID,
    DistributionPrettyName,
    DistributionCPE,
    DistributionArch,
    PackageModule,
    RepositoryName,
}

impl FromStr for MatchConstraint {
    type Err = Error;

    /// Parse the configuration name of a constraint.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "distribution.did" => MatchConstraint::DistributionDID,
            "distribution.name" => MatchConstraint::DistributionName,
            "distribution.version" => MatchConstraint::DistributionVersion,
            "distribution.version_code_name" => MatchConstraint::DistributionVersionCodeName,
            "distribution.version_id" => MatchConstraint::DistributionVersionID,
            "distribution.pretty_name" => MatchConstraint::DistributionPrettyName,
            "distribution.cpe" => MatchConstraint::DistributionCPE,
            "distribution.arch" => MatchConstraint::DistributionArch,
            "package.module" => MatchConstraint::PackageModule,
            "repository.name" => MatchConstraint::RepositoryName,
            other => return Err(Error::UnknownConstraint(other.to_string())),
        })
    }
}

/// Query-shaping options supplied by the matcher driving a scan.
#[derive(Clone, Debug, Default)]
pub struct GetOpts {
    /// Constraints to apply, in order. Duplicates are ignored.
    pub matchers: Vec<MatchConstraint>,
    /// Constrain hits to ranges containing the record's normalized version.
    /// Only effective for records whose matcher exposed a version scheme.
    pub version_filtering: bool,
}

impl StoreService {
    /// Return the candidate vulnerabilities for each index record, keyed by
    /// the record's package id.
    ///
    /// All per-record queries run in one read-only snapshot transaction
    /// under a shared deadline, so no record ever observes a partially
    /// committed update operation. Records without a package name are
    /// logged and skipped; the remaining records are still served.
    #[instrument(skip(self, records, opts), fields(num = records.len()), err)]
    pub async fn get(
        &self,
        records: &[IndexRecord],
        opts: &GetOpts,
    ) -> Result<HashMap<String, Vec<Vulnerability>>, Error> {
        // build everything up front so construction errors surface before
        // the transaction opens
        let mut queries = Vec::with_capacity(records.len());
        for record in records {
            match build_query(record, opts) {
                Ok(sql) => queries.push((record.package.id.clone(), sql)),
                Err(Error::InvalidRecord(id)) => {
                    log::warn!("skipping unqueryable index record: {id:?}");
                }
                Err(err) => return Err(err),
            }
        }

        let tx = self
            .db
            .begin_with_config(
                Some(IsolationLevel::RepeatableRead),
                Some(AccessMode::ReadOnly),
            )
            .await?;

        let results = tokio::time::timeout(GET_DEADLINE, async {
            let mut out: HashMap<String, Vec<Vulnerability>> = HashMap::new();
            for (package_id, sql) in queries {
                let rows = vulnerability::Model::find_by_statement(Statement::from_string(
                    DbBackend::Postgres,
                    sql,
                ))
                .all(&tx)
                .await?;

                out.entry(package_id)
                    .or_default()
                    .extend(rows.into_iter().map(Vulnerability::from));
            }
            Ok::<_, Error>(out)
        })
        .await??;

        tx.commit().await?;

        Ok(results)
    }
}

/// Render one record's SELECT.
///
/// Constraints apply in caller order with duplicates dropped, and values are
/// inlined by the query builder, so a fixed input always renders the same
/// bytes and the server-side statement cache stays hot.
fn build_query(record: &IndexRecord, opts: &GetOpts) -> Result<String, Error> {
    if record.package.name.is_empty() {
        return Err(Error::InvalidRecord(record.package.id.clone()));
    }

    // missing sub-records normalize to their all-zero values
    let dist = record.distribution.clone().unwrap_or_default();
    let repo = record.repository.clone().unwrap_or_default();

    let mut cond = Cond::all();

    cond = cond.add(match record.package.source_name() {
        Some(source) => Expr::col(Column::PackageName)
            .is_in([record.package.name.clone(), source.to_string()]),
        None => Expr::col(Column::PackageName).eq(record.package.name.clone()),
    });

    let mut seen = HashSet::new();
    for constraint in &opts.matchers {
        if !seen.insert(*constraint) {
            continue;
        }

        let (column, value) = match constraint {
            MatchConstraint::DistributionDID => (Column::DistId, dist.did.clone()),
            MatchConstraint::DistributionName => (Column::DistName, dist.name.clone()),
            MatchConstraint::DistributionVersion => (Column::DistVersion, dist.version.clone()),
            MatchConstraint::DistributionVersionCodeName => {
                (Column::DistVersionCodeName, dist.version_code_name.clone())
            }
            MatchConstraint::DistributionVersionID => {
                (Column::DistVersionId, dist.version_id.clone())
            }
            MatchConstraint::DistributionPrettyName => {
                (Column::DistPrettyName, dist.pretty_name.clone())
            }
            MatchConstraint::DistributionCPE => (Column::DistCpe, dist.cpe.clone()),
            MatchConstraint::DistributionArch => (Column::DistArch, dist.arch.clone()),
            MatchConstraint::PackageModule => {
                (Column::PackageModule, record.package.module.clone())
            }
            MatchConstraint::RepositoryName => (Column::RepoName, repo.name.clone()),
        };
        cond = cond.add(Expr::col(column).eq(value));
    }

    if opts.version_filtering
        && let Some(version) = &record.package.normalized_version
    {
        cond = cond.add(Expr::col(Column::VersionKind).eq(version.kind.clone()));
        cond = cond.add(Expr::cust(format!(
            "\"vulnerable_range\" @> '{}'::int[]",
            version.to_int_array()
        )));
    }

    Ok(Query::select()
        .columns([
            Column::Id,
            Column::HashKind,
            Column::Hash,
            Column::Updater,
            Column::Name,
            Column::Description,
            Column::Issued,
            Column::Links,
            Column::Severity,
            Column::NormalizedSeverity,
            Column::PackageName,
            Column::PackageVersion,
            Column::PackageModule,
            Column::PackageArch,
            Column::PackageKind,
            Column::DistId,
            Column::DistName,
            Column::DistVersion,
            Column::DistVersionCodeName,
            Column::DistVersionId,
            Column::DistArch,
            Column::DistCpe,
            Column::DistPrettyName,
            Column::RepoName,
            Column::RepoKey,
            Column::RepoUri,
            Column::FixedInVersion,
            Column::ArchOperation,
            Column::VersionKind,
        ])
        .from(vulnerability::Entity)
        .cond_where(cond)
        .to_string(PostgresQueryBuilder))
}
