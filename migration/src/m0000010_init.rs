use scandium_common::db::create::{create_enum_if_not_exists, create_range_if_not_exists};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        create_enum_if_not_exists(
            manager,
            UpdaterKindType,
            [KindVariant::Vulnerability, KindVariant::Enrichment],
        )
        .await?;

        // range over version vectors; probed with `@> $n::int[]`
        create_range_if_not_exists(manager, VersionRangeType, "int4[]").await?;

        manager
            .create_table(
                Table::create()
                    .table(UpdateOperation::Table)
                    .col(
                        ColumnDef::new(UpdateOperation::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UpdateOperation::Ref)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(UpdateOperation::Updater).text().not_null())
                    .col(
                        ColumnDef::new(UpdateOperation::Fingerprint)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpdateOperation::Kind)
                            .enumeration(
                                UpdaterKindType,
                                [KindVariant::Vulnerability, KindVariant::Enrichment],
                            )
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpdateOperation::Date)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uo_updater_idx")
                    .table(UpdateOperation::Table)
                    .col(UpdateOperation::Updater)
                    .col(UpdateOperation::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vuln::Table)
                    .col(ColumnDef::new(Vuln::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Vuln::HashKind).text().not_null())
                    .col(ColumnDef::new(Vuln::Hash).binary().not_null())
                    .col(ColumnDef::new(Vuln::Updater).text().not_null())
                    .col(ColumnDef::new(Vuln::Name).text().not_null())
                    .col(ColumnDef::new(Vuln::Description).text().not_null())
                    .col(ColumnDef::new(Vuln::Issued).timestamp_with_time_zone())
                    .col(ColumnDef::new(Vuln::Links).text().not_null())
                    .col(ColumnDef::new(Vuln::Severity).text().not_null())
                    .col(ColumnDef::new(Vuln::NormalizedSeverity).text().not_null())
                    .col(ColumnDef::new(Vuln::PackageName).text().not_null())
                    .col(ColumnDef::new(Vuln::PackageVersion).text().not_null())
                    .col(ColumnDef::new(Vuln::PackageModule).text().not_null())
                    .col(ColumnDef::new(Vuln::PackageArch).text().not_null())
                    .col(ColumnDef::new(Vuln::PackageKind).text().not_null())
                    .col(ColumnDef::new(Vuln::DistId).text().not_null())
                    .col(ColumnDef::new(Vuln::DistName).text().not_null())
                    .col(ColumnDef::new(Vuln::DistVersion).text().not_null())
                    .col(ColumnDef::new(Vuln::DistVersionCodeName).text().not_null())
                    .col(ColumnDef::new(Vuln::DistVersionId).text().not_null())
                    .col(ColumnDef::new(Vuln::DistArch).text().not_null())
                    .col(ColumnDef::new(Vuln::DistCpe).text().not_null())
                    .col(ColumnDef::new(Vuln::DistPrettyName).text().not_null())
                    .col(ColumnDef::new(Vuln::RepoName).text().not_null())
                    .col(ColumnDef::new(Vuln::RepoKey).text().not_null())
                    .col(ColumnDef::new(Vuln::RepoUri).text().not_null())
                    .col(ColumnDef::new(Vuln::FixedInVersion).text().not_null())
                    .col(ColumnDef::new(Vuln::ArchOperation).text().not_null())
                    .col(ColumnDef::new(Vuln::VersionKind).text())
                    .col(
                        ColumnDef::new(Vuln::VulnerableRange)
                            .custom(VersionRangeType),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("vuln_identity_idx")
                    .table(Vuln::Table)
                    .col(Vuln::HashKind)
                    .col(Vuln::Hash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("vuln_package_name_idx")
                    .table(Vuln::Table)
                    .col(Vuln::PackageName)
                    .to_owned(),
            )
            .await?;

        // the reference sweep pages by (updater, id)
        manager
            .create_index(
                Index::create()
                    .name("vuln_updater_idx")
                    .table(Vuln::Table)
                    .col(Vuln::Updater)
                    .col(Vuln::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UoVuln::Table)
                    .col(ColumnDef::new(UoVuln::Uo).big_integer().not_null())
                    .col(ColumnDef::new(UoVuln::Vuln).uuid().not_null())
                    .primary_key(Index::create().col(UoVuln::Uo).col(UoVuln::Vuln).primary())
                    .foreign_key(
                        ForeignKey::create()
                            .from_col(UoVuln::Uo)
                            .to(UpdateOperation::Table, UpdateOperation::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from_col(UoVuln::Vuln)
                            .to(Vuln::Table, Vuln::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uo_vuln_vuln_idx")
                    .table(UoVuln::Table)
                    .col(UoVuln::Vuln)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UpdaterStatus::Table)
                    .col(
                        ColumnDef::new(UpdaterStatus::UpdaterName)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UpdaterStatus::LastAttempt).timestamp_with_time_zone())
                    .col(ColumnDef::new(UpdaterStatus::LastSuccess).timestamp_with_time_zone())
                    .col(ColumnDef::new(UpdaterStatus::LastRunSucceeded).boolean())
                    .col(ColumnDef::new(UpdaterStatus::LastAttemptFingerprint).text())
                    .col(ColumnDef::new(UpdaterStatus::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Enrichment::Table)
                    .col(
                        ColumnDef::new(Enrichment::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Enrichment::HashKind).text().not_null())
                    .col(ColumnDef::new(Enrichment::Hash).binary().not_null())
                    .col(ColumnDef::new(Enrichment::Updater).text().not_null())
                    .col(
                        ColumnDef::new(Enrichment::Tags)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Enrichment::Data).json_binary().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("enrichment_identity_idx")
                    .table(Enrichment::Table)
                    .col(Enrichment::HashKind)
                    .col(Enrichment::Hash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // tag intersection uses the array overlap operator
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS enrichment_tags_idx ON enrichment USING gin (tags)",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UoEnrich::Table)
                    .col(ColumnDef::new(UoEnrich::Uo).big_integer().not_null())
                    .col(ColumnDef::new(UoEnrich::Enrich).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(UoEnrich::Uo)
                            .col(UoEnrich::Enrich)
                            .primary(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from_col(UoEnrich::Uo)
                            .to(UpdateOperation::Table, UpdateOperation::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from_col(UoEnrich::Enrich)
                            .to(Enrichment::Table, Enrichment::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uo_enrich_enrich_idx")
                    .table(UoEnrich::Table)
                    .col(UoEnrich::Enrich)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UoEnrich::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Enrichment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UpdaterStatus::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UoVuln::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vuln::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UpdateOperation::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS versionrange; DROP TYPE IF EXISTS updaterkind")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden, Clone)]
#[sea_orm(iden = "updaterkind")]
struct UpdaterKindType;

#[derive(DeriveIden)]
enum KindVariant {
    Vulnerability,
    Enrichment,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "versionrange")]
struct VersionRangeType;

#[derive(DeriveIden)]
enum UpdateOperation {
    Table,
    Id,
    Ref,
    Updater,
    Fingerprint,
    Kind,
    Date,
}

#[derive(DeriveIden)]
enum Vuln {
    Table,
    Id,
    HashKind,
    Hash,
    Updater,
    Name,
    Description,
    Issued,
    Links,
    Severity,
    NormalizedSeverity,
    PackageName,
    PackageVersion,
    PackageModule,
    PackageArch,
    PackageKind,
    DistId,
    DistName,
    DistVersion,
    DistVersionCodeName,
    DistVersionId,
    DistArch,
    DistCpe,
    DistPrettyName,
    RepoName,
    RepoKey,
    RepoUri,
    FixedInVersion,
    ArchOperation,
    VersionKind,
    VulnerableRange,
}

#[derive(DeriveIden)]
enum UoVuln {
    Table,
    Uo,
    Vuln,
}

#[derive(DeriveIden)]
enum UpdaterStatus {
    Table,
    UpdaterName,
    LastAttempt,
    LastSuccess,
    LastRunSucceeded,
    LastAttemptFingerprint,
    LastError,
}

#[derive(DeriveIden)]
enum Enrichment {
    Table,
    Id,
    HashKind,
    Hash,
    Updater,
    Tags,
    Data,
}

#[derive(DeriveIden)]
enum UoEnrich {
    Table,
    Uo,
    Enrich,
}
