use scandium_common::update;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "update_operation")]
pub struct Model {
    /// Surrogate id; its ordering is the ingest ordering per updater.
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique, column_name = "ref")]
    pub r#ref: Uuid,
    pub updater: String,
    pub fingerprint: String,
    pub kind: UpdateKind,
    pub date: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::uo_vuln::Entity")]
    UoVuln,

    #[sea_orm(has_many = "super::uo_enrich::Entity")]
    UoEnrich,
}

impl Related<super::uo_vuln::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UoVuln.def()
    }
}

impl Related<super::uo_enrich::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UoEnrich.def()
    }
}

impl Related<super::vulnerability::Entity> for Entity {
    fn to() -> RelationDef {
        super::uo_vuln::Relation::Vulnerability.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::uo_vuln::Relation::UpdateOperation.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "updaterkind")]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    #[sea_orm(string_value = "vulnerability")]
    Vulnerability,
    #[sea_orm(string_value = "enrichment")]
    Enrichment,
}

impl From<update::UpdateKind> for UpdateKind {
    fn from(value: update::UpdateKind) -> Self {
        match value {
            update::UpdateKind::Vulnerability => UpdateKind::Vulnerability,
            update::UpdateKind::Enrichment => UpdateKind::Enrichment,
        }
    }
}

impl From<UpdateKind> for update::UpdateKind {
    fn from(value: UpdateKind) -> Self {
        match value {
            UpdateKind::Vulnerability => update::UpdateKind::Vulnerability,
            UpdateKind::Enrichment => update::UpdateKind::Enrichment,
        }
    }
}

impl From<Model> for update::UpdateOperation {
    fn from(value: Model) -> Self {
        Self {
            r#ref: value.r#ref,
            updater: value.updater,
            fingerprint: value.fingerprint.into(),
            kind: value.kind.into(),
            date: value.date,
        }
    }
}
