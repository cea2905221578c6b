use scandium_common::enrichment::EnrichmentRecord;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "enrichment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub hash_kind: String,
    #[sea_orm(column_type = "VarBinary(StringLen::None)")]
    pub hash: Vec<u8>,
    pub updater: String,
    pub tags: Vec<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::uo_enrich::Entity")]
    UoEnrich,
}

impl Related<super::uo_enrich::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UoEnrich.def()
    }
}

impl Related<super::update_operation::Entity> for Entity {
    fn to() -> RelationDef {
        super::uo_enrich::Relation::UpdateOperation.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::uo_enrich::Relation::Enrichment.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for EnrichmentRecord {
    fn from(value: Model) -> Self {
        Self {
            tags: value.tags,
            enrichment: value.data,
        }
    }
}
