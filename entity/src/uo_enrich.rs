use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "uo_enrich")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uo: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub enrich: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::update_operation::Entity",
        from = "Column::Uo",
        to = "super::update_operation::Column::Id"
    )]
    UpdateOperation,

    #[sea_orm(
        belongs_to = "super::enrichment::Entity",
        from = "Column::Enrich",
        to = "super::enrichment::Column::Id"
    )]
    Enrichment,
}

impl Related<super::update_operation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UpdateOperation.def()
    }
}

impl Related<super::enrichment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrichment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
