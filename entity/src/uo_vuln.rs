use sea_orm::entity::prelude::*;

/// Association row; the only place operation membership lives.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "uo_vuln")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uo: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub vuln: Uuid,
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
        belongs_to = "super::vulnerability::Entity",
        from = "Column::Vuln",
        to = "super::vulnerability::Column::Id"
    )]
    Vulnerability,
}

impl Related<super::update_operation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UpdateOperation.def()
    }
}

impl Related<super::vulnerability::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vulnerability.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
