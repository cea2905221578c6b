use sea_orm::entity::prelude::*;

/// Per-updater bookkeeping for external schedulers; never consulted by the
/// query path.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "updater_status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub updater_name: String,
    pub last_attempt: Option<TimeDateTimeWithTimeZone>,
    pub last_success: Option<TimeDateTimeWithTimeZone>,
    pub last_run_succeeded: Option<bool>,
    pub last_attempt_fingerprint: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
