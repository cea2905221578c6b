use scandium_common::{
    distribution::Distribution,
    package::Package,
    repository::Repository,
    vuln::{ArchOp, Vulnerability},
};
use sea_orm::entity::prelude::*;

/// One row per distinct vulnerability identity.
///
/// The `vulnerable_range` column is deliberately unmapped: it holds a custom
/// range type and is only ever written and probed through raw statements.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "vuln")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub hash_kind: String,
    #[sea_orm(column_type = "VarBinary(StringLen::None)")]
    pub hash: Vec<u8>,
    pub updater: String,
    pub name: String,
    pub description: String,
    pub issued: Option<TimeDateTimeWithTimeZone>,
    pub links: String,
    pub severity: String,
    pub normalized_severity: String,
    pub package_name: String,
    pub package_version: String,
    pub package_module: String,
    pub package_arch: String,
    pub package_kind: String,
    pub dist_id: String,
    pub dist_name: String,
    pub dist_version: String,
    pub dist_version_code_name: String,
    pub dist_version_id: String,
    pub dist_arch: String,
    pub dist_cpe: String,
    pub dist_pretty_name: String,
    pub repo_name: String,
    pub repo_key: String,
    pub repo_uri: String,
    pub fixed_in_version: String,
    pub arch_operation: String,
    pub version_kind: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::uo_vuln::Entity")]
    UoVuln,
}

impl Related<super::uo_vuln::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UoVuln.def()
    }
}

impl Related<super::update_operation::Entity> for Entity {
    fn to() -> RelationDef {
        super::uo_vuln::Relation::UpdateOperation.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::uo_vuln::Relation::Vulnerability.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Vulnerability {
    fn from(value: Model) -> Self {
        Self {
            id: value.id.to_string(),
            updater: value.updater,
            name: value.name,
            description: value.description,
            issued: value.issued,
            links: value.links,
            severity: value.severity,
            normalized_severity: value
                .normalized_severity
                .parse()
                .unwrap_or_default(),
            package: Package {
                name: value.package_name,
                version: value.package_version,
                module: value.package_module,
                arch: value.package_arch,
                kind: value.package_kind,
                ..Default::default()
            },
            dist: Distribution {
                did: value.dist_id,
                name: value.dist_name,
                version: value.dist_version,
                version_code_name: value.dist_version_code_name,
                version_id: value.dist_version_id,
                arch: value.dist_arch,
                cpe: value.dist_cpe,
                pretty_name: value.dist_pretty_name,
                ..Default::default()
            },
            repo: Repository {
                name: value.repo_name,
                key: value.repo_key,
                uri: value.repo_uri,
                ..Default::default()
            },
            fixed_in_version: value.fixed_in_version,
            arch_operation: ArchOp::from_column(&value.arch_operation),
            range: None,
        }
    }
}
