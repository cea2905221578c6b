use super::StoreService;
use crate::error::Error;
use scandium_common::update::{UpdateKind, UpdateOperation};
use scandium_entity::update_operation;
use sea_orm::{
    ActiveEnum, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Statement,
};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// How many operations per updater the directory reports. Anything older is
/// only reachable through GC.
const OPERATION_HISTORY_DEPTH: u64 = 10;

const LATEST_REFS: &str = r#"
SELECT DISTINCT ON (updater) updater, ref
FROM update_operation
WHERE kind = $1::updaterkind
ORDER BY updater, id DESC
"#;

impl StoreService {
    /// List recent operations per updater, newest first.
    ///
    /// An empty updater list enumerates all updaters of the given kind. Each
    /// updater's history is capped; callers must not rely on unbounded depth.
    #[instrument(skip(self), err)]
    pub async fn get_update_operations(
        &self,
        kind: UpdateKind,
        updaters: &[&str],
    ) -> Result<HashMap<String, Vec<UpdateOperation>>, Error> {
        let kind: update_operation::UpdateKind = kind.into();

        let updaters: Vec<String> = if updaters.is_empty() {
            update_operation::Entity::find()
                .select_only()
                .column(update_operation::Column::Updater)
                .distinct()
                .filter(update_operation::Column::Kind.eq(kind))
                .into_tuple()
                .all(&self.db)
                .await?
        } else {
            updaters.iter().map(ToString::to_string).collect()
        };

        let mut out = HashMap::new();
        for updater in updaters {
            let ops = update_operation::Entity::find()
                .filter(update_operation::Column::Updater.eq(&updater))
                .filter(update_operation::Column::Kind.eq(kind))
                .order_by_desc(update_operation::Column::Id)
                .limit(OPERATION_HISTORY_DEPTH)
                .all(&self.db)
                .await?;

            if !ops.is_empty() {
                out.insert(updater, ops.into_iter().map(Into::into).collect());
            }
        }

        Ok(out)
    }

    /// The newest ref across all updaters, or the nil ref when the store has
    /// never seen an operation of this kind.
    #[instrument(skip(self), err)]
    pub async fn get_latest_update_ref(&self, kind: UpdateKind) -> Result<Uuid, Error> {
        let kind: update_operation::UpdateKind = kind.into();

        let op = update_operation::Entity::find()
            .filter(update_operation::Column::Kind.eq(kind))
            .order_by_desc(update_operation::Column::Id)
            .one(&self.db)
            .await?;

        Ok(op.map(|op| op.r#ref).unwrap_or_else(Uuid::nil))
    }

    /// The newest ref per updater.
    #[instrument(skip(self), err)]
    pub async fn get_latest_update_refs(
        &self,
        kind: UpdateKind,
    ) -> Result<HashMap<String, Uuid>, Error> {
        let kind: update_operation::UpdateKind = kind.into();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            LATEST_REFS,
            [kind.to_value().into()],
        );

        let mut out = HashMap::new();
        for row in self.db.query_all(stmt).await? {
            let updater: String = row.try_get("", "updater")?;
            let r#ref: Uuid = row.try_get("", "ref")?;
            out.insert(updater, r#ref);
        }

        Ok(out)
    }

    /// Metadata of a single operation, by ref.
    pub(crate) async fn get_update_operation(
        &self,
        r#ref: Uuid,
    ) -> Result<UpdateOperation, Error> {
        update_operation::Entity::find()
            .filter(update_operation::Column::Ref.eq(r#ref))
            .one(&self.db)
            .await?
            .map(Into::into)
            .ok_or(Error::OperationNotFound(r#ref))
    }
}
