use super::StoreService;
use crate::error::Error;
use scandium_common::update::Fingerprint;
use scandium_entity::updater_status::{self, Column};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, sea_query::Expr, sea_query::OnConflict,
};
use time::OffsetDateTime;
use tracing::instrument;

impl StoreService {
    /// Record the outcome of one updater run.
    ///
    /// A successful run also advances `last_success` and stores the
    /// fingerprint; a failed run keeps the previous success untouched and
    /// records the error text.
    #[instrument(skip(self), err)]
    pub async fn record_updater_update_time(
        &self,
        updater: &str,
        update_time: OffsetDateTime,
        fingerprint: Fingerprint,
        updater_error: Option<&str>,
    ) -> Result<(), Error> {
        let (model, on_conflict) = match updater_error {
            None => (
                updater_status::ActiveModel {
                    updater_name: Set(updater.to_string()),
                    last_attempt: Set(Some(update_time)),
                    last_success: Set(Some(update_time)),
                    last_run_succeeded: Set(Some(true)),
                    last_attempt_fingerprint: Set(Some(fingerprint.to_string())),
                    last_error: Set(None),
                },
                OnConflict::column(Column::UpdaterName)
                    .update_columns([
                        Column::LastAttempt,
                        Column::LastSuccess,
                        Column::LastRunSucceeded,
                        Column::LastAttemptFingerprint,
                        Column::LastError,
                    ])
                    .to_owned(),
            ),
            Some(message) => (
                updater_status::ActiveModel {
                    updater_name: Set(updater.to_string()),
                    last_attempt: Set(Some(update_time)),
                    last_success: Set(None),
                    last_run_succeeded: Set(Some(false)),
                    last_attempt_fingerprint: Set(Some(fingerprint.to_string())),
                    last_error: Set(Some(message.to_string())),
                },
                OnConflict::column(Column::UpdaterName)
                    .update_columns([
                        Column::LastAttempt,
                        Column::LastRunSucceeded,
                        Column::LastAttemptFingerprint,
                        Column::LastError,
                    ])
                    .to_owned(),
            ),
        };

        updater_status::Entity::insert(model)
            .on_conflict(on_conflict)
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Mark every updater sharing a name prefix as freshly succeeded.
    ///
    /// Used by updater sets that succeed or fail as a unit. Returns the
    /// number of rows touched.
    #[instrument(skip(self), err)]
    pub async fn record_updater_set_update_time(
        &self,
        prefix: &str,
        update_time: OffsetDateTime,
    ) -> Result<u64, Error> {
        let result = updater_status::Entity::update_many()
            .col_expr(Column::LastAttempt, Expr::value(update_time))
            .col_expr(Column::LastSuccess, Expr::value(update_time))
            .col_expr(Column::LastRunSucceeded, Expr::value(true))
            .filter(Column::UpdaterName.starts_with(prefix))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
