use crate::{
    driver::{Enricher, EnrichmentGetter, Updater},
    error::Error,
};
use scandium_common::{
    enrichment::EnrichmentRecord,
    update::{Fingerprint, UpdateKind},
};
use scandium_module_vulnstore::StoreService;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

/// Drives updaters and enrichers end to end against the store: fetch, parse,
/// ingest, record status.
#[derive(Clone, Debug)]
pub struct UpdateRunner {
    store: StoreService,
}

impl UpdateRunner {
    pub fn new(store: StoreService) -> Self {
        Self { store }
    }

    /// Run one updater.
    ///
    /// Returns the ref of the newly created operation, or `None` when the
    /// feed was unchanged. Either way the attempt lands in the updater
    /// status table; failures are recorded there too, then surfaced.
    #[instrument(skip_all, fields(updater = updater.name()), err)]
    pub async fn run(&self, updater: &dyn Updater) -> Result<Option<Uuid>, Error> {
        let name = updater.name();
        let prior = self.prior_fingerprint(UpdateKind::Vulnerability, name).await?;
        let now = OffsetDateTime::now_utc();

        let (feed, fingerprint) = match updater.fetch(prior.as_ref()).await {
            Ok(fetched) => fetched,
            Err(Error::Unchanged) => {
                log::debug!("{name}: feed unchanged");
                self.store
                    .record_updater_update_time(name, now, prior.unwrap_or_default(), None)
                    .await?;
                return Ok(None);
            }
            Err(err) => {
                self.store
                    .record_updater_update_time(
                        name,
                        now,
                        prior.unwrap_or_default(),
                        Some(&err.to_string()),
                    )
                    .await?;
                return Err(err);
            }
        };

        let result = async {
            let vulns = updater.parse(feed).await?;
            self.store
                .update_vulnerabilities(name, fingerprint.clone(), &vulns)
                .await
                .map_err(Error::from)
        }
        .await;

        match result {
            Ok(r#ref) => {
                self.store
                    .record_updater_update_time(name, now, fingerprint, None)
                    .await?;
                Ok(Some(r#ref))
            }
            Err(err) => {
                self.store
                    .record_updater_update_time(name, now, fingerprint, Some(&err.to_string()))
                    .await?;
                Err(err)
            }
        }
    }

    /// Run one enricher; same contract as [`Self::run`].
    #[instrument(skip_all, fields(enricher = enricher.name()), err)]
    pub async fn run_enricher(&self, enricher: &dyn Enricher) -> Result<Option<Uuid>, Error> {
        let name = enricher.name();
        let prior = self.prior_fingerprint(UpdateKind::Enrichment, name).await?;
        let now = OffsetDateTime::now_utc();

        let (feed, fingerprint) = match enricher.fetch_enrichment(prior.as_ref()).await {
            Ok(fetched) => fetched,
            Err(Error::Unchanged) => {
                log::debug!("{name}: enrichment feed unchanged");
                self.store
                    .record_updater_update_time(name, now, prior.unwrap_or_default(), None)
                    .await?;
                return Ok(None);
            }
            Err(err) => {
                self.store
                    .record_updater_update_time(
                        name,
                        now,
                        prior.unwrap_or_default(),
                        Some(&err.to_string()),
                    )
                    .await?;
                return Err(err);
            }
        };

        let result = async {
            let records = enricher.parse_enrichment(feed).await?;
            self.store
                .update_enrichments(name, fingerprint.clone(), &records)
                .await
                .map_err(Error::from)
        }
        .await;

        match result {
            Ok(r#ref) => {
                self.store
                    .record_updater_update_time(name, now, fingerprint, None)
                    .await?;
                Ok(Some(r#ref))
            }
            Err(err) => {
                self.store
                    .record_updater_update_time(name, now, fingerprint, Some(&err.to_string()))
                    .await?;
                Err(err)
            }
        }
    }

    /// A getter bound to one enricher's stored data.
    pub fn getter(&self, enricher: &dyn Enricher) -> StoreGetter {
        StoreGetter {
            store: self.store.clone(),
            name: enricher.name().to_string(),
        }
    }

    /// The fingerprint of the newest committed operation for `name`.
    async fn prior_fingerprint(
        &self,
        kind: UpdateKind,
        name: &str,
    ) -> Result<Option<Fingerprint>, Error> {
        let mut ops = self.store.get_update_operations(kind, &[name]).await?;

        Ok(ops
            .remove(name)
            .and_then(|ops| ops.into_iter().next())
            .map(|op| op.fingerprint))
    }
}

/// [`EnrichmentGetter`] reading from the store.
pub struct StoreGetter {
    store: StoreService,
    name: String,
}

#[async_trait::async_trait]
impl EnrichmentGetter for StoreGetter {
    async fn get_enrichment(&self, tags: &[String]) -> Result<Vec<EnrichmentRecord>, Error> {
        Ok(self.store.get_enrichment(&self.name, tags).await?)
    }
}
