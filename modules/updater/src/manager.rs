use crate::{error::Error, registry, run::UpdateRunner};
use scandium_module_vulnstore::StoreService;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::instrument;

/// Default pause between update sweeps.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);

/// Drives every registered updater against the store on a fixed period.
pub struct Manager {
    runner: UpdateRunner,
    period: Duration,
}

impl Manager {
    pub fn new(store: StoreService) -> Self {
        Self {
            runner: UpdateRunner::new(store),
            period: DEFAULT_PERIOD,
        }
    }

    pub fn with_period(store: StoreService, period: Duration) -> Self {
        Self {
            runner: UpdateRunner::new(store),
            period,
        }
    }

    /// Run forever, sweeping all registered updaters each period. Individual
    /// failures are logged and do not stop the loop.
    pub async fn start(&self) -> Result<(), Error> {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if let Err(err) = self.run_once().await {
                log::warn!("update sweep finished with errors: {err}");
            }
        }
    }

    /// Sweep all registered updaters once.
    ///
    /// Every updater runs regardless of earlier failures; errors are
    /// collected and joined.
    #[instrument(skip(self), err)]
    pub async fn run_once(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        for name in registry::registered() {
            let Some(factory) = registry::get(&name) else {
                continue;
            };
            let updater = factory();

            log::debug!("running updater {name}");
            match self.runner.run(updater.as_ref()).await {
                Ok(Some(r#ref)) => log::info!("{name}: new update operation {}", r#ref),
                Ok(None) => {}
                Err(err) => {
                    log::warn!("{name}: update failed: {err}");
                    errors.push(format!("{name}: {err}"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Sweep(errors.join("; ")))
        }
    }
}
