pub mod driver;
pub mod enricher;
pub mod error;
pub mod manager;
pub mod osv;
pub mod registry;
pub mod run;

pub use driver::{Enricher, EnrichmentGetter, Fetched, Updater};
pub use error::Error;
pub use manager::Manager;
pub use run::UpdateRunner;
