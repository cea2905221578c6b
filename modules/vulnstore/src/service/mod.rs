mod diff;
mod digest;
mod enrichment;
mod gc;
mod get;
mod microbatch;
mod ops;
mod status;
mod update;

pub use get::{GetOpts, MatchConstraint};
pub use microbatch::Microbatcher;

use scandium_common::db::Database;

/// Transactional access to the vulnerability store.
///
/// Cloning is cheap; all clones share the underlying pool.
#[derive(Clone, Debug)]
pub struct StoreService {
    db: Database,
}

impl StoreService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}
