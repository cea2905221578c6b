use crate::{distribution::Distribution, package::Package, repository::Repository};
use serde::{Deserialize, Serialize};

/// The per-package tuple a matcher submits at query time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct IndexRecord {
    pub package: Package,
    pub distribution: Option<Distribution>,
    pub repository: Option<Repository>,
}
