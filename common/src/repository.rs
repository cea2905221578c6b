use serde::{Deserialize, Serialize};

/// A package repository, e.g. a dpkg source or an RPM repo.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Repository {
    /// Storage identifier, opaque to callers. Empty until persisted.
    pub id: String,
    pub name: String,
    pub key: String,
    pub uri: String,
}
