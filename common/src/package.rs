use crate::version::Version;
use serde::{Deserialize, Serialize};

/// A package discovered in a layer or claimed by an advisory.
///
/// Binary packages carry a reference to the source package they were built
/// from, when the origin feed exposes one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Package {
    /// Storage identifier, opaque to callers. Empty until persisted.
    pub id: String,
    pub name: String,
    pub version: String,
    /// `binary` or `source`.
    pub kind: String,
    pub source: Option<Box<Package>>,
    pub module: String,
    pub arch: String,
    /// Fixed-width version vector, present when the origin matcher exposes
    /// a version scheme for this package.
    pub normalized_version: Option<Version>,
}

impl Package {
    /// The source package, if one with a usable name is attached.
    pub fn source_name(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(|source| source.name.as_str())
            .filter(|name| !name.is_empty())
    }
}
