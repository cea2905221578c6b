use serde::{Deserialize, Serialize};

/// An operating-system distribution, mirroring the os-release fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Distribution {
    /// Storage identifier, opaque to callers. Empty until persisted.
    pub id: String,
    /// The os-release `ID` field, e.g. `debian`.
    pub did: String,
    pub name: String,
    pub version: String,
    pub version_code_name: String,
    pub version_id: String,
    pub arch: String,
    pub cpe: String,
    pub pretty_name: String,
}
