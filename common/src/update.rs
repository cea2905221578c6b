use crate::vuln::Vulnerability;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Opaque bytes a fetcher chooses to describe the state of a remote feed.
///
/// The store round-trips fingerprints without interpreting them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The two lifecycles an update operation can belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Vulnerability,
    Enrichment,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateKind::Vulnerability => "vulnerability",
            UpdateKind::Enrichment => "enrichment",
        })
    }
}

/// One immutable ingestion event for one updater.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateOperation {
    /// Public identifier; globally unique and never reused.
    pub r#ref: Uuid,
    pub updater: String,
    pub fingerprint: Fingerprint,
    pub kind: UpdateKind,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// The symmetric difference between two update operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateDiff {
    /// Absent when the diff was taken against the nil ref.
    pub prev: Option<UpdateOperation>,
    pub cur: UpdateOperation,
    pub added: Vec<Vulnerability>,
    pub removed: Vec<Vulnerability>,
}
