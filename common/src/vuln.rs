use crate::{
    distribution::Distribution, package::Package, repository::Repository, version::VersionRange,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Severity normalized onto a common scale, for feeds that agree on nothing
/// else.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Unknown,
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Unknown => "unknown",
            Severity::Negligible => "negligible",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        })
    }
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;

    /// Lenient: anything unrecognized reads as [`Severity::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "negligible" => Severity::Negligible,
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        })
    }
}

/// How a vulnerability's architecture claim is matched against a package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchOp {
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "not equals")]
    NotEquals,
    #[serde(rename = "pattern match")]
    PatternMatch,
}

impl fmt::Display for ArchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchOp::Equals => "equals",
            ArchOp::NotEquals => "not equals",
            ArchOp::PatternMatch => "pattern match",
        })
    }
}

impl ArchOp {
    /// Parse the storage representation; empty and unknown read as `None`.
    pub fn from_column(s: &str) -> Option<ArchOp> {
        match s {
            "equals" => Some(ArchOp::Equals),
            "not equals" => Some(ArchOp::NotEquals),
            "pattern match" => Some(ArchOp::PatternMatch),
            _ => None,
        }
    }
}

/// A single defect claimed by one updater against one package.
///
/// The embedded distribution and repository normalize to their all-zero
/// values when a feed leaves them out, keeping the identity digest total.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Vulnerability {
    /// Storage identifier, opaque to callers. Empty until persisted and
    /// never part of the identity digest.
    pub id: String,
    /// Name of the updater that produced this record.
    pub updater: String,
    pub name: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub issued: Option<OffsetDateTime>,
    /// Space-separated advisory links.
    pub links: String,
    /// Severity in the originating feed's own vocabulary.
    pub severity: String,
    pub normalized_severity: Severity,
    pub package: Package,
    pub dist: Distribution,
    pub repo: Repository,
    pub fixed_in_version: String,
    pub arch_operation: Option<ArchOp>,
    /// Range of vulnerable versions, for updaters exposing a version scheme.
    pub range: Option<VersionRange>,
}
