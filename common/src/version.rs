use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Number of components in a version vector. All schemes pad to this width.
pub const VERSION_WIDTH: usize = 10;

/// A version normalized into a fixed-width integer vector.
///
/// The vector compares lexicographically, which lets the database test range
/// membership without understanding the original version scheme. Zero
/// components are valid and common; absence of a version is modeled by
/// omitting the whole value, never by an all-zero vector alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Version {
    /// Version scheme, e.g. `pep440` or `rpm`.
    pub kind: String,
    pub v: [i32; VERSION_WIDTH],
}

impl Version {
    /// Build a version from a scheme name and leading components; the rest
    /// of the vector is zero-padded.
    pub fn from_parts(kind: impl Into<String>, parts: impl IntoIterator<Item = i32>) -> Self {
        let mut v = [0i32; VERSION_WIDTH];
        for (slot, part) in v.iter_mut().zip(parts) {
            *slot = part;
        }
        Self {
            kind: kind.into(),
            v,
        }
    }

    /// Render the vector as a PostgreSQL `int[]` literal, `{0,1,20,…}`.
    pub fn to_int_array(&self) -> String {
        let mut out = String::with_capacity(2 + 3 * VERSION_WIDTH);
        out.push('{');
        for (i, part) in self.v.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            // writing an integer into a String cannot fail
            let _ = write!(out, "{part}");
        }
        out.push('}');
        out
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.to_int_array())
    }
}

/// A half-open interval of [`Version`]s, lower bound inclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VersionRange {
    pub lower: Version,
    pub upper: Version,
}

impl VersionRange {
    /// The version scheme shared by both endpoints.
    pub fn kind(&self) -> &str {
        &self.lower.kind
    }
}
