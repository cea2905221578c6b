use serde::{Deserialize, Serialize};

/// An opaque enrichment payload, addressed by its tags.
///
/// The wire form is a length-unframed sequence of these objects, so large
/// feeds never need to materialize a surrounding array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    #[serde(rename = "Enrichment")]
    pub enrichment: serde_json::Value,
}
