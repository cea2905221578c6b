use scandium_common::{enrichment::EnrichmentRecord, vuln::Vulnerability};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Algorithm family of the identity digest. Stored next to the digest so a
/// stronger family can be introduced without rewriting existing rows.
pub(crate) const HASH_KIND: &str = "sha256";

/// Namespace for deriving storage ids from vulnerability digests.
const VULN_NAMESPACE: Uuid = Uuid::from_bytes([
    0x5f, 0x0a, 0x9c, 0x2e, 0x3d, 0x41, 0x4f, 0x8b, 0x9a, 0x6c, 0x1e, 0x73, 0x8f, 0x25, 0xb1,
    0x6d,
]);

/// Namespace for deriving storage ids from enrichment digests.
const ENRICHMENT_NAMESPACE: Uuid = Uuid::from_bytes([
    0xc4, 0x7d, 0x12, 0x9f, 0x88, 0x0b, 0x45, 0x1a, 0xbb, 0x31, 0x54, 0xe9, 0x02, 0xd6, 0x47,
    0x3e,
]);

/// Stable identity digest over the semantic fields of a vulnerability.
///
/// The field order is fixed and the record id never participates, so the
/// same content always lands on the same row no matter which process or
/// operation observed it.
pub(crate) fn vuln_digest(vuln: &Vulnerability) -> Vec<u8> {
    let mut hash = Sha256::new();

    hash.update(vuln.name.as_bytes());
    hash.update(vuln.description.as_bytes());
    if let Some(issued) = &vuln.issued
        && let Ok(issued) = issued.format(&Rfc3339)
    {
        hash.update(issued.as_bytes());
    }
    hash.update(vuln.links.as_bytes());
    hash.update(vuln.severity.as_bytes());
    hash.update(vuln.normalized_severity.to_string().as_bytes());

    for field in [
        &vuln.package.name,
        &vuln.package.version,
        &vuln.package.module,
        &vuln.package.arch,
        &vuln.package.kind,
    ] {
        hash.update(field.as_bytes());
    }

    for field in [
        &vuln.dist.did,
        &vuln.dist.name,
        &vuln.dist.version,
        &vuln.dist.version_code_name,
        &vuln.dist.version_id,
        &vuln.dist.arch,
        &vuln.dist.cpe,
        &vuln.dist.pretty_name,
    ] {
        hash.update(field.as_bytes());
    }

    for field in [&vuln.repo.name, &vuln.repo.key, &vuln.repo.uri] {
        hash.update(field.as_bytes());
    }

    hash.update(vuln.fixed_in_version.as_bytes());
    if let Some(op) = &vuln.arch_operation {
        hash.update(op.to_string().as_bytes());
    }

    hash.finalize().to_vec()
}

/// Identity digest of an enrichment record: sorted tags, then the canonical
/// JSON payload. `serde_json` renders object keys sorted, which keeps the
/// payload bytes stable across processes.
pub(crate) fn enrichment_digest(record: &EnrichmentRecord) -> Vec<u8> {
    let mut hash = Sha256::new();

    let mut tags = record.tags.clone();
    tags.sort_unstable();
    for tag in &tags {
        hash.update(tag.as_bytes());
    }
    hash.update(record.enrichment.to_string().as_bytes());

    hash.finalize().to_vec()
}

pub(crate) fn vuln_id(digest: &[u8]) -> Uuid {
    Uuid::new_v5(&VULN_NAMESPACE, digest)
}

pub(crate) fn enrichment_id(digest: &[u8]) -> Uuid {
    Uuid::new_v5(&ENRICHMENT_NAMESPACE, digest)
}
