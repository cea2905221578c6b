pub mod cvss;
pub mod epss;

use regex::Regex;
use scandium_common::vuln::Vulnerability;
use std::{collections::BTreeSet, sync::LazyLock};

// static pattern, compiles by construction
static CVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CVE-\d{4}-\d{4,}").expect("CVE pattern compiles"));

/// Collect the distinct CVE ids mentioned anywhere in the vulnerability's
/// name, description, or links.
///
/// Feeds frequently name advisories by a vendor id while citing the CVE only
/// in prose, so matching on the name alone would miss them.
pub fn cve_tags(vuln: &Vulnerability) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for text in [&vuln.name, &vuln.description, &vuln.links] {
        for found in CVE_REGEX.find_iter(text) {
            tags.insert(found.as_str().to_string());
        }
    }

    tags.into_iter().collect()
}
