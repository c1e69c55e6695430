//! Target API version helpers

/// Leading component of an API version string (`"4.12.0"` → `"4"`)
#[must_use]
pub fn major_version(api: &str) -> &str {
    let api = api.trim();
    api.split_once('.').map_or(api, |(major, _)| major)
}

/// Whether any declared API targets major 4 or later, which maps the
/// declared namespace prefix onto `src/`
#[must_use]
pub fn uses_namespace_prefix(apis: &[String]) -> bool {
    apis.iter().any(|api| {
        let major = major_version(api);
        !major.is_empty()
            && major.bytes().all(|b| b.is_ascii_digit())
            && major.parse::<u64>().is_ok_and(|n| n >= 4)
    })
}

/// Distinct major versions in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MajorVersions {
    pub versions: Vec<String>,
    /// First major version that was declared more than once
    pub redundant: Option<String>,
}

/// Collapse declared API versions into distinct majors
#[must_use]
pub fn dedupe_major_versions(apis: &[String]) -> MajorVersions {
    let mut result = MajorVersions::default();
    for api in apis {
        let major = major_version(api).to_string();
        if major.is_empty() {
            continue;
        }
        if result.versions.contains(&major) {
            if result.redundant.is_none() {
                result.redundant = Some(major);
            }
        } else {
            result.versions.push(major);
        }
    }
    result
}
