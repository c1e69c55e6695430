//! Inclusion and exclusion rules mapping source paths to archive paths

use plugci_types::ProjectManifest;

/// Marker meaning "same path on both sides" in a directory mapping
const SAME_PATH: &str = "=";

/// Compiled archive rules for one project
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveRules {
    /// Directory mappings, matched first-match-wins in this order
    pub include_dirs: Vec<(String, String)>,
    /// Exact file mappings, destination relative to the archive root
    pub include_files: Vec<(String, String)>,
    pub exclude_files: Vec<String>,
    pub exclude_dirs: Vec<String>,
}

/// Where a source file lands in the archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destination {
    pub path: String,
    /// Matched through an exact file mapping rather than a directory rule
    pub exact: bool,
}

impl ArchiveRules {
    /// Compile the rules declared by a project manifest
    ///
    /// The defaults `resources/` and `src/` under the project path come first.
    /// A declared directory with the same normalized source as an earlier rule
    /// replaces that rule's destination in place.
    #[must_use]
    pub fn from_manifest(manifest: &ProjectManifest) -> Self {
        let project = manifest.path.as_str();
        let mut rules = Self {
            include_dirs: vec![
                (format!("{project}resources/"), "resources/".to_string()),
                (format!("{project}src/"), "src/".to_string()),
            ],
            ..Self::default()
        };

        for (source, target) in &manifest.include_dirs {
            let from = dir_form(&resolve(project, source));
            let raw_target = if target.trim() == SAME_PATH {
                source.trim()
            } else {
                target.as_str()
            };
            let to = dir_form(raw_target);
            insert_or_replace(&mut rules.include_dirs, from, to);
        }
        for (source, target) in &manifest.include_files {
            insert_or_replace(
                &mut rules.include_files,
                resolve(project, source),
                file_form(target),
            );
        }
        rules.exclude_files = manifest
            .exclude_files
            .iter()
            .map(|file| resolve(project, file))
            .collect();
        rules.exclude_dirs = manifest
            .exclude_dirs
            .iter()
            .map(|dir| dir_form(&resolve(project, dir)))
            .collect();
        rules
    }

    /// Archive destination for a source file, or `None` if it is not packaged
    #[must_use]
    pub fn destination(&self, path: &str) -> Option<Destination> {
        if let Some((_, target)) = self.include_files.iter().find(|(source, _)| source == path) {
            return Some(Destination {
                path: target.clone(),
                exact: true,
            });
        }

        let (source, target) = self
            .include_dirs
            .iter()
            .find(|(source, _)| path.starts_with(source.as_str()))?;

        if self.exclude_files.iter().any(|file| file == path)
            || self.exclude_dirs.iter().any(|dir| path.starts_with(dir.as_str()))
        {
            return None;
        }

        Some(Destination {
            path: format!("{target}{}", &path[source.len()..]),
            exact: false,
        })
    }
}

/// Root-relative when declared with a leading `/`, project-relative otherwise
fn resolve(project: &str, declared: &str) -> String {
    let declared = declared.trim();
    match declared.strip_prefix('/') {
        Some(rooted) => rooted.to_string(),
        None => format!("{project}{declared}"),
    }
}

/// File destinations are always archive-relative
fn file_form(path: &str) -> String {
    path.trim().trim_start_matches('/').to_string()
}

/// Trim separators and append exactly one; the root stays empty
fn dir_form(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

fn insert_or_replace(rules: &mut Vec<(String, String)>, from: String, to: String) {
    match rules.iter_mut().find(|(source, _)| *source == from) {
        Some(rule) => rule.1 = to,
        None => rules.push((from, to)),
    }
}
