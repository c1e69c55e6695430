//! Platform manifest (`plugin.yml`) descriptor

use plugci_errors::ManifestError;
use serde::{Deserialize, Serialize};

use crate::scalar_list;

/// File name of the platform manifest, relative to the project path
pub const PLUGIN_MANIFEST: &str = "plugin.yml";

/// The subset of `plugin.yml` the pipeline reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    #[serde(default, deserialize_with = "scalar_list::optional_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_list::optional_string")]
    pub version: Option<String>,
    /// Fully qualified entry-point class
    #[serde(default, deserialize_with = "scalar_list::optional_string")]
    pub main: Option<String>,
    /// Declared target API versions, normalised to a list
    #[serde(default, deserialize_with = "scalar_list::strings")]
    pub api: Vec<String>,
    /// Namespace prefix mapped onto `src/` for API 4 and later
    #[serde(
        default,
        rename = "src-namespace-prefix",
        deserialize_with = "scalar_list::optional_string"
    )]
    pub src_namespace_prefix: Option<String>,
    /// Hard dependencies
    #[serde(default, deserialize_with = "scalar_list::strings")]
    pub depend: Vec<String>,
    /// Soft dependencies
    #[serde(default, deserialize_with = "scalar_list::strings")]
    pub softdepend: Vec<String>,
}

impl PluginDescriptor {
    /// Parse raw `plugin.yml` bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not UTF-8 or not a YAML mapping.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ManifestError::ParseError {
            file: PLUGIN_MANIFEST.to_string(),
            message: e.to_string(),
        })?;
        serde_yml::from_str(text).map_err(|e| ManifestError::ParseError {
            file: PLUGIN_MANIFEST.to_string(),
            message: e.to_string(),
        })
    }

    /// Hard dependencies followed by soft dependencies
    #[must_use]
    pub fn dependency_names(&self) -> Vec<String> {
        self.depend
            .iter()
            .chain(self.softdepend.iter())
            .cloned()
            .collect()
    }

    /// Namespace of the entry-point class with a trailing separator, e.g.
    /// `Vendor\Plugin\` for `Vendor\Plugin\Main`
    #[must_use]
    pub fn main_namespace(&self) -> Option<String> {
        let main = self.main.as_deref()?;
        let segments: Vec<&str> = main.split('\\').collect();
        let namespace = segments[..segments.len().saturating_sub(1)].join("\\");
        Some(format!("{namespace}\\"))
    }
}
