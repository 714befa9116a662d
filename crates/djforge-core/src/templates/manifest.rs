//! Template pack manifest (`templates.yaml`)

use serde::{Deserialize, Serialize};

/// File name of the manifest at the root of a pack
pub const MANIFEST_FILE: &str = "templates.yaml";

/// Describes a template pack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackManifest {
    /// Display name of the pack
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Oldest CLI version the pack is written for
    #[serde(default)]
    pub version: Option<String>,
}

impl PackManifest {
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let manifest =
            PackManifest::parse("name: acme\nversion: 0.2.0\ndescription: House style\n").unwrap();
        assert_eq!(manifest.name, "acme");
        assert_eq!(manifest.version.as_deref(), Some("0.2.0"));
    }

    #[test]
    fn test_empty_manifest_is_default() {
        assert_eq!(PackManifest::parse("").unwrap(), PackManifest::default());
        assert!(PackManifest::parse("version: [").is_err());
    }
}
