//! File templates for generated projects
//!
//! Templates are addressed by key. Every key ships inside the binary
//! ([`bundled`]); a template pack fetched from a directory, a zip file or a URL
//! ([`fetcher`]) can override any of them.

pub mod bundled;
pub mod fetcher;
pub mod manifest;
pub mod version;

use crate::error::{Error, Result};
use std::borrow::Cow;

pub use bundled::BundledTemplates;
pub use fetcher::{TemplateFetcher, TemplatePack, TemplateSource};
pub use manifest::PackManifest;
pub use version::check_compatibility;

/// Prefix of the files making up the custom user app
pub const CUSTOM_USER_MODULE: &str = "custom-user-module/";
pub const DEV_LAUNCHER: &str = "dev-launcher-script";
pub const BACKEND_CONTAINER: &str = "container-descriptor-backend";
pub const FRONTEND_CONTAINER: &str = "container-descriptor-frontend";
pub const BACKEND_CONTAINER_IGNORE: &str = "container-ignore-backend";
pub const HOSTING_SHIM: &str = "hosting-gateway-shim";

/// Lookup of template content by key
pub trait TemplateProvider {
    fn lookup(&self, key: &str) -> Option<Cow<'_, [u8]>>;

    /// All keys this provider knows, unordered
    fn keys(&self) -> Vec<String>;

    fn get(&self, key: &str) -> Result<Cow<'_, [u8]>> {
        self.lookup(key)
            .ok_or_else(|| Error::TemplateNotFound(key.to_string()))
    }

    fn get_text(&self, key: &str) -> Result<String> {
        let bytes = self.get(key)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Sorted keys under `prefix`
    fn list(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Bundled templates with an optional pack layered on top
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pack: Option<TemplatePack>,
}

impl Templates {
    pub fn bundled() -> Self {
        Self::default()
    }

    pub fn with_pack(pack: TemplatePack) -> Self {
        Self { pack: Some(pack) }
    }

    pub fn pack(&self) -> Option<&TemplatePack> {
        self.pack.as_ref()
    }
}

impl TemplateProvider for Templates {
    fn lookup(&self, key: &str) -> Option<Cow<'_, [u8]>> {
        self.pack
            .as_ref()
            .and_then(|pack| pack.lookup(key))
            .or_else(|| BundledTemplates.lookup(key))
    }

    fn keys(&self) -> Vec<String> {
        let mut keys = BundledTemplates.keys();
        if let Some(pack) = &self.pack {
            keys.extend(pack.keys());
        }
        keys
    }
}

/// Substitute `{{key}}` placeholders; unknown placeholders stay as they are
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{{{}}}}}", key), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_render_placeholders() {
        let out = render(
            "name={{name}} again={{name}} other={{other}}",
            &[("name", "shop")],
        );
        assert_eq!(out, "name=shop again=shop other={{other}}");
    }

    #[test]
    fn test_bundled_keys_resolve() {
        let templates = Templates::bundled();
        for key in [
            DEV_LAUNCHER,
            BACKEND_CONTAINER,
            FRONTEND_CONTAINER,
            BACKEND_CONTAINER_IGNORE,
            HOSTING_SHIM,
        ] {
            assert!(templates.get(key).is_ok(), "missing {}", key);
        }
        assert!(matches!(
            templates.get("no-such-key"),
            Err(Error::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_custom_user_module_listing() {
        let files = Templates::bundled().list(CUSTOM_USER_MODULE);
        assert!(files.contains(&"custom-user-module/models.py".to_string()));
        assert!(files.contains(&"custom-user-module/migrations/__init__.py".to_string()));
    }

    #[test]
    fn test_pack_overrides_bundled() {
        let mut files = HashMap::new();
        files.insert(DEV_LAUNCHER.to_string(), b"#!/bin/sh\necho custom\n".to_vec());
        files.insert("custom-user-module/signals.py".to_string(), b"".to_vec());
        let templates = Templates::with_pack(TemplatePack::new(PackManifest::default(), files));

        assert_eq!(
            templates.get_text(DEV_LAUNCHER).unwrap(),
            "#!/bin/sh\necho custom\n"
        );
        // Keys the pack lacks still come from the bundle
        assert!(templates.get(HOSTING_SHIM).is_ok());

        let listed = templates.list(CUSTOM_USER_MODULE);
        assert!(listed.contains(&"custom-user-module/signals.py".to_string()));
        assert_eq!(
            listed.iter().filter(|k| k.ends_with("models.py")).count(),
            1
        );
    }
}
