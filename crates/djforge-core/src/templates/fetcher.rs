//! Template packs from a local directory, a zip file or a URL
//!
//! A pack is a tree of files named by template key (for example
//! `dev-launcher-script` or `custom-user-module/models.py`) with an optional
//! `templates.yaml` manifest at its root. Zip archives may wrap that tree in a
//! single top-level directory.

use super::manifest::{PackManifest, MANIFEST_FILE};
use super::TemplateProvider;
use crate::error::{Error, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;
use zip::ZipArchive;

/// Where a template pack comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// URL of a zip archive
    Remote(Url),
    /// A directory or a `.zip` file
    Local(PathBuf),
}

impl TemplateSource {
    pub fn remote(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::TemplatePack {
            location: url.to_string(),
            reason: format!("invalid URL: {}", e),
        })?;
        Ok(Self::Remote(parsed))
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local(path.into())
    }

    pub fn location(&self) -> String {
        match self {
            TemplateSource::Remote(url) => url.to_string(),
            TemplateSource::Local(path) => path.display().to_string(),
        }
    }
}

/// Loaded template pack
#[derive(Debug, Clone, Default)]
pub struct TemplatePack {
    manifest: PackManifest,
    files: HashMap<String, Vec<u8>>,
}

impl TemplatePack {
    pub fn new(manifest: PackManifest, files: HashMap<String, Vec<u8>>) -> Self {
        Self { manifest, files }
    }

    pub fn manifest(&self) -> &PackManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl TemplateProvider for TemplatePack {
    fn lookup(&self, key: &str) -> Option<Cow<'_, [u8]>> {
        self.files.get(key).map(|bytes| Cow::Borrowed(bytes.as_slice()))
    }

    fn keys(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }
}

/// Normalise a relative path into a template key, refusing anything that
/// could escape the directory it is later written into
fn template_key(relative: &str) -> Option<String> {
    let parts: Vec<&str> = relative
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    if parts.is_empty() || parts.iter().any(|p| *p == ".." || p.contains(':')) {
        return None;
    }
    if relative.starts_with('/') || relative.starts_with('\\') {
        return None;
    }
    Some(parts.join("/"))
}

fn pack_error(location: &str, reason: impl Into<String>) -> Error {
    Error::TemplatePack {
        location: location.to_string(),
        reason: reason.into(),
    }
}

/// Split raw files into manifest and templates
fn into_pack(location: &str, mut files: HashMap<String, Vec<u8>>) -> Result<TemplatePack> {
    let manifest = match files.remove(MANIFEST_FILE) {
        Some(raw) => PackManifest::parse(&String::from_utf8_lossy(&raw))
            .map_err(|e| pack_error(location, format!("invalid {}: {}", MANIFEST_FILE, e)))?,
        None => PackManifest::default(),
    };
    tracing::debug!(location, templates = files.len(), "loaded template pack");
    Ok(TemplatePack::new(manifest, files))
}

/// Read every file under `dir`
pub fn load_dir(dir: &Path) -> Result<TemplatePack> {
    let location = dir.display().to_string();
    if !dir.is_dir() {
        return Err(pack_error(&location, "not a directory"));
    }

    let mut files = HashMap::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| pack_error(&location, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| pack_error(&location, e.to_string()))?;
        let Some(key) = template_key(&relative.to_string_lossy()) else {
            continue;
        };
        let content = std::fs::read(entry.path())
            .map_err(|e| Error::io(format!("reading {}", entry.path().display()), e))?;
        files.insert(key, content);
    }

    into_pack(&location, files)
}

/// Extract a pack from zip bytes
pub fn load_zip(bytes: &[u8], location: &str) -> Result<TemplatePack> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| pack_error(location, format!("unreadable zip archive: {}", e)))?;

    let mut files: HashMap<String, Vec<u8>> = HashMap::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| pack_error(location, e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let Some(key) = template_key(&name) else {
            return Err(pack_error(location, format!("unsafe entry path '{}'", name)));
        };
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| pack_error(location, e.to_string()))?;
        files.insert(key, contents);
    }

    // Archives built by zipping a folder carry that folder as a prefix
    if !files.contains_key(MANIFEST_FILE) {
        let wrapped = files
            .keys()
            .filter_map(|k| k.strip_suffix(MANIFEST_FILE))
            .filter(|prefix| prefix.matches('/').count() == 1)
            .map(str::to_string)
            .next();
        if let Some(prefix) = wrapped {
            files = files
                .into_iter()
                .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|rest| (rest.to_string(), v)))
                .collect();
        }
    }

    into_pack(location, files)
}

/// Fetches template packs
pub struct TemplateFetcher {
    client: reqwest::Client,
}

impl TemplateFetcher {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub async fn fetch(&self, source: &TemplateSource) -> Result<TemplatePack> {
        let location = source.location();
        match source {
            TemplateSource::Remote(url) => {
                tracing::info!(%url, "downloading template pack");
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| pack_error(&location, e.to_string()))?;
                if !response.status().is_success() {
                    return Err(pack_error(
                        &location,
                        format!("HTTP {}", response.status()),
                    ));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| pack_error(&location, e.to_string()))?;
                load_zip(&bytes, &location)
            }
            TemplateSource::Local(path) if path.is_dir() => load_dir(path),
            TemplateSource::Local(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
                load_zip(&bytes, &location)
            }
        }
    }
}
