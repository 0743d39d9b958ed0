use std::path::Path;

use serde::Deserialize;

use crate::errors::ManifestError;

const SCRIPT_SUFFIX: &str = ".js";

/// Maps router uris to page script paths.
pub trait RouteResolver: Send + Sync {
    /// Script path for `uri`, or `None` when the uri is not a known page.
    fn page_path(&self, uri: &str) -> Option<String>;

    /// Script path of the page loaded when no url is given.
    fn entry(&self) -> Option<String>;
}

/// Application manifest (`manifest.json`). Only the fields the router uses are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "appID")]
    pub app_id: String,
    #[serde(default, rename = "appName")]
    pub app_name: String,
    /// Page uris, the first one is the entry page
    #[serde(default)]
    pub pages: Vec<String>,
}

impl Manifest {
    pub fn parse(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        if manifest.pages.is_empty() {
            log::warn!("manifest declares no pages");
        }
        Ok(manifest)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn with_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

impl RouteResolver for Manifest {
    fn page_path(&self, uri: &str) -> Option<String> {
        let uri = uri.strip_suffix(SCRIPT_SUFFIX).unwrap_or(uri);
        if self.pages.iter().any(|page| page == uri) {
            Some(format!("{}{}", uri, SCRIPT_SUFFIX))
        } else {
            log::debug!("uri '{}' is not a declared page", uri);
            None
        }
    }

    fn entry(&self) -> Option<String> {
        self.pages.first().map(|page| format!("{}{}", page, SCRIPT_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"{
        "appID": "com.example.demo",
        "appName": "demo",
        "pages": ["pages/index/index", "pages/detail/detail"]
    }"#;

    #[test]
    fn resolves_declared_pages_only() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.app_id, "com.example.demo");
        assert_eq!(manifest.page_path("pages/detail/detail").as_deref(), Some("pages/detail/detail.js"));
        assert_eq!(manifest.page_path("pages/detail/detail.js").as_deref(), Some("pages/detail/detail.js"));
        assert_eq!(manifest.page_path("pages/missing"), None);
        assert_eq!(manifest.entry().as_deref(), Some("pages/index/index.js"));
    }

    #[test]
    fn empty_manifest_has_no_entry() {
        let manifest = Manifest::parse("{}").unwrap();
        assert!(manifest.entry().is_none());
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        assert!(matches!(Manifest::parse("{ pages: "), Err(ManifestError::Parse(_))));
    }

    #[test]
    fn loads_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(MANIFEST.as_bytes())?;

        let manifest = Manifest::from_file(file.path())?;
        assert_eq!(manifest.pages.len(), 2);
        assert!(matches!(
            Manifest::from_file(file.path().with_extension("missing")),
            Err(ManifestError::Io(_))
        ));
        Ok(())
    }
}
