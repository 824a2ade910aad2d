use std::path::Path;

use serde::Deserialize;

use crate::error::{ManifestError, Result};

/// Knobs shared by the manifest readers and the reconciliation passes.
///
/// Everything has a default matching a stock Visual Studio layout, so most
/// callers just use `Settings::default()`. A `csproj.toml` can override any
/// subset of the fields:
///
/// ```toml
/// packages-dir = "packages"
/// default-framework-version = "4.5.1"
/// excluded-dirs = ["bin", "obj", ".vs"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Name of the local package store folder next to the solution.
    pub packages_dir: String,
    /// Version assumed for classic references that carry none, when the
    /// project has no `TargetFrameworkVersion` either.
    pub default_framework_version: String,
    /// Moniker used when a project declares no target framework at all.
    pub default_target_framework: String,
    /// Top-level folders skipped when scanning a project folder.
    pub excluded_dirs: Vec<String>,
    /// File extensions (with dot) skipped when scanning a project folder.
    pub excluded_extensions: Vec<String>,
    /// Extensions an SDK project compiles without listing them.
    pub compile_extensions: Vec<String>,
    /// Extensions an SDK project carries as `None` items without listing them.
    pub none_extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            packages_dir: "packages".into(),
            default_framework_version: "4.5.1".into(),
            default_target_framework: "net45".into(),
            excluded_dirs: vec!["bin".into(), "obj".into()],
            excluded_extensions: vec![".user".into(), ".csproj".into()],
            compile_extensions: vec![".cs".into()],
            none_extensions: vec![".json".into(), ".config".into()],
        }
    }
}

impl Settings {
    pub fn from_toml_str(source: &str, origin: impl AsRef<Path>) -> Result<Self> {
        toml::from_str(source).map_err(|source| ManifestError::Config {
            path: origin.as_ref().to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|e| ManifestError::io(path, e))?;
        Self::from_toml_str(&source, path)
    }

    pub fn with_packages_dir(mut self, dir: impl Into<String>) -> Self {
        self.packages_dir = dir.into();
        self
    }

    pub fn with_default_framework_version(mut self, version: impl Into<String>) -> Self {
        self.default_framework_version = version.into();
        self
    }

    pub fn with_excluded_dir(mut self, dir: impl Into<String>) -> Self {
        self.excluded_dirs.push(dir.into());
        self
    }

    // ─── Extension lookups ───────────────────────────────────────────────

    pub(crate) fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d.eq_ignore_ascii_case(name))
    }

    pub(crate) fn is_excluded_file(&self, name: &str) -> bool {
        has_extension(name, &self.excluded_extensions)
    }

    /// Item type an SDK project gives `name` by convention, if any.
    pub(crate) fn implicit_item_type(&self, name: &str) -> Option<&'static str> {
        if has_extension(name, &self.compile_extensions) {
            Some("Compile")
        } else if has_extension(name, &self.none_extensions) {
            Some("None")
        } else {
            None
        }
    }
}

fn has_extension(name: &str, extensions: &[String]) -> bool {
    let name = name.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| name.ends_with(&ext.to_ascii_lowercase()))
}
