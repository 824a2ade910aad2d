//! Read-only access to the local package store and the `.nupkg` archives in
//! it.
//!
//! The store is the `packages/` folder next to a solution, one
//! `{Name}.{Version}/` folder per restored package holding the archive and
//! its extracted `lib/{tfm}/` binaries.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Settings;
use crate::error::{ManifestError, Result};
use crate::version::Version;
use crate::xml;

static PACKAGE_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>.+?)\.(?P<version>\d+(?:\.\d+)*(?:-[0-9A-Za-z.\-]+)?)$")
        .expect("package folder pattern is valid")
});

/// Split `Newtonsoft.Json.9.0.1` into `("Newtonsoft.Json", "9.0.1")`.
pub fn split_package_folder(folder: &str) -> Option<(&str, &str)> {
    let caps = PACKAGE_FOLDER.captures(folder)?;
    Some((caps.name("id")?.as_str(), caps.name("version")?.as_str()))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Package manifest (.nuspec)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDependency {
    pub name: String,
    /// Range as written, e.g. `[1.0.0, 2.0.0)` or `1.0.0`.
    pub version_range: String,
}

impl PackageDependency {
    /// Lower bound of the range and whether the bound itself is allowed.
    fn lower_bound(&self) -> Option<(&str, bool)> {
        let range = self.version_range.trim();
        let inclusive = !range.starts_with('(');
        let lower = range
            .trim_start_matches(['[', '('])
            .split(',')
            .next()
            .unwrap_or_default()
            .trim_end_matches([']', ')'])
            .trim();
        (!lower.is_empty()).then_some((lower, inclusive))
    }

    /// The version that gets restored: the lower bound when the range
    /// includes it. Exclusive bounds such as `(1.0, )` name no version.
    pub fn minimum_version(&self) -> Option<String> {
        self.lower_bound()
            .filter(|(_, inclusive)| *inclusive)
            .map(|(lower, _)| lower.to_string())
    }

    /// `version` is at or above the lower bound. The upper bound is not
    /// checked.
    pub fn admits(&self, version: &Version) -> bool {
        match self.lower_bound() {
            None => true,
            Some((lower, true)) => *version >= Version::parse(lower),
            Some((lower, false)) => *version > Version::parse(lower),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: String,
    pub version: Version,
    pub dependencies: Vec<PackageDependency>,
    /// `lib/{tfm}` folders present in the archive.
    pub target_frameworks: Vec<String>,
}

impl PackageManifest {
    /// Parse a `.nuspec` document. Dependencies listed once per target
    /// framework group are reported once.
    pub fn parse(source: &str, origin: &Path) -> Result<Self> {
        let doc = xml::parse(source, origin)?;
        let metadata = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "metadata")
            .ok_or_else(|| ManifestError::MissingElement {
                path: origin.to_path_buf(),
                element: "metadata",
            })?;

        let name = xml::child_text(metadata, "id").unwrap_or_default();
        let version = Version::parse(&xml::child_text(metadata, "version").unwrap_or_default());

        let mut dependencies: Vec<PackageDependency> = Vec::new();
        let listed = metadata
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "dependency");
        for node in listed {
            let Some(id) = node.attribute("id") else { continue };
            if dependencies.iter().any(|d| d.name.eq_ignore_ascii_case(id)) {
                continue;
            }
            dependencies.push(PackageDependency {
                name: id.to_string(),
                version_range: node.attribute("version").unwrap_or_default().to_string(),
            });
        }

        Ok(Self { name, version, dependencies, target_frameworks: Vec::new() })
    }

    /// Read the `.nuspec` at the root of a `.nupkg` archive.
    pub fn read_archive(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ManifestError::io(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|source| ManifestError::Archive {
            path: path.to_path_buf(),
            source,
        })?;

        let mut nuspec = None;
        let mut target_frameworks: Vec<String> = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|source| ManifestError::Archive {
                path: path.to_path_buf(),
                source,
            })?;
            let name = entry.name().replace('\\', "/");
            if !name.contains('/') && name.to_ascii_lowercase().ends_with(".nuspec") {
                let mut text = String::new();
                entry
                    .read_to_string(&mut text)
                    .map_err(|e| ManifestError::io(path, e))?;
                nuspec = Some(text);
            } else if let Some(rest) = name.strip_prefix("lib/") {
                if let Some((tfm, _)) = rest.split_once('/') {
                    if !tfm.is_empty() && !target_frameworks.iter().any(|t| t == tfm) {
                        target_frameworks.push(tfm.to_string());
                    }
                }
            }
        }

        let nuspec = nuspec.ok_or_else(|| ManifestError::MissingPackageMetadata {
            path: path.to_path_buf(),
        })?;
        let mut manifest = Self::parse(&nuspec, path)?;
        target_frameworks.sort();
        manifest.target_frameworks = target_frameworks;
        Ok(manifest)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Package folder
// ═══════════════════════════════════════════════════════════════════════════════

/// One `{Name}.{Version}` folder in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFolder {
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
}

impl PackageFolder {
    /// `{Name}.{Version}.nupkg` inside the folder, or any other `.nupkg`.
    pub fn archive_path(&self) -> Result<Option<PathBuf>> {
        if let Some(folder) = self.path.file_name() {
            let expected = self.path.join(format!("{}.nupkg", folder.to_string_lossy()));
            if expected.is_file() {
                return Ok(Some(expected));
            }
        }
        let entries = std::fs::read_dir(&self.path).map_err(|e| ManifestError::io(&self.path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ManifestError::io(&self.path, e))?;
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("nupkg"))
            {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    pub fn read_manifest(&self) -> Result<PackageManifest> {
        let archive = self
            .archive_path()?
            .ok_or_else(|| ManifestError::MissingPackageMetadata { path: self.path.clone() })?;
        let mut manifest = PackageManifest::read_archive(&archive)?;
        if manifest.name.is_empty() {
            manifest.name = self.name.clone();
        }
        if manifest.version.is_zero() {
            manifest.version = self.version.clone();
        }
        Ok(manifest)
    }

    /// Extracted `lib/` sub-folders.
    pub fn target_frameworks(&self) -> Result<Vec<String>> {
        let lib = self.path.join("lib");
        if !lib.is_dir() {
            return Ok(Vec::new());
        }
        let mut tfms = Vec::new();
        for entry in std::fs::read_dir(&lib).map_err(|e| ManifestError::io(&lib, e))? {
            let entry = entry.map_err(|e| ManifestError::io(&lib, e))?;
            if entry.path().is_dir() {
                tfms.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        tfms.sort();
        Ok(tfms)
    }

    /// Binaries extracted to `lib/{tfm}/`.
    pub fn binaries(&self, tfm: &str) -> Result<Vec<PathBuf>> {
        let dir = self.path.join("lib").join(tfm);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut dlls = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| ManifestError::io(&dir, e))? {
            let path = entry.map_err(|e| ManifestError::io(&dir, e))?.path();
            if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"))
            {
                dlls.push(path);
            }
        }
        dlls.sort();
        Ok(dlls)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct PackageStore {
    root: PathBuf,
}

impl PackageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn for_solution(solution_dir: &Path, settings: &Settings) -> Self {
        Self::new(solution_dir.join(&settings.packages_dir))
    }

    /// Nearest packages folder at or above `start`.
    pub fn locate(start: &Path, settings: &Settings) -> Option<Self> {
        start
            .ancestors()
            .map(|dir| dir.join(&settings.packages_dir))
            .find(|candidate| candidate.is_dir())
            .map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every restored version of `name`, oldest first.
    pub fn package_folders(&self, name: &str) -> Result<Vec<PackageFolder>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut folders = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(|e| ManifestError::io(&self.root, e))? {
            let entry = entry.map_err(|e| ManifestError::io(&self.root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let folder_name = entry.file_name().to_string_lossy().into_owned();
            let Some((id, version)) = split_package_folder(&folder_name) else {
                continue;
            };
            if id.eq_ignore_ascii_case(name) {
                folders.push(PackageFolder {
                    name: id.to_string(),
                    version: Version::parse(version),
                    path,
                });
            }
        }
        folders.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(folders)
    }

    pub fn find(&self, name: &str, version: &Version) -> Result<Option<PackageFolder>> {
        Ok(self
            .package_folders(name)?
            .into_iter()
            .find(|folder| &folder.version == version))
    }

    pub fn latest(&self, name: &str) -> Result<Option<PackageFolder>> {
        Ok(self.package_folders(name)?.pop())
    }
}
