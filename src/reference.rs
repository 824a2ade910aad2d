use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::package::split_package_folder;
use crate::version::Version;

static PACKAGE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[\\/])packages[\\/](?P<folder>[^\\/]+)[\\/](?:.*[\\/])?lib[\\/]")
        .expect("package hint pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceKind {
    /// Framework assembly resolved from the GAC, no hint path.
    SystemLibrary,
    /// Binary with a hint path outside the package store.
    LocalBinary,
    /// Binary inside an extracted package, or a `<PackageReference>`.
    Package,
    /// `<ProjectReference>`.
    Project,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SystemLibrary => "GAC",
            Self::LocalBinary => "DLL",
            Self::Package => "NuGet",
            Self::Project => "Project",
        })
    }
}

/// One dependency edge declared by a project.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Name of the declaring project.
    pub source: String,
    pub kind: ReferenceKind,
    pub name: String,
    /// The `Include` value as written, e.g. `Foo, Version=1.0.0.0, Culture=neutral`.
    pub identity: String,
    pub version: Option<Version>,
    pub hint_path: Option<String>,
    pub package_name: Option<String>,
    pub package_version: Option<Version>,
    pub private: bool,
}

impl Reference {
    /// Build a library reference from a classic `<Reference>` element.
    pub fn library(
        source: &str,
        identity: &str,
        hint_path: Option<String>,
        private: bool,
        default_version: &str,
    ) -> Self {
        let (name, version) = split_identity(identity);
        let version = Version::parse(version.unwrap_or(default_version));

        let package = hint_path
            .as_deref()
            .and_then(|hint| PACKAGE_HINT.captures(hint))
            .and_then(|caps| caps.name("folder"))
            .map(|folder| folder.as_str().to_string());

        let (kind, package_name, package_version) = match (&package, &hint_path) {
            (Some(folder), _) => match split_package_folder(folder) {
                Some((id, v)) => (ReferenceKind::Package, Some(id.to_string()), Some(Version::parse(v))),
                None => (ReferenceKind::Package, Some(folder.clone()), Some(Version::parse(folder))),
            },
            (None, Some(_)) => (ReferenceKind::LocalBinary, None, None),
            (None, None) => (ReferenceKind::SystemLibrary, None, None),
        };

        Self {
            source: source.to_string(),
            kind,
            name: name.to_string(),
            identity: identity.to_string(),
            version: Some(version),
            hint_path,
            package_name,
            package_version,
            private,
        }
    }

    pub fn package(source: &str, name: &str, version: &str) -> Self {
        let version = Version::parse(version);
        Self {
            source: source.to_string(),
            kind: ReferenceKind::Package,
            name: name.to_string(),
            identity: name.to_string(),
            version: Some(version.clone()),
            hint_path: None,
            package_name: Some(name.to_string()),
            package_version: Some(version),
            private: false,
        }
    }

    pub fn project(source: &str, name: &str, include: &str) -> Self {
        Self {
            source: source.to_string(),
            kind: ReferenceKind::Project,
            name: name.to_string(),
            identity: include.to_string(),
            version: None,
            hint_path: Some(include.to_string()),
            package_name: None,
            package_version: None,
            private: false,
        }
    }

    pub fn is_package(&self) -> bool {
        self.kind == ReferenceKind::Package
    }

    /// Name, then version, then package version for package references, then
    /// the identity string.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| {
                if self.is_package() && other.is_package() {
                    self.package_version.cmp(&other.package_version)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| self.identity.cmp(&other.identity))
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Reference {}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

/// Split `Name, Version=1.0.0.0, Culture=neutral` into the name and the
/// version text, if any.
pub fn split_identity(identity: &str) -> (&str, Option<&str>) {
    let mut parts = identity.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default();
    let version = parts.find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim().eq_ignore_ascii_case("Version").then(|| value.trim())
    });
    (name, version)
}

/// A package dependency as listed in `packages.config` or a
/// `<PackageReference>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub version: String,
    pub target_framework: Option<String>,
}

impl PackageEntry {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), target_framework: None }
    }

    pub fn with_target_framework(mut self, tfm: impl Into<String>) -> Self {
        self.target_framework = Some(tfm.into());
        self
    }

    pub fn parsed_version(&self) -> Version {
        Version::parse(&self.version)
    }
}
