use std::path::{Path, PathBuf};

use crate::error::{ManifestError, Result};
use crate::reference::PackageEntry;
use crate::xml::{self, Edit, Layout};

const EMPTY: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<packages>\n</packages>\n";

/// A `packages.config` file sitting next to a classic project.
#[derive(Debug, Clone)]
pub struct PackageList {
    path: PathBuf,
    source: String,
    dirty: bool,
}

impl PackageList {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ManifestError::io(path, e))?;
        Self::parse(path, source)
    }

    pub fn parse(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self> {
        let list = Self { path: path.into(), source: source.into(), dirty: false };
        list.root_check()?;
        Ok(list)
    }

    /// An empty list that will be created on the first save.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), source: EMPTY.to_string(), dirty: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn root_check(&self) -> Result<()> {
        let doc = xml::parse(&self.source, &self.path)?;
        if doc.root_element().tag_name().name() != "packages" {
            return Err(ManifestError::MissingElement { path: self.path.clone(), element: "packages" });
        }
        Ok(())
    }

    pub fn packages(&self) -> Result<Vec<PackageEntry>> {
        let doc = xml::parse(&self.source, &self.path)?;
        Ok(xml::named(doc.root_element(), "package")
            .filter_map(|node| {
                let mut entry = PackageEntry::new(node.attribute("id")?, node.attribute("version").unwrap_or_default());
                entry.target_framework = node.attribute("targetFramework").map(str::to_string);
                Some(entry)
            })
            .collect())
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.packages()?.iter().any(|p| p.name.eq_ignore_ascii_case(name)))
    }

    /// Add `name` unless it is already listed. Returns whether it was added.
    pub fn add_package(&mut self, name: &str, version: &str, target_framework: Option<&str>) -> Result<bool> {
        if self.contains(name)? {
            return Ok(false);
        }
        let edit = {
            let doc = xml::parse(&self.source, &self.path)?;
            let layout = Layout::detect(&self.source, &doc);
            let mut attrs = vec![("id", name), ("version", version)];
            if let Some(tfm) = target_framework {
                attrs.push(("targetFramework", tfm));
            }
            let text = xml::render_element("package", &attrs, [], "", &layout);
            xml::append_child(&self.source, doc.root_element(), &text, &layout)
        };
        xml::apply(&mut self.source, vec![edit]);
        self.dirty = true;
        tracing::debug!("{}: added package {name} {version}", self.path.display());
        Ok(true)
    }

    /// Remove every `<package>` named `name`. Returns whether anything went.
    pub fn remove_package(&mut self, name: &str) -> Result<bool> {
        let edits: Vec<Edit> = {
            let doc = xml::parse(&self.source, &self.path)?;
            xml::named(doc.root_element(), "package")
                .filter(|n| n.attribute("id").is_some_and(|id| id.eq_ignore_ascii_case(name)))
                .map(|n| xml::remove_node(&self.source, n))
                .collect()
        };
        if edits.is_empty() {
            return Ok(false);
        }
        xml::apply(&mut self.source, edits);
        self.dirty = true;
        tracing::debug!("{}: removed package {name}", self.path.display());
        Ok(true)
    }

    /// Write the file if anything changed.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        std::fs::write(&self.path, &self.source).map_err(|e| ManifestError::io(&self.path, e))?;
        self.dirty = false;
        tracing::info!("saved {}", self.path.display());
        Ok(true)
    }
}
