mod classic;
mod files;
mod sdk;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use roxmltree::{Document, Node};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::condition;
use crate::config::Settings;
use crate::error::{ManifestError, Result};
use crate::logger::Logger;
use crate::package_list::PackageList;
use crate::paths;
use crate::reference::{split_identity, PackageEntry, Reference};
use crate::version::Version;
use crate::xml::{self, Edit, Layout};

pub use files::FileEntry;

/// Flattened `<PropertyGroup>` values.
pub type Properties = BTreeMap<String, String>;
/// `<key>value</key>` children of an item element.
pub type Metadata = BTreeMap<String, String>;

static FRAMEWORK_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?").expect("framework version pattern is valid")
});

/// The two MSBuild project formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Pre-SDK format: `xmlns` on the root, every file and reference listed.
    Classic,
    /// `<Project Sdk="...">`: files included by convention, `Update`/`Remove`
    /// directives on items.
    Sdk,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Classic => "classic",
            Self::Sdk => "sdk",
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  ProjectManifest – top-level handle
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle for reading and mutating a `.csproj` file while preserving its
/// original formatting.
///
/// Every query parses the current source with `roxmltree`; every mutation
/// splices the source at node ranges and marks the handle dirty. Nothing
/// reaches the disk until [`ProjectManifest::save`], and even then only when
/// the content hash differs from the one taken at load time.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    path: PathBuf,
    directory: PathBuf,
    source: String,
    dialect: Dialect,
    original_hash: String,
    dirty: bool,
    /// Sibling `packages.config`, loaded when present or created on demand.
    package_list: Option<PackageList>,
    settings: Settings,
}

impl ProjectManifest {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, Settings::default())
    }

    pub fn open_with(path: impl AsRef<Path>, settings: Settings) -> Result<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).map_err(|e| ManifestError::io(path, e))?;
        let path = paths::normalize(&absolute);
        let source = std::fs::read_to_string(&path).map_err(|e| ManifestError::io(&path, e))?;
        Self::from_source(path, source, settings)
    }

    /// Build a handle from text already in memory. `path` locates the
    /// project folder and its `packages.config`.
    pub fn from_source(path: impl Into<PathBuf>, source: impl Into<String>, settings: Settings) -> Result<Self> {
        let path = path.into();
        let source = source.into();
        let dialect = {
            let doc = xml::parse(&source, &path)?;
            let root = doc.root_element();
            if root.tag_name().name() != "Project" {
                return Err(ManifestError::MissingElement { path, element: "Project" });
            }
            if root.has_attribute("Sdk") { Dialect::Sdk } else { Dialect::Classic }
        };

        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let list_path = directory.join("packages.config");
        let package_list = if list_path.is_file() {
            Some(PackageList::open(&list_path)?)
        } else {
            None
        };

        tracing::debug!("opened {} ({dialect})", path.display());
        Ok(Self {
            original_hash: content_hash(&source),
            path,
            directory,
            source,
            dialect,
            dirty: false,
            package_list,
            settings,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File stem of the project file.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn is_sdk(&self) -> bool {
        self.dialect == Dialect::Sdk
    }

    /// The current raw XML source (reflects any mutations).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn package_list(&self) -> Option<&PackageList> {
        self.package_list.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Write the manifest back if it was mutated and its content changed.
    /// A dirty `packages.config` is written as well. Returns whether the
    /// manifest itself was written.
    pub fn save(&mut self) -> Result<bool> {
        if let Some(list) = self.package_list.as_mut() {
            list.save()?;
        }
        if !self.dirty {
            return Ok(false);
        }
        let hash = content_hash(&self.source);
        if hash == self.original_hash {
            tracing::debug!("{} unchanged, not saving", self.path.display());
            return Ok(false);
        }
        std::fs::write(&self.path, &self.source).map_err(|e| ManifestError::io(&self.path, e))?;
        self.original_hash = hash;
        tracing::info!("saved {}", self.path.display());
        Ok(true)
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn document(&self) -> Result<Document<'_>> {
        xml::parse(&self.source, &self.path)
    }

    /// Apply edits; returns whether any were applied.
    fn splice(&mut self, edits: Vec<Edit>) -> bool {
        if edits.is_empty() {
            return false;
        }
        xml::apply(&mut self.source, edits);
        self.dirty = true;
        true
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            paths::normalize(path)
        } else {
            paths::normalize(&self.directory.join(path))
        }
    }

    /// Whether the manifest path `include` names the absolute `target`.
    fn names_path(&self, include: &str, target: &Path) -> bool {
        paths::key(&paths::resolve(&self.directory, include)) == paths::key(target)
    }

    // ─── Properties ──────────────────────────────────────────────────────

    /// Values of every `<PropertyGroup>` whose condition holds for the given
    /// configuration and platform, later groups overriding earlier ones.
    pub fn properties(&self, configuration: &str, platform: &str) -> Result<Properties> {
        let vars = HashMap::from([
            ("Configuration".to_string(), configuration.to_string()),
            ("Platform".to_string(), platform.to_string()),
        ]);
        let doc = self.document()?;
        let mut properties = Properties::new();
        for group in xml::named(doc.root_element(), "PropertyGroup") {
            if !condition::holds(group.attribute("Condition"), &vars) {
                continue;
            }
            properties.extend(xml::metadata(group));
        }
        if self.is_sdk() {
            properties
                .entry("AssemblyName".to_string())
                .or_insert_with(|| self.name());
        }
        Ok(properties)
    }

    /// Build output folder relative to the project.
    pub fn output_path(&self, configuration: &str, platform: &str) -> Result<PathBuf> {
        let properties = self.properties(configuration, platform)?;
        let non_empty = |key: &str| properties.get(key).filter(|v| !v.is_empty());

        let mut output = match non_empty("OutputPath") {
            Some(explicit) => paths::from_manifest(explicit),
            None => {
                let mut default = PathBuf::from("bin");
                let any_cpu = platform.replace(' ', "").eq_ignore_ascii_case("AnyCPU");
                if !platform.is_empty() && !any_cpu {
                    default.push(platform);
                }
                default.push(configuration);
                default
            }
        };
        if self.is_sdk() {
            if let Some(tfm) = non_empty("TargetFramework") {
                output.push(tfm);
            }
            if let Some(rid) = non_empty("RuntimeIdentifier") {
                output.push(rid);
            }
        }
        Ok(output)
    }

    /// First value of `tag` in any property group, conditions ignored.
    fn first_property(&self, tag: &str) -> Result<Option<String>> {
        let doc = self.document()?;
        Ok(xml::named(doc.root_element(), "PropertyGroup")
            .find_map(|group| xml::child_text(group, tag))
            .filter(|v| !v.is_empty()))
    }

    /// Target framework moniker, e.g. `net461`.
    pub fn target_framework(&self) -> Result<String> {
        let fallback = || self.settings.default_target_framework.clone();
        match self.dialect {
            Dialect::Sdk => {
                if let Some(tfm) = self.first_property("TargetFramework")? {
                    return Ok(tfm);
                }
                Ok(self
                    .first_property("TargetFrameworks")?
                    .and_then(|all| all.split(';').map(str::trim).find(|t| !t.is_empty()).map(str::to_string))
                    .unwrap_or_else(fallback))
            }
            Dialect::Classic => Ok(self
                .first_property("TargetFrameworkVersion")?
                .and_then(|version| {
                    let caps = FRAMEWORK_VERSION.captures(&version)?;
                    let digits: String = caps
                        .iter()
                        .skip(1)
                        .flatten()
                        .map(|m| m.as_str())
                        .collect();
                    Some(format!("net{digits}"))
                })
                .unwrap_or_else(fallback)),
        }
    }

    /// Version given to classic references that do not carry one.
    fn default_reference_version(&self) -> Result<String> {
        Ok(self
            .first_property("TargetFrameworkVersion")?
            .map(|v| v.trim_start_matches('v').to_string())
            .unwrap_or_else(|| self.settings.default_framework_version.clone()))
    }

    // ─── References ──────────────────────────────────────────────────────

    /// Library references (classic) or package references (SDK).
    pub fn references(&self) -> Result<Vec<Reference>> {
        match self.dialect {
            Dialect::Classic => classic::references(self),
            Dialect::Sdk => sdk::references(self),
        }
    }

    pub fn project_references(&self) -> Result<Vec<Reference>> {
        let doc = self.document()?;
        let name = self.name();
        Ok(items(&doc)
            .filter(|n| n.tag_name().name() == "ProjectReference")
            .filter_map(|node| {
                let include = node.attribute("Include")?;
                let target = xml::child_text(node, "Name")
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| paths::stem(include));
                Some(Reference::project(&name, &target, include))
            })
            .collect())
    }

    /// Everything the project depends on, project references included.
    pub fn all_references(&self) -> Result<Vec<Reference>> {
        let mut all = self.references()?;
        all.extend(self.project_references()?);
        Ok(all)
    }

    fn inline_packages(&self) -> Result<Vec<PackageEntry>> {
        let doc = self.document()?;
        Ok(items(&doc)
            .filter(|n| n.tag_name().name() == "PackageReference")
            .filter_map(|node| {
                let include = node.attribute("Include")?;
                Some(PackageEntry::new(include, package_version(node).unwrap_or_default()))
            })
            .collect())
    }

    /// `<PackageReference>` items, or the sibling `packages.config` for a
    /// classic project that has none.
    pub fn package_references(&self) -> Result<Vec<PackageEntry>> {
        let inline = self.inline_packages()?;
        if !inline.is_empty() || self.is_sdk() {
            return Ok(inline);
        }
        match &self.package_list {
            Some(list) => list.packages(),
            None => Ok(Vec::new()),
        }
    }

    /// Package references live in the manifest rather than `packages.config`.
    fn uses_inline_packages(&self) -> Result<bool> {
        Ok(self.is_sdk() || !self.inline_packages()?.is_empty())
    }

    /// Add a package reference, or raise the version of an existing one.
    pub fn add_package_reference(
        &mut self,
        name: &str,
        version: &str,
        target_framework: Option<&str>,
    ) -> Result<bool> {
        if !self.uses_inline_packages()? {
            let list = self
                .package_list
                .get_or_insert_with(|| PackageList::empty(self.directory.join("packages.config")));
            return list.add_package(name, version, target_framework);
        }

        let edit = {
            let doc = self.document()?;
            let layout = Layout::detect(&self.source, &doc);
            let existing = items(&doc).find(|n| {
                n.tag_name().name() == "PackageReference"
                    && n.attribute("Include").is_some_and(|i| i.eq_ignore_ascii_case(name))
            });
            match existing {
                None => Some(add_item_edit(&self.source, &doc, &layout, "PackageReference", |indent| {
                    xml::render_element(
                        "PackageReference",
                        &[("Include", name), ("Version", version)],
                        [],
                        indent,
                        &layout,
                    )
                })),
                Some(node) => {
                    let current = package_version(node);
                    let newer = current
                        .as_deref()
                        .is_none_or(|c| Version::parse(version) > Version::parse(c));
                    newer.then(|| set_package_version(&self.source, node, version))
                }
            }
        };
        let changed = self.splice(edit.into_iter().collect());
        if changed {
            tracing::debug!("{}: package reference {name} {version}", self.name());
        }
        Ok(changed)
    }

    pub fn remove_package_reference(&mut self, name: &str) -> Result<bool> {
        let edits: Vec<Edit> = {
            let doc = self.document()?;
            items(&doc)
                .filter(|n| {
                    n.tag_name().name() == "PackageReference"
                        && n.attribute("Include").is_some_and(|i| i.eq_ignore_ascii_case(name))
                })
                .map(|n| xml::remove_node(&self.source, n))
                .collect()
        };
        if self.splice(edits) {
            tracing::debug!("{}: removed package reference {name}", self.name());
            return Ok(true);
        }
        match self.package_list.as_mut() {
            Some(list) if self.dialect == Dialect::Classic => list.remove_package(name),
            _ => Ok(false),
        }
    }

    /// Add a `<ProjectReference>` to the project file at `project_path`
    /// unless one already points there.
    pub fn add_project_reference(&mut self, name: &str, project_path: &Path, id: Uuid) -> Result<bool> {
        let target = self.absolute(project_path);
        let include = paths::relative(&self.directory, &target);
        let edit = {
            let doc = self.document()?;
            let exists = items(&doc)
                .filter(|n| n.tag_name().name() == "ProjectReference")
                .any(|n| {
                    n.attribute("Include").is_some_and(|i| self.names_path(i, &target))
                        || xml::child_text(n, "Name").is_some_and(|n| n.eq_ignore_ascii_case(name))
                });
            if exists {
                None
            } else {
                let layout = Layout::detect(&self.source, &doc);
                let project_id = format!("{{{id}}}");
                let metadata: Vec<(&str, &str)> = match self.dialect {
                    Dialect::Classic => vec![("Project", project_id.as_str()), ("Name", name)],
                    Dialect::Sdk => Vec::new(),
                };
                Some(add_item_edit(&self.source, &doc, &layout, "ProjectReference", |indent| {
                    xml::render_element("ProjectReference", &[("Include", &include)], metadata, indent, &layout)
                }))
            }
        };
        let changed = self.splice(edit.into_iter().collect());
        if changed {
            tracing::debug!("{}: project reference {include}", self.name());
        }
        Ok(changed)
    }

    /// Remove the `<ProjectReference>` whose include names the same file as
    /// `include`.
    pub fn remove_project_reference(&mut self, include: &str) -> Result<bool> {
        let target = paths::resolve(&self.directory, include);
        let edits: Vec<Edit> = {
            let doc = self.document()?;
            items(&doc)
                .filter(|n| n.tag_name().name() == "ProjectReference")
                .filter(|n| n.attribute("Include").is_some_and(|i| self.names_path(i, &target)))
                .map(|n| xml::remove_node(&self.source, n))
                .collect()
        };
        Ok(self.splice(edits))
    }

    /// Remove every `<Reference>` whose assembly name is `name`.
    pub fn remove_reference(&mut self, name: &str) -> Result<bool> {
        let edits: Vec<Edit> = {
            let doc = self.document()?;
            items(&doc)
                .filter(|n| n.tag_name().name() == "Reference")
                .filter(|n| {
                    n.attribute("Include")
                        .is_some_and(|i| split_identity(i).0.eq_ignore_ascii_case(name))
                })
                .map(|n| xml::remove_node(&self.source, n))
                .collect()
        };
        Ok(self.splice(edits))
    }

    /// Reference a binary directly by hint path. Classic projects only; SDK
    /// projects pick binaries up from their package references.
    pub fn add_binary_reference(&mut self, binary: &Path) -> Result<bool> {
        match self.dialect {
            Dialect::Classic => classic::add_binary_reference(self, binary),
            Dialect::Sdk => Ok(false),
        }
    }

    // ─── Files ───────────────────────────────────────────────────────────

    /// Every file on disk under the project folder merged with every file
    /// the manifest mentions.
    pub fn scan_files(&self) -> Result<Vec<FileEntry>> {
        match self.dialect {
            Dialect::Classic => classic::scan_files(self),
            Dialect::Sdk => sdk::scan_files(self),
        }
    }

    /// Make `path` part of the project, with `metadata` as its item metadata
    /// when given.
    pub fn add_file(&mut self, path: &Path, item_type: Option<&str>, metadata: Option<&Metadata>) -> Result<bool> {
        let path = self.absolute(path);
        match self.dialect {
            Dialect::Classic => classic::add_file(self, &path, item_type, metadata),
            Dialect::Sdk => sdk::add_file(self, &path, item_type, metadata),
        }
    }

    pub fn remove_file(&mut self, path: &Path) -> Result<bool> {
        let path = self.absolute(path);
        match self.dialect {
            Dialect::Classic => classic::remove_file(self, &path),
            Dialect::Sdk => sdk::remove_file(self, &path),
        }
    }

    // ─── Cleanup ─────────────────────────────────────────────────────────

    /// Deduplicate references and regroup and sort items. SDK projects have
    /// nothing to normalise.
    pub fn clean_up(&mut self, logger: &dyn Logger) -> Result<bool> {
        match self.dialect {
            Dialect::Classic => classic::clean_up(self, logger),
            Dialect::Sdk => Ok(false),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Shared helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn content_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

/// Item elements of every `<ItemGroup>` in the document.
fn items<'a, 'input>(doc: &'a Document<'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "ItemGroup")
        .flat_map(xml::elements)
}

/// Items that describe dependencies rather than files.
fn is_reference_item(tag: &str) -> bool {
    matches!(tag, "Reference" | "ProjectReference" | "PackageReference" | "DotNetCliToolReference")
}

/// Items that only configure tooling.
fn is_structural_item(tag: &str) -> bool {
    matches!(tag, "WCFMetadata" | "Folder" | "Service" | "BootstrapperPackage")
}

fn package_version(node: Node) -> Option<String> {
    node.attribute("Version")
        .map(str::to_string)
        .or_else(|| xml::child_text(node, "Version"))
}

fn set_package_version(source: &str, node: Node, version: &str) -> Edit {
    if node.has_attribute("Version") || xml::child_text(node, "Version").is_none() {
        let mut attrs: Vec<(&str, &str)> = xml::attributes(node)
            .into_iter()
            .filter(|(k, _)| *k != "Version")
            .collect();
        attrs.push(("Version", version));
        return xml::rewrite_start_tag(source, node, &attrs);
    }
    let child = xml::elements(node).find(|n| n.tag_name().name() == "Version");
    match child.and_then(|c| c.children().find(|n| n.is_text())) {
        Some(text) => Edit::replace(text.range(), xml::escape(version).into_owned()),
        None => {
            let mut attrs = xml::attributes(node);
            attrs.push(("Version", version));
            xml::rewrite_start_tag(source, node, &attrs)
        }
    }
}

/// Edit adding an item next to existing `tag` items, or in a new
/// `<ItemGroup>` at the end of the project. `render` receives the
/// indentation the item will sit at.
fn add_item_edit(
    source: &str,
    doc: &Document,
    layout: &Layout,
    tag: &str,
    render: impl FnOnce(&str) -> String,
) -> Edit {
    let root = doc.root_element();
    let group = xml::named(root, "ItemGroup")
        .filter(|g| !g.has_attribute("Condition"))
        .find(|g| xml::elements(*g).any(|n| n.tag_name().name() == tag));
    match group {
        Some(group) => {
            let indent = layout.child_indent(source, group);
            xml::append_child(source, group, &render(&indent), layout)
        }
        None => {
            let group_indent = layout.child_indent(source, root);
            let item_indent = format!("{group_indent}{}", layout.unit);
            let text = xml::render_group(&[render(&item_indent)], &group_indent, layout);
            xml::append_child(source, root, &text, layout)
        }
    }
}

fn metadata_of(node: Node) -> Metadata {
    xml::metadata(node).into_iter().collect()
}
