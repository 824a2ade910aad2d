//! SDK-style manifests: files are part of the project by convention, and
//! items only add (`Include`), adjust (`Update`) or exclude (`Remove`).

use std::path::Path;

use roxmltree::Node;

use super::files::{self, FileEntry, Wildcard, REMOVED};
use super::{
    add_item_edit, is_reference_item, is_structural_item, items, metadata_of, package_version, Metadata,
    ProjectManifest,
};
use crate::error::Result;
use crate::paths;
use crate::reference::Reference;
use crate::xml::{self, Layout};

/// Item attribute naming the file an element applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Update,
    Include,
    Remove,
}

impl Directive {
    /// Scan order: later directives override earlier ones.
    const ORDER: [Self; 3] = [Self::Update, Self::Include, Self::Remove];

    fn attribute(self) -> &'static str {
        match self {
            Self::Update => "Update",
            Self::Include => "Include",
            Self::Remove => "Remove",
        }
    }
}

pub(super) fn references(project: &ProjectManifest) -> Result<Vec<Reference>> {
    let name = project.name();
    let doc = project.document()?;
    Ok(items(&doc)
        .filter(|n| n.tag_name().name() == "PackageReference")
        .filter_map(|node| {
            let include = node.attribute("Include")?;
            Some(Reference::package(&name, include, &package_version(node).unwrap_or_default()))
        })
        .collect())
}

// ─── Scan ────────────────────────────────────────────────────────────────────

pub(super) fn scan_files(project: &ProjectManifest) -> Result<Vec<FileEntry>> {
    let directory = &project.directory;
    let mut files = files::discover(directory, &project.settings, true)?;
    let doc = project.document()?;

    let mut removals = Vec::new();
    for directive in Directive::ORDER {
        for item in items(&doc) {
            let tag = item.tag_name().name();
            if is_reference_item(tag) || is_structural_item(tag) {
                continue;
            }
            let Some(value) = item.attribute(directive.attribute()) else {
                continue;
            };
            for include in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                if files::is_wildcard(include) {
                    match directive {
                        Directive::Remove => removals.extend(Wildcard::compile(directory, include)),
                        _ => tracing::warn!(
                            "{}: wildcard {} ignored on {tag}",
                            project.name(),
                            directive.attribute()
                        ),
                    }
                    continue;
                }
                match directive {
                    Directive::Remove => files::declare(&mut files, directory, include, REMOVED, Metadata::new()),
                    _ => files::declare(&mut files, directory, include, tag, metadata_of(item)),
                }
            }
        }
    }

    for wildcard in &removals {
        for entry in files.values_mut() {
            if entry.on_disk && !entry.in_manifest && wildcard.matches(&entry.path) {
                tracing::trace!("{} excluded by {}", entry.name, wildcard.raw);
                entry.item_type = REMOVED.to_string();
                entry.implicit = false;
            }
        }
    }
    Ok(files.into_values().collect())
}

// ─── Mutation ────────────────────────────────────────────────────────────────

fn find<'a, 'input>(
    project: &ProjectManifest,
    doc: &'a roxmltree::Document<'input>,
    directive: Directive,
    path: &Path,
) -> Option<Node<'a, 'input>> {
    items(doc).find(|n| {
        !is_reference_item(n.tag_name().name())
            && n.attribute(directive.attribute()).is_some_and(|v| project.names_path(v, path))
    })
}

/// Delete the element carrying `directive` for `path`, if any.
fn delete(project: &mut ProjectManifest, directive: Directive, path: &Path) -> Result<bool> {
    let edit = {
        let doc = project.document()?;
        find(project, &doc, directive, path).map(|n| xml::remove_node(&project.source, n))
    };
    Ok(project.splice(edit.into_iter().collect()))
}

pub(super) fn add_file(
    project: &mut ProjectManifest,
    path: &Path,
    item_type: Option<&str>,
    metadata: Option<&Metadata>,
) -> Result<bool> {
    let include = paths::relative(&project.directory, path);
    let convention = project.settings.implicit_item_type(&include);
    let item_type = item_type.or(convention).unwrap_or("None");
    let directive = if convention.is_some() { Directive::Update } else { Directive::Include };
    let wants_metadata = metadata.is_some_and(|m| !m.is_empty());

    let mut changed = delete(project, Directive::Remove, path)?;

    let edit = {
        let doc = project.document()?;
        let layout = Layout::detect(&project.source, &doc);
        match find(project, &doc, directive, path) {
            None if convention.is_some() && !wants_metadata => None,
            None => {
                let pairs = metadata
                    .into_iter()
                    .flatten()
                    .map(|(k, v)| (k.as_str(), v.as_str()));
                Some(add_item_edit(&project.source, &doc, &layout, item_type, |indent| {
                    xml::render_element(
                        item_type,
                        &[(directive.attribute(), include.as_str())],
                        pairs,
                        indent,
                        &layout,
                    )
                }))
            }
            Some(node) => metadata.filter(|m| **m != metadata_of(node)).map(|m| {
                let indent = xml::indent_at(&project.source, node.range().start);
                let text = xml::render_element(
                    node.tag_name().name(),
                    &xml::attributes(node),
                    m.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    indent,
                    &layout,
                );
                xml::replace_node(node, text)
            }),
        }
    };
    changed |= project.splice(edit.into_iter().collect());
    if changed {
        tracing::debug!("{}: {item_type} {} {include}", project.name(), directive.attribute());
    }
    Ok(changed)
}

pub(super) fn remove_file(project: &mut ProjectManifest, path: &Path) -> Result<bool> {
    let include = paths::relative(&project.directory, path);
    let convention = project.settings.implicit_item_type(&include);

    let mut changed = delete(project, Directive::Update, path)?;
    changed |= delete(project, Directive::Include, path)?;

    let Some(tag) = convention else {
        return Ok(changed);
    };
    let edit = {
        let doc = project.document()?;
        if find(project, &doc, Directive::Remove, path).is_some() {
            None
        } else {
            let layout = Layout::detect(&project.source, &doc);
            Some(add_item_edit(&project.source, &doc, &layout, tag, |indent| {
                xml::render_element(tag, &[("Remove", include.as_str())], [], indent, &layout)
            }))
        }
    };
    changed |= project.splice(edit.into_iter().collect());
    if changed {
        tracing::debug!("{}: removed {include}", project.name());
    }
    Ok(changed)
}
