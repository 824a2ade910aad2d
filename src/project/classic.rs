//! Classic (pre-SDK) manifests: every reference and file is spelled out.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use roxmltree::Node;

use super::files::{self, FileEntry};
use super::{add_item_edit, is_reference_item, is_structural_item, items, metadata_of, Metadata, ProjectManifest};
use crate::error::Result;
use crate::logger::Logger;
use crate::package::PackageStore;
use crate::paths;
use crate::reference::{split_identity, Reference};
use crate::xml::{self, Edit, Layout};

pub(super) fn references(project: &ProjectManifest) -> Result<Vec<Reference>> {
    let default_version = project.default_reference_version()?;
    let name = project.name();
    let doc = project.document()?;
    Ok(items(&doc)
        .filter(|n| n.tag_name().name() == "Reference")
        .filter_map(|node| library(&name, node, &default_version))
        .collect())
}

fn library(project: &str, node: Node, default_version: &str) -> Option<Reference> {
    let identity = node.attribute("Include")?;
    let hint = node
        .attribute("HintPath")
        .map(str::to_string)
        .or_else(|| xml::child_text(node, "HintPath"))
        .filter(|h| !h.is_empty());
    let private = xml::child_text(node, "Private").is_some_and(|p| p.eq_ignore_ascii_case("true"));
    Some(Reference::library(project, identity, hint, private, default_version))
}

// ─── Files ───────────────────────────────────────────────────────────────────

pub(super) fn scan_files(project: &ProjectManifest) -> Result<Vec<FileEntry>> {
    let mut files = files::discover(&project.directory, &project.settings, false)?;
    let doc = project.document()?;
    for item in items(&doc) {
        let tag = item.tag_name().name();
        if is_reference_item(tag) || is_structural_item(tag) {
            continue;
        }
        let Some(include) = item.attribute("Include") else {
            continue;
        };
        files::declare(&mut files, &project.directory, include, tag, metadata_of(item));
    }
    Ok(files.into_values().collect())
}

fn default_item_type(project: &ProjectManifest, include: &str) -> &'static str {
    match project.settings.implicit_item_type(include) {
        Some("Compile") => "Compile",
        _ => "None",
    }
}

pub(super) fn add_file(
    project: &mut ProjectManifest,
    path: &Path,
    item_type: Option<&str>,
    metadata: Option<&Metadata>,
) -> Result<bool> {
    let include = paths::relative(&project.directory, path);
    let item_type = item_type.unwrap_or_else(|| default_item_type(project, &include));
    let edit = {
        let doc = project.document()?;
        let layout = Layout::detect(&project.source, &doc);
        let existing = items(&doc).find(|n| {
            n.tag_name().name() == item_type
                && n.attribute("Include").is_some_and(|i| project.names_path(i, path))
        });
        match existing {
            None => {
                let pairs = metadata
                    .into_iter()
                    .flatten()
                    .map(|(k, v)| (k.as_str(), v.as_str()));
                Some(add_item_edit(&project.source, &doc, &layout, item_type, |indent| {
                    xml::render_element(item_type, &[("Include", &include)], pairs, indent, &layout)
                }))
            }
            Some(node) => metadata.filter(|m| **m != metadata_of(node)).map(|m| {
                let indent = xml::indent_at(&project.source, node.range().start);
                let text = xml::render_element(
                    item_type,
                    &xml::attributes(node),
                    m.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    indent,
                    &layout,
                );
                xml::replace_node(node, text)
            }),
        }
    };
    let changed = project.splice(edit.into_iter().collect());
    if changed {
        tracing::debug!("{}: {item_type} {include}", project.name());
    }
    Ok(changed)
}

pub(super) fn remove_file(project: &mut ProjectManifest, path: &Path) -> Result<bool> {
    let edits: Vec<Edit> = {
        let doc = project.document()?;
        items(&doc)
            .filter(|n| !is_reference_item(n.tag_name().name()))
            .filter(|n| n.attribute("Include").is_some_and(|i| project.names_path(i, path)))
            .map(|n| xml::remove_node(&project.source, n))
            .collect()
    };
    Ok(project.splice(edits))
}

pub(super) fn add_binary_reference(project: &mut ProjectManifest, binary: &Path) -> Result<bool> {
    let Some(name) = binary.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return Ok(false);
    };
    let hint = paths::relative(&project.directory, binary);
    let edit = {
        let doc = project.document()?;
        let exists = items(&doc)
            .filter(|n| n.tag_name().name() == "Reference")
            .filter_map(|n| n.attribute("Include"))
            .any(|i| split_identity(i).0.eq_ignore_ascii_case(&name));
        if exists {
            None
        } else {
            let layout = Layout::detect(&project.source, &doc);
            Some(add_item_edit(&project.source, &doc, &layout, "Reference", |indent| {
                xml::render_element(
                    "Reference",
                    &[("Include", &name)],
                    [("HintPath", hint.as_str()), ("Private", "True")],
                    indent,
                    &layout,
                )
            }))
        }
    };
    let changed = project.splice(edit.into_iter().collect());
    if changed {
        tracing::debug!("{}: binary reference {hint}", project.name());
    }
    Ok(changed)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Cleanup
// ═══════════════════════════════════════════════════════════════════════════════

/// Case-insensitive, then ordinal.
fn by_include(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Flag a package reference whose hint path points outside every extracted
/// version of its package while the assembly and package versions disagree.
fn check_hint_path(
    project: &ProjectManifest,
    store: Option<&PackageStore>,
    reference: &Reference,
    logger: &dyn Logger,
) -> Result<()> {
    let (Some(package), Some(package_version), Some(version), Some(hint)) = (
        &reference.package_name,
        &reference.package_version,
        &reference.version,
        &reference.hint_path,
    ) else {
        return Ok(());
    };
    if package_version.compare_release(version) == Ordering::Equal {
        return Ok(());
    }
    let Some(store) = store else {
        return Ok(());
    };
    let hint = paths::resolve(&project.directory, hint);
    let folders = store.package_folders(package)?;
    if !folders.iter().any(|f| hint.starts_with(&f.path)) {
        logger.message(&format!(
            "{}: suspicious hint path for {} {version}: {}",
            project.name(),
            reference.name,
            hint.display()
        ));
    }
    Ok(())
}

/// Deduplicate references and regroup every unconditioned item into four
/// sorted groups: framework references, project references, hinted
/// references, everything else. Elements move with their original text.
pub(super) fn clean_up(project: &mut ProjectManifest, logger: &dyn Logger) -> Result<bool> {
    let default_version = project.default_reference_version()?;
    let store = PackageStore::locate(&project.directory, &project.settings);
    let name = project.name();

    let edits = {
        let doc = project.document()?;
        let source = project.source.as_str();
        let root = doc.root_element();
        let layout = Layout::detect(source, &doc);
        let groups: Vec<Node> = xml::named(root, "ItemGroup")
            .filter(|g| !g.has_attribute("Condition"))
            .collect();

        let mut moved: HashSet<usize> = HashSet::new();
        let mut references: Vec<(Reference, Node)> = Vec::new();
        let mut projects: Vec<(&str, Node)> = Vec::new();
        let mut others: Vec<(&str, Node)> = Vec::new();

        for group in &groups {
            for node in xml::elements(*group) {
                match node.tag_name().name() {
                    "Reference" => {
                        let Some(reference) = library(&name, node, &default_version) else {
                            continue;
                        };
                        moved.insert(node.range().start);
                        check_hint_path(project, store.as_ref(), &reference, logger)?;
                        keep_best(&name, &mut references, reference, node, logger);
                    }
                    "ProjectReference" => {
                        moved.insert(node.range().start);
                        if let Some(include) = node.attribute("Include") {
                            projects.push((include, node));
                        }
                    }
                    _ => {
                        if let Some(include) = node.attribute("Include") {
                            moved.insert(node.range().start);
                            others.push((include, node));
                        }
                    }
                }
            }
        }

        projects.sort_by(|a, b| by_include(a.0, b.0));
        projects.dedup_by(|a, b| {
            let same = a.0.eq_ignore_ascii_case(b.0);
            if same {
                logger.message(&format!("{name}: dropping duplicate project reference {}", a.0));
            }
            same
        });
        others.sort_by(|a, b| by_include(a.0, b.0).then_with(|| a.1.tag_name().name().cmp(b.1.tag_name().name())));

        let (mut hinted, mut framework): (Vec<_>, Vec<_>) =
            references.into_iter().partition(|(r, _)| r.hint_path.is_some());
        framework.sort_by(|a, b| a.0.cmp(&b.0));
        hinted.sort_by(|a, b| a.0.cmp(&b.0));

        let text = |node: &Node| source[node.range()].to_string();
        let buckets: [Vec<String>; 4] = [
            framework.iter().map(|(_, n)| text(n)).collect(),
            projects.iter().map(|(_, n)| text(n)).collect(),
            hinted.iter().map(|(_, n)| text(n)).collect(),
            others.iter().map(|(_, n)| text(n)).collect(),
        ];

        let mut edits = Vec::new();
        let mut emptied: HashSet<usize> = HashSet::new();
        for group in &groups {
            let children: Vec<Node> = xml::elements(*group).collect();
            if children.iter().all(|c| moved.contains(&c.range().start)) {
                emptied.insert(group.range().start);
                edits.push(xml::remove_node(source, *group));
            } else {
                edits.extend(
                    children
                        .into_iter()
                        .filter(|c| moved.contains(&c.range().start))
                        .map(|c| xml::remove_node(source, c)),
                );
            }
        }

        let indent = layout.child_indent(source, root);
        let inserted: String = buckets
            .iter()
            .filter(|bucket| !bucket.is_empty())
            .map(|bucket| format!("{}{indent}{}", layout.newline, xml::render_group(bucket, &indent, &layout)))
            .collect();
        if !inserted.is_empty() {
            // After the last property group, else after the last element
            // that stays.
            let anchor = xml::named(root, "PropertyGroup")
                .last()
                .or_else(|| xml::elements(root).filter(|n| !emptied.contains(&n.range().start)).last());
            let at = match anchor {
                Some(node) => node.range().end,
                None => {
                    let raw = &source[root.range()];
                    root.range().start + raw.find('>').map_or(raw.len(), |i| i + 1)
                }
            };
            edits.push(Edit::insert(at, inserted));
        }
        edits
    };

    let before = project.source.clone();
    project.splice(edits);
    let changed = project.source != before;
    if changed {
        logger.information(&format!("{name}: items regrouped"));
    }
    Ok(changed)
}

/// Keep the higher of two references to the same assembly.
fn keep_best<'a, 'input>(
    project: &str,
    kept: &mut Vec<(Reference, Node<'a, 'input>)>,
    reference: Reference,
    node: Node<'a, 'input>,
    logger: &dyn Logger,
) {
    let Some(index) = kept
        .iter()
        .position(|(r, _)| r.name.eq_ignore_ascii_case(&reference.name))
    else {
        kept.push((reference, node));
        return;
    };
    let existing = &kept[index].0;
    match reference.cmp(existing) {
        Ordering::Equal => logger.message(&format!(
            "{project}: identical reference {} listed twice, keeping the first",
            reference.identity
        )),
        Ordering::Greater => {
            logger.message(&format!(
                "{project}: replacing {} with {}",
                existing.identity, reference.identity
            ));
            kept[index] = (reference, node);
        }
        Ordering::Less => logger.message(&format!(
            "{project}: keeping {}, dropping {}",
            existing.identity, reference.identity
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Settings;
    use crate::logger::MemoryLogger;
    use crate::project::{Metadata, ProjectManifest};
    use crate::test_support::{write, write_package, CLASSIC_PACKAGES, CLASSIC_PROJECT};
    use std::path::Path;
    use tempfile::TempDir;

    fn open(dir: &TempDir, manifest: &str) -> ProjectManifest {
        write(dir.path(), "src/App/packages.config", CLASSIC_PACKAGES);
        let path = write(dir.path(), "src/App/App.csproj", manifest);
        ProjectManifest::open(path).unwrap()
    }

    const DUPLICATES: &str = r#"<Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <TargetFrameworkVersion>v4.6.1</TargetFrameworkVersion>
  </PropertyGroup>
  <ItemGroup>
    <Compile Include="b.cs" />
    <Reference Include="Foo, Version=1.0.0.0">
      <HintPath>..\..\packages\Foo.1.0.0\lib\net45\Foo.dll</HintPath>
    </Reference>
    <Reference Include="System" />
    <Reference Include="Foo, Version=2.0.0.0">
      <HintPath>..\..\packages\Foo.2.0.0\lib\net45\Foo.dll</HintPath>
    </Reference>
    <Compile Include="A.cs" />
  </ItemGroup>
  <ItemGroup Condition=" '$(Configuration)' == 'Debug' ">
    <Reference Include="Debug.Only" />
  </ItemGroup>
  <Import Project="$(MSBuildToolsPath)\Microsoft.CSharp.targets" />
</Project>
"#;

    // ── Scan ─────────────────────────────────────────────────────────────

    #[test]
    fn scan_reports_orphans_and_dangling_items() {
        let dir = TempDir::new().unwrap();
        let project = open(&dir, CLASSIC_PROJECT);
        write(dir.path(), "src/App/Class1.cs", "");
        write(dir.path(), "src/App/Extra.cs", "");
        write(dir.path(), "src/App/obj/Debug/Temp.cs", "");

        let files = project.scan_files().unwrap();
        let find = |name: &str| files.iter().find(|f| f.name == name).unwrap();
        assert!(find("Class1.cs").is_declared());
        assert!(find("Extra.cs").is_orphaned());
        assert_eq!(find("Extra.cs").item_type, "Unknown");
        assert!(find(r"Properties\AssemblyInfo.cs").is_dangling());
        assert!(find("packages.config").is_declared());
        assert!(files.iter().all(|f| !f.name.starts_with("obj")));
        assert!(files.iter().all(|f| !f.name.ends_with("Lib.csproj")));
    }

    #[test]
    fn add_then_remove_file() {
        let dir = TempDir::new().unwrap();
        let mut project = open(&dir, CLASSIC_PROJECT);
        write(dir.path(), "src/App/Extra.cs", "");

        assert!(project.add_file(Path::new("Extra.cs"), None, None).unwrap());
        assert!(!project.add_file(Path::new("Extra.cs"), None, None).unwrap());
        assert!(project.source().contains(
            "    <Compile Include=\"Properties\\AssemblyInfo.cs\" />\n    <Compile Include=\"Extra.cs\" />\n"
        ));
        let extra = project.scan_files().unwrap().into_iter().find(|f| f.name == "Extra.cs").unwrap();
        assert!(extra.is_declared() && extra.on_disk);

        assert!(project.remove_file(&dir.path().join("src").join("App").join("Extra.cs")).unwrap());
        assert!(!project.source().contains("Extra.cs"));
    }

    #[test]
    fn add_file_updates_metadata_of_existing_item() {
        let dir = TempDir::new().unwrap();
        let mut project = open(&dir, CLASSIC_PROJECT);
        let metadata = Metadata::from([("CopyToOutputDirectory".to_string(), "Always".to_string())]);
        assert!(project.add_file(Path::new("packages.config"), Some("None"), Some(&metadata)).unwrap());
        assert!(project.source().contains(
            "    <None Include=\"packages.config\">\n      <CopyToOutputDirectory>Always</CopyToOutputDirectory>\n    </None>"
        ));
        assert!(!project.add_file(Path::new("packages.config"), Some("None"), Some(&metadata)).unwrap());
    }

    #[test]
    fn non_source_files_default_to_none() {
        let dir = TempDir::new().unwrap();
        let mut project = open(&dir, CLASSIC_PROJECT);
        project.add_file(&Path::new("Content").join("logo.png"), None, None).unwrap();
        assert!(project.source().contains("<None Include=\"Content\\logo.png\" />"));
    }

    #[test]
    fn binary_reference_uses_relative_hint() {
        let dir = TempDir::new().unwrap();
        let mut project = open(&dir, CLASSIC_PROJECT);
        let binary = dir.path().join("lib").join("Tools.dll");
        assert!(project.add_binary_reference(&binary).unwrap());
        assert!(!project.add_binary_reference(&binary).unwrap());
        assert!(project.source().contains(
            "    <Reference Include=\"Tools\">\n      <HintPath>..\\..\\lib\\Tools.dll</HintPath>\n      <Private>True</Private>\n    </Reference>"
        ));
    }

    // ── Cleanup ──────────────────────────────────────────────────────────

    #[test]
    fn cleanup_keeps_highest_duplicate_and_regroups() {
        let dir = TempDir::new().unwrap();
        let mut project = open(&dir, DUPLICATES);
        let logger = MemoryLogger::new();
        assert!(project.clean_up(&logger).unwrap());

        let foo: Vec<_> = project
            .references()
            .unwrap()
            .into_iter()
            .filter(|r| r.name == "Foo")
            .collect();
        assert_eq!(foo.len(), 1);
        assert_eq!(foo[0].version.as_ref().unwrap().to_string(), "2.0.0.0");
        assert!(logger.contains("replacing Foo, Version=1.0.0.0 with Foo, Version=2.0.0.0"));

        assert_eq!(
            project.source(),
            r#"<Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <TargetFrameworkVersion>v4.6.1</TargetFrameworkVersion>
  </PropertyGroup>
  <ItemGroup>
    <Reference Include="System" />
  </ItemGroup>
  <ItemGroup>
    <Reference Include="Foo, Version=2.0.0.0">
      <HintPath>..\..\packages\Foo.2.0.0\lib\net45\Foo.dll</HintPath>
    </Reference>
  </ItemGroup>
  <ItemGroup>
    <Compile Include="A.cs" />
    <Compile Include="b.cs" />
  </ItemGroup>
  <ItemGroup Condition=" '$(Configuration)' == 'Debug' ">
    <Reference Include="Debug.Only" />
  </ItemGroup>
  <Import Project="$(MSBuildToolsPath)\Microsoft.CSharp.targets" />
</Project>
"#
        );
    }

    #[test]
    fn cleanup_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut project = open(&dir, CLASSIC_PROJECT);
        let logger = MemoryLogger::new();
        project.clean_up(&logger).unwrap();
        let once = project.source().to_string();
        assert!(!project.clean_up(&logger).unwrap());
        assert_eq!(project.source(), once);

        let mut again = open(&dir, DUPLICATES);
        again.clean_up(&logger).unwrap();
        let once = again.source().to_string();
        again.clean_up(&logger).unwrap();
        assert_eq!(again.source(), once);
    }

    #[test]
    fn cleanup_orders_groups() {
        let dir = TempDir::new().unwrap();
        let mut project = open(&dir, CLASSIC_PROJECT);
        project.clean_up(&MemoryLogger::new()).unwrap();
        let source = project.source();
        let system = source.find("<Reference Include=\"System\" />").unwrap();
        let lib = source.find("<ProjectReference").unwrap();
        let json = source.find("<Reference Include=\"Newtonsoft.Json").unwrap();
        let class = source.find("<Compile Include=\"Class1.cs\"").unwrap();
        let import = source.find("<Import").unwrap();
        assert!(system < lib && lib < json && json < class && class < import);
        assert!(source.contains("<Compile Include=\"Class1.cs\" />\n    <None Include=\"packages.config\" />\n    <Compile Include=\"Properties\\AssemblyInfo.cs\" />"));
    }

    #[test]
    fn cleanup_without_property_group_appends_to_root() {
        let dir = TempDir::new().unwrap();
        let manifest = "<Project>\n  <ItemGroup>\n    <Compile Include=\"b.cs\" />\n    <Compile Include=\"A.cs\" />\n  </ItemGroup>\n  <Import Project=\"x.targets\" />\n</Project>\n";
        let mut project = open(&dir, manifest);
        assert!(project.clean_up(&MemoryLogger::new()).unwrap());
        let source = project.source();
        assert!(source.find("<Import").unwrap() < source.find("A.cs").unwrap());
        assert!(source.ends_with(
            "    <Compile Include=\"A.cs\" />\n    <Compile Include=\"b.cs\" />\n  </ItemGroup>\n</Project>\n"
        ));
    }

    #[test]
    fn cleanup_leaves_reference_without_include_in_place() {
        let dir = TempDir::new().unwrap();
        let reference = "<Reference>\n      <HintPath>lib\\Odd.dll</HintPath>\n    </Reference>";
        let manifest = format!(
            "<Project>\n  <PropertyGroup />\n  <ItemGroup>\n    {reference}\n    <Compile Include=\"b.cs\" />\n    <Compile Include=\"A.cs\" />\n  </ItemGroup>\n</Project>\n"
        );
        let mut project = open(&dir, &manifest);
        assert!(project.clean_up(&MemoryLogger::new()).unwrap());
        let source = project.source();
        assert!(source.contains(reference));
        assert!(source.find("A.cs").unwrap() < source.find("b.cs").unwrap());
        assert!(!project.clean_up(&MemoryLogger::new()).unwrap());
    }

    #[test]
    fn cleanup_flags_hint_outside_any_package_folder() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("packages");
        write_package(&store, "Foo", "1.0.0", &[], &["net45"]);
        let manifest = DUPLICATES.replace(r"packages\Foo.2.0.0", r"packages\Foo.9.9.9");
        let mut project = open(&dir, &manifest);
        let logger = MemoryLogger::new();
        project.clean_up(&logger).unwrap();
        assert!(logger.contains("suspicious hint path for Foo"));
    }

    #[test]
    fn sdk_projects_have_nothing_to_clean() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "Web/Web.csproj", crate::test_support::SDK_PROJECT);
        let mut project = ProjectManifest::open_with(path, Settings::default()).unwrap();
        assert!(!project.clean_up(&MemoryLogger::new()).unwrap());
        assert!(!project.is_dirty());
    }
}
