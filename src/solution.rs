//! Visual Studio solution files.
//!
//! The format is line-oriented text with no grammar worth parsing in full.
//! Reads pattern-match the three regions this crate cares about (project
//! entries, `NestedProjects`, `ProjectConfigurationPlatforms`); writes splice
//! exact spans of those regions and leave every other byte alone.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::{ManifestError, Result};
use crate::paths;
use crate::splice::{self, Edit};

// ═══════════════════════════════════════════════════════════════════════════════
//  Project types
// ═══════════════════════════════════════════════════════════════════════════════

pub const FOLDER_TYPE: Uuid = Uuid::from_u128(0x2150E333_8FDC_42A3_9474_1A3956D46DE8);
pub const CLASSIC_CSHARP_TYPE: Uuid = Uuid::from_u128(0xFAE04EC0_301F_11D3_BF4B_00C04F79EFBC);
pub const SDK_CSHARP_TYPE: Uuid = Uuid::from_u128(0x9A19103F_16F7_4668_BE54_9A1E7A4F7556);
pub const SERVICE_FABRIC_TYPE: Uuid = Uuid::from_u128(0xA07B5EB6_E848_4116_A8D0_A826331D98C6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectKind {
    Folder,
    ClassicCSharp,
    SdkCSharp,
    ServiceFabric,
    Other(Uuid),
}

impl ProjectKind {
    pub fn from_type_id(id: Uuid) -> Self {
        match id {
            FOLDER_TYPE => Self::Folder,
            CLASSIC_CSHARP_TYPE => Self::ClassicCSharp,
            SDK_CSHARP_TYPE => Self::SdkCSharp,
            SERVICE_FABRIC_TYPE => Self::ServiceFabric,
            other => Self::Other(other),
        }
    }

    pub fn type_id(self) -> Uuid {
        match self {
            Self::Folder => FOLDER_TYPE,
            Self::ClassicCSharp => CLASSIC_CSHARP_TYPE,
            Self::SdkCSharp => SDK_CSHARP_TYPE,
            Self::ServiceFabric => SERVICE_FABRIC_TYPE,
            Self::Other(id) => id,
        }
    }

    /// C# projects, the only kinds whose manifests this crate edits.
    pub fn is_buildable(self) -> bool {
        matches!(self, Self::ClassicCSharp | Self::SdkCSharp)
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Folder => f.write_str("folder"),
            Self::ClassicCSharp => f.write_str("C#"),
            Self::SdkCSharp => f.write_str("C# (SDK)"),
            Self::ServiceFabric => f.write_str("Service Fabric"),
            Self::Other(id) => write!(f, "{}", braced(*id)),
        }
    }
}

/// `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`, the spelling solution files use.
pub fn braced(id: Uuid) -> String {
    format!("{{{}}}", id.to_string().to_uppercase())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Items
// ═══════════════════════════════════════════════════════════════════════════════

/// One `{id}.<key> = <value>` row of `ProjectConfigurationPlatforms`, e.g.
/// key `Debug|Any CPU.Build.0`, value `Debug|Any CPU`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRow {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionItem {
    pub kind: ProjectKind,
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    /// Path relative to the solution folder, as written.
    pub path: String,
    pub configurations: Vec<ConfigurationRow>,
    pub children: Vec<SolutionItem>,
}

impl SolutionItem {
    pub fn is_folder(&self) -> bool {
        self.kind == ProjectKind::Folder
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Patterns
// ═══════════════════════════════════════════════════════════════════════════════

const GUID: &str = r"[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}";

static PROJECT_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?msR)^Project\("\{{(?P<type>{GUID})\}}"\)[ \t]*=[ \t]*"(?P<name>[^"]*)"[ \t]*,[ \t]*"(?P<path>[^"]*)"[ \t]*,[ \t]*"\{{(?P<id>{GUID})\}}"[^\n]*\n.*?^EndProject[ \t]*(?:\r?\n|\z)"#
    ))
    .expect("project entry pattern is valid")
});

static GLOBAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mR)^Global[ \t]*$").expect("global pattern is valid"));

static END_GLOBAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mR)^EndGlobal[ \t]*$").expect("end global pattern is valid"));

static NESTED_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?mR)^[ \t]*\{{(?P<child>{GUID})\}}[ \t]*=[ \t]*\{{(?P<parent>{GUID})\}}[ \t]*$"
    ))
    .expect("nested row pattern is valid")
});

static CONFIGURATION_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?mR)^[ \t]*\{{(?P<id>{GUID})\}}\.(?P<key>[^=\n]*?)[ \t]*=[ \t]*(?P<value>[^\n]*?)[ \t]*$"
    ))
    .expect("configuration row pattern is valid")
});

fn section_pattern(name: &str) -> Regex {
    // Section names are fixed identifiers without regex metacharacters.
    Regex::new(&format!(
        r"(?msR)^[ \t]*GlobalSection\({name}\)[^\n]*\n(?P<body>.*?)^[ \t]*EndGlobalSection[ \t]*$"
    ))
    .expect("section pattern is valid")
}

static NESTED_SECTION: LazyLock<Regex> = LazyLock::new(|| section_pattern("NestedProjects"));
static CONFIGURATION_SECTION: LazyLock<Regex> =
    LazyLock::new(|| section_pattern("ProjectConfigurationPlatforms"));

fn parse_id(path: &Path, text: &str) -> Result<Uuid> {
    Uuid::parse_str(text).map_err(|e| ManifestError::Solution {
        path: path.to_path_buf(),
        message: format!("invalid id {text}: {e}"),
    })
}

/// Body span of a `GlobalSection`, if present.
fn section_body(pattern: &Regex, text: &str) -> Option<Range<usize>> {
    pattern
        .captures(text)
        .and_then(|caps| caps.name("body"))
        .map(|body| body.range())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Solution
// ═══════════════════════════════════════════════════════════════════════════════

/// An open `.sln` file. Edits splice the text as read, so untouched lines
/// keep their line endings.
#[derive(Debug, Clone)]
pub struct Solution {
    path: PathBuf,
    directory: PathBuf,
    text: String,
    /// Line break for inserted rows, taken from the first line.
    newline: &'static str,
    dirty: bool,
}

impl Solution {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).map_err(|e| ManifestError::io(path, e))?;
        let path = paths::normalize(&absolute);
        let text = std::fs::read_to_string(&path).map_err(|e| ManifestError::io(&path, e))?;
        Self::parse(path, text)
    }

    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let text = text.into();
        let newline = match text.find('\n') {
            Some(i) if text[..i].ends_with('\r') => "\r\n",
            _ => "\n",
        };
        if !GLOBAL.is_match(&text) || !END_GLOBAL.is_match(&text) {
            return Err(ManifestError::Solution { path, message: "missing Global section".into() });
        }
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { path, directory, text, newline, dirty: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Absolute location of an item's path.
    pub fn item_path(&self, item: &SolutionItem) -> PathBuf {
        paths::resolve(&self.directory, &item.path)
    }

    // ─── Reading ─────────────────────────────────────────────────────────

    fn entries(&self) -> Result<Vec<(Range<usize>, SolutionItem)>> {
        PROJECT_ENTRY
            .captures_iter(&self.text)
            .map(|caps| -> Result<(Range<usize>, SolutionItem)> {
                let span = caps.get(0).map(|m| m.range()).unwrap_or_default();
                let item = SolutionItem {
                    kind: ProjectKind::from_type_id(parse_id(&self.path, &caps["type"])?),
                    id: parse_id(&self.path, &caps["id"])?,
                    parent_id: None,
                    name: caps["name"].to_string(),
                    path: caps["path"].to_string(),
                    configurations: Vec::new(),
                    children: Vec::new(),
                };
                Ok((span, item))
            })
            .collect()
    }

    /// `(child, parent, line span)` for every `NestedProjects` row.
    fn nesting(&self) -> Result<Vec<(Uuid, Uuid, Range<usize>)>> {
        let Some(body) = section_body(&NESTED_SECTION, &self.text) else {
            return Ok(Vec::new());
        };
        NESTED_ROW
            .captures_iter(&self.text[body.clone()])
            .map(|caps| -> Result<(Uuid, Uuid, Range<usize>)> {
                let span = caps.get(0).map(|m| m.range()).unwrap_or_default();
                let span = splice::whole_lines(&self.text, body.start + span.start..body.start + span.end);
                Ok((parse_id(&self.path, &caps["child"])?, parse_id(&self.path, &caps["parent"])?, span))
            })
            .collect()
    }

    /// `(id, row, line span)` for every `ProjectConfigurationPlatforms` row.
    fn configuration_rows(&self) -> Result<Vec<(Uuid, ConfigurationRow, Range<usize>)>> {
        let Some(body) = section_body(&CONFIGURATION_SECTION, &self.text) else {
            return Ok(Vec::new());
        };
        CONFIGURATION_ROW
            .captures_iter(&self.text[body.clone()])
            .map(|caps| -> Result<(Uuid, ConfigurationRow, Range<usize>)> {
                let span = caps.get(0).map(|m| m.range()).unwrap_or_default();
                let span = splice::whole_lines(&self.text, body.start + span.start..body.start + span.end);
                let row = ConfigurationRow { key: caps["key"].to_string(), value: caps["value"].to_string() };
                Ok((parse_id(&self.path, &caps["id"])?, row, span))
            })
            .collect()
    }

    /// Every entry, folders included, in file order, with its parent and
    /// configuration rows.
    pub fn projects(&self) -> Result<Vec<SolutionItem>> {
        let parents: HashMap<Uuid, Uuid> = self
            .nesting()?
            .into_iter()
            .map(|(child, parent, _)| (child, parent))
            .collect();
        let mut rows: HashMap<Uuid, Vec<ConfigurationRow>> = HashMap::new();
        for (id, row, _) in self.configuration_rows()? {
            rows.entry(id).or_default().push(row);
        }
        Ok(self
            .entries()?
            .into_iter()
            .map(|(_, mut item)| {
                item.parent_id = parents.get(&item.id).copied();
                item.configurations = rows.remove(&item.id).unwrap_or_default();
                item
            })
            .collect())
    }

    /// Like [`Solution::projects`], each item also listing its direct
    /// children.
    pub fn projects_with_parents(&self) -> Result<Vec<SolutionItem>> {
        let items = self.projects()?;
        Ok(items
            .iter()
            .map(|item| {
                let mut item = item.clone();
                item.children = items
                    .iter()
                    .filter(|child| child.parent_id == Some(item.id))
                    .cloned()
                    .collect();
                item
            })
            .collect())
    }

    /// Top-level items with their descendants nested under `children`.
    pub fn hierarchy(&self) -> Result<Vec<SolutionItem>> {
        let items = self.projects()?;
        let known: HashSet<Uuid> = items.iter().map(|i| i.id).collect();

        fn build(item: &SolutionItem, items: &[SolutionItem], seen: &mut HashSet<Uuid>) -> SolutionItem {
            let mut node = item.clone();
            seen.insert(item.id);
            let children: Vec<&SolutionItem> = items
                .iter()
                .filter(|child| child.parent_id == Some(item.id) && !seen.contains(&child.id))
                .collect();
            node.children = children.into_iter().map(|child| build(child, items, seen)).collect();
            node
        }

        let mut seen = HashSet::new();
        Ok(items
            .iter()
            .filter(|item| item.parent_id.is_none_or(|p| !known.contains(&p)))
            .map(|item| build(item, &items, &mut seen))
            .collect())
    }

    pub fn compilable_projects(&self) -> Result<Vec<SolutionItem>> {
        Ok(self
            .projects()?
            .into_iter()
            .filter(|item| item.kind.is_buildable())
            .collect())
    }

    pub fn find(&self, kind: ProjectKind, name: &str) -> Result<Option<SolutionItem>> {
        Ok(self
            .projects()?
            .into_iter()
            .find(|item| item.kind == kind && item.name.eq_ignore_ascii_case(name)))
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<SolutionItem>> {
        Ok(self.projects()?.into_iter().find(|item| item.id == id))
    }

    // ─── Writing ─────────────────────────────────────────────────────────

    /// `text` with its `\n` breaks in the file's own spelling.
    fn lines(&self, text: String) -> String {
        if self.newline == "\n" { text } else { text.replace('\n', self.newline) }
    }

    fn splice(&mut self, edits: Vec<Edit>) -> bool {
        if edits.is_empty() {
            return false;
        }
        splice::apply(&mut self.text, edits);
        self.dirty = true;
        true
    }

    /// Add a solution folder, or return the id of the existing one.
    pub fn add_folder(&mut self, name: &str, parent: Option<Uuid>) -> Result<Uuid> {
        self.add_entry(ProjectKind::Folder, name, name, parent)
    }

    /// Add a project entry for the manifest at `path`, or return the id of
    /// an existing entry with the same kind and name.
    pub fn add_project(&mut self, kind: ProjectKind, name: &str, path: &Path, parent: Option<Uuid>) -> Result<Uuid> {
        let absolute = if path.is_absolute() {
            paths::normalize(path)
        } else {
            paths::normalize(&self.directory.join(path))
        };
        let relative = paths::relative(&self.directory, &absolute);
        self.add_entry(kind, name, &relative, parent)
    }

    fn add_entry(&mut self, kind: ProjectKind, name: &str, path: &str, parent: Option<Uuid>) -> Result<Uuid> {
        let id = match self.find(kind, name)? {
            Some(existing) => existing.id,
            None => {
                let id = Uuid::new_v4();
                let at = GLOBAL
                    .find(&self.text)
                    .map(|m| m.start())
                    .ok_or_else(|| self.shape_error("missing Global section"))?;
                let entry = format!(
                    "Project(\"{}\") = \"{name}\", \"{path}\", \"{}\"\nEndProject\n",
                    braced(kind.type_id()),
                    braced(id)
                );
                let entry = self.lines(entry);
                self.splice(vec![Edit::insert(at, entry)]);
                tracing::debug!("{}: added {kind} {name}", self.path.display());
                id
            }
        };
        if let Some(parent) = parent {
            self.nest(id, parent)?;
        }
        Ok(id)
    }

    /// Record `child` as nested under `parent` unless it already is.
    pub fn nest(&mut self, child: Uuid, parent: Uuid) -> Result<bool> {
        if self.nesting()?.iter().any(|(c, p, _)| *c == child && *p == parent) {
            return Ok(false);
        }
        let row = format!("\t\t{} = {}\n", braced(child), braced(parent));
        let edit = match section_body(&NESTED_SECTION, &self.text) {
            Some(body) => Edit::insert(body.end, self.lines(row)),
            None => {
                let at = END_GLOBAL
                    .find(&self.text)
                    .map(|m| m.start())
                    .ok_or_else(|| self.shape_error("missing EndGlobal"))?;
                Edit::insert(at, self.lines(format!("\tGlobalSection(NestedProjects) = preSolution\n{row}\tEndGlobalSection\n")))
            }
        };
        Ok(self.splice(vec![edit]))
    }

    /// Give a new buildable project the configuration rows of the first
    /// configured project. Does nothing when `item` already has rows.
    pub fn add_project_configuration(&mut self, item: &SolutionItem) -> Result<bool> {
        if !item.kind.is_buildable() {
            return Ok(false);
        }
        let rows = self.configuration_rows()?;
        if rows.iter().any(|(id, _, _)| *id == item.id) {
            return Ok(false);
        }
        let Some((template, _, _)) = rows.first() else {
            return Ok(false);
        };
        let cloned: String = rows
            .iter()
            .filter(|(id, _, _)| id == template)
            .map(|(_, row, _)| format!("\t\t{}.{} = {}\n", braced(item.id), row.key, row.value))
            .collect();
        let Some(body) = section_body(&CONFIGURATION_SECTION, &self.text) else {
            return Ok(false);
        };
        let cloned = self.lines(cloned);
        Ok(self.splice(vec![Edit::insert(body.end, cloned)]))
    }

    /// Drop the entry for `id`, its configuration rows and every nesting row
    /// naming it.
    pub fn remove_project(&mut self, id: Uuid) -> Result<bool> {
        let mut edits: Vec<Edit> = self
            .entries()?
            .into_iter()
            .filter(|(_, item)| item.id == id)
            .map(|(span, _)| Edit::delete(span))
            .collect();
        edits.extend(
            self.configuration_rows()?
                .into_iter()
                .filter(|(row_id, _, _)| *row_id == id)
                .map(|(_, _, span)| Edit::delete(span)),
        );
        edits.extend(
            self.nesting()?
                .into_iter()
                .filter(|(child, parent, _)| *child == id || *parent == id)
                .map(|(_, _, span)| Edit::delete(span)),
        );
        let changed = self.splice(edits);
        if changed {
            tracing::debug!("{}: removed {}", self.path.display(), braced(id));
        }
        Ok(changed)
    }

    /// Write the file back if anything changed.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        std::fs::write(&self.path, &self.text).map_err(|e| ManifestError::io(&self.path, e))?;
        self.dirty = false;
        tracing::info!("saved {}", self.path.display());
        Ok(true)
    }

    fn shape_error(&self, message: &str) -> ManifestError {
        ManifestError::Solution { path: self.path.clone(), message: message.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write, SOLUTION};
    use tempfile::TempDir;

    const APP: Uuid = Uuid::from_u128(0x11111111_1111_1111_1111_111111111111);
    const WEB: Uuid = Uuid::from_u128(0x22222222_2222_2222_2222_222222222222);
    const SRC: Uuid = Uuid::from_u128(0x33333333_3333_3333_3333_333333333333);

    fn solution() -> Solution {
        Solution::parse("/repo/All.sln", SOLUTION).unwrap()
    }

    // ── Reading ──────────────────────────────────────────────────────────

    #[test]
    fn lists_entries_with_parents_and_rows() {
        let projects = solution().projects().unwrap();
        assert_eq!(projects.len(), 3);
        let app = &projects[0];
        assert_eq!(app.name, "App");
        assert_eq!(app.kind, ProjectKind::ClassicCSharp);
        assert_eq!(app.path, r"src\App\App.csproj");
        assert_eq!(app.parent_id, Some(SRC));
        assert_eq!(app.configurations.len(), 4);
        assert_eq!(
            app.configurations[1],
            ConfigurationRow { key: "Debug|Any CPU.Build.0".into(), value: "Debug|Any CPU".into() }
        );
        assert!(projects[2].is_folder());
        assert!(projects[2].configurations.is_empty());
    }

    #[test]
    fn hierarchy_nests_children() {
        let solution = solution();
        let top = solution.hierarchy().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, SRC);
        let names: Vec<_> = top[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["App", "Web"]);

        let flat = solution.projects_with_parents().unwrap();
        assert_eq!(flat.iter().find(|i| i.id == SRC).unwrap().children.len(), 2);
    }

    #[test]
    fn compilable_and_find() {
        let solution = solution();
        assert_eq!(solution.compilable_projects().unwrap().len(), 2);
        assert_eq!(solution.find(ProjectKind::SdkCSharp, "web").unwrap().unwrap().id, WEB);
        assert!(solution.find(ProjectKind::ClassicCSharp, "Web").unwrap().is_none());
        assert_eq!(
            solution.item_path(&solution.find_by_id(APP).unwrap().unwrap()),
            Path::new("/repo/src/App/App.csproj")
        );
    }

    #[test]
    fn missing_global_is_structural() {
        let err = Solution::parse("/repo/x.sln", "Microsoft Visual Studio Solution File\n").unwrap_err();
        assert!(err.is_structural());
    }

    // ── Writing ──────────────────────────────────────────────────────────

    #[test]
    fn add_folder_reuses_existing() {
        let mut solution = solution();
        assert_eq!(solution.add_folder("src", None).unwrap(), SRC);
        assert!(!solution.is_dirty());

        let tools = solution.add_folder("tools", Some(SRC)).unwrap();
        assert_eq!(solution.add_folder("tools", Some(SRC)).unwrap(), tools);
        let text = solution.text();
        let entry = format!("Project(\"{{2150E333-8FDC-42A3-9474-1A3956D46DE8}}\") = \"tools\", \"tools\", \"{}\"\nEndProject\nGlobal\n", braced(tools));
        assert!(text.contains(&entry));
        assert_eq!(text.matches(&format!("{} = {}", braced(tools), braced(SRC))).count(), 1);
        assert_eq!(solution.find_by_id(tools).unwrap().unwrap().parent_id, Some(SRC));
    }

    #[test]
    fn add_project_writes_relative_path_and_configuration() {
        let mut solution = solution();
        let id = solution
            .add_project(ProjectKind::SdkCSharp, "Foo", Path::new("/repo/lib/Foo/Foo.csproj"), Some(SRC))
            .unwrap();
        let item = solution.find_by_id(id).unwrap().unwrap();
        assert_eq!(item.path, r"lib\Foo\Foo.csproj");

        assert!(solution.add_project_configuration(&item).unwrap());
        assert!(!solution.add_project_configuration(&item).unwrap());
        let item = solution.find_by_id(id).unwrap().unwrap();
        assert_eq!(item.configurations.len(), 4);
        assert!(solution
            .text()
            .contains(&format!("\t\t{}.Release|Any CPU.Build.0 = Release|Any CPU\n\tEndGlobalSection", braced(id))));

        let folder = solution.find_by_id(SRC).unwrap().unwrap();
        assert!(!solution.add_project_configuration(&folder).unwrap());
    }

    #[test]
    fn nested_section_is_created_when_missing() {
        let text = SOLUTION.replace(
            "\tGlobalSection(NestedProjects) = preSolution\n\t\t{11111111-1111-1111-1111-111111111111} = {33333333-3333-3333-3333-333333333333}\n\t\t{22222222-2222-2222-2222-222222222222} = {33333333-3333-3333-3333-333333333333}\n\tEndGlobalSection\n",
            "",
        );
        let mut solution = Solution::parse("/repo/All.sln", text).unwrap();
        assert_eq!(solution.find_by_id(APP).unwrap().unwrap().parent_id, None);
        assert!(solution.nest(APP, SRC).unwrap());
        assert!(solution.text().ends_with(
            "\tGlobalSection(NestedProjects) = preSolution\n\t\t{11111111-1111-1111-1111-111111111111} = {33333333-3333-3333-3333-333333333333}\n\tEndGlobalSection\nEndGlobal\n"
        ));
        assert_eq!(solution.find_by_id(APP).unwrap().unwrap().parent_id, Some(SRC));
    }

    #[test]
    fn remove_project_drops_entry_rows_and_nesting() {
        let mut solution = solution();
        assert!(solution.remove_project(APP).unwrap());
        let text = solution.text().to_string();
        assert!(!text.contains("11111111-1111-1111-1111-111111111111"));
        assert!(text.contains("{22222222-2222-2222-2222-222222222222} = {33333333-3333-3333-3333-333333333333}"));
        assert!(text.contains("Project(\"{9A19103F-16F7-4668-BE54-9A1E7A4F7556}\") = \"Web\""));
        assert_eq!(solution.projects().unwrap().len(), 2);
        assert!(!solution.remove_project(APP).unwrap());

        let untouched = SOLUTION
            .lines()
            .filter(|l| !l.contains("11111111-1111-1111-1111-111111111111") && *l != "EndProject")
            .count();
        let remaining = text.lines().filter(|l| *l != "EndProject").count();
        assert_eq!(remaining, untouched);
    }

    #[test]
    fn removing_a_folder_drops_rows_naming_it_as_parent() {
        let mut solution = solution();
        solution.remove_project(SRC).unwrap();
        assert!(solution.projects().unwrap().iter().all(|p| p.parent_id.is_none()));
    }

    #[test]
    fn save_keeps_crlf_and_skips_clean() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "All.sln", &SOLUTION.replace('\n', "\r\n"));
        let mut solution = Solution::open(&path).unwrap();
        assert!(!solution.save().unwrap());

        solution.add_folder("tools", None).unwrap();
        assert!(solution.save().unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.replace("\r\n", "").contains('\n'));
        assert!(written.contains("\"tools\", \"tools\""));
    }

    #[test]
    fn mixed_line_endings_survive_edits() {
        let dir = TempDir::new().unwrap();
        let original = SOLUTION.replace('\n', "\r\n").replacen("EndProject\r\n", "EndProject\n", 1);
        let path = write(dir.path(), "All.sln", &original);
        let mut solution = Solution::open(&path).unwrap();
        assert_eq!(solution.projects().unwrap().len(), 3);

        let tools = solution.add_folder("tools", None).unwrap();
        assert!(solution.save().unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        let entry = format!(
            "Project(\"{{2150E333-8FDC-42A3-9474-1A3956D46DE8}}\") = \"tools\", \"tools\", \"{}\"\r\nEndProject\r\n",
            braced(tools)
        );
        assert_eq!(written.replacen(&entry, "", 1), original);
    }

    #[test]
    fn crlf_rows_parse_without_carriage_returns() {
        let solution = Solution::parse("/repo/All.sln", SOLUTION.replace('\n', "\r\n")).unwrap();
        let app = solution.find_by_id(APP).unwrap().unwrap();
        assert_eq!(app.parent_id, Some(SRC));
        assert_eq!(app.configurations[0].value, "Debug|Any CPU");

        let mut solution = solution;
        assert!(solution.remove_project(APP).unwrap());
        assert!(!solution.text().contains("11111111-1111-1111-1111-111111111111"));
        assert!(!solution.text().replace("\r\n", "").contains('\n'));
    }
}
