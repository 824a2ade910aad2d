use std::collections::BTreeMap;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use super::Metadata;
use crate::config::Settings;
use crate::error::{ManifestError, Result};
use crate::paths;

/// Item type recorded for files excluded with a `Remove` directive.
pub const REMOVED: &str = "Remove";
/// Item type recorded for files on disk the manifest says nothing about.
pub const UNKNOWN: &str = "Unknown";

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One file as seen from the disk and from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Path relative to the project folder, in manifest spelling.
    pub name: String,
    /// `Compile`, `None`, `Content`, ..., [`REMOVED`] or [`UNKNOWN`].
    pub item_type: String,
    pub on_disk: bool,
    /// Named by an item in the manifest.
    pub in_manifest: bool,
    /// Part of an SDK project by convention.
    pub implicit: bool,
    pub metadata: Metadata,
}

impl FileEntry {
    pub fn is_removed(&self) -> bool {
        self.item_type == REMOVED
    }

    /// The build picks this file up.
    pub fn is_declared(&self) -> bool {
        (self.in_manifest || self.implicit) && !self.is_removed()
    }

    /// On disk but not part of the build.
    pub fn is_orphaned(&self) -> bool {
        self.on_disk && !self.is_declared()
    }

    /// Declared but missing from disk.
    pub fn is_dangling(&self) -> bool {
        self.is_declared() && !self.on_disk
    }
}

/// Files keyed by lowercased absolute path.
pub(super) type FileMap = BTreeMap<String, FileEntry>;

/// Walk `directory`, skipping excluded top-level folders and excluded
/// extensions. With `conventions`, files matching an implicit item type are
/// marked as such.
pub(super) fn discover(directory: &Path, settings: &Settings, conventions: bool) -> Result<FileMap> {
    let mut files = FileMap::new();
    if !directory.is_dir() {
        return Ok(files);
    }
    let walker = WalkDir::new(directory)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() == 1
                && e.file_type().is_dir()
                && settings.is_excluded_dir(&e.file_name().to_string_lossy()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| directory.to_path_buf(), Path::to_path_buf);
            ManifestError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if settings.is_excluded_file(&file_name) {
            continue;
        }
        let implicit = if conventions { settings.implicit_item_type(&file_name) } else { None };
        let path = entry.path().to_path_buf();
        files.insert(
            paths::key(&path),
            FileEntry {
                name: paths::relative(directory, &path),
                item_type: implicit.unwrap_or(UNKNOWN).to_string(),
                on_disk: true,
                in_manifest: false,
                implicit: implicit.is_some(),
                metadata: Metadata::new(),
                path,
            },
        );
    }
    tracing::trace!("{} files under {}", files.len(), directory.display());
    Ok(files)
}

/// Record a manifest item for `include`, keeping what the disk scan found.
pub(super) fn declare(
    files: &mut FileMap,
    directory: &Path,
    include: &str,
    item_type: &str,
    metadata: Metadata,
) {
    let path = paths::resolve(directory, include);
    let key = paths::key(&path);
    let on_disk = files.get(&key).is_some_and(|f| f.on_disk);
    files.insert(
        key,
        FileEntry {
            name: paths::relative(directory, &path),
            item_type: item_type.to_string(),
            on_disk,
            in_manifest: true,
            implicit: false,
            metadata,
            path,
        },
    );
}

/// An item directive whose path contains a wildcard.
#[derive(Debug)]
pub(super) struct Wildcard {
    pub raw: String,
    pub pattern: Pattern,
}

impl Wildcard {
    /// Compile `include`, relative to `directory`, into a glob pattern.
    pub fn compile(directory: &Path, include: &str) -> Option<Self> {
        let relative = paths::from_manifest(include);
        let text = format!(
            "{}{MAIN_SEPARATOR}{}",
            Pattern::escape(&directory.to_string_lossy()),
            relative.to_string_lossy()
        );
        match Pattern::new(&text) {
            Ok(pattern) => Some(Self { raw: include.to_string(), pattern }),
            Err(e) => {
                tracing::warn!("ignoring wildcard {include}: {e}");
                None
            }
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.pattern.matches_path_with(path, MATCH)
    }
}

pub(super) fn is_wildcard(include: &str) -> bool {
    include.contains(['*', '?'])
}
