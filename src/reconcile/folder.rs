use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Settings;
use crate::error::{ManifestError, Result};
use crate::paths;

/// A `.csproj` found under a folder handed to a transmogrify pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderProject {
    pub name: String,
    pub path: PathBuf,
}

impl FolderProject {
    pub fn key(&self) -> String {
        paths::key(&self.path)
    }
}

/// Every project manifest under `folder`, sorted by path. Build output
/// folders are not descended into.
pub fn discover_projects(folder: &Path, settings: &Settings) -> Result<Vec<FolderProject>> {
    let folder = paths::normalize(&std::path::absolute(folder).map_err(|e| ManifestError::io(folder, e))?);
    let walker = WalkDir::new(&folder)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0 && e.file_type().is_dir() && settings.is_excluded_dir(&e.file_name().to_string_lossy()))
        });

    let mut projects = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| folder.clone(), Path::to_path_buf);
            ManifestError::io(path, e.into())
        })?;
        let path = entry.path();
        let is_project = entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csproj"));
        if !is_project {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        projects.push(FolderProject { name, path: path.to_path_buf() });
    }
    tracing::debug!("{} candidate projects under {}", projects.len(), folder.display());
    Ok(projects)
}
