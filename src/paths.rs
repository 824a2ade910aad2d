//! Conversions between the backslash paths stored in manifests and
//! filesystem paths.

use std::path::{Component, Path, PathBuf};

/// Turn a manifest path (`..\lib\Foo.dll`, `src/Bar.cs`) into a relative
/// filesystem path.
pub fn from_manifest(path: &str) -> PathBuf {
    path.split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .collect()
}

/// Render a relative path the way MSBuild manifests spell it.
pub fn to_manifest(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\\")
}

/// Lexically resolve `.` and `..` without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute, normalized location of a manifest path relative to `base`.
pub fn resolve(base: &Path, manifest_path: &str) -> PathBuf {
    normalize(&base.join(from_manifest(manifest_path)))
}

/// `target` relative to the directory `base`, in manifest spelling.
pub fn relative(base: &Path, target: &Path) -> String {
    match pathdiff::diff_paths(target, base) {
        Some(rel) => to_manifest(&rel),
        None => target.to_string_lossy().into_owned(),
    }
}

/// Lowercased absolute path used to key file maps.
pub fn key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// File name without extension of a manifest path.
pub fn stem(manifest_path: &str) -> String {
    from_manifest(manifest_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
