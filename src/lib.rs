pub mod condition;
pub mod config;
pub mod error;
pub mod logger;
pub mod package;
pub mod package_list;
pub mod paths;
pub mod project;
pub mod reconcile;
pub mod reference;
pub mod solution;
mod splice;
pub mod version;
mod xml;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use error::{ManifestError, Result};
pub use logger::{Logger, MemoryLogger, TracingLogger};
pub use package::{PackageFolder, PackageStore};
pub use package_list::PackageList;
pub use project::{Dialect, FileEntry, ProjectManifest};
pub use reconcile::Reconciler;
pub use reference::{PackageEntry, Reference, ReferenceKind};
pub use solution::{ProjectKind, Solution, SolutionItem};
pub use version::Version;
