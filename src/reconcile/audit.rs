use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{Failure, Reconciler};
use crate::error::{ManifestError, Result};
use crate::project::FileEntry;
use crate::reference::{Reference, ReferenceKind};
use crate::solution::Solution;
use crate::version::Version;

/// One project's use of a reference name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceUsage {
    pub project: String,
    pub kind: ReferenceKind,
    /// Package version for package references, assembly version otherwise.
    pub version: Option<Version>,
}

impl ReferenceUsage {
    fn of(reference: &Reference) -> Self {
        let version = if reference.is_package() {
            reference.package_version.clone()
        } else {
            reference.version.clone()
        };
        Self { project: reference.source.clone(), kind: reference.kind, version }
    }
}

/// A reference name used in more than one way across the solution.
#[derive(Debug, Clone)]
pub struct ReferenceConflict {
    pub name: String,
    pub usages: Vec<ReferenceUsage>,
}

impl ReferenceConflict {
    /// Distinct `(version, kind)` combinations, each with the projects using it.
    pub fn breakdown(&self) -> BTreeMap<(Option<Version>, ReferenceKind), Vec<String>> {
        let mut breakdown: BTreeMap<_, Vec<String>> = BTreeMap::new();
        for usage in &self.usages {
            breakdown
                .entry((usage.version.clone(), usage.kind))
                .or_default()
                .push(usage.project.clone());
        }
        breakdown
    }
}

#[derive(Debug, Default)]
pub struct ReferenceAudit {
    pub conflicts: Vec<ReferenceConflict>,
    pub failures: Vec<Failure>,
}

/// Files of one project that are on disk or declared but not both.
#[derive(Debug, Clone, Default)]
pub struct ProjectFiles {
    pub project: String,
    pub orphaned: Vec<FileEntry>,
    pub dangling: Vec<FileEntry>,
    /// Orphans removed from disk by [`Reconciler::remove_orphaned_files`].
    pub deleted: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct FileAudit {
    pub projects: Vec<ProjectFiles>,
    pub failures: Vec<Failure>,
}

impl FileAudit {
    pub fn is_clean(&self) -> bool {
        self.projects
            .iter()
            .all(|p| p.orphaned.is_empty() && p.dangling.is_empty())
    }
}

impl Reconciler<'_> {
    /// Report every reference name that appears with more than one
    /// version or kind. Touches nothing.
    pub fn audit_references(&self, solution: &Solution) -> Result<ReferenceAudit> {
        let mut by_name: BTreeMap<String, (String, Vec<ReferenceUsage>)> = BTreeMap::new();
        let failures = self.for_each_project(solution, &solution.compilable_projects()?, |_, project| {
            for reference in project.all_references()? {
                by_name
                    .entry(reference.name.to_lowercase())
                    .or_insert_with(|| (reference.name.clone(), Vec::new()))
                    .1
                    .push(ReferenceUsage::of(&reference));
            }
            Ok(())
        })?;

        let mut conflicts = Vec::new();
        for (name, usages) in by_name.into_values() {
            let conflict = ReferenceConflict { name, usages };
            let breakdown = conflict.breakdown();
            if breakdown.len() < 2 {
                continue;
            }
            self.logger.message(&format!("{} is referenced {} ways:", conflict.name, breakdown.len()));
            for ((version, kind), projects) in &breakdown {
                let version = version.as_ref().map(Version::to_string).unwrap_or_else(|| "-".into());
                self.logger.message(&format!("  {kind} {version}: {}", projects.join(", ")));
            }
            conflicts.push(conflict);
        }
        Ok(ReferenceAudit { conflicts, failures })
    }

    /// Orphaned and dangling files of every project. Touches nothing.
    pub fn audit_files(&self, solution: &Solution) -> Result<FileAudit> {
        self.file_pass(solution, false)
    }

    /// [`Reconciler::audit_files`], then delete every orphaned file.
    pub fn remove_orphaned_files(&self, solution: &Solution) -> Result<FileAudit> {
        self.file_pass(solution, true)
    }

    fn file_pass(&self, solution: &Solution, delete: bool) -> Result<FileAudit> {
        let mut projects = Vec::new();
        let failures = self.for_each_project(solution, &solution.compilable_projects()?, |item, project| {
            let (orphaned, rest): (Vec<_>, Vec<_>) =
                project.scan_files()?.into_iter().partition(FileEntry::is_orphaned);
            let dangling: Vec<_> = rest.into_iter().filter(FileEntry::is_dangling).collect();

            for file in &orphaned {
                self.logger.information(&format!("{}: orphaned {}", item.name, file.name));
            }
            for file in &dangling {
                self.logger.information(&format!("{}: missing {}", item.name, file.name));
            }

            let mut deleted = Vec::new();
            if delete {
                for file in &orphaned {
                    std::fs::remove_file(&file.path).map_err(|e| ManifestError::io(&file.path, e))?;
                    tracing::info!("deleted {}", file.path.display());
                    deleted.push(file.path.clone());
                }
            }
            if !orphaned.is_empty() || !dangling.is_empty() {
                self.logger.message(&format!(
                    "{}: {} orphaned, {} missing",
                    item.name,
                    orphaned.len(),
                    dangling.len()
                ));
            }
            projects.push(ProjectFiles { project: item.name.clone(), orphaned, dangling, deleted });
            Ok(())
        })?;
        Ok(FileAudit { projects, failures })
    }
}

#[cfg(test)]
mod tests {
    use crate::logger::MemoryLogger;
    use crate::reconcile::Reconciler;
    use crate::reference::ReferenceKind;
    use crate::solution::Solution;
    use crate::test_support::{write, CLASSIC_PACKAGES, CLASSIC_PROJECT, SDK_PROJECT, SOLUTION};
    use tempfile::TempDir;

    fn workspace(dir: &TempDir) -> Solution {
        let sln = write(dir.path(), "All.sln", SOLUTION);
        write(dir.path(), "src/App/App.csproj", CLASSIC_PROJECT);
        write(dir.path(), "src/App/packages.config", CLASSIC_PACKAGES);
        write(dir.path(), "src/App/Class1.cs", "");
        write(dir.path(), "src/App/Stray.cs", "");
        write(dir.path(), "src/Web/Web.csproj", SDK_PROJECT);
        write(dir.path(), "src/Web/Program.cs", "");
        write(dir.path(), "src/Web/notes.txt", "");
        Solution::open(sln).unwrap()
    }

    // ── References ───────────────────────────────────────────────────────

    #[test]
    fn reports_names_used_in_several_ways() {
        let dir = TempDir::new().unwrap();
        let solution = workspace(&dir);
        let logger = MemoryLogger::new();
        let audit = Reconciler::new(&logger).audit_references(&solution).unwrap();

        let names: Vec<_> = audit.conflicts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Newtonsoft.Json"]);
        let breakdown = audit.conflicts[0].breakdown();
        assert_eq!(breakdown.len(), 2);
        assert!(breakdown.keys().all(|(_, kind)| *kind == ReferenceKind::Package));
        assert!(logger.contains("Newtonsoft.Json is referenced 2 ways"));
        assert!(logger.contains("NuGet 10.0.3: Web"));
        assert!(logger.contains("NuGet 9.0.1: App"));
    }

    #[test]
    fn same_project_reference_everywhere_is_not_a_conflict() {
        let dir = TempDir::new().unwrap();
        let solution = workspace(&dir);
        let audit = Reconciler::new(&MemoryLogger::new()).audit_references(&solution).unwrap();
        assert!(audit.conflicts.iter().all(|c| c.name != "Lib"));
    }

    // ── Files ────────────────────────────────────────────────────────────

    #[test]
    fn file_audit_is_read_only() {
        let dir = TempDir::new().unwrap();
        let solution = workspace(&dir);
        let audit = Reconciler::new(&MemoryLogger::new()).audit_files(&solution).unwrap();
        assert!(!audit.is_clean());

        let app = &audit.projects[0];
        let orphans: Vec<_> = app.orphaned.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(orphans, vec!["Stray.cs"]);
        let missing: Vec<_> = app.dangling.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(missing, vec![r"Properties\AssemblyInfo.cs"]);

        let web = &audit.projects[1];
        let orphans: Vec<_> = web.orphaned.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(orphans, vec!["notes.txt"]);
        assert!(dir.path().join("src").join("App").join("Stray.cs").exists());
    }

    #[test]
    fn destructive_variant_deletes_orphans() {
        let dir = TempDir::new().unwrap();
        let solution = workspace(&dir);
        let audit = Reconciler::new(&MemoryLogger::new()).remove_orphaned_files(&solution).unwrap();
        assert_eq!(audit.projects[0].deleted, vec![dir.path().join("src").join("App").join("Stray.cs")]);
        assert!(!dir.path().join("src").join("App").join("Stray.cs").exists());
        assert!(!dir.path().join("src").join("Web").join("notes.txt").exists());
        assert!(dir.path().join("src").join("Web").join("Program.cs").exists());

        let after = Reconciler::new(&MemoryLogger::new()).audit_files(&solution).unwrap();
        assert!(after.projects.iter().all(|p| p.orphaned.is_empty()));
    }
}
