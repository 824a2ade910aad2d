//! Swapping package references for project references and back.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Component, Path};

use uuid::Uuid;

use super::folder::{discover_projects, FolderProject};
use super::{Failure, Reconciler};
use crate::error::{ManifestError, Result};
use crate::package::{PackageFolder, PackageStore};
use crate::paths;
use crate::project::ProjectManifest;
use crate::reference::ReferenceKind;
use crate::solution::{ProjectKind, Solution, SolutionItem};
use crate::version::Version;

/// One reference swapped in a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub project: String,
    pub reference: String,
}

#[derive(Debug, Default)]
pub struct TransmogrifyReport {
    /// Solution entries added (package to project) or removed (project to
    /// package).
    pub solution_entries: Vec<String>,
    pub conversions: Vec<Conversion>,
    pub failures: Vec<Failure>,
}

/// A candidate project that now has a solution entry.
#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    path: std::path::PathBuf,
    id: Uuid,
}

/// A package to reference, with its store folder when restored.
#[derive(Debug, Clone)]
struct ResolvedPackage {
    name: String,
    version: String,
    folder: Option<PackageFolder>,
}

impl ResolvedPackage {
    fn from_folder(folder: PackageFolder) -> Self {
        Self { name: folder.name.clone(), version: folder.version.to_string(), folder: Some(folder) }
    }
}

impl Reconciler<'_> {
    fn store(&self, solution: &Solution) -> PackageStore {
        PackageStore::for_solution(solution.directory(), &self.settings)
    }

    /// Solution folders mirroring `folder` relative to the solution; returns
    /// the innermost one.
    fn mirror_folders(&self, solution: &mut Solution, folder: &Path) -> Result<Option<Uuid>> {
        let relative = pathdiff::diff_paths(folder, solution.directory()).unwrap_or_default();
        let mut parent = None;
        for component in relative.components() {
            if let Component::Normal(name) = component {
                parent = Some(solution.add_folder(&name.to_string_lossy(), parent)?);
            }
        }
        Ok(parent)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Packages → projects
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bring every project under `folder` into the solution and replace
    /// package references to them with project references.
    pub fn packages_to_projects(&self, solution: &mut Solution, folder: &Path) -> Result<TransmogrifyReport> {
        let mut report = TransmogrifyReport::default();
        let found = discover_projects(folder, &self.settings)?;
        if found.is_empty() {
            self.logger.message(&format!("no projects under {}", folder.display()));
            return Ok(report);
        }

        let folder = paths::normalize(&std::path::absolute(folder).map_err(|e| ManifestError::io(folder, e))?);
        let parent = self.mirror_folders(solution, &folder)?;
        let mut candidates: HashMap<String, Candidate> = HashMap::new();
        for project in &found {
            let kind = match ProjectManifest::open_with(&project.path, self.settings.clone()) {
                Ok(manifest) if manifest.is_sdk() => ProjectKind::SdkCSharp,
                Ok(_) => ProjectKind::ClassicCSharp,
                Err(error) if error.is_structural() => {
                    self.logger.message(&format!("{}: skipped, {error}", project.name));
                    report.failures.push(Failure { project: project.name.clone(), error });
                    continue;
                }
                Err(error) => return Err(error),
            };
            let known = solution.find(kind, &project.name)?.is_some();
            let id = solution.add_project(kind, &project.name, &project.path, parent)?;
            if let Some(item) = solution.find_by_id(id)? {
                solution.add_project_configuration(&item)?;
            }
            if !known {
                self.logger.information(&format!("added {} to the solution", project.name));
                report.solution_entries.push(project.name.clone());
            }
            candidates.insert(
                project.name.to_lowercase(),
                Candidate { name: project.name.clone(), path: project.path.clone(), id },
            );
        }
        solution.save()?;

        let store = self.store(solution);
        let mut conversions = Vec::new();
        let failures = self.for_each_project(solution, &solution.compilable_projects()?, |item, project| {
            let own = paths::key(project.path());
            let tfm = project.target_framework()?;
            for (name, version) in packages_of(project)? {
                let Some(candidate) = candidates.get(&name.to_lowercase()) else {
                    continue;
                };
                if paths::key(&candidate.path) == own {
                    continue;
                }
                project.remove_package_reference(&name)?;
                project.remove_reference(&name)?;
                project.add_project_reference(&candidate.name, &candidate.path, candidate.id)?;
                self.logger.information(&format!("{}: {name} is now a project reference", item.name));
                conversions.push(Conversion { project: item.name.clone(), reference: candidate.name.clone() });

                let Some(package) = store.find(&name, &Version::parse(&version))? else {
                    self.logger.message(&format!("{}: package {name} {version} is not restored", item.name));
                    continue;
                };
                let manifest = match package.read_manifest() {
                    Ok(manifest) => manifest,
                    Err(error) => {
                        tracing::warn!("cannot read {}: {error}", package.path.display());
                        self.logger.message(&format!("{}: {error}", item.name));
                        continue;
                    }
                };
                for dependency in &manifest.dependencies {
                    match candidates.get(&dependency.name.to_lowercase()) {
                        Some(dep) if paths::key(&dep.path) != own => {
                            project.add_project_reference(&dep.name, &dep.path, dep.id)?;
                        }
                        Some(_) => {}
                        None => {
                            if let Some(minimum) = dependency.minimum_version() {
                                project.add_package_reference(&dependency.name, &minimum, Some(&tfm))?;
                            }
                        }
                    }
                }
            }
            project.save()?;
            Ok(())
        })?;

        report.conversions = conversions;
        report.failures.extend(failures);
        Ok(report)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Projects → packages
    // ═══════════════════════════════════════════════════════════════════════════

    /// Replace references to the projects under `folder` with references to
    /// their restored packages, then drop those projects from the solution.
    pub fn projects_to_packages(&self, solution: &mut Solution, folder: &Path) -> Result<TransmogrifyReport> {
        let mut report = TransmogrifyReport::default();
        let found = discover_projects(folder, &self.settings)?;
        let by_path: HashMap<String, &FolderProject> = found.iter().map(|p| (p.key(), p)).collect();

        // Packages are looked up by the framework the removed project builds.
        let mut frameworks: HashMap<String, String> = HashMap::new();
        for project in &found {
            match ProjectManifest::open_with(&project.path, self.settings.clone()).and_then(|m| m.target_framework()) {
                Ok(tfm) => {
                    frameworks.insert(project.key(), tfm);
                }
                Err(error) if error.is_structural() => {
                    tracing::warn!("cannot read {}: {error}", project.path.display());
                }
                Err(error) => return Err(error),
            }
        }

        let store = self.store(solution);
        let remaining: Vec<SolutionItem> = solution
            .compilable_projects()?
            .into_iter()
            .filter(|item| !by_path.contains_key(&paths::key(&solution.item_path(item))))
            .collect();

        let mut conversions = Vec::new();
        // Candidates some project still references as a project.
        let mut kept: HashSet<String> = HashSet::new();
        let failures = self.for_each_project(solution, &remaining, |item, project| {
            let tfm = project.target_framework()?;
            let references: Vec<_> = project
                .project_references()?
                .into_iter()
                .filter_map(|reference| {
                    let include = reference.hint_path?;
                    let key = paths::key(&paths::resolve(project.directory(), &include));
                    let candidate = by_path.get(&key)?;
                    Some((include, candidate.name.clone(), key))
                })
                .collect();
            if references.is_empty() {
                return Ok(());
            }

            let existing: HashSet<String> = project
                .package_references()?
                .into_iter()
                .map(|p| p.name.to_lowercase())
                .collect();
            let referenced: HashSet<String> = references.iter().map(|(_, name, _)| name.to_lowercase()).collect();

            for (include, name, key) in &references {
                let lib_tfm = frameworks.get(key).unwrap_or(&tfm);
                let Some(root) = resolve_package(&store, name, lib_tfm)? else {
                    self.logger.message(&format!("{}: no restored package for {name}", item.name));
                    kept.insert(key.clone());
                    continue;
                };
                project.remove_project_reference(include)?;
                let mut packages = vec![ResolvedPackage::from_folder(root.clone())];
                packages.extend(
                    self.dependency_closure(&store, &root)?
                        .into_iter()
                        .filter(|p| {
                            let key = p.name.to_lowercase();
                            !existing.contains(&key) && !referenced.contains(&key)
                        }),
                );
                for package in &packages {
                    project.add_package_reference(&package.name, &package.version, Some(&tfm))?;
                    if project.is_sdk() {
                        continue;
                    }
                    if let Some(folder) = &package.folder {
                        for binary in folder.binaries(lib_tfm)? {
                            project.add_binary_reference(&binary)?;
                        }
                    }
                }
                self.logger.information(&format!("{}: {name} is now a package reference", item.name));
                conversions.push(Conversion { project: item.name.clone(), reference: name.clone() });
            }
            project.save()?;
            Ok(())
        })?;

        for item in solution.projects()? {
            let key = paths::key(&solution.item_path(&item));
            if !by_path.contains_key(&key) || kept.contains(&key) {
                continue;
            }
            if solution.remove_project(item.id)? {
                self.logger.information(&format!("removed {} from the solution", item.name));
                report.solution_entries.push(item.name.clone());
            }
        }
        solution.save()?;

        report.conversions = conversions;
        report.failures = failures;
        Ok(report)
    }

    /// Every package `root` depends on, directly or not, each listed once.
    /// Dependencies are pinned to the lower bound of their range.
    fn dependency_closure(&self, store: &PackageStore, root: &PackageFolder) -> Result<Vec<ResolvedPackage>> {
        let mut seen = HashSet::from([root.name.to_lowercase()]);
        let mut queue = VecDeque::from([root.clone()]);
        let mut closure = Vec::new();
        while let Some(folder) = queue.pop_front() {
            let manifest = match folder.read_manifest() {
                Ok(manifest) => manifest,
                Err(error) => {
                    tracing::warn!("cannot read {}: {error}", folder.path.display());
                    continue;
                }
            };
            for dependency in manifest.dependencies {
                if !seen.insert(dependency.name.to_lowercase()) {
                    continue;
                }
                let minimum = dependency.minimum_version();
                let restored = match &minimum {
                    Some(v) => store.find(&dependency.name, &Version::parse(v))?,
                    None => store
                        .package_folders(&dependency.name)?
                        .into_iter()
                        .rev()
                        .find(|folder| dependency.admits(&folder.version)),
                };
                match restored {
                    Some(found) => {
                        queue.push_back(found.clone());
                        closure.push(ResolvedPackage::from_folder(found));
                    }
                    None => {
                        self.logger.message(&format!("{} {} is not restored", dependency.name, dependency.version_range));
                        if let Some(version) = minimum {
                            closure.push(ResolvedPackage { name: dependency.name, version, folder: None });
                        }
                    }
                }
            }
        }
        Ok(closure)
    }
}

/// Package references of a project, including classic library references
/// that point into the package store, one per name.
fn packages_of(project: &ProjectManifest) -> Result<Vec<(String, String)>> {
    let mut packages: BTreeMap<String, (String, String)> = BTreeMap::new();
    for entry in project.package_references()? {
        packages
            .entry(entry.name.to_lowercase())
            .or_insert((entry.name, entry.version));
    }
    for reference in project.references()? {
        if reference.kind != ReferenceKind::Package {
            continue;
        }
        if let (Some(name), Some(version)) = (reference.package_name, reference.package_version) {
            packages
                .entry(name.to_lowercase())
                .or_insert((name, version.to_string()));
        }
    }
    Ok(packages.into_values().collect())
}

/// Latest restored version of `name` built for `tfm`, else the latest one.
fn resolve_package(store: &PackageStore, name: &str, tfm: &str) -> Result<Option<PackageFolder>> {
    let mut folders = store.package_folders(name)?;
    for folder in folders.iter().rev() {
        if folder.target_frameworks()?.iter().any(|t| t.eq_ignore_ascii_case(tfm)) {
            return Ok(Some(folder.clone()));
        }
    }
    Ok(folders.pop())
}
