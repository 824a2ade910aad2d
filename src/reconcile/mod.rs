//! Solution-wide passes built on [`ProjectManifest`] and [`Solution`].
//!
//! Every pass visits the solution's C# projects one at a time. A project
//! whose manifest is malformed is recorded as a [`Failure`] and skipped; I/O
//! errors abort the pass.

mod audit;
mod folder;
mod transmogrify;

use std::fmt;

use crate::config::Settings;
use crate::error::{ManifestError, Result};
use crate::logger::Logger;
use crate::project::ProjectManifest;
use crate::solution::{Solution, SolutionItem};

pub use audit::{FileAudit, ProjectFiles, ReferenceAudit, ReferenceConflict, ReferenceUsage};
pub use folder::{discover_projects, FolderProject};
pub use transmogrify::{Conversion, TransmogrifyReport};

/// A project skipped because its manifest could not be used.
#[derive(Debug)]
pub struct Failure {
    pub project: String,
    pub error: ManifestError,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.project, self.error)
    }
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Projects whose manifest was rewritten.
    pub saved: Vec<String>,
    pub failures: Vec<Failure>,
}

/// Runs the reconciliation passes, reporting through a [`Logger`].
pub struct Reconciler<'a> {
    settings: Settings,
    logger: &'a dyn Logger,
}

impl<'a> Reconciler<'a> {
    pub fn new(logger: &'a dyn Logger) -> Self {
        Self { settings: Settings::default(), logger }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Open each of `items` and hand it to `visit`. Structural errors from
    /// opening or visiting are collected; anything else stops the pass.
    fn for_each_project<F>(&self, solution: &Solution, items: &[SolutionItem], mut visit: F) -> Result<Vec<Failure>>
    where
        F: FnMut(&SolutionItem, &mut ProjectManifest) -> Result<()>,
    {
        let mut failures = Vec::new();
        for item in items {
            self.logger.progress();
            let outcome = ProjectManifest::open_with(solution.item_path(item), self.settings.clone())
                .and_then(|mut project| visit(item, &mut project));
            match outcome {
                Ok(()) => {}
                Err(error) if error.is_structural() => {
                    tracing::warn!("skipping {}: {error}", item.name);
                    self.logger.message(&format!("{}: skipped, {error}", item.name));
                    failures.push(Failure { project: item.name.clone(), error });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(failures)
    }

    /// Deduplicate and regroup the references and items of every classic
    /// project, saving the ones that changed.
    pub fn clean_up_projects(&self, solution: &Solution) -> Result<CleanupReport> {
        let mut saved = Vec::new();
        let failures = self.for_each_project(solution, &solution.compilable_projects()?, |item, project| {
            project.clean_up(self.logger)?;
            if project.save()? {
                self.logger.information(&format!("{}: cleaned up", item.name));
                saved.push(item.name.clone());
            }
            Ok(())
        })?;
        Ok(CleanupReport { saved, failures })
    }
}
