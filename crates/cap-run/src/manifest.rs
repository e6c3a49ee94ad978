use std::fs;
use std::path::{Path, PathBuf};

use cap_config::ConfigFile;
use cap_core::errors::{CapError, ErrorInfo};
use cap_core::provenance::RunProvenance;
use cap_task::{Counters, RunContext, Stage};
use serde::{Deserialize, Serialize};

use crate::report::RunReport;

/// Counters of one task at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Task path.
    pub path: String,
    /// Component kind.
    pub kind: String,
    /// Counters at the end of the run.
    pub counters: Counters,
}

/// Structured manifest describing a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Driver report.
    pub report: RunReport,
    /// Resolved configuration the run used.
    pub configuration: ConfigFile,
    /// Every task in dispatch order.
    pub tasks: Vec<TaskSummary>,
    /// Partial-save documents in task then index order.
    pub partial_saves: Vec<PathBuf>,
    /// Who produced the run and when.
    pub provenance: RunProvenance,
}

impl RunManifest {
    /// Captures the state of `root` and `ctx` after a run.
    pub fn capture(
        root: &dyn Stage,
        ctx: &RunContext,
        report: RunReport,
        provenance: RunProvenance,
    ) -> Self {
        let mut tasks = Vec::new();
        let mut partial_saves = Vec::new();
        collect(root, &mut tasks, &mut partial_saves);
        Self {
            report,
            configuration: ConfigFile::from_configuration(ctx.config()),
            tasks,
            partial_saves,
            provenance,
        }
    }

    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), CapError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                CapError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            CapError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            CapError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, CapError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CapError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            CapError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

fn collect(stage: &dyn Stage, tasks: &mut Vec<TaskSummary>, partial_saves: &mut Vec<PathBuf>) {
    let core = stage.core();
    tasks.push(TaskSummary {
        path: core.scope().path().to_owned(),
        kind: core.kind().to_owned(),
        counters: core.counters().clone(),
    });
    partial_saves.extend(core.partial_paths().iter().cloned());
    for child in core.children() {
        collect(child.as_ref(), tasks, partial_saves);
    }
}
