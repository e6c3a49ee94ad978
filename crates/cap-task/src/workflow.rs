//! Staged statistics workflow on a task's accumulator group: scale, save,
//! load, partial save, reset and subsample aggregation.
//!
//! Output locations come from the scoped configuration at the task's scope.
//! Shared switches are defaulted at the root so a single override applies to
//! every task; file names are defaulted per task.

use std::path::PathBuf;

use cap_config::{Configuration, Scope};
use cap_core::errors::{CapError, ErrorInfo};
use cap_core::status::Status;
use cap_hist::{
    aggregate, output_file, partial_file, subsample_file, GroupState, Normalization, OpenMode,
    PartialSaveRecord, SubsampleOptions, Tally,
};

use crate::context::RunContext;
use crate::task::TaskCore;

/// Directory for saved documents.
pub const PARAM_OUTPUT_PATH: &str = "histoOutputPath";
/// File stem for saved documents.
pub const PARAM_OUTPUT_FILE: &str = "histoOutputFileName";
/// Directory for loaded documents.
pub const PARAM_INPUT_PATH: &str = "histoInputPath";
/// File stem for loaded documents.
pub const PARAM_INPUT_FILE: &str = "histoInputFileName";
/// Truncate (true) or update (false) the output document on save.
pub const PARAM_FORCE_REWRITE: &str = "forceHistogramsRewrite";
/// Restore histograms from the input document instead of booking them.
pub const PARAM_DO_LOAD: &str = "doLoadHistograms";
/// Scale histograms by accepted counts at finalize.
pub const PARAM_DO_SCALE: &str = "doScaleHistograms";
/// Save histograms at finalize.
pub const PARAM_DO_SAVE: &str = "doSaveHistograms";
/// Checkpoint every `nIterationPartialSave` iterations.
pub const PARAM_DO_PARTIAL_SAVE: &str = "doPartialSave";
/// Reset after each checkpoint and aggregate the snapshots at the end.
pub const PARAM_DO_SUBSAMPLE: &str = "doSubsampleAnalysis";
/// Snapshot normalization: `by-accepted` or `none`.
pub const PARAM_NORMALIZATION: &str = "subsampleNormalization";

/// Merges the workflow defaults for a task called `name` at `scope`.
pub fn workflow_defaults(config: &mut Configuration, scope: &Scope, name: &str) {
    let root = Scope::root();
    config.merge_default(&root, PARAM_OUTPUT_PATH, ".");
    config.merge_default(&root, PARAM_INPUT_PATH, ".");
    config.merge_default(&root, PARAM_FORCE_REWRITE, true);
    config.merge_default(&root, PARAM_DO_LOAD, false);
    config.merge_default(&root, PARAM_DO_SCALE, true);
    config.merge_default(&root, PARAM_DO_SAVE, true);
    config.merge_default(&root, PARAM_DO_PARTIAL_SAVE, false);
    config.merge_default(&root, PARAM_DO_SUBSAMPLE, false);
    config.merge_default(&root, PARAM_NORMALIZATION, "by-accepted");
    config.merge_default(scope, PARAM_OUTPUT_FILE, name);
    config.merge_default(scope, PARAM_INPUT_FILE, name);
}

fn location(core: &TaskCore, config: &Configuration, dir: &str, file: &str) -> (PathBuf, String) {
    let view = config.view(core.scope());
    let dir = view
        .resolve(dir)
        .and_then(|value| value.as_str())
        .unwrap_or(".")
        .to_owned();
    let stem = view
        .resolve(file)
        .and_then(|value| value.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| core.name().to_owned());
    (PathBuf::from(dir), stem)
}

fn normalization(core: &TaskCore, config: &Configuration) -> Result<Normalization, CapError> {
    match config.get_string(core.scope(), PARAM_NORMALIZATION).as_str() {
        "" | "by-accepted" => Ok(Normalization::ByAccepted),
        "none" => Ok(Normalization::None),
        other => Err(CapError::Config(
            ErrorInfo::new("config-normalization", "unknown subsample normalization")
                .with_context("value", other)
                .with_hint("use by-accepted or none"),
        )),
    }
}

impl TaskCore {
    /// Directory and file stem used by [`TaskCore::save_histograms`] and partial saves.
    pub fn output_location(&self, config: &Configuration) -> (PathBuf, String) {
        location(self, config, PARAM_OUTPUT_PATH, PARAM_OUTPUT_FILE)
    }

    /// Directory and file stem used by [`TaskCore::load_histograms`].
    pub fn input_location(&self, config: &Configuration) -> (PathBuf, String) {
        location(self, config, PARAM_INPUT_PATH, PARAM_INPUT_FILE)
    }

    /// Divides each histogram by the accepted count of its category.
    /// Categories with no accepted events are left untouched with a warning.
    pub fn scale_histograms(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        if self.accumulators().is_none() && !self.requires_accumulators() {
            return Ok(());
        }
        let accepted = self.counters().accepted_by_category.clone();
        let skipped = self.require_accumulators("scale")?.scale_by_category(&accepted);
        if !skipped.is_empty() {
            ctx.post(
                Status::Warning,
                self.site("scale"),
                format!("no accepted events in categories {skipped:?}; left unscaled"),
            );
        }
        Ok(())
    }

    /// Writes the group and counters to `<output>/<stem>.json`.
    pub fn save_histograms(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        if self.accumulators().is_none() && !self.requires_accumulators() {
            return Ok(());
        }
        let (dir, stem) = self.output_location(ctx.config());
        let path = output_file(&dir, &stem);
        let mode = if ctx.config().get_bool(self.scope(), PARAM_FORCE_REWRITE) {
            OpenMode::Create
        } else {
            OpenMode::CreateIfAbsent
        };
        let tally = self.counters().tally();
        let group = self.require_accumulators("save")?;
        let mut handle = ctx.store().open(&path, mode)?;
        tally.write(&mut *handle)?;
        handle.write_group(group)?;
        handle.close()?;
        group.mark_persisted();
        tracing::info!(
            task = self.scope().path(),
            path = %path.display(),
            processed = tally.processed,
            accepted = tally.accepted,
            "histograms saved"
        );
        Ok(())
    }

    /// Restores the group and counters from `<input>/<stem>.json`. The
    /// restored group is SCALED and must not be scaled again.
    pub fn load_histograms(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        let (dir, stem) = self.input_location(ctx.config());
        let path = output_file(&dir, &stem);
        let handle = ctx.store().open(&path, OpenMode::Read)?;
        let tally = Tally::read(&*handle)?;
        let mut group = handle.read_group(self.name())?;
        handle.close()?;
        group.mark_scaled();
        self.counters_mut().restore(&tally);
        self.set_accumulators(group);
        tracing::info!(task = self.scope().path(), path = %path.display(), "histograms loaded");
        Ok(())
    }

    /// Persists the raw group and counters under the next partial index.
    pub fn save_partial(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        if self.accumulators().is_none() && !self.requires_accumulators() {
            return Ok(());
        }
        let (dir, stem) = self.output_location(ctx.config());
        let index = self.partial_index;
        let path = partial_file(&dir, &stem, index);
        let tally = self.counters().tally();
        let group = self.require_accumulators("savePartial")?;
        let record = PartialSaveRecord {
            index,
            tally,
            group: group.clone(),
        };
        record.save(ctx.store(), &path)?;
        group.mark_persisted();
        tracing::debug!(
            task = self.scope().path(),
            index,
            path = %path.display(),
            "partial save written"
        );
        self.partial_index += 1;
        self.partial_paths.push(path);
        Ok(())
    }

    /// Returns every bin to zero and the group to EMPTY.
    pub fn reset_histograms(&mut self) {
        if let Some(group) = self.accumulators_mut() {
            group.reset();
        }
    }

    /// Aggregates this task's partial saves into `<output>/<stem>_Subsample.json`
    /// and replaces the owned group with the aggregated (SCALED) one.
    pub fn subsample_analysis(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        if self.accumulators().is_none() && !self.requires_accumulators() {
            return Ok(());
        }
        if self.partial_paths.is_empty() {
            return Err(CapError::Subsample(
                ErrorInfo::new("subsample-empty", "no partial saves to aggregate")
                    .with_context("task", self.scope().path())
                    .with_hint("enable doPartialSave with a positive nIterationPartialSave"),
            ));
        }
        let options = SubsampleOptions {
            normalization: normalization(self, ctx.config())?,
        };
        let records = self
            .partial_paths
            .iter()
            .map(|path| PartialSaveRecord::load(ctx.store(), path, self.name()))
            .collect::<Result<Vec<_>, _>>()?;
        let result = aggregate(&records, &options)?;
        for warning in &result.warnings {
            ctx.post(Status::Warning, self.site("subsampleAnalysis"), warning.clone());
        }

        let (dir, stem) = self.output_location(ctx.config());
        let path = subsample_file(&dir, &stem);
        let mut handle = ctx.store().open(&path, OpenMode::Create)?;
        result.tally.write(&mut *handle)?;
        handle.write_group(&result.group)?;
        handle.close()?;
        tracing::info!(
            task = self.scope().path(),
            samples = result.samples,
            path = %path.display(),
            "subsample analysis written"
        );
        self.set_accumulators(result.group);
        Ok(())
    }

    /// Returns true when the owned group was loaded or already scaled.
    pub fn is_scaled(&self) -> bool {
        self.accumulators()
            .is_some_and(|group| group.state() == GroupState::Scaled)
    }
}
