//! Filtered analysis task: books one set of histograms per filter category
//! and fills them from the shared event buffer.

use std::cell::RefCell;
use std::rc::Rc;

use cap_config::{Configuration, ParamValue, Scope, ScopedView};
use cap_core::errors::CapError;
use cap_core::status::Status;
use cap_hist::AccumulatorGroup;

use crate::context::RunContext;
use crate::filter::FilterSet;
use crate::stage::Stage;
use crate::task::TaskCore;
use crate::workflow::{
    workflow_defaults, PARAM_DO_LOAD, PARAM_DO_SAVE, PARAM_DO_SCALE, PARAM_DO_SUBSAMPLE,
};

/// User analysis plugged into an [`AnalysisTask`].
pub trait Analysis {
    /// Event type read from the shared buffer.
    type Event;

    /// Default parameters merged at the task's scope.
    fn defaults(&self) -> Vec<(&'static str, ParamValue)> {
        Vec::new()
    }

    /// Books the histograms of `category` (labelled `label`) into `group`.
    fn book(
        &mut self,
        group: &mut AccumulatorGroup,
        category: usize,
        label: &str,
        params: ScopedView<'_>,
    ) -> Result<(), CapError>;

    /// Fills the histograms of `category` from `event`.
    fn fill(
        &mut self,
        group: &mut AccumulatorGroup,
        category: usize,
        label: &str,
        event: &Self::Event,
    ) -> Result<(), CapError>;
}

/// Stage running an [`Analysis`] over every filter category.
pub struct AnalysisTask<A: Analysis> {
    core: TaskCore,
    analysis: A,
    filters: FilterSet<A::Event>,
    buffer: Rc<RefCell<A::Event>>,
    labels: Vec<String>,
}

impl<A: Analysis> AnalysisTask<A> {
    /// Creates a task called `name` below `parent` reading from `buffer`.
    pub fn new(
        name: &str,
        parent: &Scope,
        analysis: A,
        filters: FilterSet<A::Event>,
        buffer: Rc<RefCell<A::Event>>,
    ) -> Result<Self, CapError> {
        let core = TaskCore::new("AnalysisTask", name, parent)?.with_required_accumulators();
        let labels = filters.labels(name);
        Ok(Self {
            core,
            analysis,
            filters,
            buffer,
            labels,
        })
    }

    /// The wrapped analysis.
    pub fn analysis(&self) -> &A {
        &self.analysis
    }

    /// Category labels in filter order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn book_all(&mut self, config: &Configuration) -> Result<AccumulatorGroup, CapError> {
        let mut group = AccumulatorGroup::new(self.core.name());
        let params = config.view(self.core.scope());
        for (category, label) in self.labels.iter().enumerate() {
            self.analysis.book(&mut group, category, label, params)?;
        }
        Ok(group)
    }
}

impl<A: Analysis> Stage for AnalysisTask<A> {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn define_defaults(&self, config: &mut Configuration) -> Result<(), CapError> {
        workflow_defaults(config, self.core.scope(), self.core.name());
        for (name, value) in self.analysis.defaults() {
            config.merge_default(self.core.scope(), name, value);
        }
        Ok(())
    }

    fn initialize(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        if ctx.config().get_bool(self.core.scope(), PARAM_DO_LOAD) {
            return self.core.load_histograms(ctx);
        }
        let group = self.book_all(ctx.config())?;
        tracing::debug!(
            task = self.core.scope().path(),
            histograms = group.len(),
            categories = self.labels.len(),
            "histograms booked"
        );
        self.core.set_accumulators(group);
        self.core.counters_mut().ensure_categories(self.labels.len());
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        self.core.counters_mut().increment_processed();
        let event = self.buffer.borrow();
        let accepted = self.filters.accepted(&event);
        if accepted.is_empty() {
            return Ok(());
        }
        self.core.counters_mut().increment_accepted();
        for category in accepted {
            self.core.counters_mut().increment_category(category);
            let group = self.core.require_accumulators("execute")?;
            self.analysis
                .fill(group, category, &self.labels[category], &event)?;
        }
        Ok(())
    }

    fn finalize(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        let counters = self.core.counters();
        tracing::info!(
            task = self.core.scope().path(),
            processed = counters.processed,
            accepted = counters.accepted,
            total = counters.total_since_start,
            "analysis finished"
        );
        let scope = self.core.scope().clone();
        if ctx.config().get_bool(&scope, PARAM_DO_SUBSAMPLE) {
            if counters.processed > 0 {
                ctx.post(
                    Status::Warning,
                    self.core.site("finalize"),
                    format!(
                        "{} events after the last partial save belong to no subsample",
                        counters.processed
                    ),
                );
            }
            return Ok(());
        }
        if ctx.config().get_bool(&scope, PARAM_DO_SCALE) && !self.core.is_scaled() {
            self.core.scale_histograms(ctx)?;
        }
        if ctx.config().get_bool(&scope, PARAM_DO_SAVE) {
            self.core.save_histograms(ctx)?;
        }
        Ok(())
    }
}
