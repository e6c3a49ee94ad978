//! Task node: identity, scope, counters, owned accumulators and children.

use cap_config::Scope;
use cap_core::errors::{CapError, ErrorInfo};
use cap_core::status::Site;
use cap_hist::{AccumulatorGroup, Tally};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// Event counters of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Events processed since the last reset.
    pub processed: u64,
    /// Events accepted since the last reset.
    pub accepted: u64,
    /// Events processed since construction; survives resets.
    pub total_since_start: u64,
    /// Accepted events per filter category since the last reset.
    pub accepted_by_category: Vec<u64>,
}

impl Counters {
    /// Counts one processed event.
    pub fn increment_processed(&mut self) {
        self.processed += 1;
        self.total_since_start += 1;
    }

    /// Counts one accepted event.
    pub fn increment_accepted(&mut self) {
        self.accepted += 1;
    }

    /// Counts one accepted event in `category`, growing the tally as needed.
    pub fn increment_category(&mut self, category: usize) {
        if self.accepted_by_category.len() <= category {
            self.accepted_by_category.resize(category + 1, 0);
        }
        self.accepted_by_category[category] += 1;
    }

    /// Makes room for `categories` per-category tallies.
    pub fn ensure_categories(&mut self, categories: usize) {
        if self.accepted_by_category.len() < categories {
            self.accepted_by_category.resize(categories, 0);
        }
    }

    /// Zeroes the transient counters; `total_since_start` is kept.
    pub fn reset(&mut self) {
        self.processed = 0;
        self.accepted = 0;
        self.accepted_by_category.iter_mut().for_each(|count| *count = 0);
    }

    /// Persistable view of the transient counters.
    pub fn tally(&self) -> Tally {
        Tally {
            processed: to_scalar(self.processed),
            accepted: to_scalar(self.accepted),
            accepted_by_category: self.accepted_by_category.iter().copied().map(to_scalar).collect(),
        }
    }

    /// Restores the transient counters from a persisted tally.
    pub fn restore(&mut self, tally: &Tally) {
        self.processed = tally.processed.max(0) as u64;
        self.accepted = tally.accepted.max(0) as u64;
        self.accepted_by_category = tally
            .accepted_by_category
            .iter()
            .map(|&count| count.max(0) as u64)
            .collect();
    }
}

fn to_scalar(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// State shared by every stage: who it is, where it sits, what it owns.
pub struct TaskCore {
    kind: &'static str,
    name: String,
    scope: Scope,
    counters: Counters,
    accumulators: Option<AccumulatorGroup>,
    requires_accumulators: bool,
    children: Vec<Box<dyn Stage>>,
    initialized: bool,
    pub(crate) partial_index: u32,
    pub(crate) partial_paths: Vec<std::path::PathBuf>,
}

impl TaskCore {
    /// Creates a task called `name` below `parent`. `kind` names the
    /// component in status reports.
    pub fn new(kind: &'static str, name: &str, parent: &Scope) -> Result<Self, CapError> {
        let scope = parent.child(name)?;
        Ok(Self {
            kind,
            name: name.to_owned(),
            scope,
            counters: Counters::default(),
            accumulators: None,
            requires_accumulators: false,
            children: Vec::new(),
            initialized: false,
            partial_index: 0,
            partial_paths: Vec::new(),
        })
    }

    /// Creates a top-level task directly below the configuration root.
    pub fn top_level(kind: &'static str, name: &str) -> Result<Self, CapError> {
        Self::new(kind, name, &Scope::root())
    }

    /// Marks the task as owning histograms: the staged workflow then treats a
    /// missing group as fatal instead of skipping.
    pub fn with_required_accumulators(mut self) -> Self {
        self.requires_accumulators = true;
        self
    }

    /// Component label used in status reports.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Name, unique among siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified configuration scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Scope of the parent task (or the root), fixed at construction.
    pub fn parent_scope(&self) -> Scope {
        self.scope.parent().unwrap_or_else(Scope::root)
    }

    /// Reporting site for `operation`.
    pub fn site(&self, operation: &str) -> Site {
        Site::new(self.kind, self.scope.path(), operation)
    }

    /// Event counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Mutable event counters.
    pub fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    /// Owned accumulator group, if any.
    pub fn accumulators(&self) -> Option<&AccumulatorGroup> {
        self.accumulators.as_ref()
    }

    /// Mutable owned accumulator group, if any.
    pub fn accumulators_mut(&mut self) -> Option<&mut AccumulatorGroup> {
        self.accumulators.as_mut()
    }

    /// Takes ownership of `group`, replacing any previous one.
    pub fn set_accumulators(&mut self, group: AccumulatorGroup) {
        self.accumulators = Some(group);
    }

    /// Returns true when the staged workflow must find a group.
    pub fn requires_accumulators(&self) -> bool {
        self.requires_accumulators
    }

    /// The owned group, or a fatal error naming the operation that needed it.
    pub fn require_accumulators(&mut self, operation: &str) -> Result<&mut AccumulatorGroup, CapError> {
        let path = self.scope.path().to_owned();
        self.accumulators.as_mut().ok_or_else(|| {
            CapError::Fatal(
                ErrorInfo::new("accumulators-missing", "task has no accumulator group")
                    .with_context("task", path)
                    .with_context("operation", operation),
            )
        })
    }

    /// Appends `child`; insertion order is execution order.
    ///
    /// The child must have been built below this task's scope and its name
    /// must be unique among the existing children.
    pub fn add_child(&mut self, child: Box<dyn Stage>) -> Result<(), CapError> {
        let child_core = child.core();
        if child_core.parent_scope() != self.scope {
            return Err(CapError::Fatal(
                ErrorInfo::new("task-reparent", "child was built for a different parent")
                    .with_context("parent", self.scope.path())
                    .with_context("child", child_core.scope().path()),
            ));
        }
        if self.child(child_core.name()).is_some() {
            return Err(CapError::Fatal(
                ErrorInfo::new("task-duplicate-child", "a child with this name already exists")
                    .with_context("parent", self.scope.path())
                    .with_context("child", child_core.name()),
            ));
        }
        self.children.push(child);
        Ok(())
    }

    /// Child called `name`.
    pub fn child(&self, name: &str) -> Option<&dyn Stage> {
        self.children
            .iter()
            .find(|child| child.core().name() == name)
            .map(|child| child.as_ref())
    }

    /// Children in execution order.
    pub fn children(&self) -> &[Box<dyn Stage>] {
        &self.children
    }

    /// Mutable children in execution order.
    pub fn children_mut(&mut self) -> &mut [Box<dyn Stage>] {
        &mut self.children
    }

    /// Returns true once `initialize` has been dispatched to this task.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Zeroes transient state: bins and counters. Identity, children and
    /// `total_since_start` are kept.
    pub fn reset(&mut self) {
        self.counters.reset();
        self.reset_histograms();
    }

    /// Releases the owned accumulator group.
    pub fn clear(&mut self) {
        self.accumulators = None;
    }

    /// Number of partial saves written so far.
    pub fn partial_count(&self) -> u32 {
        self.partial_index
    }

    /// Documents written by partial saves, in index order.
    pub fn partial_paths(&self) -> &[std::path::PathBuf] {
        &self.partial_paths
    }
}

impl std::fmt::Debug for TaskCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCore")
            .field("kind", &self.kind)
            .field("scope", &self.scope.path())
            .field("counters", &self.counters)
            .field("children", &self.children.len())
            .finish()
    }
}
