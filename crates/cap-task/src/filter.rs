//! Event filters: each accepted filter defines one category of histograms.

use std::fmt;

/// Accepts or rejects a candidate.
pub trait Filter<C: ?Sized> {
    /// Short name used in category labels.
    fn name(&self) -> &str;

    /// Returns true when `candidate` passes.
    fn accept(&self, candidate: &C) -> bool;
}

/// Filter accepting everything.
#[derive(Debug, Clone)]
pub struct AcceptAll {
    name: String,
}

impl AcceptAll {
    /// Creates an accept-all filter called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl<C: ?Sized> Filter<C> for AcceptAll {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&self, _candidate: &C) -> bool {
        true
    }
}

/// Filter backed by a closure.
pub struct FnFilter<F> {
    name: String,
    predicate: F,
}

impl<F> FnFilter<F> {
    /// Creates a filter called `name` accepting what `predicate` accepts.
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<C: ?Sized, F: Fn(&C) -> bool> Filter<C> for FnFilter<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&self, candidate: &C) -> bool {
        (self.predicate)(candidate)
    }
}

impl<F> fmt::Debug for FnFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter").field("name", &self.name).finish()
    }
}

/// Ordered filters; the position of a filter is its category index.
pub struct FilterSet<C: ?Sized> {
    filters: Vec<Box<dyn Filter<C>>>,
}

impl<C: ?Sized> Default for FilterSet<C> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
        }
    }
}

impl<C: ?Sized> FilterSet<C> {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `filter` as the next category.
    pub fn push(&mut self, filter: impl Filter<C> + 'static) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Builder form of [`FilterSet::push`].
    pub fn with(mut self, filter: impl Filter<C> + 'static) -> Self {
        self.push(filter);
        self
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true when no filter is registered.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter names in category order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|filter| filter.name())
    }

    /// `<task>_<filter>` labels in category order.
    pub fn labels(&self, task: &str) -> Vec<String> {
        self.names().map(|name| category_label(task, name)).collect()
    }

    /// Categories accepting `candidate`.
    pub fn accepted(&self, candidate: &C) -> Vec<usize> {
        self.filters
            .iter()
            .enumerate()
            .filter(|(_, filter)| filter.accept(candidate))
            .map(|(category, _)| category)
            .collect()
    }
}

impl<C: ?Sized> fmt::Debug for FilterSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Category label of filter `filter` inside task `task`.
pub fn category_label(task: &str, filter: &str) -> String {
    format!("{task}_{filter}")
}
