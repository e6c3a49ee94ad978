use std::collections::BTreeMap;
use std::fmt::Write as _;

use cap_core::errors::{CapError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;
use crate::value::ParamValue;

/// Returned by [`Configuration::get_int`] when the key resolves nowhere.
pub const INT_SENTINEL: i32 = i32::MIN;
/// Returned by [`Configuration::get_long`] when the key resolves nowhere.
pub const LONG_SENTINEL: i64 = i64::MIN;
/// Returned by [`Configuration::get_double`] when the key resolves nowhere.
pub const DOUBLE_SENTINEL: f64 = f64::NAN;

/// How [`Configuration::add_parameter`] treats an existing `(path, name)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strictness {
    /// Duplicate additions fail and leave the entry untouched.
    #[default]
    Strict,
    /// Duplicate additions overwrite with a warning.
    Lenient,
}

/// A resolved parameter together with the path it was found at.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    /// Path of the matching entry (`""` for the root).
    pub origin: &'a str,
    /// The stored value.
    pub value: &'a ParamValue,
}

/// Hierarchical parameter store keyed by `(path, name)`.
///
/// Lookups start at the requesting scope and walk up through every ancestor
/// to the root path; the most specific path wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    entries: BTreeMap<String, BTreeMap<String, ParamValue>>,
    strictness: Strictness,
}

impl Configuration {
    /// Creates an empty strict configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty configuration with the given strictness.
    pub fn with_strictness(strictness: Strictness) -> Self {
        Self {
            entries: BTreeMap::new(),
            strictness,
        }
    }

    /// Current duplicate-key policy.
    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Changes the duplicate-key policy.
    pub fn set_strictness(&mut self, strictness: Strictness) {
        self.strictness = strictness;
    }

    /// Number of stored entries across all paths.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a new entry. Under [`Strictness::Strict`] an existing exact
    /// `(path, name)` is an error and nothing changes.
    pub fn add_parameter(
        &mut self,
        scope: &Scope,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), CapError> {
        let value = value.into();
        if let Some(existing) = self.get_exact(scope, name) {
            match self.strictness {
                Strictness::Strict => {
                    return Err(CapError::Config(
                        ErrorInfo::new("config-duplicate", "parameter already defined")
                            .with_context("path", scope.path())
                            .with_context("name", name)
                            .with_context("existing", existing.to_string())
                            .with_hint("use set_parameter to overwrite"),
                    ));
                }
                Strictness::Lenient => {
                    tracing::warn!(
                        path = scope.path(),
                        name,
                        old = %existing,
                        new = %value,
                        "overwriting duplicate parameter"
                    );
                }
            }
        }
        self.set_parameter(scope, name, value);
        Ok(())
    }

    /// Creates or overwrites an entry.
    pub fn set_parameter(&mut self, scope: &Scope, name: &str, value: impl Into<ParamValue>) {
        self.entries
            .entry(scope.path().to_string())
            .or_default()
            .insert(name.to_string(), value.into());
    }

    /// Inserts an entry only when the exact `(path, name)` is absent.
    /// Returns true when the entry was inserted.
    pub fn merge_default(
        &mut self,
        scope: &Scope,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> bool {
        let slot = self.entries.entry(scope.path().to_string()).or_default();
        if slot.contains_key(name) {
            return false;
        }
        slot.insert(name.to_string(), value.into());
        true
    }

    /// Copies every entry of `overrides` into `self`, overwriting.
    pub fn apply_overrides(&mut self, overrides: &Configuration) {
        for (path, params) in &overrides.entries {
            let slot = self.entries.entry(path.clone()).or_default();
            for (name, value) in params {
                slot.insert(name.clone(), value.clone());
            }
        }
    }

    /// Exact lookup without inheritance.
    pub fn get_exact(&self, scope: &Scope, name: &str) -> Option<&ParamValue> {
        self.entries.get(scope.path())?.get(name)
    }

    /// Resolves `name` for `scope`, searching its path then every ancestor path.
    pub fn resolve(&self, scope: &Scope, name: &str) -> Option<&ParamValue> {
        self.resolve_with_origin(scope, name).map(|found| found.value)
    }

    /// Like [`Configuration::resolve`] but also reports where the match was found.
    pub fn resolve_with_origin(&self, scope: &Scope, name: &str) -> Option<Resolved<'_>> {
        scope.search_paths().find_map(|path| {
            let (origin, params) = self.entries.get_key_value(path)?;
            params.get(name).map(|value| Resolved {
                origin: origin.as_str(),
                value,
            })
        })
    }

    /// Resolved boolean or `None`.
    pub fn try_bool(&self, scope: &Scope, name: &str) -> Option<bool> {
        self.typed(scope, name, "bool", ParamValue::as_bool)
    }

    /// Resolved int or `None`.
    pub fn try_int(&self, scope: &Scope, name: &str) -> Option<i32> {
        self.typed(scope, name, "int", ParamValue::as_int)
    }

    /// Resolved long or `None`.
    pub fn try_long(&self, scope: &Scope, name: &str) -> Option<i64> {
        self.typed(scope, name, "long", ParamValue::as_long)
    }

    /// Resolved double or `None`.
    pub fn try_double(&self, scope: &Scope, name: &str) -> Option<f64> {
        self.typed(scope, name, "double", ParamValue::as_double)
    }

    /// Resolved string or `None`.
    pub fn try_string(&self, scope: &Scope, name: &str) -> Option<String> {
        self.typed(scope, name, "string", |value| {
            value.as_str().map(str::to_string)
        })
    }

    /// Resolved boolean, `false` when absent.
    pub fn get_bool(&self, scope: &Scope, name: &str) -> bool {
        self.try_bool(scope, name).unwrap_or(false)
    }

    /// Resolved int, [`INT_SENTINEL`] when absent.
    pub fn get_int(&self, scope: &Scope, name: &str) -> i32 {
        self.try_int(scope, name).unwrap_or(INT_SENTINEL)
    }

    /// Resolved long, [`LONG_SENTINEL`] when absent.
    pub fn get_long(&self, scope: &Scope, name: &str) -> i64 {
        self.try_long(scope, name).unwrap_or(LONG_SENTINEL)
    }

    /// Resolved double, [`DOUBLE_SENTINEL`] (NaN) when absent.
    pub fn get_double(&self, scope: &Scope, name: &str) -> f64 {
        self.try_double(scope, name).unwrap_or(DOUBLE_SENTINEL)
    }

    /// Resolved string, empty when absent.
    pub fn get_string(&self, scope: &Scope, name: &str) -> String {
        self.try_string(scope, name).unwrap_or_default()
    }

    fn typed<T>(
        &self,
        scope: &Scope,
        name: &str,
        expected: &str,
        view: impl Fn(&ParamValue) -> Option<T>,
    ) -> Option<T> {
        let found = self.resolve_with_origin(scope, name)?;
        let typed = view(found.value);
        if typed.is_none() {
            tracing::warn!(
                path = scope.path(),
                origin = found.origin,
                name,
                expected,
                actual = found.value.type_name(),
                "parameter has an unexpected type"
            );
        }
        typed
    }

    /// Effective parameters visible from `scope` after shadowing, with their origin path.
    pub fn effective(&self, scope: &Scope) -> BTreeMap<String, (String, ParamValue)> {
        let mut visible = BTreeMap::new();
        for path in scope.search_paths() {
            if let Some(params) = self.entries.get(path) {
                for (name, value) in params {
                    visible
                        .entry(name.clone())
                        .or_insert_with(|| (path.to_string(), value.clone()));
                }
            }
        }
        visible
    }

    /// Iterates over every `(path, name, value)` in path then name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &ParamValue)> {
        self.entries.iter().flat_map(|(path, params)| {
            params
                .iter()
                .map(move |(name, value)| (path.as_str(), name.as_str(), value))
        })
    }

    /// Human readable listing, one `path:name = value` per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (path, name, value) in self.iter() {
            let path = if path.is_empty() { "<root>" } else { path };
            let _ = writeln!(out, "{path}:{name} = {value}");
        }
        out
    }

    pub(crate) fn entries(&self) -> &BTreeMap<String, BTreeMap<String, ParamValue>> {
        &self.entries
    }
}

/// Read-only view of a configuration from one scope.
#[derive(Debug, Clone, Copy)]
pub struct ScopedView<'a> {
    config: &'a Configuration,
    scope: &'a Scope,
}

impl Configuration {
    /// Binds lookups to `scope`.
    pub fn view<'a>(&'a self, scope: &'a Scope) -> ScopedView<'a> {
        ScopedView {
            config: self,
            scope,
        }
    }
}

impl<'a> ScopedView<'a> {
    /// Scope the view resolves from.
    pub fn scope(&self) -> &'a Scope {
        self.scope
    }

    /// See [`Configuration::resolve`].
    pub fn resolve(&self, name: &str) -> Option<&'a ParamValue> {
        self.config.resolve(self.scope, name)
    }

    /// See [`Configuration::get_bool`].
    pub fn get_bool(&self, name: &str) -> bool {
        self.config.get_bool(self.scope, name)
    }

    /// See [`Configuration::get_int`].
    pub fn get_int(&self, name: &str) -> i32 {
        self.config.get_int(self.scope, name)
    }

    /// See [`Configuration::get_long`].
    pub fn get_long(&self, name: &str) -> i64 {
        self.config.get_long(self.scope, name)
    }

    /// See [`Configuration::get_double`].
    pub fn get_double(&self, name: &str) -> f64 {
        self.config.get_double(self.scope, name)
    }

    /// See [`Configuration::get_string`].
    pub fn get_string(&self, name: &str) -> String {
        self.config.get_string(self.scope, name)
    }

    /// See [`Configuration::try_long`].
    pub fn try_long(&self, name: &str) -> Option<i64> {
        self.config.try_long(self.scope, name)
    }

    /// See [`Configuration::try_int`].
    pub fn try_int(&self, name: &str) -> Option<i32> {
        self.config.try_int(self.scope, name)
    }
}
