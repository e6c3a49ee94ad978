use std::fmt::{self, Display};

use cap_core::errors::{CapError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Separator between ancestor names in a scope path.
pub const SEPARATOR: char = '/';

/// Immutable stack of ancestor task names.
///
/// The root scope has no segments and the path `""`. A task named `Analyzer`
/// under a task named `Run` lives at `Run/Analyzer`. Ancestor paths are
/// derived from cached prefix offsets so lookups never rebuild strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope {
    path: String,
    ends: Vec<usize>,
}

impl Scope {
    /// The configuration root (`""`).
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds the scope of a child named `name`.
    pub fn child(&self, name: &str) -> Result<Self, CapError> {
        validate_name(name)?;
        let mut path = self.path.clone();
        if !path.is_empty() {
            path.push(SEPARATOR);
        }
        path.push_str(name);
        let mut ends = self.ends.clone();
        ends.push(path.len());
        Ok(Self { path, ends })
    }

    /// Parses a `/`-separated path. The empty string is the root.
    pub fn from_path(path: &str) -> Result<Self, CapError> {
        let mut scope = Self::root();
        if path.is_empty() {
            return Ok(scope);
        }
        for name in path.split(SEPARATOR) {
            scope = scope.child(name)?;
        }
        Ok(scope)
    }

    /// Fully-qualified path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of segments; zero for the root.
    pub fn depth(&self) -> usize {
        self.ends.len()
    }

    /// Returns true for the root scope.
    pub fn is_root(&self) -> bool {
        self.ends.is_empty()
    }

    /// Last segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        let end = *self.ends.last()?;
        let start = match self.ends.len() {
            1 => 0,
            n => self.ends[n - 2] + 1,
        };
        Some(&self.path[start..end])
    }

    /// Scope of the parent, `None` for the root.
    pub fn parent(&self) -> Option<Scope> {
        if self.ends.is_empty() {
            return None;
        }
        let ends = self.ends[..self.ends.len() - 1].to_vec();
        let path = ends
            .last()
            .map(|&end| self.path[..end].to_string())
            .unwrap_or_default();
        Some(Self { path, ends })
    }

    /// Paths searched during resolution: this path, each ancestor, then `""`.
    pub fn search_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.ends
            .iter()
            .rev()
            .map(move |&end| &self.path[..end])
            .chain(std::iter::once(""))
    }

    /// Returns true when `self` equals `other` or lies below it.
    pub fn is_within(&self, other: &Scope) -> bool {
        self.ends.len() >= other.ends.len() && self.search_paths().any(|p| p == other.path)
    }
}

fn validate_name(name: &str) -> Result<(), CapError> {
    if name.is_empty() || name.contains(SEPARATOR) {
        return Err(CapError::Config(
            ErrorInfo::new("scope-name", "task names must be non-empty and contain no '/'")
                .with_context("name", name),
        ));
    }
    Ok(())
}

impl Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.path)
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = CapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Scope::from_path(&value)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.path
    }
}
