#![deny(missing_docs)]
#![doc = "Hierarchical scoped configuration: parameters keyed by (task path, name), resolved from the most specific path up to the root."]

/// YAML configuration files.
pub mod file;
/// Immutable ancestor scopes.
pub mod scope;
/// The parameter store and resolver.
pub mod store;
/// Typed parameter values.
pub mod value;

pub use file::{load_configuration, write_configuration, ConfigFile};
pub use scope::Scope;
pub use store::{
    Configuration, Resolved, ScopedView, Strictness, DOUBLE_SENTINEL, INT_SENTINEL,
    LONG_SENTINEL,
};
pub use value::ParamValue;
