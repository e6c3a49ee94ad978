//! `--set [path:]name=value` command line overrides.

use cap_config::{Configuration, ParamValue, Scope};
use cap_core::errors::{CapError, ErrorInfo};

/// One parsed override.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    /// Scope the value is set at; the root when no path is given.
    pub scope: Scope,
    /// Parameter name.
    pub name: String,
    /// Value, typed the way YAML would type it.
    pub value: ParamValue,
}

/// Parses `[path:]name=value`.
pub fn parse_override(arg: &str) -> Result<Override, CapError> {
    let invalid = |message: &str| {
        CapError::Config(
            ErrorInfo::new("override-syntax", message)
                .with_context("override", arg)
                .with_hint("expected [path:]name=value"),
        )
    };
    let (key, raw) = arg.split_once('=').ok_or_else(|| invalid("missing '='"))?;
    let (path, name) = key.rsplit_once(':').unwrap_or(("", key));
    if name.is_empty() {
        return Err(invalid("empty parameter name"));
    }
    let value: ParamValue = serde_yaml::from_str(raw).map_err(|err| invalid(&err.to_string()))?;
    Ok(Override {
        scope: Scope::from_path(path)?,
        name: name.to_owned(),
        value,
    })
}

/// Applies every override with `set_parameter` semantics.
pub fn apply_overrides(config: &mut Configuration, args: &[String]) -> Result<(), CapError> {
    for arg in args {
        let parsed = parse_override(arg)?;
        config.set_parameter(&parsed.scope, &parsed.name, parsed.value);
    }
    Ok(())
}
