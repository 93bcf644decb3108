//! Environment variable access for config overrides.
//!
//! Production code reads the process environment through [`Env::real()`].
//! Tests build an [`Env::mock()`] from a fixed map so config layering can be
//! exercised without touching global process state.

use std::collections::HashMap;
use std::str::FromStr;

/// Environment variable reader.
#[derive(Clone, Debug, Default)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    /// Read from the real process environment.
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// Read from explicit key-value pairs only.
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Look up a variable. Empty values count as unset.
    pub fn var(&self, name: &str) -> Option<String> {
        let value = match &self.overrides {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        }?;
        let value = value.trim().to_string();
        (!value.is_empty()).then_some(value)
    }

    /// Parse a variable into `T`.
    ///
    /// Returns `None` when unset and `Some(Err(raw))` when the value does
    /// not parse, so callers can warn with the offending text.
    pub fn parsed<T: FromStr>(&self, name: &str) -> Option<Result<T, String>> {
        self.var(name).map(|raw| raw.parse::<T>().map_err(|_| raw))
    }

    /// Split a comma-separated variable into its non-empty items.
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        let items: Vec<String> = self
            .var(name)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        (!items.is_empty()).then_some(items)
    }

    /// Interpret a variable as a boolean switch.
    pub fn flag(&self, name: &str) -> Option<Result<bool, String>> {
        self.var(name).map(|raw| match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(raw),
        })
    }
}
