//! Named plugin parameters and per-plugin parameter schemas
//!
//! The orchestrator hands every plugin a bag of named values. Each plugin type
//! declares a static [`ParamSchema`] listing the names it requires and the
//! names it optionally understands; anything else in the bag is ignored.
//! Presence is checked at construction time. Semantic checks (date formats,
//! ordering, numeric ranges) happen when the plugin runs, because the
//! orchestrator may only bind some values after construction.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Named parameter values bound to one plugin instance
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Parse parameters from a JSON object
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::config("Params", format!("invalid parameter object: {}", e)))
    }

    /// Raw value lookup
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// True if `name` was supplied (even as null)
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Static declaration of the parameters a plugin type understands
#[derive(Debug)]
pub struct ParamSchema {
    /// Plugin type name used in error messages
    pub plugin: &'static str,
    /// Parameters that must be present
    pub required: &'static [&'static str],
    /// Parameters that may be present
    pub optional: &'static [&'static str],
}

impl ParamSchema {
    /// All recognised parameter names: required first, then optional
    pub fn provided_params(&self) -> Vec<&'static str> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .copied()
            .collect()
    }

    /// Fail with a configuration error naming the first missing required parameter
    pub fn validate(&self, params: &Params) -> Result<()> {
        match self.required.iter().find(|name| !params.contains(name)) {
            Some(missing) => Err(self.error(format!(
                "Required parameter {} for {} not provided",
                missing, self.plugin
            ))),
            None => Ok(()),
        }
    }

    /// Configuration error attributed to this plugin
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::config(self.plugin, message)
    }

    /// Required parameter rendered as a string
    pub fn string(&self, params: &Params, name: &str) -> Result<String> {
        self.opt_string(params, name)?
            .ok_or_else(|| self.error(format!("Parameter {} for {} has no value", name, self.plugin)))
    }

    /// Optional parameter rendered as a string; absent and null are `None`
    pub fn opt_string(&self, params: &Params, name: &str) -> Result<Option<String>> {
        match params.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(self.error(format!(
                "Parameter {} for {} must be a scalar, got {}",
                name, self.plugin, other
            ))),
        }
    }

    /// Parameter given either as a JSON array or a comma separated string
    pub fn string_list(&self, params: &Params, name: &str) -> Result<Vec<String>> {
        match params.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.trim().to_string()),
                    Value::Number(n) => Ok(n.to_string()),
                    other => Err(self.error(format!(
                        "Parameter {} for {} contains a non-scalar entry {}",
                        name, self.plugin, other
                    ))),
                })
                .collect(),
            _ => Ok(self
                .string(params, name)?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()),
        }
    }

    /// Integer parameter; integer-valued strings are accepted
    pub fn integer(&self, params: &Params, name: &str) -> Result<i64> {
        let invalid = || {
            self.error(format!(
                "Parameter {} for {} must be an integer",
                name, self.plugin
            ))
        };
        match params.get(name) {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid),
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    /// Optional integer parameter; absent and null are `None`
    pub fn opt_integer(&self, params: &Params, name: &str) -> Result<Option<i64>> {
        match params.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.integer(params, name).map(Some),
        }
    }

    /// Optional EPSG code overriding a shapefile's own `.prj`
    pub fn opt_epsg(&self, params: &Params, name: &str) -> Result<Option<u16>> {
        self.opt_integer(params, name)?
            .map(|code| {
                u16::try_from(code).ok().filter(|c| *c > 0).ok_or_else(|| {
                    self.error(format!("Parameter {} for {} is not an EPSG code: {}", name, self.plugin, code))
                })
            })
            .transpose()
    }

    /// Parse an `mm/dd/YYYY` date
    pub fn date(&self, name: &str, value: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(value.trim(), "%m/%d/%Y").map_err(|_| {
            self.error(format!(
                "Error parsing {} provided to {}, please ensure format is mm/dd/YYYY (got {:?})",
                name, self.plugin, value
            ))
        })
    }

    /// Parse a pair of `mm/dd/YYYY` dates and reject a start after the end
    pub fn date_range(&self, start: &str, end: &str) -> Result<(NaiveDate, NaiveDate)> {
        let start = self.date("start date", start)?;
        let end = self.date("end date", end)?;
        if start > end {
            return Err(self.error(format!(
                "Start date cannot be later than end date in {}",
                self.plugin
            )));
        }
        Ok((start, end))
    }
}
