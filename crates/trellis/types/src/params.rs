//! Run parameters: declared values with lightweight schemas.
//!
//! A task declares its parameters with defaults; a caller may override
//! values before execution. Validation runs over the merged set and
//! rejects missing required values, kind mismatches, and values outside
//! a declared allowed set.

use crate::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ── Parameter Kinds ──────────────────────────────────────────────────

/// Declared kind of a parameter value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Any JSON value is accepted
    #[default]
    Any,
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    /// Check whether a value matches this kind
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        }
    }
}

// ── Parameter ────────────────────────────────────────────────────────

/// A single declared parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Current value; `Null` when no value has been supplied
    pub value: Value,
    pub kind: ParamKind,
    pub required: bool,
    /// Closed set of admissible values, when declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl Param {
    /// Untyped parameter carrying a value
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            kind: ParamKind::Any,
            required: false,
            allowed: None,
        }
    }

    /// Typed parameter carrying a value
    pub fn typed(value: impl Into<Value>, kind: ParamKind) -> Self {
        Self {
            value: value.into(),
            kind,
            required: false,
            allowed: None,
        }
    }

    /// Required parameter with no default; validation fails until a
    /// value is supplied
    pub fn required(kind: ParamKind) -> Self {
        Self {
            value: Value::Null,
            kind,
            required: true,
            allowed: None,
        }
    }

    pub fn with_allowed(mut self, allowed: Vec<Value>) -> Self {
        self.allowed = Some(allowed);
        self
    }
}

// ── Parameter Set ────────────────────────────────────────────────────

/// Ordered set of parameters for a task or a single invocation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet {
    params: BTreeMap<String, Param>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, param: Param) {
        self.params.insert(name.into(), param);
    }

    pub fn with(mut self, name: impl Into<String>, param: Param) -> Self {
        self.insert(name, param);
        self
    }

    /// Current value of a parameter
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name).map(|p| &p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Merge override values into the set.
    ///
    /// Known names have their value replaced; unknown names are added
    /// as untyped parameters.
    pub fn merge(&mut self, overrides: BTreeMap<String, Value>) {
        for (name, value) in overrides {
            match self.params.get_mut(&name) {
                Some(param) => param.value = value,
                None => {
                    self.params.insert(name, Param::new(value));
                }
            }
        }
    }

    /// Validate every declared parameter against its schema
    pub fn validate(&self) -> WorkflowResult<()> {
        for (name, param) in &self.params {
            if param.required && param.value.is_null() {
                return Err(WorkflowError::Validation(format!(
                    "param '{}' is required but has no value",
                    name
                )));
            }
            if !param.value.is_null() && !param.kind.matches(&param.value) {
                return Err(WorkflowError::Validation(format!(
                    "param '{}' expects {:?}, got {}",
                    name,
                    param.kind,
                    value_kind(&param.value)
                )));
            }
            if let Some(allowed) = &param.allowed {
                if !param.value.is_null() && !allowed.contains(&param.value) {
                    return Err(WorkflowError::Validation(format!(
                        "param '{}' value {} is not in the allowed set",
                        name, param.value
                    )));
                }
            }
        }
        Ok(())
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_params() -> ParamSet {
        ParamSet::new()
            .with("source", Param::typed("s3://input", ParamKind::String))
            .with("batch_size", Param::typed(100, ParamKind::Integer))
    }

    #[test]
    fn test_valid_set_passes() {
        assert!(make_params().validate().is_ok());
    }

    #[test]
    fn test_required_without_value_fails() {
        let params = make_params().with("target", Param::required(ParamKind::String));
        let err = params.validate().unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn test_kind_mismatch_fails() {
        let mut params = make_params();
        params.merge(BTreeMap::from([(
            "batch_size".to_string(),
            json!("not-a-number"),
        )]));
        let err = params.validate().unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn test_allowed_set_enforced() {
        let params = ParamSet::new().with(
            "mode",
            Param::typed("strict", ParamKind::String).with_allowed(vec![
                json!("strict"),
                json!("lenient"),
            ]),
        );
        assert!(params.validate().is_ok());

        let mut params = params;
        params.merge(BTreeMap::from([("mode".to_string(), json!("other"))]));
        assert!(matches!(
            params.validate(),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_merge_updates_and_adds() {
        let mut params = make_params();
        params.merge(BTreeMap::from([
            ("batch_size".to_string(), json!(500)),
            ("extra".to_string(), json!(true)),
        ]));

        assert_eq!(params.get("batch_size"), Some(&json!(500)));
        assert_eq!(params.get("extra"), Some(&json!(true)));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_required_satisfied_by_merge() {
        let mut params = ParamSet::new().with("target", Param::required(ParamKind::String));
        params.merge(BTreeMap::from([("target".to_string(), json!("s3://out"))]));
        assert!(params.validate().is_ok());
    }
}
