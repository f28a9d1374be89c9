//! Typed parameter schemas and the parameter resolver/validator
//!
//! Requests carry step parameters as free-form JSON. Each transform declares
//! a closed schema of [`ParamSpec`]s; a request is checked against it with
//! [`ParameterSchema::validate`] and only then merged over the defaults with
//! [`ParameterSchema::resolve`].

use super::transform::TransformRegistry;
use crate::error::{CloudMakerError, CloudMakerResult};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// User-supplied parameter overrides for one step
pub type ParamMap = Map<String, Value>;

/// What values a parameter accepts
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Strings and numbers; `null` too when `nullable`
    Text { nullable: bool },
    /// One of a fixed set of strings
    Choice {
        options: &'static [&'static str],
        case_insensitive: bool,
    },
    /// Whole numbers given as JSON numbers or numeric strings, with inclusive bounds
    Integer { min: Option<i64>, max: Option<i64> },
    /// Either a falsy value (`false`, `null`, `0`, `""`) or a non-empty string
    OptionalText,
}

impl ParamKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Text { nullable } => match value {
                Value::String(_) | Value::Number(_) => true,
                Value::Null => *nullable,
                _ => false,
            },
            ParamKind::Choice {
                options,
                case_insensitive,
            } => match value {
                Value::String(s) if *case_insensitive => {
                    options.iter().any(|o| o.eq_ignore_ascii_case(s))
                }
                Value::String(s) => options.contains(&s.as_str()),
                _ => false,
            },
            ParamKind::Integer { min, max } => match integer_value(value) {
                Some(n) => min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m),
                None => false,
            },
            ParamKind::OptionalText => is_falsy(value) || matches!(value, Value::String(_)),
        }
    }
}

/// Declaration of one parameter: its name, default and accepted values
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Value,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn text(name: &'static str, default: impl Into<Value>) -> Self {
        Self {
            name,
            default: default.into(),
            kind: ParamKind::Text { nullable: true },
        }
    }

    pub fn choice(
        name: &'static str,
        default: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            default: Value::from(default),
            kind: ParamKind::Choice {
                options,
                case_insensitive: false,
            },
        }
    }

    /// Choice matched without regard to ASCII case
    pub fn choice_ignore_case(
        name: &'static str,
        default: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            kind: ParamKind::Choice {
                options,
                case_insensitive: true,
            },
            ..Self::choice(name, default, options)
        }
    }

    pub fn integer(name: &'static str, default: impl Into<Value>) -> Self {
        Self {
            name,
            default: default.into(),
            kind: ParamKind::Integer {
                min: None,
                max: None,
            },
        }
    }

    pub fn bounded_integer(
        name: &'static str,
        default: impl Into<Value>,
        min: i64,
        max: i64,
    ) -> Self {
        Self {
            name,
            default: default.into(),
            kind: ParamKind::Integer {
                min: Some(min),
                max: Some(max),
            },
        }
    }

    pub fn optional_text(name: &'static str) -> Self {
        Self {
            name,
            default: Value::Bool(false),
            kind: ParamKind::OptionalText,
        }
    }

    pub fn validate(&self, value: &Value) -> bool {
        self.kind.accepts(value)
    }
}

/// The full set of parameters a transform understands
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    specs: Vec<ParamSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transform writes a blob, so every schema starts with these two
    ///
    /// Both are typed as text, so booleans, objects and arrays are rejected
    /// even though the keys themselves are free-form.
    pub fn with_output(prefix: &'static str, bucket: Option<&'static str>) -> Self {
        Self::new()
            .param(ParamSpec::text("outputPrefix", prefix))
            .param(ParamSpec::text("outputBucketName", bucket))
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.specs.iter().map(|s| s.name).collect()
    }

    pub fn defaults(&self) -> ParamMap {
        self.specs
            .iter()
            .map(|s| (s.name.to_string(), s.default.clone()))
            .collect()
    }

    /// Check every supplied key exists and passes its validator
    pub fn validate(&self, transform: &str, params: &ParamMap) -> CloudMakerResult<()> {
        for (key, value) in params {
            let spec = self.get(key).ok_or_else(|| CloudMakerError::UnexpectedParameter {
                transform: transform.to_string(),
                key: key.clone(),
                expected: self.keys().join(","),
            })?;
            if !spec.validate(value) {
                return Err(CloudMakerError::RejectedParameter {
                    transform: transform.to_string(),
                    key: key.clone(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }

    /// Defaults overwritten by the supplied values
    ///
    /// Assumes `params` already passed [`ParameterSchema::validate`].
    pub fn resolve(&self, params: &ParamMap) -> ResolvedParameters {
        let mut values = self.defaults();
        let mut supplied = BTreeSet::new();
        for (key, value) in params {
            values.insert(key.clone(), value.clone());
            supplied.insert(key.clone());
        }
        ResolvedParameters { values, supplied }
    }
}

/// Complete, validated parameter set for one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    values: ParamMap,
    supplied: BTreeSet<String>,
}

impl ResolvedParameters {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn as_map(&self) -> &ParamMap {
        &self.values
    }

    /// Whether the caller set this key rather than inheriting the default
    pub fn is_supplied(&self, key: &str) -> bool {
        self.supplied.contains(key)
    }

    /// String form of a text parameter; `None` for null, false or empty values
    pub fn text(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Non-empty string value; any falsy value reads as unset
    pub fn optional_text(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Text parameter that must be present
    pub fn require_text(&self, key: &str) -> CloudMakerResult<String> {
        self.text(key).ok_or_else(|| missing(key))
    }

    pub fn integer(&self, key: &str) -> CloudMakerResult<i64> {
        self.values
            .get(key)
            .and_then(integer_value)
            .ok_or_else(|| missing(key))
    }

    /// String items of a list parameter; empty when absent
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A new parameter set with `key` added or replaced
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.values.insert(key.into(), value.into());
        next
    }
}

impl From<ParamMap> for ResolvedParameters {
    fn from(values: ParamMap) -> Self {
        Self {
            values,
            supplied: BTreeSet::new(),
        }
    }
}

fn missing(key: &str) -> CloudMakerError {
    CloudMakerError::Internal(format!("Parameter {} is missing or has the wrong type", key))
}

/// Check `params` against the schema of the transform called `name`
pub fn validate_parameters(
    registry: &TransformRegistry,
    name: &str,
    params: &ParamMap,
) -> CloudMakerResult<()> {
    registry.require(name)?.schema().validate(name, params)
}

/// Full parameter set for the transform called `name`
pub fn resolve_parameters(
    registry: &TransformRegistry,
    name: &str,
    params: &ParamMap,
) -> CloudMakerResult<ResolvedParameters> {
    Ok(registry.require(name)?.schema().resolve(params))
}

/// Integer reading of a JSON number or numeric string
pub fn integer_value(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            n.as_f64()?
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    let in_range = number >= i64::MIN as f64 && number <= i64::MAX as f64;
    (number.is_finite() && number.fract() == 0.0 && in_range).then(|| number as i64)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAnnotationService, MockImageEngine};
    use serde_json::json;

    fn params(value: Value) -> ParamMap {
        value.as_object().cloned().unwrap()
    }

    fn test_schema() -> ParameterSchema {
        ParameterSchema::new().param(ParamSpec::text("outputBucketName", "cloud-maker-outputs"))
    }

    #[test]
    fn test_integer_kind() {
        let width = ParamSpec::integer("width", 200);
        let valid_values = [
            json!(200),
            json!("200"),
            json!(" 20 "),
            json!(30.0),
            json!("1e3"),
            json!(-4),
        ];
        for valid in valid_values {
            assert!(width.validate(&valid), "expected {} to be accepted", valid);
        }
        for invalid in [
            json!("foo"),
            json!(30.01),
            json!("1.1"),
            json!(""),
            json!(null),
            json!(true),
            json!({}),
            json!([1]),
        ] {
            assert!(!width.validate(&invalid), "expected {} to be rejected", invalid);
        }
    }

    #[test]
    fn test_bounded_integer_kind() {
        let border = ParamSpec::bounded_integer("width", "1", 1, 100);
        for valid in [json!(10), json!("20"), json!(30.0), json!(1), json!(100)] {
            assert!(border.validate(&valid));
        }
        for invalid in [json!(200), json!("foo"), json!(30.01), json!(0), json!("101")] {
            assert!(!border.validate(&invalid));
        }
    }

    #[test]
    fn test_choice_kinds() {
        let axis = ParamSpec::choice("axis", "x", &["x", "y"]);
        assert!(axis.validate(&json!("x")));
        assert!(axis.validate(&json!("y")));
        for invalid in [json!("a"), json!("z"), json!(null), json!(false), json!("X")] {
            assert!(!axis.validate(&invalid));
        }

        let color = ParamSpec::choice_ignore_case("color", "blue", &["blue", "green"]);
        assert!(color.validate(&json!("BLUE")));
        assert!(!color.validate(&json!("magenta")));
        assert!(!color.validate(&json!("0")));
    }

    #[test]
    fn test_optional_text_kind() {
        let caption = ParamSpec::optional_text("caption");
        for valid in [json!(false), json!("a"), json!(null), json!(0), json!("")] {
            assert!(caption.validate(&valid));
        }
        for invalid in [json!(true), json!({}), json!(1)] {
            assert!(!caption.validate(&invalid));
        }
    }

    #[test]
    fn test_validate_accepts_empty_and_known_keys() {
        let schema = test_schema();
        assert!(schema.validate("testFunction", &ParamMap::new()).is_ok());
        assert!(schema
            .validate("testFunction", &params(json!({"outputBucketName": "asdf"})))
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_key() {
        let err = test_schema()
            .validate("testFunction", &params(json!({"aBadParameter": 1})))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter aBadParameter not expected for function testFunction. Expected one of outputBucketName"
        );
    }

    #[test]
    fn test_validate_rejects_bad_value() {
        let schema = ParameterSchema::new().param(ParamSpec::choice("axis", "x", &["x", "y"]));
        let err = schema
            .validate("reflectTransform", &params(json!({"axis": "z"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Parameter axis with value z was rejected by reflectTransform");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_resolve_empty_is_defaults() {
        let schema = ParameterSchema::with_output("resized", Some("cloud-maker-outputs-resized"))
            .param(ParamSpec::integer("width", 200));
        let resolved = schema.resolve(&ParamMap::new());
        assert_eq!(resolved.as_map(), &schema.defaults());
        assert!(!resolved.is_supplied("width"));
    }

    #[test]
    fn test_resolve_overrides_only_supplied_keys() {
        let schema = ParameterSchema::with_output("resized", Some("cloud-maker-outputs-resized"))
            .param(ParamSpec::integer("width", 200))
            .param(ParamSpec::integer("height", 200));
        let resolved = schema.resolve(&params(json!({"width": "640"})));

        assert_eq!(resolved.get("width"), Some(&json!("640")));
        assert_eq!(resolved.get("height"), Some(&json!(200)));
        assert_eq!(resolved.text("outputPrefix").as_deref(), Some("resized"));
        assert!(resolved.is_supplied("width"));
        assert!(!resolved.is_supplied("height"));
        assert_eq!(resolved.integer("width").unwrap(), 640);
    }

    #[test]
    fn test_nullable_default_reads_as_none() {
        let schema = ParameterSchema::with_output("safe", None);
        let resolved = schema.resolve(&ParamMap::new());
        assert_eq!(resolved.get("outputBucketName"), Some(&Value::Null));
        assert_eq!(resolved.text("outputBucketName"), None);
    }

    #[test]
    fn test_with_builds_new_record() {
        let base = test_schema().resolve(&ParamMap::new());
        let enriched = base.with("caption", "a cat");
        assert_eq!(enriched.text("caption").as_deref(), Some("a cat"));
        assert!(base.get("caption").is_none());
    }

    fn registry() -> TransformRegistry {
        TransformRegistry::builtin(
            std::sync::Arc::new(MockImageEngine::new()),
            std::sync::Arc::new(MockAnnotationService::new()),
        )
    }

    #[test]
    fn test_validate_parameters_by_name() {
        let registry = registry();
        let width = params(json!({"width": 10}));
        assert!(validate_parameters(&registry, "resizeTransform", &width).is_ok());

        let err = validate_parameters(&registry, "sharpenTransform", &ParamMap::new()).unwrap_err();
        assert!(matches!(err, CloudMakerError::UnknownTransform(_)));

        let err = validate_parameters(
            &registry,
            "resizeTransform",
            &params(json!({"outputPrefix": false})),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter outputPrefix with value false was rejected by resizeTransform"
        );
    }

    #[test]
    fn test_resolve_parameters_by_name() {
        let registry = registry();
        let width = params(json!({"width": 64}));
        let resolved = resolve_parameters(&registry, "resizeTransform", &width).unwrap();
        assert_eq!(resolved.integer("width").unwrap(), 64);
        assert_eq!(resolved.integer("height").unwrap(), 200);
        assert!(!resolved.is_supplied("height"));

        assert!(resolve_parameters(&registry, "sharpenTransform", &ParamMap::new()).is_err());
    }

    #[test]
    fn test_param_replaces_duplicate_names() {
        let schema = ParameterSchema::with_output("shape", None)
            .param(ParamSpec::text("outputPrefix", "other"));
        assert_eq!(schema.keys(), vec!["outputBucketName", "outputPrefix"]);
        assert_eq!(schema.defaults()["outputPrefix"], json!("other"));
    }
}
