//! Parameter rule evaluation.
//!
//! A shallow, synchronous validator for transport-level parameters (path,
//! query, header, cookie). Each [`ParameterSpec`] carries an ordered list of
//! [`ValidationRule`]s; the first failing rule decides the error message.

use crate::error::ValidationError;
use crate::operation::ParameterSpec;
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Category of a validation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Required,
    Min,
    Max,
    Pattern,
    Enum,
    Email,
    Url,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Min => "min",
            Self::Max => "max",
            Self::Pattern => "pattern",
            Self::Enum => "enum",
            Self::Email => "email",
            Self::Url => "url",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison value attached to a rule.
///
/// For `min`/`max` the variant decides the interpretation: `Number` is a
/// numeric bound on the parsed value, `Length` is a bound on the byte length.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    Number(f64),
    Length(usize),
    Pattern(String),
    Set(Vec<Value>),
    None,
}

/// A single declarative check on a parameter value
#[derive(Debug, Clone)]
pub struct ValidationRule {
    kind: RuleKind,
    value: RuleValue,
    message: String,
    regex: Option<Regex>,
}

impl ValidationRule {
    /// Create a rule from its parts
    pub fn new(kind: RuleKind, value: RuleValue, message: impl Into<String>) -> Self {
        let regex = match (&kind, &value) {
            (RuleKind::Pattern, RuleValue::Pattern(source)) => Regex::new(source).ok(),
            _ => None,
        };
        Self {
            kind,
            value,
            message: message.into(),
            regex,
        }
    }

    /// Value must not be blank
    pub fn required(message: impl Into<String>) -> Self {
        Self::new(RuleKind::Required, RuleValue::None, message)
    }

    /// Numeric lower bound (inclusive). Non-numeric input skips the rule.
    pub fn min(threshold: f64, message: impl Into<String>) -> Self {
        Self::new(RuleKind::Min, RuleValue::Number(threshold), message)
    }

    /// Numeric upper bound (inclusive). Non-numeric input skips the rule.
    pub fn max(threshold: f64, message: impl Into<String>) -> Self {
        Self::new(RuleKind::Max, RuleValue::Number(threshold), message)
    }

    /// Minimum length in bytes
    pub fn min_length(length: usize, message: impl Into<String>) -> Self {
        Self::new(RuleKind::Min, RuleValue::Length(length), message)
    }

    /// Maximum length in bytes
    pub fn max_length(length: usize, message: impl Into<String>) -> Self {
        Self::new(RuleKind::Max, RuleValue::Length(length), message)
    }

    /// Value must contain a match for the regular expression
    pub fn pattern(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RuleKind::Pattern, RuleValue::Pattern(source.into()), message)
    }

    /// Value must equal one of the given values once stringified
    pub fn one_of<I, V>(values: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set = values.into_iter().map(Into::into).collect();
        Self::new(RuleKind::Enum, RuleValue::Set(set), message)
    }

    /// Minimal structural email check
    pub fn email(message: impl Into<String>) -> Self {
        Self::new(RuleKind::Email, RuleValue::None, message)
    }

    /// Value must be an absolute URI or absolute path
    pub fn url(message: impl Into<String>) -> Self {
        Self::new(RuleKind::Url, RuleValue::None, message)
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn value(&self) -> &RuleValue {
        &self.value
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Evaluate the rule against a present value
    pub fn check(&self, field: &str, value: &str) -> Result<(), ValidationError> {
        let passed = match (self.kind, &self.value) {
            (RuleKind::Required, _) => !value.trim().is_empty(),
            (RuleKind::Min, RuleValue::Number(min)) => match value.parse::<f64>() {
                Ok(number) => number >= *min,
                Err(_) => true,
            },
            (RuleKind::Min, RuleValue::Length(min)) => value.len() >= *min,
            (RuleKind::Max, RuleValue::Number(max)) => match value.parse::<f64>() {
                Ok(number) => number <= *max,
                Err(_) => true,
            },
            (RuleKind::Max, RuleValue::Length(max)) => value.len() <= *max,
            (RuleKind::Pattern, RuleValue::Pattern(source)) => match &self.regex {
                Some(regex) => regex.is_match(value),
                None => {
                    let error = self.fail(field);
                    return Err(match Regex::new(source) {
                        Err(cause) => error.with_cause(cause),
                        Ok(_) => error,
                    });
                }
            },
            (RuleKind::Enum, RuleValue::Set(values)) => {
                values.iter().any(|candidate| stringify(candidate) == value)
            }
            (RuleKind::Email, _) => value.contains('@') && value.contains('.'),
            (RuleKind::Url, _) => is_request_uri(value),
            // Comparison value of the wrong shape: rule does not apply.
            _ => true,
        };

        if passed {
            Ok(())
        } else {
            Err(self.fail(field))
        }
    }

    fn fail(&self, field: &str) -> ValidationError {
        ValidationError::new(field, self.kind, self.message.clone())
    }
}

/// Validate a raw parameter value against its spec.
///
/// `None` means the parameter was absent from the request; `Some("")` means
/// it was present but empty. Both pass for optional parameters and fail for
/// required ones.
pub fn validate(spec: &ParameterSpec, raw: Option<&str>) -> Result<(), ValidationError> {
    let value = match raw {
        Some(value) if !value.is_empty() => value,
        _ if spec.required => {
            return Err(ValidationError::new(
                spec.name.clone(),
                RuleKind::Required,
                format!("missing required parameter: {}", spec.name),
            ));
        }
        _ => return Ok(()),
    };

    spec.rules
        .iter()
        .try_for_each(|rule| rule.check(&spec.name, value))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_request_uri(value: &str) -> bool {
    if value.starts_with('/') {
        return !value.chars().any(|c| c.is_whitespace() || c.is_control());
    }
    url::Url::parse(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ParameterLocation;

    fn query(name: &str, required: bool, rules: Vec<ValidationRule>) -> ParameterSpec {
        ParameterSpec::new(name, ParameterLocation::Query)
            .required(required)
            .with_rules(rules)
    }

    #[test]
    fn test_absent_required_fails() {
        let spec = query("limit", true, vec![]);
        let error = validate(&spec, None).unwrap_err();
        assert!(error.is_missing());
        assert_eq!(error.field, "limit");
        assert_eq!(error.message, "missing required parameter: limit");

        assert!(validate(&spec, Some("")).unwrap_err().is_missing());
    }

    #[test]
    fn test_optional_absent_or_empty_skips_rules() {
        let spec = query(
            "filter",
            false,
            vec![ValidationRule::pattern("^[a-z]+$", "lowercase only")],
        );
        assert!(validate(&spec, None).is_ok());
        assert!(validate(&spec, Some("")).is_ok());
        assert!(validate(&spec, Some("ABC")).is_err());
    }

    #[test]
    fn test_numeric_min_skips_non_numeric() {
        let spec = query("age", true, vec![ValidationRule::min(18.0, "too young")]);
        assert!(validate(&spec, Some("20")).is_ok());
        assert!(validate(&spec, Some("18")).is_ok());
        assert_eq!(validate(&spec, Some("15")).unwrap_err().message, "too young");
        // Threshold is numeric, the value is not: the rule does not apply.
        assert!(validate(&spec, Some("abc")).is_ok());
    }

    #[test]
    fn test_numeric_max() {
        let spec = query("limit", true, vec![ValidationRule::max(100.0, "too many")]);
        assert!(validate(&spec, Some("100")).is_ok());
        assert!(validate(&spec, Some("100.5")).is_err());
        assert!(validate(&spec, Some("lots")).is_ok());
    }

    #[test]
    fn test_length_bounds() {
        let spec = query(
            "name",
            true,
            vec![
                ValidationRule::min_length(3, "name too short"),
                ValidationRule::max_length(5, "name too long"),
            ],
        );
        assert!(validate(&spec, Some("bob")).is_ok());
        assert_eq!(validate(&spec, Some("al")).unwrap_err().message, "name too short");
        assert_eq!(validate(&spec, Some("robert")).unwrap_err().message, "name too long");
        // Length bounds apply to numeric-looking input too.
        assert!(validate(&spec, Some("12")).is_err());
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let spec = query(
            "code",
            true,
            vec![
                ValidationRule::min_length(10, "first"),
                ValidationRule::pattern("^x", "second"),
            ],
        );
        let error = validate(&spec, Some("abc")).unwrap_err();
        assert_eq!(error.message, "first");
        assert_eq!(error.kind, RuleKind::Min);
    }

    #[test]
    fn test_pattern_rules() {
        let rule = ValidationRule::pattern(r"\d{3}", "needs three digits");
        assert!(rule.check("code", "ab123").is_ok());
        assert!(rule.check("code", "ab12").is_err());

        let broken = ValidationRule::pattern("(", "broken pattern");
        let error = broken.check("code", "anything").unwrap_err();
        assert_eq!(error.message, "broken pattern");
        assert!(error.cause.is_some());
    }

    #[test]
    fn test_enum_rule_stringifies_values() {
        let rule = ValidationRule::one_of(
            vec![Value::from("asc"), Value::from("desc"), Value::from(10)],
            "bad order",
        );
        assert!(rule.check("order", "asc").is_ok());
        assert!(rule.check("order", "10").is_ok());
        assert!(rule.check("order", "\"asc\"").is_err());
        assert!(rule.check("order", "random").is_err());
    }

    #[test]
    fn test_email_rule() {
        let rule = ValidationRule::email("bad email");
        assert!(rule.check("email", "user@example.com").is_ok());
        assert!(rule.check("email", "user@localhost").is_err());
        assert!(rule.check("email", "user.example.com").is_err());
    }

    #[test]
    fn test_url_rule() {
        let rule = ValidationRule::url("bad url");
        assert!(rule.check("callback", "https://example.com/hook").is_ok());
        assert!(rule.check("callback", "/relative/path").is_ok());
        assert!(rule.check("callback", "not a url").is_err());
        assert!(rule.check("callback", "example").is_err());
    }

    #[test]
    fn test_required_rule_rejects_blank() {
        let rule = ValidationRule::required("must not be blank");
        assert!(rule.check("token", "abc").is_ok());
        assert!(rule.check("token", "   ").is_err());
    }

    #[test]
    fn test_mismatched_value_is_not_applicable() {
        let rule = ValidationRule::new(RuleKind::Pattern, RuleValue::Number(1.0), "never");
        assert!(rule.check("field", "value").is_ok());

        let rule = ValidationRule::new(RuleKind::Min, RuleValue::Pattern("x".into()), "never");
        assert!(rule.check("field", "value").is_ok());
    }
}
