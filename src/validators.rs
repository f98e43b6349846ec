//! Validators - Pure Predicates Producing Error Codes
//!
//! A validator never mutates and never panics on malformed input:
//! a non-numeric value handed to a range check IS the failing condition.

use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Error-code to detail map for one field or group.
///
/// BTreeMap keeps iteration/serialization order deterministic.
pub type ErrorSet = BTreeMap<String, Value>;

pub mod codes {
    pub const REQUIRED: &str = "required";
    pub const MINLENGTH: &str = "minlength";
    pub const MAXLENGTH: &str = "maxlength";
    pub const PATTERN: &str = "pattern";
    pub const RANGE: &str = "range";
    pub const MATCH: &str = "match";
}

/// Empty means "no value yet": null or the empty string.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

// UI inputs deliver numbers as strings; both forms are accepted.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Single-field validator: pass, or fail with this validator's code.
pub trait Validator {
    fn code(&self) -> &'static str;

    /// `None` = pass, `Some(detail)` = fail with `code()`.
    fn check(&self, value: &Value) -> Option<Value>;
}

/// Fails on an empty value. Every other validator treats empty as a pass;
/// optionality is exclusively this rule's concern.
pub struct Required;

impl Validator for Required {
    fn code(&self) -> &'static str {
        codes::REQUIRED
    }

    fn check(&self, value: &Value) -> Option<Value> {
        if is_empty(value) {
            Some(json!(true))
        } else {
            None
        }
    }
}

pub struct MinLength {
    pub min: usize,
}

impl Validator for MinLength {
    fn code(&self) -> &'static str {
        codes::MINLENGTH
    }

    fn check(&self, value: &Value) -> Option<Value> {
        if is_empty(value) {
            return None;
        }
        let s = value.as_str()?;
        let actual = s.chars().count();
        if actual < self.min {
            Some(json!({"requiredLength": self.min, "actualLength": actual}))
        } else {
            None
        }
    }
}

pub struct MaxLength {
    pub max: usize,
}

impl Validator for MaxLength {
    fn code(&self) -> &'static str {
        codes::MAXLENGTH
    }

    fn check(&self, value: &Value) -> Option<Value> {
        if is_empty(value) {
            return None;
        }
        let s = value.as_str()?;
        let actual = s.chars().count();
        if actual > self.max {
            Some(json!({"requiredLength": self.max, "actualLength": actual}))
        } else {
            None
        }
    }
}

/// Regex mismatch check. Empty passes; a non-string value fails.
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl Validator for Pattern {
    fn code(&self) -> &'static str {
        codes::PATTERN
    }

    fn check(&self, value: &Value) -> Option<Value> {
        if is_empty(value) {
            return None;
        }
        let detail = json!({"requiredPattern": self.regex.as_str(), "actual": value.clone()});
        match value.as_str() {
            Some(s) if self.regex.is_match(s) => None,
            _ => Some(detail),
        }
    }
}

/// Inclusive numeric window, e.g. a 1-5 rating. The field stays optional:
/// empty passes, anything non-numeric or outside `[min, max]` fails.
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Validator for Range {
    fn code(&self) -> &'static str {
        codes::RANGE
    }

    fn check(&self, value: &Value) -> Option<Value> {
        if is_empty(value) {
            return None;
        }
        let detail = json!({"min": self.min, "max": self.max, "actual": value.clone()});
        match as_number(value) {
            Some(n) if n >= self.min && n <= self.max => None,
            _ => Some(detail),
        }
    }
}

/// Read access a group validator gets to its sibling fields.
///
/// Returns `None` for a missing child or one that is a nested group.
pub trait GroupView {
    fn child_value(&self, name: &str) -> Option<&Value>;
    fn child_dirty(&self, name: &str) -> Option<bool>;
    fn child_touched(&self, name: &str) -> Option<bool>;

    fn child_pristine(&self, name: &str) -> Option<bool> {
        self.child_dirty(name).map(|d| !d)
    }
}

/// Cross-field validator: sees the whole group, not one value.
pub trait GroupValidator {
    fn code(&self) -> &'static str;
    fn check(&self, group: &dyn GroupView) -> Option<Value>;
}

/// Two sibling fields must hold equal values.
///
/// Suppressed while either side is pristine: the user has not been asked
/// to reconcile fields they have not filled in yet. This is deliberate
/// UX policy, not an optimization.
pub struct FieldsMatch {
    pub left: String,
    pub right: String,
}

impl GroupValidator for FieldsMatch {
    fn code(&self) -> &'static str {
        codes::MATCH
    }

    fn check(&self, group: &dyn GroupView) -> Option<Value> {
        let left_pristine = group.child_pristine(&self.left).unwrap_or(true);
        let right_pristine = group.child_pristine(&self.right).unwrap_or(true);
        if left_pristine || right_pristine {
            return None;
        }
        if group.child_value(&self.left) == group.child_value(&self.right) {
            None
        } else {
            Some(json!({"left": self.left, "right": self.right}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fails_on_empty() {
        assert!(Required.check(&Value::Null).is_some());
        assert!(Required.check(&json!("")).is_some());
        assert!(Required.check(&json!("x")).is_none());
        assert!(Required.check(&json!(0)).is_none());
    }

    #[test]
    fn test_minlength_boundary() {
        let v = MinLength { min: 3 };
        assert!(v.check(&json!("Al")).is_some());
        assert!(v.check(&json!("Ali")).is_none());
        assert!(v.check(&json!("Alice")).is_none());
        // Empty is the required validator's concern
        assert!(v.check(&json!("")).is_none());
        assert!(v.check(&Value::Null).is_none());
    }

    #[test]
    fn test_minlength_detail_reports_lengths() {
        let detail = MinLength { min: 3 }.check(&json!("Al")).unwrap();
        assert_eq!(detail["requiredLength"], json!(3));
        assert_eq!(detail["actualLength"], json!(2));
    }

    #[test]
    fn test_maxlength_boundary() {
        let v = MaxLength { max: 5 };
        assert!(v.check(&json!("Alice")).is_none());
        assert!(v.check(&json!("Alicia")).is_some());
    }

    #[test]
    fn test_range_inclusive_window() {
        let v = Range::new(1.0, 5.0);
        for n in 1..=5 {
            assert!(v.check(&json!(n)).is_none(), "in-window {} must pass", n);
        }
        assert!(v.check(&json!(0)).is_some());
        assert!(v.check(&json!(6)).is_some());
    }

    #[test]
    fn test_range_empty_passes() {
        let v = Range::new(1.0, 5.0);
        assert!(v.check(&Value::Null).is_none());
        assert!(v.check(&json!("")).is_none());
    }

    #[test]
    fn test_range_non_numeric_fails_not_panics() {
        let v = Range::new(1.0, 5.0);
        assert!(v.check(&json!("not a number")).is_some());
        assert!(v.check(&json!({"nested": true})).is_some());
        assert!(v.check(&json!(true)).is_some());
    }

    #[test]
    fn test_range_accepts_numeric_strings() {
        let v = Range::new(1.0, 5.0);
        assert!(v.check(&json!("3")).is_none());
        assert!(v.check(&json!(" 4.5 ")).is_none());
        assert!(v.check(&json!("9")).is_some());
    }

    #[test]
    fn test_pattern_email_shaped() {
        let v = Pattern::new(r"^[^@ ]+@[^@ ]+\.[^@ ]+$").unwrap();
        assert!(v.check(&json!("a@b.com")).is_none());
        assert!(v.check(&json!("not-an-email")).is_some());
        assert!(v.check(&json!("")).is_none());
        // Non-strings cannot match a pattern
        assert!(v.check(&json!(42)).is_some());
    }

    struct FakeView {
        fields: Vec<(String, Value, bool)>, // name, value, dirty
    }

    impl GroupView for FakeView {
        fn child_value(&self, name: &str) -> Option<&Value> {
            self.fields.iter().find(|(n, _, _)| n == name).map(|(_, v, _)| v)
        }
        fn child_dirty(&self, name: &str) -> Option<bool> {
            self.fields.iter().find(|(n, _, _)| n == name).map(|(_, _, d)| *d)
        }
        fn child_touched(&self, _name: &str) -> Option<bool> {
            Some(false)
        }
    }

    fn match_validator() -> FieldsMatch {
        FieldsMatch {
            left: "email".to_string(),
            right: "confirmEmail".to_string(),
        }
    }

    #[test]
    fn test_fields_match_suppressed_while_pristine() {
        let view = FakeView {
            fields: vec![
                ("email".to_string(), json!("a@b.com"), true),
                ("confirmEmail".to_string(), json!(""), false),
            ],
        };
        assert!(match_validator().check(&view).is_none());
    }

    #[test]
    fn test_fields_match_both_dirty() {
        let differ = FakeView {
            fields: vec![
                ("email".to_string(), json!("a@b.com"), true),
                ("confirmEmail".to_string(), json!("x@y.com"), true),
            ],
        };
        assert!(match_validator().check(&differ).is_some());

        let equal = FakeView {
            fields: vec![
                ("email".to_string(), json!("a@b.com"), true),
                ("confirmEmail".to_string(), json!("a@b.com"), true),
            ],
        };
        assert!(match_validator().check(&equal).is_none());
    }
}
