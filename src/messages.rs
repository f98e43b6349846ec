//! Validation Message Catalog
//!
//! Display-side only: maps error codes to human-readable text. Validation
//! logic never consults it.

use std::collections::HashMap;

use crate::engine::{EngineError, FormEngine};
use crate::validators::codes;

pub struct MessageCatalog {
    messages: HashMap<String, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
        }
    }

    /// English defaults for the engine's built-in codes.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.insert(codes::REQUIRED, "Please enter a value.");
        catalog.insert(codes::PATTERN, "Please enter a valid value.");
        catalog.insert(codes::MINLENGTH, "The value is too short.");
        catalog.insert(codes::MAXLENGTH, "The value is too long.");
        catalog.insert(codes::RANGE, "Please enter a value in the allowed range.");
        catalog.insert(codes::MATCH, "The confirmation does not match.");
        catalog
    }

    pub fn insert(&mut self, code: &str, message: &str) {
        self.messages.insert(code.to_string(), message.to_string());
    }

    pub fn message_for(&self, code: &str) -> Option<&str> {
        self.messages.get(code).map(String::as_str)
    }

    /// Feedback string for one field: empty until the group's surface
    /// policy opens the gate, then every present code mapped through the
    /// catalog (unknown codes fall back to the code itself) and joined.
    pub fn feedback_for(&self, engine: &FormEngine, path: &str) -> Result<String, EngineError> {
        let state = engine.display_state(path)?;
        if !state.policy.surfaced(state.dirty, state.touched) {
            return Ok(String::new());
        }
        let parts: Vec<&str> = state
            .errors
            .keys()
            .map(|code| self.message_for(code).unwrap_or(code.as_str()))
            .collect();
        Ok(parts.join(" "))
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, GroupSpec, Schema, SurfacePolicy, ValidatorSpec};
    use serde_json::json;

    fn name_schema(policy: SurfacePolicy) -> Schema {
        Schema {
            name: "t".to_string(),
            root: GroupSpec::new().surface(policy).field(
                "firstName",
                FieldSpec::new()
                    .validator(ValidatorSpec::Required)
                    .validator(ValidatorSpec::MinLength { min: 3 }),
            ),
        }
    }

    #[test]
    fn test_no_feedback_while_untouched_and_pristine() {
        let engine = FormEngine::from_schema(&name_schema(SurfacePolicy::TouchedOrDirty)).unwrap();
        let catalog = MessageCatalog::with_defaults();
        // Field is invalid (required) but nothing is surfaced yet
        assert!(!engine.is_valid("firstName").unwrap());
        assert_eq!(catalog.feedback_for(&engine, "firstName").unwrap(), "");
    }

    #[test]
    fn test_feedback_after_dirty() {
        let mut engine =
            FormEngine::from_schema(&name_schema(SurfacePolicy::TouchedOrDirty)).unwrap();
        engine.set_value("firstName", json!("Al")).unwrap();
        let catalog = MessageCatalog::with_defaults();
        assert_eq!(
            catalog.feedback_for(&engine, "firstName").unwrap(),
            "The value is too short."
        );
    }

    #[test]
    fn test_touched_and_dirty_policy_needs_both() {
        let mut engine =
            FormEngine::from_schema(&name_schema(SurfacePolicy::TouchedAndDirty)).unwrap();
        let catalog = MessageCatalog::with_defaults();

        engine.set_value("firstName", json!("Al")).unwrap();
        assert_eq!(catalog.feedback_for(&engine, "firstName").unwrap(), "");

        engine.mark_touched("firstName").unwrap();
        assert_eq!(
            catalog.feedback_for(&engine, "firstName").unwrap(),
            "The value is too short."
        );
    }

    #[test]
    fn test_multiple_codes_joined_in_stable_order() {
        let mut engine =
            FormEngine::from_schema(&name_schema(SurfacePolicy::TouchedOrDirty)).unwrap();
        // Both minlength and a custom failing code: use pattern too
        engine
            .set_validator_specs(
                "firstName",
                &[
                    ValidatorSpec::MinLength { min: 3 },
                    ValidatorSpec::Pattern {
                        pattern: "^[0-9]+$".to_string(),
                    },
                ],
            )
            .unwrap();
        engine.set_value("firstName", json!("Al")).unwrap();
        let catalog = MessageCatalog::with_defaults();
        // ErrorSet iterates codes alphabetically: minlength, pattern
        assert_eq!(
            catalog.feedback_for(&engine, "firstName").unwrap(),
            "The value is too short. Please enter a valid value."
        );
    }

    #[test]
    fn test_unknown_code_falls_back_to_code() {
        let mut engine =
            FormEngine::from_schema(&name_schema(SurfacePolicy::TouchedOrDirty)).unwrap();
        engine.set_value("firstName", json!("")).unwrap();
        let catalog = MessageCatalog::new(); // no entries at all
        assert_eq!(catalog.feedback_for(&engine, "firstName").unwrap(), "required");
    }
}
