use std::fmt::Debug;

use jsonschema::JSONSchema;
use serde_json::Value;

/// Outcome of validating a value against a constraints field filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub valid: bool,
    pub messages: Vec<String>,
}

impl FilterOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            messages: Vec::new(),
        }
    }

    pub fn invalid(messages: Vec<String>) -> Self {
        Self {
            valid: false,
            messages,
        }
    }
}

/// Validates values selected by a constraints field against its `filter`.
///
/// Validation is advisory: an invalid value, or an invalid filter, is
/// reported through the outcome and ends up as a check result, never as an
/// error of the evaluation.
pub trait FilterValidator: Debug {
    fn validate(&self, value: &Value, filter: &Value) -> FilterOutcome;
}

/// [FilterValidator] backed by the `jsonschema` crate.
///
/// Remote references are not resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaFilter;

impl FilterValidator for JsonSchemaFilter {
    fn validate(&self, value: &Value, filter: &Value) -> FilterOutcome {
        let schema = match JSONSchema::compile(filter) {
            Ok(schema) => schema,
            Err(e) => return FilterOutcome::invalid(vec![format!("invalid filter: {e}")]),
        };

        let messages = match schema.validate(value) {
            Ok(()) => return FilterOutcome::valid(),
            Err(errors) => errors.map(|error| error.to_string()).collect(),
        };

        FilterOutcome::invalid(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_schema_filter() {
        let filter = json!({ "type": "string", "pattern": "^did:example:" });

        assert!(JsonSchemaFilter.validate(&json!("did:example:123"), &filter).valid);

        let outcome = JsonSchemaFilter.validate(&json!("did:foo:123"), &filter);
        assert!(!outcome.valid);
        assert_eq!(outcome.messages.len(), 1);
    }

    #[test]
    fn test_const_and_contains() {
        let filter = json!({ "type": "array", "contains": { "const": "EUDriversLicense" } });

        assert!(
            JsonSchemaFilter
                .validate(&json!(["VerifiableCredential", "EUDriversLicense"]), &filter)
                .valid
        );
        assert!(!JsonSchemaFilter.validate(&json!(["VerifiableCredential"]), &filter).valid);
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        let outcome = JsonSchemaFilter.validate(&json!("a"), &json!({ "pattern": "(" }));
        assert!(!outcome.valid);
        assert!(outcome.messages[0].starts_with("invalid filter"));
    }
}
