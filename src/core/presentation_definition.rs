use super::credential_format::*;
use super::input_descriptor::*;
use super::path;
use super::submission_requirement::*;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A presentation definition is a JSON object that describes the information a [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires of a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// Presentation Definitions are composed of inputs, which describe the forms and details of the
/// proofs they require, and optional sets of selection rules, to allow [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder)s flexibility
/// in cases where different types of proofs may satisfy an input requirement.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    id: String,
    input_descriptors: Vec<InputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_requirements: Option<Vec<SubmissionRequirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(default, skip_serializing_if = "ClaimFormatMap::is_empty")]
    format: ClaimFormatMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<Value>,
}

/// Presentation definition parsing or validation error.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("malformed presentation definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("presentation definition must contain at least one input descriptor")]
    NoInputDescriptors,

    #[error("duplicate input descriptor id `{0}`")]
    DuplicateDescriptorId(String),

    #[error("submission requirement references group `{0}` that no input descriptor belongs to")]
    UnknownGroup(GroupId),
}

impl PresentationDefinition {
    /// The Presentation Definition MUST contain an id property. The value of this property MUST be a string.
    /// The string SHOULD provide a unique ID for the desired context.
    ///
    /// The Presentation Definition MUST contain an input_descriptors property. Its value MUST be an array of Input Descriptor Objects,
    /// the composition of which are found [InputDescriptor] type.
    pub fn new(id: impl Into<String>, input_descriptor: InputDescriptor) -> Self {
        Self {
            id: id.into(),
            input_descriptors: vec![input_descriptor],
            ..Default::default()
        }
    }

    /// Parse a presentation definition from its JSON representation.
    ///
    /// The document is normalized before parsing: the escaped JSON Schema
    /// keywords `_const` and `_enum` are restored and constraint paths are
    /// rewritten into canonical form. The parsed definition is then
    /// validated, see [PresentationDefinition::validate].
    pub fn from_json(value: &Value) -> Result<Self, DefinitionError> {
        let definition: Self = serde_json::from_value(normalize_definition(value))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Check the invariants serde cannot express.
    ///
    /// Input descriptor ids must be unique and every group referenced by a
    /// submission requirement, at any depth, must be carried by at least one
    /// input descriptor.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.input_descriptors.is_empty() {
            return Err(DefinitionError::NoInputDescriptors);
        }

        let mut ids = HashSet::new();
        for descriptor in &self.input_descriptors {
            if !ids.insert(descriptor.id()) {
                return Err(DefinitionError::DuplicateDescriptorId(
                    descriptor.id().to_owned(),
                ));
            }
        }

        for requirement in self.submission_requirements.iter().flatten() {
            for group in requirement.groups() {
                if !self.input_descriptors.iter().any(|d| d.is_in_group(group)) {
                    return Err(DefinitionError::UnknownGroup(group.clone()));
                }
            }
        }

        Ok(())
    }

    /// Return the id of the presentation definition.
    pub fn id(&self) -> &String {
        &self.id
    }

    /// Add a new input descriptor to the presentation definition.
    pub fn add_input_descriptors(mut self, input_descriptor: InputDescriptor) -> Self {
        self.input_descriptors.push(input_descriptor);
        self
    }

    /// Return the input descriptors of the presentation definition.
    pub fn input_descriptors(&self) -> &[InputDescriptor] {
        &self.input_descriptors
    }

    /// Return the input descriptors indexed by id.
    pub fn input_descriptors_map(&self) -> HashMap<&str, &InputDescriptor> {
        self.input_descriptors
            .iter()
            .map(|descriptor| (descriptor.id(), descriptor))
            .collect()
    }

    /// Return the input descriptors of `group` with their position in the
    /// definition, in definition order.
    pub fn input_descriptors_in_group<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = (usize, &'a InputDescriptor)> + 'a {
        self.input_descriptors
            .iter()
            .enumerate()
            .filter(move |(_, descriptor)| descriptor.is_in_group(group))
    }

    pub fn set_submission_requirements(mut self, requirements: Vec<SubmissionRequirement>) -> Self {
        self.submission_requirements = Some(requirements);
        self
    }

    /// Return the submission requirements, if any are declared.
    pub fn submission_requirements(&self) -> Option<&[SubmissionRequirement]> {
        self.submission_requirements.as_deref()
    }

    /// Set the name of the presentation definition.
    ///
    /// If present, its value SHOULD be a human-friendly string intended to
    /// constitute a distinctive designation of the Presentation Definition.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    pub fn set_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Set the claim formats the Verifier can process.
    ///
    /// Input descriptors without a `format` of their own inherit this one.
    pub fn set_format(mut self, format: ClaimFormatMap) -> Self {
        self.format = format;
        self
    }

    pub fn add_format(mut self, format: ClaimFormatDesignation, value: ClaimFormatPayload) -> Self {
        self.format.insert(format, value);
        self
    }

    pub fn format(&self) -> &ClaimFormatMap {
        &self.format
    }

    /// The formats that apply to `descriptor`: its own, or the definition's
    /// when it declares none.
    pub fn effective_format<'a>(&'a self, descriptor: &'a InputDescriptor) -> &'a ClaimFormatMap {
        if descriptor.format().is_empty() {
            &self.format
        } else {
            descriptor.format()
        }
    }

    /// Set the JSON-LD frame used to derive selectively disclosed credentials.
    pub fn set_frame(mut self, frame: Value) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn frame(&self) -> Option<&Value> {
        self.frame.as_ref()
    }

    /// Return the human-readable string representation of the fields requested
    /// in the presentation definition's input descriptors.
    ///
    /// For example, `$.credentialSubject.givenName` becomes `Given Name`.
    pub fn requested_fields(&self) -> Vec<String> {
        self.input_descriptors
            .iter()
            .flat_map(InputDescriptor::requested_fields)
            .collect()
    }
}

/// Copy `value` and undo the escaping applied to presentation definitions:
/// `_const` and `_enum` become `const` and `enum`, and constraint paths are
/// brought into canonical form.
pub fn normalize_definition(value: &Value) -> Value {
    let mut definition = value.clone();
    path::rename_key_recursively(&mut definition, "_const", "const");
    path::rename_key_recursively(&mut definition, "_enum", "enum");
    path::rewrite_special_paths(&mut definition);
    definition
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(submission_requirements: Value) -> Value {
        json!({
            "id": "32f54163-7166-48f1-93d8-ff217bdb0653",
            "submission_requirements": submission_requirements,
            "input_descriptors": [
                {
                    "id": "employment_input",
                    "group": ["B"],
                    "constraints": {
                        "fields": [{
                            "path": ["$.@context"],
                            "filter": { "type": "string", "_const": "https://business-standards.org/schemas/employment-history.json" }
                        }]
                    }
                }
            ]
        })
    }

    #[test]
    fn test_from_json_normalizes() {
        let definition =
            PresentationDefinition::from_json(&definition(json!([{ "rule": "all", "from": "B" }])))
                .unwrap();

        let field = &definition.input_descriptors()[0].constraints().fields()[0];
        assert_eq!(field.path().head(), "$['@context']");
        assert!(field.filter().unwrap().get("const").is_some());
        assert!(field.filter().unwrap().get("_const").is_none());
    }

    #[test]
    fn test_unknown_group_is_rejected() {
        let nested = json!([{
            "rule": "pick",
            "count": 1,
            "from_nested": [{ "rule": "all", "from": "B" }, { "rule": "all", "from": "C" }]
        }]);

        assert!(matches!(
            PresentationDefinition::from_json(&definition(nested)),
            Err(DefinitionError::UnknownGroup(group)) if group == "C"
        ));
    }

    #[test]
    fn test_malformed_definition() {
        assert!(matches!(
            PresentationDefinition::from_json(&json!({ "id": 1 })),
            Err(DefinitionError::Parse(_))
        ));
    }

    #[test]
    fn test_effective_format() {
        let descriptor = InputDescriptor::new("a", Constraints::new());
        let definition = PresentationDefinition::new("pd", descriptor.clone()).add_format(
            ClaimFormatDesignation::JwtVc,
            ClaimFormatPayload::Alg(vec!["ES256".into()]),
        );

        assert!(definition
            .effective_format(&descriptor)
            .contains_key(&ClaimFormatDesignation::JwtVc));
    }
}
