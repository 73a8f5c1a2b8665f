use std::collections::HashSet;

use super::{
    credential_format::*,
    path::{self, PathError, PathMatch},
};
use crate::utils::{to_human_readable_string, NonEmptyVec};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A GroupId represents a unique identifier for a group of Input Descriptors.
///
/// Submission requirements select input descriptors through these labels.
pub type GroupId = String;

/// A JSONPath is a string that represents a path to a specific value within a JSON object.
///
/// For syntax details, see [https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition)
pub type JsonPath = String;

/// The predicate Feature lets a Verifier ask the Holder to apply a filter and
/// return the boolean outcome instead of the value itself.
///
/// If the predicate property is present, the filter property **MUST** also be present.
///
/// See: [https://identity.foundation/presentation-exchange/#predicate-feature](https://identity.foundation/presentation-exchange/#predicate-feature)
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    /// The returned value **MUST** be the boolean result of applying the filter.
    Required,
    /// The returned value **SHOULD** be the boolean result of applying the filter.
    Preferred,
}

/// How strongly the Verifier asks for a relational or disclosure feature.
///
/// Used by `limit_disclosure`, `subject_is_issuer` and the `directive` of
/// `is_holder` and `same_subject` entries. A failed `Required` feature rejects
/// the credential, a failed `Preferred` one only produces a warning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Optionality {
    Required,
    Preferred,
}

/// Kept for callers using the Presentation Exchange name of the property.
pub type ConstraintsLimitDisclosure = Optionality;

/// A v1 schema reference, matched against the credential's `@context`,
/// `type` and `credentialSchema`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaReference {
    pub uri: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

/// Input Descriptors are objects used to describe the information a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires of a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// All Input Descriptors MUST be satisfied, unless otherwise specified by
/// submission requirements.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    id: String,
    #[serde(default)]
    constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(default, skip_serializing_if = "ClaimFormatMap::is_empty")]
    format: ClaimFormatMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    group: Vec<GroupId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    schema: Vec<SchemaReference>,
}

impl InputDescriptor {
    /// Create a new instance of the input descriptor with the given id and constraints.
    ///
    /// The id MUST NOT conflict with the id of another Input Descriptor Object in
    /// the same Presentation Definition.
    pub fn new(id: impl Into<String>, constraints: Constraints) -> Self {
        Self {
            id: id.into(),
            constraints,
            ..Default::default()
        }
    }

    /// Return the id of the input descriptor.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Return the constraints of the input descriptor.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the purpose of the input descriptor.
    ///
    /// If present, the purpose MUST be a string that describes the purpose for which the
    /// [Claim](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:claim)'s
    /// data is being requested.
    pub fn set_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Set the format of the input descriptor.
    ///
    /// When present, it constrains submission of this input to a subset of the
    /// formats or algorithms allowed by the presentation definition.
    pub fn set_format(mut self, format: ClaimFormatMap) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> &ClaimFormatMap {
        &self.format
    }

    pub fn format_designations(&self) -> HashSet<&ClaimFormatDesignation> {
        self.format.keys().collect()
    }

    pub fn set_group(mut self, group: Vec<GroupId>) -> Self {
        self.group = group;
        self
    }

    pub fn add_to_group(mut self, member: impl Into<GroupId>) -> Self {
        self.group.push(member.into());
        self
    }

    /// Return the groups this input descriptor belongs to.
    pub fn groups(&self) -> &[GroupId] {
        &self.group
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.group.iter().any(|g| g == group)
    }

    pub fn set_schema(mut self, schema: Vec<SchemaReference>) -> Self {
        self.schema = schema;
        self
    }

    /// Return the v1 schema references of the input descriptor.
    pub fn schema(&self) -> &[SchemaReference] {
        &self.schema
    }

    /// Return the humanly readable requested fields of the input descriptor.
    pub fn requested_fields(&self) -> Vec<String> {
        self.constraints
            .fields()
            .iter()
            .flat_map(|field| field.requested_fields_human_readable())
            .collect()
    }

    /// Whether one of the fields of this descriptor carries the given field id.
    pub fn has_field_id(&self, field_id: &str) -> bool {
        self.constraints
            .fields()
            .iter()
            .any(|field| field.id().is_some_and(|id| id == field_id))
    }
}

/// Constraints describe what a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder) must satisfy to fulfill an Input Descriptor.
///
/// A constraint object MAY be empty.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<ConstraintsField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_disclosure: Option<Optionality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_is_issuer: Option<Optionality>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    is_holder: Vec<HolderSubject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    same_subject: Vec<HolderSubject>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new field constraint to the constraints list.
    pub fn add_constraint(mut self, field: ConstraintsField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[ConstraintsField] {
        &self.fields
    }

    /// Set the limit disclosure value.
    ///
    /// For all Claims submitted in relation to an input descriptor with
    /// `limit_disclosure` set to `required`, the data submitted must be
    /// limited to the entries specified in the `fields` property.
    ///
    /// See [https://identity.foundation/presentation-exchange/spec/v2.0.0/#limited-disclosure-submissions](https://identity.foundation/presentation-exchange/spec/v2.0.0/#limited-disclosure-submissions)
    pub fn set_limit_disclosure(mut self, limit_disclosure: Optionality) -> Self {
        self.limit_disclosure = Some(limit_disclosure);
        self
    }

    pub fn limit_disclosure(&self) -> Option<Optionality> {
        self.limit_disclosure
    }

    /// Set whether the subject of the credential must be its issuer.
    pub fn set_subject_is_issuer(mut self, subject_is_issuer: Optionality) -> Self {
        self.subject_is_issuer = Some(subject_is_issuer);
        self
    }

    pub fn subject_is_issuer(&self) -> Option<Optionality> {
        self.subject_is_issuer
    }

    pub fn add_is_holder(mut self, is_holder: HolderSubject) -> Self {
        self.is_holder.push(is_holder);
        self
    }

    /// Fields whose subject must be the holder of the presentation.
    pub fn is_holder(&self) -> &[HolderSubject] {
        &self.is_holder
    }

    pub fn add_same_subject(mut self, same_subject: HolderSubject) -> Self {
        self.same_subject.push(same_subject);
        self
    }

    /// Fields that must all be about the same subject.
    pub fn same_subject(&self) -> &[HolderSubject] {
        &self.same_subject
    }

    /// Returns if the constraints fields contain non-optional
    /// fields that must be satisfied.
    pub fn is_required(&self) -> bool {
        self.fields.iter().any(|field| field.is_required())
    }
}

/// An entry of `is_holder` or `same_subject`: the field ids it applies to and
/// how strongly the relation is required.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HolderSubject {
    pub field_id: NonEmptyVec<String>,
    pub directive: Optionality,
}

impl HolderSubject {
    pub fn new(field_id: NonEmptyVec<String>, directive: Optionality) -> Self {
        Self {
            field_id,
            directive,
        }
    }
}

/// ConstraintsField objects describe one claim the Holder must provide.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintsField {
    path: NonEmptyVec<JsonPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicate: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
}

impl From<NonEmptyVec<JsonPath>> for ConstraintsField {
    fn from(path: NonEmptyVec<JsonPath>) -> Self {
        Self {
            path,
            id: None,
            purpose: None,
            name: None,
            predicate: None,
            filter: None,
            optional: None,
        }
    }
}

impl ConstraintsField {
    /// Create a new instance of the constraints field with the given path.
    pub fn new(path: impl Into<JsonPath>) -> ConstraintsField {
        NonEmptyVec::new(path.into()).into()
    }

    pub fn add_path(mut self, path: impl Into<JsonPath>) -> Self {
        self.path.push(path.into());
        self
    }

    /// Return the paths of the constraints field.
    ///
    /// `path` is a non empty list of JSONPath expressions, tried in order.
    pub fn path(&self) -> &NonEmptyVec<JsonPath> {
        &self.path
    }

    /// Set the id of the constraints field.
    ///
    /// The id MUST be unique from every other field object's id, including those
    /// contained in other Input Descriptor Objects. It is what `is_holder` and
    /// `same_subject` refer to.
    pub fn set_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    pub fn set_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the filter of the constraints field.
    ///
    /// The filter is a JSON Schema descriptor used to filter against the values
    /// returned from evaluation of the JSONPath expressions in the path array.
    pub fn set_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn filter(&self) -> Option<&Value> {
        self.filter.as_ref()
    }

    pub fn set_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn predicate(&self) -> Option<Predicate> {
        self.predicate
    }

    /// Set the optional value of the constraints field.
    ///
    /// Even when the field is optional, a value located at its path MUST
    /// validate against the filter, if a filter is present.
    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    /// Inverse alias for `!is_optional()`.
    pub fn is_required(&self) -> bool {
        !self.is_optional()
    }

    /// Select the values of this field in `document`.
    ///
    /// Path expressions are tried in order and the first one returning a
    /// match wins: "If the result returned no JSONPath match, skip to the next
    /// path array element."
    pub fn select<'a>(&self, document: &'a Value) -> Result<Vec<PathMatch<'a>>, PathError> {
        for expression in self.path.iter() {
            let matches = path::resolve(document, expression)?;
            if !matches.is_empty() {
                return Ok(matches);
            }
        }
        Ok(Vec::new())
    }

    /// Return the requested field names, i.e. the last member name of each path.
    ///
    /// e.g., `$.credentialSubject.dateOfBirth` gives `dateOfBirth` and
    /// `$['@context']` gives `context`.
    pub fn requested_fields(&self) -> Vec<String> {
        self.path
            .iter()
            .filter_map(|path| {
                path.split(|c: char| ".[]'\"@$:-".contains(c))
                    .filter(|segment| !segment.is_empty() && *segment != "*")
                    .next_back()
            })
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Return the humanly-readable requested fields of the constraints field.
    pub fn requested_fields_human_readable(&self) -> Vec<String> {
        self.requested_fields()
            .into_iter()
            .map(to_human_readable_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_descriptor_deserialization() {
        let descriptor: InputDescriptor = serde_json::from_value(json!({
            "id": "banking_input_1",
            "name": "Bank Account Information",
            "group": ["A"],
            "schema": [{ "uri": "https://bank-standards.example.com#accounts", "required": true }],
            "constraints": {
                "limit_disclosure": "required",
                "subject_is_issuer": "preferred",
                "is_holder": [{ "field_id": ["account"], "directive": "required" }],
                "fields": [{
                    "id": "account",
                    "path": ["$.credentialSubject.account[*].id", "$.vc.credentialSubject.account[*].id"],
                    "purpose": "We need your bank and account information.",
                    "filter": { "type": "string", "pattern": "^[0-9]{10}$" },
                    "predicate": "preferred"
                }]
            }
        }))
        .unwrap();

        assert!(descriptor.is_in_group("A"));
        assert!(descriptor.has_field_id("account"));
        assert!(descriptor.schema()[0].required);
        assert_eq!(
            descriptor.constraints().limit_disclosure(),
            Some(Optionality::Required)
        );
        assert_eq!(descriptor.constraints().is_holder().len(), 1);
        assert_eq!(
            descriptor.constraints().fields()[0].predicate(),
            Some(Predicate::Preferred)
        );
        assert!(descriptor.constraints().is_required());
    }

    #[test]
    fn test_field_path_fallback() {
        let field = ConstraintsField::new("$.credentialSubject.name")
            .add_path("$.vc.credentialSubject.name");

        let doc = json!({ "vc": { "credentialSubject": { "name": "Alice" } } });
        let matches = field.select(&doc).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].value, &json!("Alice"));
    }

    #[test]
    fn test_field_requires_a_path() {
        let empty = serde_json::from_value::<ConstraintsField>(json!({ "path": [] }));
        assert!(empty.is_err());

        let field = ConstraintsField::from(NonEmptyVec::new("$.type".to_owned()));
        assert_eq!(field.path().head(), "$.type");
        assert!(field.is_required());
    }

    #[test]
    fn test_requested_fields() {
        let field = ConstraintsField::new("$.credentialSubject.dateOfBirth")
            .add_path("$['@context']");

        assert_eq!(field.requested_fields(), vec!["dateOfBirth", "context"]);
        assert_eq!(
            field.requested_fields_human_readable(),
            vec!["Date Of Birth", "Context"]
        );
    }
}
