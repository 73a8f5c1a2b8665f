use serde_json::{json, Value};
use tracing::debug;

use super::EvaluationHandler;
use crate::core::{
    credential::WrappedVerifiableCredential, filter::FilterValidator,
    input_descriptor::InputDescriptor,
};
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Checks the `constraints.fields` of the input descriptor.
///
/// Every field that is not optional must resolve to a value, and when the
/// field has a `filter` one of the resolved values must pass it. A value
/// found for an optional field must pass the filter too. Predicate fields are
/// only required to resolve here: their filter outcome is the concern of
/// [PredicateRelatedFieldEvaluation](super::PredicateRelatedFieldEvaluation).
///
/// The payload of a successful check lists the selected value of each field
/// under `fields`, with its normalized `path` and JSON Pointer `pointer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputDescriptorFilterEvaluation;

impl InputDescriptorFilterEvaluation {
    pub const NAME: &'static str = "InputDescriptorFilterEvaluation";
}

impl EvaluationHandler for InputDescriptorFilterEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        let filter = context.filter();

        for (d, descriptor, c, credential) in context.pairs() {
            let result = match select_fields(filter, descriptor, credential) {
                Ok(fields) => HandlerCheckResult::new(
                    d,
                    c,
                    Self::NAME,
                    Status::Info,
                    "input candidate is eligible for the input descriptor",
                )
                .with_payload(json!({ "fields": fields })),
                Err(reason) => {
                    debug!(descriptor = descriptor.id(), credential = c, "{reason}");
                    HandlerCheckResult::new(
                        d,
                        c,
                        Self::NAME,
                        Status::Error,
                        format!("input candidate does not satisfy the constraints: {reason}"),
                    )
                }
            };

            context.push(result);
        }
    }
}

fn select_fields(
    filter: &dyn FilterValidator,
    descriptor: &InputDescriptor,
    credential: &WrappedVerifiableCredential,
) -> Result<Vec<Value>, String> {
    let document = credential.internal().as_json();
    let mut fields = Vec::new();

    for field in descriptor.constraints().fields() {
        let matches = field.select(document).map_err(|e| e.to_string())?;

        if matches.is_empty() {
            if field.is_optional() {
                continue;
            }
            return Err(format!("no value found at {:?}", &field.path()[..]));
        }

        let selected = match (field.predicate(), field.filter()) {
            (None, Some(schema)) => {
                let mut messages = Vec::new();
                let passing = matches.iter().find(|candidate| {
                    let outcome = filter.validate(candidate.value, schema);
                    messages.extend(outcome.messages);
                    outcome.valid
                });

                match passing {
                    Some(selected) => selected,
                    None => {
                        return Err(format!(
                            "no value at {:?} passes the filter: {}",
                            &field.path()[..],
                            messages.join("; ")
                        ))
                    }
                }
            }
            _ => &matches[0],
        };

        fields.push(json!({
            "id": field.id(),
            "path": selected.location,
            "pointer": selected.pointer,
            "value": selected.value,
        }));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::evaluation::handlers::test_utils::run;

    fn credentials() -> Vec<Value> {
        vec![
            json!({
                "comment": "decoded JWT payload",
                "vc": {
                    "@context": "https://eu.com/claims/DriversLicense",
                    "id": "https://eu.com/claims/DriversLicense",
                    "type": ["EUDriversLicense"],
                    "issuer": "did:example:123",
                    "credentialSubject": {
                        "id": "did:example:ebfeb1f712ebc6f1c276e12ec21",
                        "accounts": [
                            { "id": "1234567890", "route": "DE-9876543210" },
                            { "id": "2457913570", "route": "DE-0753197542" }
                        ]
                    }
                }
            }),
            json!({
                "@context": "https://business-standards.org/schemas/employment-history.json",
                "id": "https://business-standards.org/schemas/employment-history.json",
                "type": ["VerifiableCredential", "GenericEmploymentCredential"],
                "issuer": "did:foo:123",
                "credentialSubject": { "id": "did:example:ebfeb1f712ebc6f1c276e12ec21", "active": true }
            }),
        ]
    }

    #[test]
    fn test_filter_selects_passing_value() {
        let definition = json!({
            "id": "pd",
            "input_descriptors": [{
                "id": "banking_input",
                "constraints": {
                    "fields": [{
                        "id": "account",
                        "path": ["$.credentialSubject.accounts[*].route"],
                        "filter": { "type": "string", "pattern": "^DE-0" }
                    }]
                }
            }]
        });

        let results = run(&definition, &credentials(), &EvaluationConfig::default(), &[&InputDescriptorFilterEvaluation]);

        assert_eq!(results[0].status, Status::Info);
        let field = &results[0].payload.as_ref().unwrap()["fields"][0];
        assert_eq!(field["value"], json!("DE-0753197542"));
        assert_eq!(field["pointer"], json!(["credentialSubject", "accounts", "1", "route"]));
        assert_eq!(results[1].status, Status::Error);
    }

    #[test]
    fn test_escaped_keywords_and_special_paths() {
        let definition = json!({
            "id": "pd",
            "input_descriptors": [{
                "id": "employment_input",
                "constraints": {
                    "fields": [{
                        "path": ["$.@context", "$.vc.@context"],
                        "filter": { "type": "string", "_const": "https://business-standards.org/schemas/employment-history.json" }
                    }]
                }
            }]
        });

        let results = run(&definition, &credentials(), &EvaluationConfig::default(), &[&InputDescriptorFilterEvaluation]);

        assert_eq!(results[0].status, Status::Error);
        assert_eq!(results[1].status, Status::Info);
    }

    #[test]
    fn test_optional_fields() {
        let definition = json!({
            "id": "pd",
            "input_descriptors": [{
                "id": "optional",
                "constraints": {
                    "fields": [
                        { "path": ["$.credentialSubject.active"], "optional": true, "filter": { "const": true } },
                        { "path": ["$.credentialSubject.id"] }
                    ]
                }
            }]
        });

        let results = run(&definition, &credentials(), &EvaluationConfig::default(), &[&InputDescriptorFilterEvaluation]);

        // Missing optional field.
        assert_eq!(results[0].status, Status::Info);
        assert_eq!(results[1].status, Status::Info);
        assert_eq!(results[1].payload.as_ref().unwrap()["fields"].as_array().unwrap().len(), 2);
    }
}
