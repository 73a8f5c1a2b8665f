use serde_json::json;
use tracing::debug;

use super::EvaluationHandler;
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Matches the v1 `schema` URIs of an input descriptor against the
/// `@context`, `type` and `credentialSchema` of the credential.
///
/// Every `required` URI must match. When none is required, one match is
/// enough. Descriptors without `schema` are not concerned.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriEvaluation;

impl UriEvaluation {
    pub const NAME: &'static str = "UriEvaluation";
}

impl EvaluationHandler for UriEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        for (d, descriptor, c, credential) in context.pairs() {
            let schema = descriptor.schema();
            if schema.is_empty() {
                continue;
            }

            let internal = credential.internal();
            let uris: Vec<&str> = internal
                .contexts()
                .into_iter()
                .chain(internal.types())
                .chain(internal.credential_schema_ids())
                .collect();

            let matched: Vec<&str> = schema
                .iter()
                .filter(|reference| uris.contains(&reference.uri.as_str()))
                .map(|reference| reference.uri.as_str())
                .collect();

            let missing: Vec<&str> = schema
                .iter()
                .filter(|reference| reference.required && !matched.contains(&reference.uri.as_str()))
                .map(|reference| reference.uri.as_str())
                .collect();

            let (status, message) = if !missing.is_empty() {
                (Status::Error, format!("required schema {missing:?} not found in credential"))
            } else if matched.is_empty() {
                (Status::Error, "no schema of the input descriptor matches the credential".to_owned())
            } else {
                (Status::Info, "credential matches the schema of the input descriptor".to_owned())
            };

            if status == Status::Error {
                debug!(descriptor = descriptor.id(), credential = c, "{message}");
            }

            context.push(
                HandlerCheckResult::new(d, c, Self::NAME, status, message)
                    .with_payload(json!({ "presentationDefinitionUris": matched, "credentialUris": uris })),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::evaluation::handlers::test_utils::run;

    #[test]
    fn test_schema_matching() {
        let definition = json!({
            "id": "pd",
            "input_descriptors": [
                {
                    "id": "employment",
                    "schema": [
                        { "uri": "https://business-standards.org/schemas/employment-history.json", "required": true },
                        { "uri": "GenericEmploymentCredential" }
                    ]
                },
                { "id": "unconstrained" }
            ]
        });
        let credentials = [
            json!({
                "@context": "https://business-standards.org/schemas/employment-history.json",
                "id": "https://business-standards.org/schemas/employment-history.json",
                "type": ["VerifiableCredential", "GenericEmploymentCredential"],
                "credentialSubject": { "active": true }
            }),
            json!({
                "@context": "https://www.w3.org/2018/credentials/v1",
                "id": "https://eu.com/claims/DriversLicense",
                "type": ["EUDriversLicense", "GenericEmploymentCredential"],
                "credentialSubject": { "license": { "number": "34DGE352" } }
            }),
        ];

        let results = run(&definition, &credentials, &EvaluationConfig::default(), &[&UriEvaluation]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, Status::Info);
        assert_eq!(results[1].status, Status::Error);
    }
}
