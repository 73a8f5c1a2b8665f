use serde_json::json;
use tracing::debug;

use super::EvaluationHandler;
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Marks every pair without an error as eligible for submission and claims
/// its descriptor map slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkForSubmissionEvaluation;

impl MarkForSubmissionEvaluation {
    pub const NAME: &'static str = "MarkForSubmissionEvaluation";
}

impl EvaluationHandler for MarkForSubmissionEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        for (d, descriptor, c, _) in context.pairs() {
            if context.log().has_error(d, c) {
                context.push(HandlerCheckResult::new(
                    d,
                    c,
                    Self::NAME,
                    Status::Error,
                    "input candidate is not eligible for submission",
                ));
                continue;
            }

            context.push(
                HandlerCheckResult::new(
                    d,
                    c,
                    Self::NAME,
                    Status::Info,
                    "input candidate is eligible for submission",
                )
                .with_payload(json!({ "group": descriptor.groups() })),
            );

            if let Err(e) = context.claim(Self::NAME, d, c) {
                debug!(descriptor = descriptor.id(), credential = c, "{e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::core::credential::{wrap_credential, JwtPayloadDecoder};
    use crate::core::filter::JsonSchemaFilter;
    use crate::core::presentation_definition::PresentationDefinition;
    use crate::evaluation::context::Candidate;
    use crate::evaluation::handlers::InputDescriptorFilterEvaluation;

    #[test]
    fn test_marks_and_claims_eligible_pairs() {
        let definition = PresentationDefinition::from_json(&json!({
            "id": "pd",
            "input_descriptors": [{
                "id": "license",
                "group": ["A"],
                "constraints": {
                    "fields": [{ "path": ["$.credentialSubject.license.number"] }]
                }
            }]
        }))
        .unwrap();
        let candidates: Vec<Candidate> = [
            json!({
                "@context": "https://www.w3.org/2018/credentials/v1",
                "id": "urn:license",
                "credentialSubject": { "license": { "number": "34DGE352" } }
            }),
            json!({
                "@context": "https://www.w3.org/2018/credentials/v1",
                "id": "urn:other",
                "credentialSubject": { "active": true }
            }),
            json!("not a token"),
        ]
        .into_iter()
        .map(|original| Candidate {
            wrapped: wrap_credential(&original, &JwtPayloadDecoder),
            original,
        })
        .collect();
        let config = EvaluationConfig::default();

        let mut context =
            EvaluationContext::new(&definition, &candidates, &config, &JsonSchemaFilter);
        InputDescriptorFilterEvaluation.handle(&mut context);
        MarkForSubmissionEvaluation.handle(&mut context);

        let (log, draft) = context.into_parts();
        let marks: Vec<_> = log
            .entries()
            .iter()
            .filter(|result| result.evaluator == MarkForSubmissionEvaluation::NAME)
            .collect();

        // The malformed candidate never reaches the handlers.
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].status, Status::Info);
        assert_eq!(marks[0].payload, Some(json!({ "group": ["A"] })));
        assert_eq!(marks[1].status, Status::Error);

        let claimed: Vec<_> = draft.claimed().collect();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].credential, 0);
        assert_eq!(claimed[0].owner(), Some(MarkForSubmissionEvaluation::NAME));
        assert_eq!(claimed[0].entry.path, "$.verifiableCredential[0]");
    }
}
