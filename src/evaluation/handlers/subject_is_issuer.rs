use serde_json::json;
use tracing::debug;

use super::{failure_status, EvaluationHandler};
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Checks `subject_is_issuer`: every subject of the credential must be its
/// issuer, as for self-issued credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectIsIssuerEvaluation;

impl SubjectIsIssuerEvaluation {
    pub const NAME: &'static str = "SubjectIsIssuerEvaluation";
}

impl EvaluationHandler for SubjectIsIssuerEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        for (d, descriptor, c, credential) in context.pairs() {
            let Some(directive) = descriptor.constraints().subject_is_issuer() else {
                continue;
            };

            let internal = credential.internal();
            let issuer = internal.issuer();
            let subjects = internal.subject_ids();

            let self_issued = issuer.is_some_and(|issuer| {
                !subjects.is_empty() && subjects.iter().all(|subject| *subject == issuer)
            });

            let result = if self_issued {
                HandlerCheckResult::new(d, c, Self::NAME, Status::Info, "subject is the issuer")
            } else {
                debug!(descriptor = descriptor.id(), credential = c, "subject is not the issuer");
                HandlerCheckResult::new(
                    d,
                    c,
                    Self::NAME,
                    failure_status(directive),
                    "subject is not the issuer of the credential",
                )
            };

            context.push(result.with_payload(json!({ "issuer": issuer, "subjects": subjects })));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::evaluation::handlers::test_utils::run;

    #[test]
    fn test_subject_is_issuer() {
        let definition = |directive: &str| {
            json!({
                "id": "pd",
                "input_descriptors": [{
                    "id": "self_issued",
                    "constraints": { "subject_is_issuer": directive }
                }]
            })
        };
        let credential = |issuer: &str| {
            json!({
                "@context": "https://www.w3.org/2018/credentials/v1",
                "id": "urn:uuid:1",
                "issuer": { "id": issuer },
                "credentialSubject": { "id": "did:example:ebfeb1f712ebc6f1c276e12ec21" }
            })
        };
        let credentials = [
            credential("did:example:ebfeb1f712ebc6f1c276e12ec21"),
            credential("did:example:123"),
        ];

        let required = run(&definition("required"), &credentials, &EvaluationConfig::default(), &[&SubjectIsIssuerEvaluation]);
        assert_eq!(required[0].status, Status::Info);
        assert_eq!(required[1].status, Status::Error);

        let preferred = run(&definition("preferred"), &credentials, &EvaluationConfig::default(), &[&SubjectIsIssuerEvaluation]);
        assert_eq!(preferred[1].status, Status::Warn);
    }
}
