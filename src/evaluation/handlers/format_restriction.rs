use serde_json::json;
use tracing::debug;

use super::EvaluationHandler;
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Checks the credential format against the `format` of the input
/// descriptor, or of the definition when the descriptor has none.
///
/// For Linked-Data credentials the proof type must be one of the listed
/// `proof_type`s. Formats excluded by
/// [EvaluationConfig::restrict_to_formats](crate::config::EvaluationConfig::restrict_to_formats)
/// are rejected whatever the definition says.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatRestrictionEvaluation;

impl FormatRestrictionEvaluation {
    pub const NAME: &'static str = "FormatRestrictionEvaluation";
}

impl EvaluationHandler for FormatRestrictionEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        let definition = context.definition();
        let config = context.config();

        for (d, descriptor, c, credential) in context.pairs() {
            let format = credential.format();
            let payload = json!({ "format": format.name() });

            let (status, message) = if !config.allows_format(&format) {
                (Status::Error, format!("credential format `{format}` is not allowed"))
            } else {
                let formats = definition.effective_format(descriptor);
                if formats.is_empty() {
                    (Status::Info, "no format restriction".to_owned())
                } else {
                    match format.lookup(formats) {
                        None => (
                            Status::Error,
                            format!("credential format `{format}` is not requested"),
                        ),
                        Some(accepted) => {
                            let proof_types = credential.internal().proof_types();
                            let accepts = if proof_types.is_empty() {
                                accepted.accepts_proof_type(None)
                            } else {
                                proof_types
                                    .iter()
                                    .any(|proof_type| accepted.accepts_proof_type(Some(proof_type)))
                            };

                            if accepts {
                                (Status::Info, format!("credential format `{format}` is accepted"))
                            } else {
                                (
                                    Status::Error,
                                    format!("proof type {proof_types:?} is not accepted for `{format}`"),
                                )
                            }
                        }
                    }
                }
            };

            if status == Status::Error {
                debug!(descriptor = descriptor.id(), credential = c, "{message}");
            }

            context.push(HandlerCheckResult::new(d, c, Self::NAME, status, message).with_payload(payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::core::credential_format::ClaimFormatDesignation;
    use crate::evaluation::handlers::test_utils::run;
    use serde_json::Value;

    fn credentials() -> Vec<Value> {
        vec![
            json!({
                "@context": "https://www.w3.org/2018/credentials/v1",
                "id": "urn:uuid:1",
                "credentialSubject": { "id": "did:example:1" },
                "proof": { "type": "RsaSignature2018" }
            }),
            json!({ "vc": { "credentialSubject": { "id": "did:example:1" } } }),
        ]
    }

    #[test]
    fn test_descriptor_format() {
        let definition = json!({
            "id": "pd",
            "input_descriptors": [{
                "id": "ldp_only",
                "format": { "ldp_vc": { "proof_type": ["RsaSignature2018"] } }
            }]
        });

        let results = run(&definition, &credentials(), &EvaluationConfig::default(), &[&FormatRestrictionEvaluation]);

        assert_eq!(results[0].status, Status::Info);
        assert_eq!(results[1].status, Status::Error);
    }

    #[test]
    fn test_definition_format_and_proof_type() {
        let definition = json!({
            "id": "pd",
            "format": { "ldp": { "proof_type": ["Ed25519Signature2018"] }, "jwt_vc": { "alg": ["ES256"] } },
            "input_descriptors": [{ "id": "any" }]
        });

        let results = run(&definition, &credentials(), &EvaluationConfig::default(), &[&FormatRestrictionEvaluation]);

        assert_eq!(results[0].status, Status::Error);
        assert_eq!(results[1].status, Status::Info);
    }

    #[test]
    fn test_restricted_formats() {
        let definition = json!({ "id": "pd", "input_descriptors": [{ "id": "any" }] });
        let config = EvaluationConfig::default().set_restrict_to_formats(vec![ClaimFormatDesignation::Jwt]);

        let results = run(&definition, &credentials(), &config, &[&FormatRestrictionEvaluation]);

        assert_eq!(results[0].status, Status::Error);
        assert_eq!(results[1].status, Status::Info);
    }
}
