use serde_json::json;
use tracing::debug;

use super::EvaluationHandler;
use crate::core::input_descriptor::Predicate;
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Applies the filter of predicate fields and records the boolean outcome
/// that a holder discloses in place of the value.
///
/// A failing `required` predicate rejects the pair, a failing `preferred`
/// one is a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateRelatedFieldEvaluation;

impl PredicateRelatedFieldEvaluation {
    pub const NAME: &'static str = "PredicateRelatedFieldEvaluation";
}

impl EvaluationHandler for PredicateRelatedFieldEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        let filter = context.filter();

        for (d, descriptor, c, credential) in context.pairs() {
            let fields: Vec<_> = descriptor
                .constraints()
                .fields()
                .iter()
                .filter_map(|field| field.predicate().map(|predicate| (field, predicate)))
                .collect();
            if fields.is_empty() {
                continue;
            }

            let document = credential.internal().as_json();
            let mut status = Status::Info;
            let mut outcomes = Vec::new();

            for (field, predicate) in fields {
                let matches = field.select(document).unwrap_or_default();
                let holds = match field.filter() {
                    Some(schema) => matches
                        .iter()
                        .any(|candidate| filter.validate(candidate.value, schema).valid),
                    None => !matches.is_empty(),
                };

                if !holds {
                    status = status.max(match predicate {
                        Predicate::Required => Status::Error,
                        Predicate::Preferred => Status::Warn,
                    });
                }

                outcomes.push(json!({
                    "id": field.id(),
                    "path": matches.first().map(|m| m.location.clone()).unwrap_or_else(|| field.path().head().clone()),
                    "predicate": predicate,
                    "value": holds,
                }));
            }

            let message = match status {
                Status::Info => "predicates hold",
                Status::Warn => "a preferred predicate does not hold",
                Status::Error => "a required predicate does not hold",
            };
            if status != Status::Info {
                debug!(descriptor = descriptor.id(), credential = c, "{message}");
            }

            context.push(
                HandlerCheckResult::new(d, c, Self::NAME, status, message)
                    .with_payload(json!({ "predicates": outcomes })),
            );
        }
    }
}
