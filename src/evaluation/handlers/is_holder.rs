use serde_json::json;
use tracing::debug;

use super::{failure_status, EvaluationHandler};
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Checks `is_holder`: the subject of the credential must be one of the
/// holder DIDs of the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsHolderEvaluation;

impl IsHolderEvaluation {
    pub const NAME: &'static str = "IsHolderEvaluation";
}

impl EvaluationHandler for IsHolderEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        let holder_dids = context.holder_dids().to_vec();

        for (d, descriptor, c, credential) in context.pairs() {
            let is_holder = descriptor.constraints().is_holder();
            if is_holder.is_empty() {
                continue;
            }

            let subjects = credential.internal().subject_ids();
            let held = subjects.iter().any(|subject| holder_dids.iter().any(|did| did == *subject));

            let status = if held {
                Status::Info
            } else {
                is_holder
                    .iter()
                    .map(|entry| failure_status(entry.directive))
                    .max()
                    .unwrap_or(Status::Info)
            };

            let message = if held {
                "subject of the credential is the holder"
            } else {
                debug!(descriptor = descriptor.id(), credential = c, "subject is not a holder DID");
                "subject of the credential is not the holder"
            };

            let field_ids: Vec<&String> = is_holder.iter().flat_map(|entry| entry.field_id.iter()).collect();

            context.push(
                HandlerCheckResult::new(d, c, Self::NAME, status, message)
                    .with_payload(json!({ "field_id": field_ids, "subjects": subjects })),
            );
        }
    }
}
