use serde_json::json;
use tracing::debug;

use super::{failure_status, EvaluationHandler, InputDescriptorFilterEvaluation};
use crate::core::credential::WrappedVerifiableCredential;
use crate::core::input_descriptor::{HolderSubject, InputDescriptor};
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Checks `same_subject`: the credentials submitted for the input
/// descriptors owning the listed field ids must share one subject.
///
/// A credential takes part in the comparison once the filter handler has
/// accepted it for the owning descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameSubjectEvaluation;

impl SameSubjectEvaluation {
    pub const NAME: &'static str = "SameSubjectEvaluation";
}

impl EvaluationHandler for SameSubjectEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        let definition = context.definition();

        for (d, descriptor, c, credential) in context.pairs() {
            let same_subject = descriptor.constraints().same_subject();
            if same_subject.is_empty() {
                continue;
            }

            let subjects = credential.internal().subject_ids();
            let mut status = Status::Info;

            for entry in same_subject {
                let owners = definition
                    .input_descriptors()
                    .iter()
                    .enumerate()
                    .filter(|(o, owner)| *o != d && owns_any(owner, entry))
                    .map(|(o, _)| o);

                let shared = !subjects.is_empty()
                    && owners.into_iter().all(|o| {
                        context.pairs().any(|(od, _, oc, other)| {
                            od == o
                                && context
                                    .log()
                                    .find(InputDescriptorFilterEvaluation::NAME, od, oc)
                                    .is_some_and(|result| result.status == Status::Info)
                                && shares_subject(&subjects, other)
                        })
                    });

                if !shared {
                    status = status.max(failure_status(entry.directive));
                }
            }

            let message = match status {
                Status::Info => "credentials share the same subject",
                _ => {
                    debug!(descriptor = descriptor.id(), credential = c, "subjects differ");
                    "credentials for the related input descriptors do not share the same subject"
                }
            };

            let field_ids: Vec<&String> =
                same_subject.iter().flat_map(|entry| entry.field_id.iter()).collect();

            context.push(
                HandlerCheckResult::new(d, c, Self::NAME, status, message)
                    .with_payload(json!({ "field_id": field_ids, "subjects": subjects })),
            );
        }
    }
}

fn owns_any(descriptor: &InputDescriptor, entry: &HolderSubject) -> bool {
    entry.field_id.iter().any(|id| descriptor.has_field_id(id))
}

fn shares_subject(subjects: &[&str], other: &WrappedVerifiableCredential) -> bool {
    other
        .internal()
        .subject_ids()
        .iter()
        .any(|subject| subjects.contains(subject))
}
