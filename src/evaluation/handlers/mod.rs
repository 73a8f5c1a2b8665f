//! The checks run over every (input descriptor, credential) pair.
//!
//! Handlers run in a fixed order and only communicate through the
//! [CheckLog](super::results::CheckLog) of the run: a later handler may read
//! the results of an earlier one, never change them. The last handler,
//! [MarkForSubmissionEvaluation], turns the log into the eligibility the
//! submission requirements are resolved against.

use std::fmt::Debug;

use super::context::EvaluationContext;
use super::results::Status;
use crate::core::input_descriptor::Optionality;

mod format_restriction;
mod input_descriptor_filter;
mod is_holder;
mod limit_disclosure;
mod mark_for_submission;
mod predicate_related_field;
mod same_subject;
mod subject_is_issuer;
mod uri;

pub use format_restriction::FormatRestrictionEvaluation;
pub use input_descriptor_filter::InputDescriptorFilterEvaluation;
pub use is_holder::IsHolderEvaluation;
pub use limit_disclosure::LimitDisclosureEvaluation;
pub use mark_for_submission::MarkForSubmissionEvaluation;
pub use predicate_related_field::PredicateRelatedFieldEvaluation;
pub use same_subject::SameSubjectEvaluation;
pub use subject_is_issuer::SubjectIsIssuerEvaluation;
pub use uri::UriEvaluation;

/// One evaluation concern.
///
/// A handler appends one result for every pair it is concerned with, and
/// must not stop on a failing pair: errors are results, not control flow.
pub trait EvaluationHandler: Debug {
    /// The name recorded as `evaluator` in the results of this handler.
    fn name(&self) -> &str;

    fn handle(&self, context: &mut EvaluationContext<'_>);
}

/// The default chain, in execution order.
pub fn default_handlers() -> Vec<Box<dyn EvaluationHandler + Send + Sync>> {
    vec![
        Box::new(FormatRestrictionEvaluation),
        Box::new(UriEvaluation),
        Box::new(InputDescriptorFilterEvaluation),
        Box::new(PredicateRelatedFieldEvaluation),
        Box::new(SubjectIsIssuerEvaluation),
        Box::new(IsHolderEvaluation),
        Box::new(SameSubjectEvaluation),
        Box::new(LimitDisclosureEvaluation),
        Box::new(MarkForSubmissionEvaluation),
    ]
}

/// The status of a failed check, given how strongly it was asked for.
fn failure_status(directive: Optionality) -> Status {
    match directive {
        Optionality::Required => Status::Error,
        Optionality::Preferred => Status::Warn,
    }
}
