use serde_json::Value;

use super::results::{CheckLog, HandlerCheckResult, Status};
use crate::config::EvaluationConfig;
use crate::core::{
    credential::{CredentialError, WrappedVerifiableCredential},
    filter::FilterValidator,
    input_descriptor::InputDescriptor,
    presentation_definition::PresentationDefinition,
    presentation_submission::DescriptorMap,
};

/// A credential submitted for evaluation.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The credential as supplied.
    pub original: Value,
    /// The normalized credential, or why it could not be normalized.
    pub wrapped: Result<WrappedVerifiableCredential, CredentialError>,
}

/// Why a descriptor map slot could not be claimed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("no slot for input descriptor {descriptor} and credential {credential}")]
    UnknownSlot { descriptor: usize, credential: usize },

    #[error("slot already claimed by `{owner}`")]
    AlreadyClaimed { owner: String },

    #[error("`{handler}` has not validated this pair")]
    NotValidated { handler: String },
}

/// A descriptor map entry waiting for a handler to vouch for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSlot {
    pub descriptor: usize,
    pub credential: usize,
    pub entry: DescriptorMap,
    owner: Option<String>,
}

impl DraftSlot {
    /// The handler that claimed this slot.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

/// The descriptor map under construction.
///
/// There is one slot per (input descriptor, credential) pair. Only claimed
/// slots end up in the presentation submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionDraft {
    slots: Vec<DraftSlot>,
}

impl SubmissionDraft {
    pub fn slots(&self) -> &[DraftSlot] {
        &self.slots
    }

    /// The claimed entries, in input descriptor order.
    pub fn claimed(&self) -> impl Iterator<Item = &DraftSlot> {
        self.slots.iter().filter(|slot| slot.owner.is_some())
    }

    fn slot_mut(&mut self, descriptor: usize, credential: usize) -> Option<&mut DraftSlot> {
        self.slots
            .iter_mut()
            .find(|slot| slot.descriptor == descriptor && slot.credential == credential)
    }
}

/// State of one evaluation run, handed to every handler in turn.
pub struct EvaluationContext<'a> {
    definition: &'a PresentationDefinition,
    candidates: &'a [Candidate],
    config: &'a EvaluationConfig,
    filter: &'a dyn FilterValidator,
    holder_dids: Vec<String>,
    log: CheckLog,
    draft: SubmissionDraft,
}

impl<'a> EvaluationContext<'a> {
    /// Build the context of a run.
    ///
    /// Candidates that could not be normalized are rejected up front, with
    /// one error per input descriptor logged by `CredentialNormalization`.
    pub fn new(
        definition: &'a PresentationDefinition,
        candidates: &'a [Candidate],
        config: &'a EvaluationConfig,
        filter: &'a dyn FilterValidator,
    ) -> Self {
        let mut log = CheckLog::new();
        let mut slots = Vec::new();

        for (d, descriptor) in definition.input_descriptors().iter().enumerate() {
            for (c, candidate) in candidates.iter().enumerate() {
                match &candidate.wrapped {
                    Ok(credential) => slots.push(DraftSlot {
                        descriptor: d,
                        credential: c,
                        entry: DescriptorMap::new(
                            descriptor.id(),
                            credential.format(),
                            super::results::verifiable_credential_path(c),
                        ),
                        owner: None,
                    }),
                    Err(e) => log.push(HandlerCheckResult::new(
                        d,
                        c,
                        NORMALIZATION,
                        Status::Error,
                        e.to_string(),
                    )),
                }
            }
        }

        Self {
            definition,
            candidates,
            config,
            filter,
            holder_dids: config.holder_dids.clone(),
            log,
            draft: SubmissionDraft { slots },
        }
    }

    /// Add DIDs controlled by the holder for this run.
    pub fn with_holder_dids(mut self, dids: impl IntoIterator<Item = String>) -> Self {
        for did in dids {
            if !self.holder_dids.contains(&did) {
                self.holder_dids.push(did);
            }
        }
        self
    }

    pub fn definition(&self) -> &'a PresentationDefinition {
        self.definition
    }

    pub fn candidates(&self) -> &'a [Candidate] {
        self.candidates
    }

    pub fn config(&self) -> &'a EvaluationConfig {
        self.config
    }

    pub fn filter(&self) -> &'a dyn FilterValidator {
        self.filter
    }

    pub fn holder_dids(&self) -> &[String] {
        &self.holder_dids
    }

    pub fn log(&self) -> &CheckLog {
        &self.log
    }

    pub fn draft(&self) -> &SubmissionDraft {
        &self.draft
    }

    pub fn push(&mut self, result: HandlerCheckResult) {
        self.log.push(result);
    }

    /// Every (input descriptor, normalized credential) pair, descriptor first.
    pub fn pairs(
        &self,
    ) -> impl Iterator<Item = (usize, &'a InputDescriptor, usize, &'a WrappedVerifiableCredential)>
    {
        let (definition, candidates) = (self.definition, self.candidates);
        definition
            .input_descriptors()
            .iter()
            .enumerate()
            .flat_map(move |(d, descriptor)| {
                candidates
                    .iter()
                    .enumerate()
                    .filter_map(move |(c, candidate)| {
                        candidate
                            .wrapped
                            .as_ref()
                            .ok()
                            .map(|credential| (d, descriptor, c, credential))
                    })
            })
    }

    /// Claim the descriptor map slot of a pair on behalf of `handler`.
    ///
    /// The slot must be unclaimed and `handler` must have logged a non-error
    /// result for the pair.
    pub fn claim(
        &mut self,
        handler: &str,
        descriptor: usize,
        credential: usize,
    ) -> Result<(), ClaimError> {
        let validated = self
            .log
            .for_pair(descriptor, credential)
            .any(|result| result.evaluator == handler && result.status != Status::Error);

        let slot = self
            .draft
            .slot_mut(descriptor, credential)
            .ok_or(ClaimError::UnknownSlot {
                descriptor,
                credential,
            })?;

        if let Some(owner) = &slot.owner {
            return Err(ClaimError::AlreadyClaimed {
                owner: owner.clone(),
            });
        }
        if !validated {
            return Err(ClaimError::NotValidated {
                handler: handler.to_owned(),
            });
        }

        slot.owner = Some(handler.to_owned());
        Ok(())
    }

    pub fn into_parts(self) -> (CheckLog, SubmissionDraft) {
        (self.log, self.draft)
    }
}

/// Evaluator name of the results logged for credentials that could not be
/// normalized.
pub const NORMALIZATION: &str = "CredentialNormalization";
