//! Evaluation of credentials against a presentation definition.
//!
//! An [Evaluator] runs its [handlers](handlers::EvaluationHandler) over every
//! (input descriptor, credential) pair, then resolves the submission
//! requirements of the definition against the pairs found eligible.
//!
//! ```ignore
//! use presentation_exchange::evaluation::Evaluator;
//!
//! let evaluator = Evaluator::default();
//! let selection = evaluator.select_from(&definition, &credentials, Some("did:example:holder"));
//!
//! for error in &selection.errors {
//!     println!("{}: {}", error.tag, error.message);
//! }
//! ```

pub mod context;
pub mod handlers;
pub mod results;
pub mod selection;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EvaluationConfig;
use crate::core::{
    credential::{
        wrap_credential, wrap_presentation, ClaimsDecoder, CredentialError, JwtPayloadDecoder,
    },
    filter::{FilterValidator, JsonSchemaFilter},
    presentation_definition::{DefinitionError, PresentationDefinition},
    presentation_submission::{DescriptorMap, PresentationSubmission},
};
use context::{Candidate, EvaluationContext, SubmissionDraft};
use handlers::{default_handlers, EvaluationHandler};
use results::{CheckLog, Checked, HandlerCheckResult};
use selection::SubmissionRequirementMatch;

/// Fatal evaluation errors. Everything else is reported in the results.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Presentation(#[from] CredentialError),
}

impl From<DefinitionError> for EvaluationError {
    fn from(e: DefinitionError) -> Self {
        Self::MalformedInput(e.to_string())
    }
}

/// The log of a run together with the submission built from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResults {
    pub results: Vec<HandlerCheckResult>,
    #[serde(rename = "presentation_submission")]
    pub submission: PresentationSubmission,
}

impl EvaluationResults {
    /// Whether any check of the run failed.
    pub fn has_errors(&self) -> bool {
        self.results
            .iter()
            .any(|result| result.status == results::Status::Error)
    }
}

/// The credentials to disclose, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectResults {
    pub errors: Vec<Checked>,
    pub warnings: Vec<Checked>,
    pub matches: Vec<SubmissionRequirementMatch>,
    /// The selected credentials, as supplied, in input order.
    #[serde(rename = "verifiableCredentials")]
    pub verifiable_credentials: Vec<Value>,
}

impl SelectResults {
    pub fn is_satisfied(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Presentation definition evaluator.
///
/// The evaluator holds no per-run state and can be shared between threads.
#[derive(Debug)]
pub struct Evaluator {
    handlers: Vec<Box<dyn EvaluationHandler + Send + Sync>>,
    decoder: Box<dyn ClaimsDecoder + Send + Sync>,
    filter: Box<dyn FilterValidator + Send + Sync>,
    config: EvaluationConfig,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvaluationConfig::default())
    }
}

impl Evaluator {
    /// An evaluator running the default handler chain.
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            handlers: default_handlers(),
            decoder: Box::new(JwtPayloadDecoder),
            filter: Box::new(JsonSchemaFilter),
            config,
        }
    }

    /// Replace the handler chain.
    ///
    /// Selection reads the results of
    /// [MarkForSubmissionEvaluation](handlers::MarkForSubmissionEvaluation), so
    /// a custom chain should end with it.
    pub fn with_handlers(mut self, handlers: Vec<Box<dyn EvaluationHandler + Send + Sync>>) -> Self {
        self.handlers = handlers;
        self
    }

    /// Append a handler to the chain.
    pub fn push_handler(mut self, handler: impl EvaluationHandler + Send + Sync + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_decoder(mut self, decoder: impl ClaimsDecoder + Send + Sync + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn with_filter(mut self, filter: impl FilterValidator + Send + Sync + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn handlers(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|handler| handler.name())
    }

    /// Run the handler chain over `credentials` and build the presentation
    /// submission from the pairs found eligible.
    ///
    /// Credentials are given as JWTs, decoded JWT claims or Linked-Data
    /// objects. A credential that cannot be normalized is reported as an
    /// error for every input descriptor and does not stop the run.
    pub fn evaluate(
        &self,
        definition: &PresentationDefinition,
        credentials: &[Value],
    ) -> EvaluationResults {
        let candidates = self.candidates(credentials);
        let (log, draft) = self.run(definition, &candidates, None);

        EvaluationResults {
            submission: submission(definition, &draft, |entry| entry),
            results: log.into_entries(),
        }
    }

    /// [Evaluator::evaluate] over raw JSON.
    pub fn evaluate_json(
        &self,
        definition: &Value,
        credentials: &Value,
    ) -> Result<EvaluationResults, EvaluationError> {
        let definition = PresentationDefinition::from_json(definition)?;
        let credentials = credentials_array(credentials)?;
        Ok(self.evaluate(&definition, credentials))
    }

    /// Evaluate the credentials embedded in a verifiable presentation.
    ///
    /// The holder of the presentation counts as a holder DID. When the
    /// presentation is a JWT, descriptor map entries point at the
    /// presentation with `path_nested` locating the credential inside it.
    pub fn evaluate_presentation(
        &self,
        definition: &PresentationDefinition,
        presentation: &Value,
    ) -> Result<EvaluationResults, EvaluationError> {
        let presentation = wrap_presentation(presentation, self.decoder.as_ref())?;
        let candidates: Vec<Candidate> = presentation
            .credentials()
            .iter()
            .zip(presentation.wrapped_credentials())
            .map(|(original, wrapped)| Candidate {
                original: original.clone(),
                wrapped: wrapped.clone(),
            })
            .collect();

        let (log, draft) = self.run(definition, &candidates, presentation.holder());

        let format = presentation.format();
        let submission = if presentation.encoding().is_token() {
            submission(definition, &draft, |entry| {
                let nested = DescriptorMap::new(
                    entry.id.clone(),
                    entry.format.clone(),
                    entry.path.replacen("$.", "$.vp.", 1),
                );
                DescriptorMap::new(entry.id, format.clone(), "$").set_path_nested(nested)
            })
        } else {
            submission(definition, &draft, |entry| entry)
        };

        Ok(EvaluationResults {
            results: log.into_entries(),
            submission,
        })
    }

    /// Run the handler chain and select the credentials to disclose.
    ///
    /// `holder_did` is added to the holder DIDs of the configuration for
    /// this run.
    pub fn select_from(
        &self,
        definition: &PresentationDefinition,
        credentials: &[Value],
        holder_did: Option<&str>,
    ) -> SelectResults {
        let candidates = self.candidates(credentials);
        let (log, _) = self.run(definition, &candidates, holder_did);
        let selection = selection::select(definition, &log);

        SelectResults {
            errors: selection.errors,
            warnings: selection.warnings,
            matches: selection.matches,
            verifiable_credentials: selection
                .credentials
                .into_iter()
                .filter_map(|c| credentials.get(c).cloned())
                .collect(),
        }
    }

    /// [Evaluator::select_from] over raw JSON.
    pub fn select_from_json(
        &self,
        definition: &Value,
        credentials: &Value,
        holder_did: Option<&str>,
    ) -> Result<SelectResults, EvaluationError> {
        let definition = PresentationDefinition::from_json(definition)?;
        let credentials = credentials_array(credentials)?;
        Ok(self.select_from(&definition, credentials, holder_did))
    }

    fn candidates(&self, credentials: &[Value]) -> Vec<Candidate> {
        credentials
            .iter()
            .enumerate()
            .map(|(c, original)| {
                let wrapped = wrap_credential(original, self.decoder.as_ref());
                if let Err(e) = &wrapped {
                    warn!(credential = c, "dropping credential: {e}");
                }
                Candidate {
                    original: original.clone(),
                    wrapped,
                }
            })
            .collect()
    }

    fn run(
        &self,
        definition: &PresentationDefinition,
        candidates: &[Candidate],
        holder_did: Option<&str>,
    ) -> (CheckLog, SubmissionDraft) {
        let mut context =
            EvaluationContext::new(definition, candidates, &self.config, self.filter.as_ref())
                .with_holder_dids(holder_did.map(str::to_owned));

        for handler in &self.handlers {
            let before = context.log().len();
            handler.handle(&mut context);
            debug!(
                handler = handler.name(),
                definition = definition.id().as_str(),
                results = context.log().len() - before,
                "handler run"
            );
        }

        context.into_parts()
    }
}

/// Build the presentation submission from the claimed slots of `draft`.
fn submission(
    definition: &PresentationDefinition,
    draft: &SubmissionDraft,
    entry: impl Fn(DescriptorMap) -> DescriptorMap,
) -> PresentationSubmission {
    PresentationSubmission::new(
        uuid::Uuid::new_v4(),
        definition.id(),
        draft.claimed().map(|slot| entry(slot.entry.clone())).collect(),
    )
}

fn credentials_array(credentials: &Value) -> Result<&[Value], EvaluationError> {
    credentials.as_array().map(Vec::as_slice).ok_or_else(|| {
        EvaluationError::MalformedInput("credentials must be a JSON array".to_owned())
    })
}
