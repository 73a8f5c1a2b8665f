//! This library evaluates credentials against a [DIF Presentation Exchange]
//! presentation definition, and selects the credentials a holder should
//! disclose.
//!
//! [DIF Presentation Exchange]: <https://identity.foundation/presentation-exchange/spec/v2.0.0/>
//!
//! # Usage
//!
//! Parse the definition sent by the verifier, then run an [`Evaluator`] over
//! the credentials of the holder:
//!
//! ```ignore
//! use presentation_exchange::core::presentation_definition::PresentationDefinition;
//! use presentation_exchange::evaluation::Evaluator;
//! use presentation_exchange::config::EvaluationConfig;
//!
//! let definition = PresentationDefinition::from_json(&definition_json)?;
//!
//! let config = EvaluationConfig::default().add_holder_did("did:example:holder");
//! let evaluator = Evaluator::new(config);
//!
//! // Which credentials satisfy the submission requirements?
//! let selection = evaluator.select_from(&definition, &credentials, None);
//! if !selection.is_satisfied() {
//!     for error in &selection.errors {
//!         println!("{}: {}", error.tag, error.message);
//!     }
//! }
//!
//! // The checks of every (input descriptor, credential) pair, and the
//! // presentation submission describing the eligible ones.
//! let evaluation = evaluator.evaluate(&definition, &selection.verifiable_credentials);
//! let submission = serde_json::to_value(&evaluation.submission)?;
//! ```
//!
//! Credentials are given as compact JWTs, decoded JWT claims sets or
//! Linked-Data objects. Tokens are decoded by a [`ClaimsDecoder`], which does
//! not verify signatures: verification is left to the caller.
//!
//! [`Evaluator`]: crate::evaluation::Evaluator
//! [`ClaimsDecoder`]: crate::core::credential::ClaimsDecoder
//!
//! # Evaluation Overview
//!
//! 1. *Normalization*: every credential is wrapped into a format agnostic
//!    view, reconciling the registered claims of a JWT with the credential it
//!    carries. See [`core::credential`].
//! 2. *Checks*: a chain of handlers inspects every pair of input descriptor
//!    and credential, each for one concern (format, schema, fields,
//!    predicates, subject relations, limited disclosure) and appends its
//!    results to the log of the run. See [`evaluation::handlers`].
//! 3. *Selection*: the submission requirements of the definition are
//!    resolved against the pairs found eligible. See
//!    [`evaluation::selection`].
//!
//! [`core::credential`]: crate::core::credential
//! [`evaluation::handlers`]: crate::evaluation::handlers
//! [`evaluation::selection`]: crate::evaluation::selection

pub mod config;
pub mod core;
pub mod evaluation;
pub mod utils;
pub use serde_json_path::JsonPath;
