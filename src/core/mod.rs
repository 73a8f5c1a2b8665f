pub mod credential;
pub mod credential_format;
pub mod filter;
pub mod input_descriptor;
pub mod path;
pub mod presentation_definition;
pub mod presentation_submission;
pub mod submission_requirement;
