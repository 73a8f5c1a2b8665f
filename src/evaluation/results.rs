use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one check, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Info,
    Warn,
    Error,
}

/// Path of the `index`-th input descriptor of a definition.
pub fn input_descriptor_path(index: usize) -> String {
    format!("$.input_descriptors[{index}]")
}

/// Path of the `index`-th credential of the evaluated set.
pub fn verifiable_credential_path(index: usize) -> String {
    format!("$.verifiableCredential[{index}]")
}

/// The outcome of one handler for one (input descriptor, credential) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerCheckResult {
    pub input_descriptor_path: String,
    pub verifiable_credential_path: String,
    pub evaluator: String,
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip)]
    pair: (usize, usize),
}

impl HandlerCheckResult {
    pub fn new(
        descriptor: usize,
        credential: usize,
        evaluator: impl Into<String>,
        status: Status,
        message: impl Into<String>,
    ) -> Self {
        Self {
            input_descriptor_path: input_descriptor_path(descriptor),
            verifiable_credential_path: verifiable_credential_path(credential),
            evaluator: evaluator.into(),
            status,
            message: message.into(),
            payload: None,
            pair: (descriptor, credential),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Index of the input descriptor in the definition.
    pub fn descriptor_index(&self) -> usize {
        self.pair.0
    }

    /// Index of the credential in the evaluated set.
    pub fn credential_index(&self) -> usize {
        self.pair.1
    }

    pub fn is_for(&self, descriptor: usize, credential: usize) -> bool {
        self.pair == (descriptor, credential)
    }
}

/// A finding reported by selection: an unsatisfied requirement or an
/// advisory check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checked {
    /// What the finding is about: a requirement name, a descriptor id or an
    /// evaluator.
    pub tag: String,
    pub status: Status,
    pub message: String,
}

impl Checked {
    pub fn new(tag: impl Into<String>, status: Status, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            status,
            message: message.into(),
        }
    }
}

/// Append-only log of the results of an evaluation run.
///
/// Handlers observe every entry appended before them; entries are never
/// modified or removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckLog {
    entries: Vec<HandlerCheckResult>,
}

impl CheckLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: HandlerCheckResult) {
        self.entries.push(result);
    }

    pub fn entries(&self) -> &[HandlerCheckResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Results logged for a pair, in log order.
    pub fn for_pair(
        &self,
        descriptor: usize,
        credential: usize,
    ) -> impl Iterator<Item = &HandlerCheckResult> {
        self.entries
            .iter()
            .filter(move |result| result.is_for(descriptor, credential))
    }

    /// Whether any handler rejected the pair.
    pub fn has_error(&self, descriptor: usize, credential: usize) -> bool {
        self.for_pair(descriptor, credential)
            .any(|result| result.status == Status::Error)
    }

    /// The result `evaluator` logged for a pair, if any.
    pub fn find(
        &self,
        evaluator: &str,
        descriptor: usize,
        credential: usize,
    ) -> Option<&HandlerCheckResult> {
        self.for_pair(descriptor, credential)
            .find(|result| result.evaluator == evaluator)
    }

    /// Results logged by `evaluator` with the given status.
    pub fn by_evaluator<'a>(
        &'a self,
        evaluator: &'a str,
        status: Status,
    ) -> impl Iterator<Item = &'a HandlerCheckResult> + 'a {
        self.entries
            .iter()
            .filter(move |result| result.evaluator == evaluator && result.status == status)
    }

    pub fn into_entries(self) -> Vec<HandlerCheckResult> {
        self.entries
    }
}
