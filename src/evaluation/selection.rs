//! Resolution of submission requirements against the outcome of the handler
//! chain.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::handlers::MarkForSubmissionEvaluation;
use super::results::{verifiable_credential_path, CheckLog, Checked, Status};
use crate::core::{
    input_descriptor::GroupId,
    presentation_definition::PresentationDefinition,
    submission_requirement::{RequirementSource, RuleKind, SubmissionRequirement},
};

/// Credentials eligible for submission, per input descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eligibility {
    by_descriptor: Vec<BTreeSet<usize>>,
}

impl Eligibility {
    /// Read the pairs marked for submission from `log`.
    pub fn from_log(log: &CheckLog, descriptors: usize) -> Self {
        let mut by_descriptor = vec![BTreeSet::new(); descriptors];
        for result in log.by_evaluator(MarkForSubmissionEvaluation::NAME, Status::Info) {
            if let Some(credentials) = by_descriptor.get_mut(result.descriptor_index()) {
                credentials.insert(result.credential_index());
            }
        }
        Self { by_descriptor }
    }

    /// Credentials eligible for the `descriptor`-th input descriptor, in
    /// array order.
    pub fn credentials(&self, descriptor: usize) -> impl Iterator<Item = usize> + '_ {
        self.by_descriptor
            .get(descriptor)
            .into_iter()
            .flatten()
            .copied()
    }

    pub fn is_satisfied(&self, descriptor: usize) -> bool {
        self.by_descriptor
            .get(descriptor)
            .is_some_and(|credentials| !credentials.is_empty())
    }

    pub fn is_eligible(&self, descriptor: usize, credential: usize) -> bool {
        self.by_descriptor
            .get(descriptor)
            .is_some_and(|credentials| credentials.contains(&credential))
    }
}

/// Where the members of a reported requirement came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Group labels of a leaf.
    From(Vec<GroupId>),
    /// Reports of the satisfied nested requirements.
    FromNested(Vec<SubmissionRequirementMatch>),
}

/// The report of a satisfied submission requirement.
///
/// `matches` lists the credential paths selected by a leaf and is always
/// empty for an internal node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRequirementMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub rule: RuleKind,
    pub count: usize,
    pub matches: Vec<String>,
    #[serde(flatten)]
    pub source: MatchSource,
    #[serde(skip)]
    credentials: BTreeSet<usize>,
}

impl SubmissionRequirementMatch {
    /// Indices of every credential reachable from this report, in array
    /// order.
    pub fn credentials(&self) -> impl Iterator<Item = usize> + '_ {
        self.credentials.iter().copied()
    }
}

/// Resolve one requirement tree, bottom-up.
///
/// Returns `None` when the requirement is not satisfied.
pub fn resolve(
    requirement: &SubmissionRequirement,
    definition: &PresentationDefinition,
    eligibility: &Eligibility,
) -> Option<SubmissionRequirementMatch> {
    let rule = requirement.rule();

    let (count, matches, source, credentials) = match requirement.source() {
        RequirementSource::From(group) => {
            let members: Vec<usize> = definition
                .input_descriptors_in_group(group)
                .map(|(d, _)| d)
                .collect();
            let satisfied: Vec<usize> = members
                .iter()
                .copied()
                .filter(|d| eligibility.is_satisfied(*d))
                .collect();

            let take = rule.take(satisfied.len(), members.len())?;
            let credentials: BTreeSet<usize> = satisfied[..take]
                .iter()
                .flat_map(|d| eligibility.credentials(*d))
                .collect();
            let matches: Vec<String> = credentials
                .iter()
                .map(|c| verifiable_credential_path(*c))
                .collect();

            (take, matches, MatchSource::From(vec![group.clone()]), credentials)
        }
        RequirementSource::FromNested(nested) => {
            let satisfied: Vec<SubmissionRequirementMatch> = nested
                .iter()
                .filter_map(|child| resolve(child, definition, eligibility))
                .collect();

            let take = rule.take(satisfied.len(), nested.len())?;
            let credentials: BTreeSet<usize> = satisfied
                .iter()
                .flat_map(|child| child.credentials.iter().copied())
                .collect();

            (take, Vec::new(), MatchSource::FromNested(satisfied), credentials)
        }
    };

    Some(SubmissionRequirementMatch {
        name: requirement.name().cloned(),
        purpose: requirement.purpose().cloned(),
        rule: rule.kind(),
        count,
        matches,
        source,
        credentials,
    })
}

/// The outcome of selection, with credentials given by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub errors: Vec<Checked>,
    pub warnings: Vec<Checked>,
    pub matches: Vec<SubmissionRequirementMatch>,
    /// Indices of the credentials to disclose, deduplicated, in array order.
    pub credentials: Vec<usize>,
}

impl Selection {
    pub fn is_satisfied(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Select the credentials to submit for `definition` from a completed log.
///
/// Without submission requirements every input descriptor must have an
/// eligible credential, and each is reported on its own as an `all` rule.
pub fn select(definition: &PresentationDefinition, log: &CheckLog) -> Selection {
    let eligibility = Eligibility::from_log(log, definition.input_descriptors().len());
    let mut selection = Selection::default();

    match definition.submission_requirements() {
        Some(requirements) => {
            for (index, requirement) in requirements.iter().enumerate() {
                match resolve(requirement, definition, &eligibility) {
                    Some(report) => selection.matches.push(report),
                    None => {
                        let tag = requirement
                            .name()
                            .or(requirement.purpose())
                            .cloned()
                            .unwrap_or_else(|| format!("$.submission_requirements[{index}]"));
                        warn!(requirement = tag.as_str(), "submission requirement is not satisfied");
                        selection.errors.push(Checked::new(
                            tag,
                            Status::Error,
                            format!(
                                "submission requirement over groups {:?} is not satisfied",
                                requirement.groups()
                            ),
                        ));
                    }
                }
            }
        }
        None => {
            for (d, descriptor) in definition.input_descriptors().iter().enumerate() {
                if !eligibility.is_satisfied(d) {
                    warn!(descriptor = descriptor.id(), "input descriptor is not satisfied");
                    selection.errors.push(Checked::new(
                        descriptor.id(),
                        Status::Error,
                        "no credential is eligible for the input descriptor",
                    ));
                    continue;
                }

                let credentials: BTreeSet<usize> = eligibility.credentials(d).collect();
                selection.matches.push(SubmissionRequirementMatch {
                    name: descriptor.name().cloned(),
                    purpose: descriptor.purpose().cloned(),
                    rule: RuleKind::All,
                    count: 1,
                    matches: credentials
                        .iter()
                        .map(|c| verifiable_credential_path(*c))
                        .collect(),
                    source: MatchSource::From(descriptor.groups().to_vec()),
                    credentials,
                });
            }
        }
    }

    for result in log.entries() {
        if result.status == Status::Warn
            && eligibility.is_eligible(result.descriptor_index(), result.credential_index())
        {
            selection.warnings.push(Checked::new(
                result.evaluator.clone(),
                Status::Warn,
                format!(
                    "{}: {} ({})",
                    result.input_descriptor_path, result.message, result.verifiable_credential_path
                ),
            ));
        }
    }

    let credentials: BTreeSet<usize> = selection
        .matches
        .iter()
        .flat_map(SubmissionRequirementMatch::credentials)
        .collect();
    selection.credentials = credentials.into_iter().collect();

    debug!(
        matches = selection.matches.len(),
        errors = selection.errors.len(),
        warnings = selection.warnings.len(),
        "selection resolved"
    );

    selection
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::evaluation::results::HandlerCheckResult;

    fn definition(requirements: serde_json::Value) -> PresentationDefinition {
        PresentationDefinition::from_json(&json!({
            "id": "pd",
            "submission_requirements": requirements,
            "input_descriptors": [
                { "id": "banking", "group": ["A"] },
                { "id": "employment", "group": ["A", "B"] },
                { "id": "license", "group": ["A", "B"] },
                { "id": "passport", "group": ["C"] }
            ]
        }))
        .unwrap()
    }

    /// Credential `i` is eligible for descriptor `i` only, and the passport
    /// has no credential.
    fn log() -> CheckLog {
        let mut log = CheckLog::new();
        for i in 0..3 {
            for d in 0..4 {
                let status = if d == i { Status::Info } else { Status::Error };
                log.push(HandlerCheckResult::new(
                    d,
                    i,
                    MarkForSubmissionEvaluation::NAME,
                    status,
                    "",
                ));
            }
        }
        log
    }

    #[test]
    fn test_leaf_rules() {
        let selection = select(&definition(json!([{ "rule": "all", "from": "A" }])), &log());
        assert!(selection.is_satisfied());
        assert_eq!(selection.matches[0].count, 3);
        assert_eq!(selection.credentials, vec![0, 1, 2]);

        let selection = select(
            &definition(json!([{ "rule": "pick", "max": 1, "from": "B" }])),
            &log(),
        );
        assert_eq!(selection.matches[0].count, 1);
        assert_eq!(selection.matches[0].matches, vec!["$.verifiableCredential[1]"]);

        let selection = select(
            &definition(json!([{ "rule": "pick", "min": 1, "from": "A" }])),
            &log(),
        );
        assert_eq!(selection.matches[0].count, 1);
        assert_eq!(selection.matches[0].matches, vec!["$.verifiableCredential[0]"]);
        assert_eq!(selection.credentials, vec![0]);

        let selection = select(
            &definition(json!([{ "name": "Three of B", "rule": "pick", "min": 3, "from": "B" }])),
            &log(),
        );
        assert!(selection.matches.is_empty());
        assert!(selection.credentials.is_empty());
        assert_eq!(selection.errors[0].tag, "Three of B");
    }

    #[test]
    fn test_nested_rules() {
        let selection = select(
            &definition(json!([{
                "rule": "pick",
                "count": 1,
                "from_nested": [
                    { "rule": "all", "from": "A" },
                    { "rule": "pick", "min": 2, "from": "B" },
                    { "rule": "all", "from": "C" }
                ]
            }])),
            &log(),
        );

        let report = &selection.matches[0];
        assert_eq!(report.count, 1);
        assert!(report.matches.is_empty());
        let MatchSource::FromNested(children) = &report.source else {
            panic!("expected nested reports");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].matches, vec!["$.verifiableCredential[1]", "$.verifiableCredential[2]"]);
        assert_eq!(selection.credentials, vec![0, 1, 2]);
    }

    #[test]
    fn test_report_shape() {
        let selection = select(
            &definition(json!([{ "rule": "pick", "min": 2, "from": "B" }])),
            &log(),
        );

        assert_eq!(
            serde_json::to_value(&selection.matches[0]).unwrap(),
            json!({
                "rule": "pick",
                "count": 2,
                "matches": ["$.verifiableCredential[1]", "$.verifiableCredential[2]"],
                "from": ["B"]
            })
        );
    }

    #[test]
    fn test_without_requirements() {
        let definition = PresentationDefinition::from_json(&json!({
            "id": "pd",
            "input_descriptors": [{ "id": "banking", "name": "Bank account" }]
        }))
        .unwrap();
        let mut log = CheckLog::new();
        log.push(HandlerCheckResult::new(0, 0, "PredicateRelatedFieldEvaluation", Status::Warn, "preferred"));
        log.push(HandlerCheckResult::new(0, 0, MarkForSubmissionEvaluation::NAME, Status::Info, ""));

        let selection = select(&definition, &log);

        assert_eq!(selection.matches.len(), 1);
        assert_eq!(selection.matches[0].count, 1);
        assert_eq!(selection.matches[0].name.as_deref(), Some("Bank account"));
        assert_eq!(selection.warnings.len(), 1);
        assert_eq!(selection.warnings[0].tag, "PredicateRelatedFieldEvaluation");
    }
}
