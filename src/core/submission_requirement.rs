use super::input_descriptor::GroupId;
use crate::utils::NonEmptyVec;

use serde::{Deserialize, Serialize};

/// The `rule` property of a submission requirement, as written on the wire.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    All,
    Pick,
}

/// The bound of a `pick` rule: either an exact `count`, or a `min`/`max`
/// range where an omitted side is unconstrained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickBound {
    Count(usize),
    Range {
        min: Option<usize>,
        max: Option<usize>,
    },
}

/// A submission requirement rule together with its bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Every member must be satisfied.
    All,
    /// A number of members, within the bound, must be satisfied.
    Pick(PickBound),
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::All => RuleKind::All,
            Rule::Pick(_) => RuleKind::Pick,
        }
    }

    /// Decide whether `satisfied` out of `total` members meet this rule.
    ///
    /// Returns how many of the satisfied members are taken when the rule is
    /// met, `None` otherwise. Members are taken first-fit in declaration
    /// order: `pick` takes the first `count`, or the first `min` once `min`
    /// is reached. A range without `min` takes up to `max`, all of them when
    /// `max` is open too.
    pub fn take(&self, satisfied: usize, total: usize) -> Option<usize> {
        match *self {
            Rule::All => (satisfied == total).then_some(total),
            Rule::Pick(PickBound::Count(count)) => (satisfied >= count).then_some(count),
            Rule::Pick(PickBound::Range { min, max }) => {
                match min {
                    Some(min) if satisfied < min => None,
                    Some(min) if min > 0 => Some(min),
                    _ => Some(max.map_or(satisfied, |max| satisfied.min(max))),
                }
            }
        }
    }
}

/// Where a submission requirement draws its members from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequirementSource {
    /// Leaf: the input descriptors tagged with this group.
    From(GroupId),
    /// Internal node: the nested submission requirements.
    FromNested(NonEmptyVec<SubmissionRequirement>),
}

/// Submission Requirements describe which combinations of inputs must be
/// submitted to satisfy a presentation definition.
///
/// A requirement is a tree: leaves select input descriptors by group with
/// `from`, internal nodes combine other requirements with `from_nested`.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirements](https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirements)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "SubmissionRequirementObject",
    into = "SubmissionRequirementObject"
)]
pub struct SubmissionRequirement {
    rule: Rule,
    source: RequirementSource,
    name: Option<String>,
    purpose: Option<String>,
}

impl SubmissionRequirement {
    /// A leaf requirement over the input descriptors of `group`.
    pub fn from_group(rule: Rule, group: impl Into<GroupId>) -> Self {
        Self {
            rule,
            source: RequirementSource::From(group.into()),
            name: None,
            purpose: None,
        }
    }

    /// An internal requirement over nested requirements.
    pub fn from_nested(rule: Rule, nested: NonEmptyVec<SubmissionRequirement>) -> Self {
        Self {
            rule,
            source: RequirementSource::FromNested(nested),
            name: None,
            purpose: None,
        }
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    pub fn set_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn source(&self) -> &RequirementSource {
        &self.source
    }

    /// Every group referenced by this requirement or its descendants.
    pub fn groups(&self) -> Vec<&GroupId> {
        match &self.source {
            RequirementSource::From(group) => vec![group],
            RequirementSource::FromNested(nested) => nested
                .iter()
                .flat_map(SubmissionRequirement::groups)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionRequirementError {
    #[error("submission requirement must contain exactly one of `from` or `from_nested`")]
    AmbiguousSource,

    #[error("`from_nested` must contain at least one submission requirement")]
    EmptyNested,

    #[error("`count`, `min` and `max` are only allowed with the `pick` rule")]
    BoundWithAll,

    #[error("`count` cannot be combined with `min` or `max`")]
    CountWithRange,

    #[error("`min` ({min}) is greater than `max` ({max})")]
    InvalidRange { min: usize, max: usize },
}

/// Wire representation of a [SubmissionRequirement].
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SubmissionRequirementObject {
    rule: RuleKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_nested: Option<Vec<SubmissionRequirement>>,
}

impl TryFrom<SubmissionRequirementObject> for SubmissionRequirement {
    type Error = SubmissionRequirementError;

    fn try_from(object: SubmissionRequirementObject) -> Result<Self, Self::Error> {
        let source = match (object.from, object.from_nested) {
            (Some(group), None) => RequirementSource::From(group),
            (None, Some(nested)) => RequirementSource::FromNested(
                NonEmptyVec::try_from(nested)
                    .map_err(|_| SubmissionRequirementError::EmptyNested)?,
            ),
            _ => return Err(SubmissionRequirementError::AmbiguousSource),
        };

        let rule = match (object.rule, object.count, object.min, object.max) {
            (RuleKind::All, None, None, None) => Rule::All,
            (RuleKind::All, ..) => return Err(SubmissionRequirementError::BoundWithAll),
            (RuleKind::Pick, Some(count), None, None) => Rule::Pick(PickBound::Count(count)),
            (RuleKind::Pick, Some(_), ..) => {
                return Err(SubmissionRequirementError::CountWithRange)
            }
            (RuleKind::Pick, None, Some(min), Some(max)) if min > max => {
                return Err(SubmissionRequirementError::InvalidRange { min, max })
            }
            (RuleKind::Pick, None, min, max) => Rule::Pick(PickBound::Range { min, max }),
        };

        Ok(Self {
            rule,
            source,
            name: object.name,
            purpose: object.purpose,
        })
    }
}

impl From<SubmissionRequirement> for SubmissionRequirementObject {
    fn from(requirement: SubmissionRequirement) -> Self {
        let (count, min, max) = match requirement.rule {
            Rule::All => (None, None, None),
            Rule::Pick(PickBound::Count(count)) => (Some(count), None, None),
            Rule::Pick(PickBound::Range { min, max }) => (None, min, max),
        };
        let (from, from_nested) = match requirement.source {
            RequirementSource::From(group) => (Some(group), None),
            RequirementSource::FromNested(nested) => (None, Some(nested.into_inner())),
        };

        Self {
            rule: requirement.rule.kind(),
            name: requirement.name,
            purpose: requirement.purpose,
            count,
            min,
            max,
            from,
            from_nested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_requirement_deserialization() {
        let requirement: SubmissionRequirement = serde_json::from_value(json!({
            "name": "Confirm banking relationship or employment and residence proofs",
            "purpose": "Recent bank statements or proofs of both employment and residence will be validated to initiate your loan application but not stored",
            "rule": "pick",
            "count": 1,
            "from_nested": [
                { "rule": "all", "from": "A" },
                { "rule": "pick", "min": 2, "from": "B" }
            ]
        }))
        .unwrap();

        assert_eq!(requirement.rule(), &Rule::Pick(PickBound::Count(1)));
        assert_eq!(requirement.groups(), vec!["A", "B"]);

        let RequirementSource::FromNested(nested) = requirement.source() else {
            panic!("expected a nested requirement");
        };
        assert_eq!(
            nested[1].rule(),
            &Rule::Pick(PickBound::Range {
                min: Some(2),
                max: None
            })
        );
    }

    #[test]
    fn test_invalid_requirements() {
        let both = json!({ "rule": "all", "from": "A", "from_nested": [{ "rule": "all", "from": "B" }] });
        let count_and_min = json!({ "rule": "pick", "count": 1, "min": 1, "from": "A" });
        let all_with_count = json!({ "rule": "all", "count": 1, "from": "A" });
        let inverted = json!({ "rule": "pick", "min": 3, "max": 1, "from": "A" });
        let empty_nested = json!({ "rule": "all", "from_nested": [] });

        for value in [both, count_and_min, all_with_count, inverted, empty_nested] {
            assert!(serde_json::from_value::<SubmissionRequirement>(value).is_err());
        }
    }

    #[test]
    fn test_wire_roundtrip_keeps_shape() {
        let value = json!({ "rule": "pick", "max": 2, "from": "B", "name": "Eligibility to Work Proof" });
        let requirement: SubmissionRequirement = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(requirement).unwrap(), value);
    }

    #[test]
    fn test_rule_take() {
        assert_eq!(Rule::All.take(3, 3), Some(3));
        assert_eq!(Rule::All.take(2, 3), None);

        let pick_one = Rule::Pick(PickBound::Count(1));
        assert_eq!(pick_one.take(2, 2), Some(1));
        assert_eq!(pick_one.take(0, 2), None);

        let at_least_two = Rule::Pick(PickBound::Range {
            min: Some(2),
            max: None,
        });
        assert_eq!(at_least_two.take(3, 3), Some(2));
        assert_eq!(at_least_two.take(2, 3), Some(2));
        assert_eq!(at_least_two.take(1, 3), None);

        let between_one_and_two = Rule::Pick(PickBound::Range {
            min: Some(1),
            max: Some(2),
        });
        assert_eq!(between_one_and_two.take(3, 3), Some(1));

        let at_most_one = Rule::Pick(PickBound::Range {
            min: None,
            max: Some(1),
        });
        assert_eq!(at_most_one.take(2, 2), Some(1));
        assert_eq!(at_most_one.take(0, 2), Some(0));
    }
}
