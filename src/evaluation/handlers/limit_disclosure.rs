use serde_json::{Map, Value};
use tracing::debug;

use super::{failure_status, EvaluationHandler, InputDescriptorFilterEvaluation};
use crate::evaluation::{
    context::EvaluationContext,
    results::{HandlerCheckResult, Status},
};

/// Members kept in a limited credential whatever the requested fields.
const BASE_MEMBERS: [&str; 6] = [
    "@context",
    "type",
    "id",
    "issuer",
    "issuanceDate",
    "expirationDate",
];

/// Checks `limit_disclosure` for the pairs accepted by the filter handler.
///
/// The credential must carry a proof from one of the configured
/// selective-disclosure suites. On success the payload is the credential
/// reduced to its base members and the fields the descriptor selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitDisclosureEvaluation;

impl LimitDisclosureEvaluation {
    pub const NAME: &'static str = "LimitDisclosureEvaluation";
}

impl EvaluationHandler for LimitDisclosureEvaluation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, context: &mut EvaluationContext<'_>) {
        let config = context.config();

        for (d, descriptor, c, credential) in context.pairs() {
            let Some(directive) = descriptor.constraints().limit_disclosure() else {
                continue;
            };
            let Some(selected) = context
                .log()
                .find(InputDescriptorFilterEvaluation::NAME, d, c)
                .filter(|result| result.status == Status::Info)
                .and_then(|result| result.payload.clone())
            else {
                continue;
            };

            let internal = credential.internal();
            let supported = internal
                .proof_types()
                .iter()
                .any(|suite| config.supports_limit_disclosure(suite));

            let result = if supported {
                HandlerCheckResult::new(
                    d,
                    c,
                    Self::NAME,
                    Status::Info,
                    "credential can be limited to the requested fields",
                )
                .with_payload(limit(internal.as_json(), &selected))
            } else {
                debug!(
                    descriptor = descriptor.id(),
                    credential = c,
                    proofs = ?internal.proof_types(),
                    "no selective disclosure suite"
                );
                HandlerCheckResult::new(
                    d,
                    c,
                    Self::NAME,
                    failure_status(directive),
                    "credential proof does not support selective disclosure",
                )
            };

            context.push(result);
        }
    }
}

/// The credential reduced to its base members, the subject id and the
/// fields listed in the filter payload.
fn limit(credential: &Value, selected: &Value) -> Value {
    let mut limited = Map::new();
    if let Value::Object(members) = credential {
        for member in BASE_MEMBERS {
            if let Some(value) = members.get(member) {
                limited.insert(member.to_owned(), value.clone());
            }
        }
    }

    let mut limited = Value::Object(limited);
    copy_pointer(
        credential,
        &mut limited,
        &["credentialSubject".to_owned(), "id".to_owned()],
    );

    let fields = selected.get("fields").and_then(Value::as_array);
    for field in fields.into_iter().flatten() {
        let pointer: Vec<String> = field
            .get("pointer")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|token| token.as_str().map(str::to_owned))
            .collect();
        copy_pointer(credential, &mut limited, &pointer);
    }

    limited
}

/// Copy the member of `source` at `tokens` into `target`, creating the
/// intermediate objects. Arrays are copied whole.
fn copy_pointer(source: &Value, target: &mut Value, tokens: &[String]) {
    let Some((head, rest)) = tokens.split_first() else {
        return;
    };
    let (Value::Object(source), Value::Object(target)) = (source, target) else {
        return;
    };
    let Some(value) = source.get(head) else {
        return;
    };

    if rest.is_empty() || !value.is_object() {
        target.insert(head.clone(), value.clone());
        return;
    }

    let next = target
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    copy_pointer(value, next, rest);
}
