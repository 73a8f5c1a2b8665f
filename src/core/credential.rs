//! Normalized views over externally supplied credentials and presentations.
//!
//! A credential reaches the evaluator in one of three encodings: a compact
//! JWT string, the decoded claims of such a JWT (with the credential under
//! `vc`), or a Linked-Data credential object. [wrap_credential] classifies
//! the input and produces one [InternalCredential] view whatever the
//! encoding, so that constraint paths written against either shape resolve.

use std::fmt::Debug;

use base64::prelude::*;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::credential_format::ClaimFormatDesignation;

/// NumericDate values above this bound are interpreted as milliseconds.
const MAX_SECONDS_TIMESTAMP: i64 = 9_999_999_999;

/// How a credential or presentation was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncodingKind {
    /// A compact JWT string.
    TokenEncoded,
    /// The decoded claims of a JWT.
    TokenDecoded,
    /// A Linked-Data object.
    LinkedData,
}

impl EncodingKind {
    pub fn is_token(&self) -> bool {
        matches!(self, Self::TokenEncoded | Self::TokenDecoded)
    }
}

/// Token decoding error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("token is not a compact JWT")]
    NotCompact,

    #[error("token payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token payload is not valid JSON: {0}")]
    Json(String),

    #[error("token payload is not a JSON object")]
    NotAnObject,
}

/// Credential normalization error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// The token could not be decoded.
    #[error("credential could not be decoded: {0}")]
    Decoding(#[from] DecodeError),

    /// An envelope claim contradicts the value carried by the credential.
    #[error("inconsistent `{claim}` between envelope ({envelope}) and credential ({body})")]
    InconsistentClaim {
        claim: &'static str,
        envelope: String,
        body: String,
    },

    /// Neither a token nor a Linked-Data shape was recognized.
    #[error("malformed credential: {0}")]
    Malformed(String),
}

/// Turns an encoded token into its claims.
///
/// Verification of the token is the responsibility of the caller: the
/// evaluator only needs the claims.
pub trait ClaimsDecoder: Debug {
    fn decode(&self, token: &str) -> Result<Map<String, Value>, DecodeError>;
}

/// [ClaimsDecoder] reading the payload of a compact JWS without checking its
/// signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtPayloadDecoder;

impl ClaimsDecoder for JwtPayloadDecoder {
    fn decode(&self, token: &str) -> Result<Map<String, Value>, DecodeError> {
        let mut parts = token.trim().split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DecodeError::NotCompact);
        };

        let payload = BASE64_URL_SAFE_NO_PAD.decode(payload)?;

        match serde_json::from_slice(&payload).map_err(|e| DecodeError::Json(e.to_string()))? {
            Value::Object(claims) => Ok(claims),
            _ => Err(DecodeError::NotAnObject),
        }
    }
}

/// Format agnostic view of a credential.
///
/// For JWT credentials this is the claims set where `vc` holds the
/// reconciled credential, and the credential members are also available at
/// the top level. Linked-Data credentials are used as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalCredential(Value);

impl InternalCredential {
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// The issuer id, from either a string `issuer` or `issuer.id`.
    pub fn issuer(&self) -> Option<&str> {
        match self.0.get("issuer")? {
            Value::String(issuer) => Some(issuer),
            Value::Object(issuer) => issuer.get("id")?.as_str(),
            _ => None,
        }
    }

    /// The ids of the credential subjects.
    pub fn subject_ids(&self) -> Vec<&str> {
        one_or_many(self.0.get("credentialSubject"))
            .filter_map(|subject| subject.get("id")?.as_str())
            .collect()
    }

    /// The `type` of each attached proof.
    pub fn proof_types(&self) -> Vec<&str> {
        one_or_many(self.0.get("proof"))
            .filter_map(|proof| proof.get("type")?.as_str())
            .collect()
    }

    pub fn types(&self) -> Vec<&str> {
        strings(self.0.get("type"))
    }

    /// The `@context` entries given as URIs.
    pub fn contexts(&self) -> Vec<&str> {
        strings(self.0.get("@context"))
    }

    pub fn credential_schema_ids(&self) -> Vec<&str> {
        one_or_many(self.0.get("credentialSchema"))
            .filter_map(|schema| schema.get("id")?.as_str())
            .collect()
    }
}

/// A credential as supplied, together with its normalized view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedVerifiableCredential {
    original: Value,
    decoded: Value,
    encoding: EncodingKind,
    internal: InternalCredential,
}

impl WrappedVerifiableCredential {
    /// The input, untouched.
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// The parsed input: the claims of a token, or the input object itself.
    pub fn decoded(&self) -> &Value {
        &self.decoded
    }

    pub fn encoding(&self) -> EncodingKind {
        self.encoding
    }

    pub fn internal(&self) -> &InternalCredential {
        &self.internal
    }

    /// The claim format designation of the credential.
    pub fn format(&self) -> ClaimFormatDesignation {
        if self.encoding.is_token() {
            ClaimFormatDesignation::JwtVc
        } else {
            ClaimFormatDesignation::LdpVc
        }
    }
}

/// A presentation as supplied, together with its wrapped credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedVerifiablePresentation {
    original: Value,
    decoded: Value,
    encoding: EncodingKind,
    credentials: Vec<Value>,
    wrapped: Vec<Result<WrappedVerifiableCredential, CredentialError>>,
}

impl WrappedVerifiablePresentation {
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// The presentation view: for a token, the claims with the `vp` members
    /// hoisted and `holder`, `id` and the validity dates taken from the
    /// envelope.
    pub fn decoded(&self) -> &Value {
        &self.decoded
    }

    pub fn encoding(&self) -> EncodingKind {
        self.encoding
    }

    pub fn format(&self) -> ClaimFormatDesignation {
        if self.encoding.is_token() {
            ClaimFormatDesignation::JwtVp
        } else {
            ClaimFormatDesignation::LdpVp
        }
    }

    /// The embedded credentials, as supplied.
    pub fn credentials(&self) -> &[Value] {
        &self.credentials
    }

    /// The outcome of wrapping each embedded credential, in order.
    ///
    /// A credential that fails to wrap does not invalidate the presentation.
    pub fn wrapped_credentials(&self) -> &[Result<WrappedVerifiableCredential, CredentialError>] {
        &self.wrapped
    }

    pub fn holder(&self) -> Option<&str> {
        match self.decoded.get("holder")? {
            Value::String(holder) => Some(holder),
            Value::Object(holder) => holder.get("id")?.as_str(),
            _ => None,
        }
    }
}

/// Classify and normalize a credential.
///
/// A bare string is a token, decoded with `decoder`. An object carrying a
/// `vc` claim is the decoded form of a token. An object with a
/// `credentialSubject` and an `id` or `@context` is a Linked-Data
/// credential. Anything else is [CredentialError::Malformed].
pub fn wrap_credential(
    input: &Value,
    decoder: &dyn ClaimsDecoder,
) -> Result<WrappedVerifiableCredential, CredentialError> {
    let (decoded, encoding) = match input {
        Value::String(token) => (decoder.decode(token)?, EncodingKind::TokenEncoded),
        Value::Object(object) if object.contains_key("vc") => {
            (object.clone(), EncodingKind::TokenDecoded)
        }
        Value::Object(object)
            if object.contains_key("credentialSubject")
                && (object.contains_key("id") || object.contains_key("@context")) =>
        {
            return Ok(WrappedVerifiableCredential {
                original: input.clone(),
                decoded: input.clone(),
                encoding: EncodingKind::LinkedData,
                internal: InternalCredential(input.clone()),
            });
        }
        _ => {
            return Err(CredentialError::Malformed(
                "expected a JWT, a `vc` claims set or a Linked-Data credential".into(),
            ))
        }
    };

    let body = reconcile_envelope(&decoded)?;
    let internal = InternalCredential(hoist(&decoded, "vc", body));

    Ok(WrappedVerifiableCredential {
        original: input.clone(),
        decoded: Value::Object(decoded),
        encoding,
        internal,
    })
}

/// Classify and normalize a presentation, wrapping every embedded credential.
pub fn wrap_presentation(
    input: &Value,
    decoder: &dyn ClaimsDecoder,
) -> Result<WrappedVerifiablePresentation, CredentialError> {
    let (decoded, encoding) = match input {
        Value::String(token) => {
            let claims = decoder.decode(token)?;
            (presentation_view(&claims)?, EncodingKind::TokenEncoded)
        }
        Value::Object(claims) if claims.contains_key("vp") => {
            (presentation_view(claims)?, EncodingKind::TokenDecoded)
        }
        Value::Object(_) if input.get("verifiableCredential").is_some() => {
            (input.clone(), EncodingKind::LinkedData)
        }
        _ => {
            return Err(CredentialError::Malformed(
                "expected a JWT, a `vp` claims set or a Linked-Data presentation".into(),
            ))
        }
    };

    let credentials: Vec<Value> = match decoded.get("verifiableCredential") {
        Some(Value::Array(credentials)) => credentials.clone(),
        Some(credential) => vec![credential.clone()],
        None => Vec::new(),
    };
    let wrapped = credentials
        .iter()
        .map(|credential| wrap_credential(credential, decoder))
        .collect();

    Ok(WrappedVerifiablePresentation {
        original: input.clone(),
        decoded,
        encoding,
        credentials,
        wrapped,
    })
}

/// Reconcile the registered claims of a JWT envelope with the credential it
/// carries under `vc`, returning the reconciled credential.
///
/// | claim | credential member       |
/// |-------|-------------------------|
/// | `iss` | `issuer` or `issuer.id` |
/// | `nbf` | `issuanceDate`          |
/// | `exp` | `expirationDate`        |
/// | `sub` | `credentialSubject.id`  |
/// | `jti` | `id`                    |
///
/// The envelope value is written into the credential. When the credential
/// already holds a different value the claims are inconsistent and
/// [CredentialError::InconsistentClaim] is returned. Dates are compared as
/// instants and written in RFC 3339 form.
pub fn reconcile_envelope(envelope: &Map<String, Value>) -> Result<Value, CredentialError> {
    let mut body = match envelope.get("vc") {
        Some(Value::Object(body)) => body.clone(),
        _ => return Err(CredentialError::Malformed("`vc` claim is not an object".into())),
    };

    if let Some(iss) = string_claim(envelope, "iss")? {
        match body.get_mut("issuer") {
            Some(Value::Object(issuer)) => reconcile_member(issuer, "id", "iss", iss)?,
            _ => reconcile_member(&mut body, "issuer", "iss", iss)?,
        }
    }

    if let Some(nbf) = date_claim(envelope, "nbf")? {
        reconcile_date(&mut body, "issuanceDate", "nbf", nbf)?;
    }

    if let Some(exp) = date_claim(envelope, "exp")? {
        reconcile_date(&mut body, "expirationDate", "exp", exp)?;
    }

    if let Some(sub) = string_claim(envelope, "sub")? {
        let subject = body
            .entry("credentialSubject")
            .or_insert_with(|| Value::Object(Map::new()));
        // Several subjects cannot be told apart from a single `sub`.
        if let Value::Object(subject) = subject {
            reconcile_member(subject, "id", "sub", sub)?;
        }
    }

    if let Some(jti) = string_claim(envelope, "jti")? {
        reconcile_member(&mut body, "id", "jti", jti)?;
    }

    Ok(Value::Object(body))
}

/// Build the view of a `vp` claims set.
fn presentation_view(claims: &Map<String, Value>) -> Result<Value, CredentialError> {
    let mut body = match claims.get("vp") {
        Some(Value::Object(body)) => body.clone(),
        _ => return Err(CredentialError::Malformed("`vp` claim is not an object".into())),
    };

    if let Some(iss) = string_claim(claims, "iss")? {
        reconcile_member(&mut body, "holder", "iss", iss)?;
    }
    if let Some(nbf) = date_claim(claims, "nbf")? {
        reconcile_date(&mut body, "issuanceDate", "nbf", nbf)?;
    }
    if let Some(exp) = date_claim(claims, "exp")? {
        reconcile_date(&mut body, "expirationDate", "exp", exp)?;
    }
    if let Some(jti) = string_claim(claims, "jti")? {
        reconcile_member(&mut body, "id", "jti", jti)?;
    }

    Ok(hoist(claims, "vp", Value::Object(body)))
}

/// The envelope with `key` replaced by `body`, and the members of `body`
/// copied to the top level where the envelope does not define them.
fn hoist(envelope: &Map<String, Value>, key: &str, body: Value) -> Value {
    let mut view = envelope.clone();
    if let Value::Object(members) = &body {
        for (name, value) in members {
            if !view.contains_key(name) {
                view.insert(name.clone(), value.clone());
            }
        }
    }
    view.insert(key.to_owned(), body);
    Value::Object(view)
}

fn reconcile_member(
    target: &mut Map<String, Value>,
    member: &str,
    claim: &'static str,
    value: String,
) -> Result<(), CredentialError> {
    match target.get(member) {
        Some(Value::String(existing)) if *existing == value => {}
        None | Some(Value::Null) => {}
        Some(existing) => {
            return Err(CredentialError::InconsistentClaim {
                claim,
                envelope: value,
                body: display(existing),
            })
        }
    }
    target.insert(member.to_owned(), Value::String(value));
    Ok(())
}

fn reconcile_date(
    target: &mut Map<String, Value>,
    member: &str,
    claim: &'static str,
    (instant, rendered): (DateTime<Utc>, String),
) -> Result<(), CredentialError> {
    let consistent = match target.get(member) {
        None | Some(Value::Null) => true,
        Some(Value::String(existing)) => match DateTime::parse_from_rfc3339(existing) {
            Ok(existing) => existing == instant,
            Err(_) => *existing == rendered,
        },
        Some(_) => false,
    };

    if !consistent {
        return Err(CredentialError::InconsistentClaim {
            claim,
            envelope: rendered,
            body: target.get(member).map(display).unwrap_or_default(),
        });
    }

    target.insert(member.to_owned(), Value::String(rendered));
    Ok(())
}

fn string_claim(
    claims: &Map<String, Value>,
    claim: &'static str,
) -> Result<Option<String>, CredentialError> {
    match claims.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(CredentialError::Malformed(format!(
            "`{claim}` claim is not a string"
        ))),
    }
}

/// Read a NumericDate claim, returning the instant and its RFC 3339 form.
fn date_claim(
    claims: &Map<String, Value>,
    claim: &'static str,
) -> Result<Option<(DateTime<Utc>, String)>, CredentialError> {
    let timestamp = match claims.get(claim) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    let invalid = || CredentialError::Malformed(format!("`{claim}` claim is not a NumericDate"));
    let timestamp = timestamp.ok_or_else(invalid)?;

    let date = if timestamp > MAX_SECONDS_TIMESTAMP {
        DateTime::<Utc>::from_timestamp_millis(timestamp)
            .map(|date| (date, date.to_rfc3339_opts(SecondsFormat::Millis, true)))
    } else {
        DateTime::<Utc>::from_timestamp(timestamp, 0)
            .map(|date| (date, date.to_rfc3339_opts(SecondsFormat::Secs, true)))
    };

    date.ok_or_else(invalid).map(Some)
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn one_or_many(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    let items: &[Value] = match value {
        Some(Value::Array(items)) => items,
        Some(value) => std::slice::from_ref(value),
        None => &[],
    };
    items.iter()
}

fn strings(value: Option<&Value>) -> Vec<&str> {
    one_or_many(value).filter_map(Value::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(claims: &Value) -> String {
        let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = BASE64_URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.")
    }

    fn jwt_claims() -> Value {
        json!({
            "iss": "did:example:123",
            "sub": "did:example:ebfeb1f712ebc6f1c276e12ec21",
            "nbf": 1262304000,
            "jti": "https://example.com/credentials/3732",
            "vc": {
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": ["VerifiableCredential", "UniversityDegreeCredential"],
                "issuer": { "id": "did:example:123", "name": "Example University" },
                "credentialSubject": {
                    "degree": { "type": "BachelorDegree", "name": "Bachelor of Science" }
                }
            }
        })
    }

    #[test]
    fn test_wrap_token_encoded() {
        let token = Value::String(encode(&jwt_claims()));
        let wrapped = wrap_credential(&token, &JwtPayloadDecoder).unwrap();

        assert_eq!(wrapped.encoding(), EncodingKind::TokenEncoded);
        assert_eq!(wrapped.original(), &token);
        assert_eq!(wrapped.format(), ClaimFormatDesignation::JwtVc);

        let internal = wrapped.internal();
        assert_eq!(internal.issuer(), Some("did:example:123"));
        assert_eq!(
            internal.subject_ids(),
            vec!["did:example:ebfeb1f712ebc6f1c276e12ec21"]
        );
        assert_eq!(internal.as_json()["vc"]["issuanceDate"], json!("2010-01-01T00:00:00Z"));
        assert_eq!(internal.as_json()["vc"]["id"], json!("https://example.com/credentials/3732"));
        // Hoisted next to the envelope claims.
        assert_eq!(internal.as_json()["issuanceDate"], json!("2010-01-01T00:00:00Z"));
        assert_eq!(internal.as_json()["iss"], json!("did:example:123"));
    }

    #[test]
    fn test_wrap_token_decoded() {
        let claims = jwt_claims();
        let wrapped = wrap_credential(&claims, &JwtPayloadDecoder).unwrap();

        assert_eq!(wrapped.encoding(), EncodingKind::TokenDecoded);
        assert_eq!(wrapped.decoded(), &claims);
        assert_eq!(
            wrapped.internal().types(),
            vec!["VerifiableCredential", "UniversityDegreeCredential"]
        );
    }

    #[test]
    fn test_wrap_linked_data() {
        let credential = json!({
            "@context": "https://www.w3.org/2018/credentials/v1",
            "id": "https://eu.com/claims/DriversLicense",
            "type": ["EUDriversLicense"],
            "issuer": "did:example:123",
            "credentialSubject": { "id": "did:example:ebfeb1f712ebc6f1c276e12ec21" },
            "proof": { "type": "RsaSignature2018" }
        });
        let wrapped = wrap_credential(&credential, &JwtPayloadDecoder).unwrap();

        assert_eq!(wrapped.encoding(), EncodingKind::LinkedData);
        assert_eq!(wrapped.internal().as_json(), &credential);
        assert_eq!(wrapped.internal().proof_types(), vec!["RsaSignature2018"]);
        assert_eq!(
            wrapped.internal().contexts(),
            vec!["https://www.w3.org/2018/credentials/v1"]
        );
    }

    #[test]
    fn test_malformed_and_undecodable() {
        assert!(matches!(
            wrap_credential(&json!({ "comment": "nothing here" }), &JwtPayloadDecoder),
            Err(CredentialError::Malformed(_))
        ));
        assert!(matches!(
            wrap_credential(&json!("not-a-jwt"), &JwtPayloadDecoder),
            Err(CredentialError::Decoding(DecodeError::NotCompact))
        ));
        assert!(matches!(
            wrap_credential(&json!("a.$$$.c"), &JwtPayloadDecoder),
            Err(CredentialError::Decoding(DecodeError::Base64(_)))
        ));
    }

    #[test]
    fn test_inconsistent_claims() {
        let mut claims = jwt_claims();
        claims["vc"]["issuanceDate"] = json!("2011-01-01T00:00:00Z");

        assert!(matches!(
            wrap_credential(&claims, &JwtPayloadDecoder),
            Err(CredentialError::InconsistentClaim { claim: "nbf", .. })
        ));

        let mut claims = jwt_claims();
        claims["vc"]["issuer"] = json!("did:example:456");

        assert!(matches!(
            wrap_credential(&claims, &JwtPayloadDecoder),
            Err(CredentialError::InconsistentClaim { claim: "iss", .. })
        ));
    }

    #[test]
    fn test_equal_dates_in_other_notation_are_consistent() {
        let mut claims = jwt_claims();
        claims["vc"]["issuanceDate"] = json!("2010-01-01T00:00:00.000Z");

        let body = reconcile_envelope(claims.as_object().unwrap()).unwrap();
        assert_eq!(body["issuanceDate"], json!("2010-01-01T00:00:00Z"));
    }

    #[test]
    fn test_millisecond_dates() {
        let mut claims = jwt_claims();
        claims["exp"] = json!(1893456000123_i64);

        let body = reconcile_envelope(claims.as_object().unwrap()).unwrap();
        assert_eq!(body["expirationDate"], json!("2030-01-01T00:00:00.123Z"));
    }

    #[test]
    fn test_wrap_token_presentation() {
        let credential = encode(&jwt_claims());
        let vp = encode(&json!({
            "iss": "did:example:ebfeb1f712ebc6f1c276e12ec21",
            "jti": "urn:uuid:3978344f-8596-4c3a-a978-8fcaba3903c5",
            "vp": {
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": ["VerifiablePresentation"],
                "verifiableCredential": [credential, { "comment": "unknown" }]
            }
        }));

        let presentation = wrap_presentation(&Value::String(vp), &JwtPayloadDecoder).unwrap();

        assert_eq!(presentation.encoding(), EncodingKind::TokenEncoded);
        assert_eq!(presentation.format(), ClaimFormatDesignation::JwtVp);
        assert_eq!(
            presentation.holder(),
            Some("did:example:ebfeb1f712ebc6f1c276e12ec21")
        );
        assert_eq!(presentation.credentials().len(), 2);
        assert!(presentation.wrapped_credentials()[0].is_ok());
        assert!(presentation.wrapped_credentials()[1].is_err());
    }
}
