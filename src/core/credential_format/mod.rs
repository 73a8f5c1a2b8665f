use core::fmt;
use std::{borrow::Cow, collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};

const FORMAT_JWT: &str = "jwt";
const FORMAT_JWT_VC: &str = "jwt_vc";
const FORMAT_JWT_VP: &str = "jwt_vp";
const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_JWT_VP_JSON: &str = "jwt_vp_json";
const FORMAT_LDP: &str = "ldp";
const FORMAT_LDP_VC: &str = "ldp_vc";
const FORMAT_LDP_VP: &str = "ldp_vp";

/// A Json object of claim formats, as found in the `format` property of a
/// presentation definition or of an input descriptor.
pub type ClaimFormatMap = HashMap<ClaimFormatDesignation, ClaimFormatPayload>;

/// The algorithms or proof types accepted for one claim format.
///
/// JWT formats list signing algorithms under `alg`, Linked-Data Proof formats
/// list proof suites under `proof_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimFormatPayload {
    #[serde(rename = "alg")]
    Alg(Vec<String>),
    #[serde(rename = "proof_type")]
    ProofType(Vec<String>),
    #[serde(untagged)]
    Other(serde_json::Value),
}

impl ClaimFormatPayload {
    /// Whether a credential secured with `proof_type` is acceptable.
    ///
    /// Only a `proof_type` payload restricts proof suites. A credential whose
    /// proof type is unknown is accepted, since the proof itself is not
    /// inspected here.
    pub fn accepts_proof_type(&self, proof_type: Option<&str>) -> bool {
        match (self, proof_type) {
            (Self::ProofType(accepted), Some(proof_type)) => {
                accepted.iter().any(|accepted| accepted == proof_type)
            }
            _ => true,
        }
    }
}

/// The claim format designation of a credential or presentation.
///
/// Registry of claim format types: <https://identity.foundation/claim-format-registry/#registry>
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClaimFormatDesignation {
    /// A JSON Web Token submitted as an encoded string.
    Jwt,

    /// A W3C Verifiable Credential secured as a JWT.
    JwtVc,

    /// A W3C Verifiable Presentation secured as a JWT.
    JwtVp,

    JwtVcJson,

    JwtVpJson,

    /// A Linked-Data Proof submitted as an object.
    Ldp,

    /// A W3C Verifiable Credential secured with a Linked-Data Proof.
    LdpVc,

    /// A W3C Verifiable Presentation secured with a Linked-Data Proof.
    LdpVp,

    /// Any other claim format designation, by name.
    Other(String),
}

impl ClaimFormatDesignation {
    pub fn from_name(name: Cow<str>) -> Self {
        match name.as_ref() {
            FORMAT_JWT => Self::Jwt,
            FORMAT_JWT_VC => Self::JwtVc,
            FORMAT_JWT_VP => Self::JwtVp,
            FORMAT_JWT_VC_JSON => Self::JwtVcJson,
            FORMAT_JWT_VP_JSON => Self::JwtVpJson,
            FORMAT_LDP => Self::Ldp,
            FORMAT_LDP_VC => Self::LdpVc,
            FORMAT_LDP_VP => Self::LdpVp,
            _ => Self::Other(name.into_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Jwt => FORMAT_JWT,
            Self::JwtVc => FORMAT_JWT_VC,
            Self::JwtVp => FORMAT_JWT_VP,
            Self::JwtVcJson => FORMAT_JWT_VC_JSON,
            Self::JwtVpJson => FORMAT_JWT_VP_JSON,
            Self::Ldp => FORMAT_LDP,
            Self::LdpVc => FORMAT_LDP_VC,
            Self::LdpVp => FORMAT_LDP_VP,
            Self::Other(other) => other,
        }
    }

    /// Whether this designation names a JWT-secured format.
    pub fn is_jwt(&self) -> bool {
        matches!(
            self,
            Self::Jwt | Self::JwtVc | Self::JwtVp | Self::JwtVcJson | Self::JwtVpJson
        )
    }

    /// Whether this designation names a Linked-Data Proof format.
    pub fn is_ldp(&self) -> bool {
        matches!(self, Self::Ldp | Self::LdpVc | Self::LdpVp)
    }

    /// Designations that describe the same credential as `self`.
    ///
    /// A credential of format `jwt_vc` also satisfies a request for `jwt` or
    /// `jwt_vc_json`, and an `ldp_vc` one satisfies a request for `ldp`.
    pub fn aliases(&self) -> Vec<ClaimFormatDesignation> {
        match self {
            Self::JwtVc | Self::JwtVcJson => vec![Self::JwtVc, Self::JwtVcJson, Self::Jwt],
            Self::JwtVp | Self::JwtVpJson => vec![Self::JwtVp, Self::JwtVpJson, Self::Jwt],
            Self::LdpVc => vec![Self::LdpVc, Self::Ldp],
            Self::LdpVp => vec![Self::LdpVp, Self::Ldp],
            other => vec![other.clone()],
        }
    }

    /// Find the payload of `formats` that applies to a credential of this
    /// format, if any.
    pub fn lookup<'a>(&self, formats: &'a ClaimFormatMap) -> Option<&'a ClaimFormatPayload> {
        self.aliases().iter().find_map(|alias| formats.get(alias))
    }
}

impl From<&str> for ClaimFormatDesignation {
    fn from(s: &str) -> Self {
        Self::from_name(Cow::Borrowed(s))
    }
}

impl From<String> for ClaimFormatDesignation {
    fn from(value: String) -> Self {
        Self::from_name(Cow::Owned(value))
    }
}

impl FromStr for ClaimFormatDesignation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl fmt::Display for ClaimFormatDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl Serialize for ClaimFormatDesignation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.name().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimFormatDesignation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_format_map_deserialization() {
        let formats: ClaimFormatMap = serde_json::from_value(json!({
            "jwt_vc": { "alg": ["ES256", "EdDSA"] },
            "ldp_vc": { "proof_type": ["Ed25519Signature2018"] },
            "dc+sd-jwt": { "sd-jwt_alg_values": ["ES256"] }
        }))
        .unwrap();

        assert_eq!(
            formats.get(&ClaimFormatDesignation::JwtVc),
            Some(&ClaimFormatPayload::Alg(vec!["ES256".into(), "EdDSA".into()]))
        );
        assert!(formats.contains_key(&ClaimFormatDesignation::Other("dc+sd-jwt".into())));
    }

    #[test]
    fn test_lookup_through_aliases() {
        let formats: ClaimFormatMap = serde_json::from_value(json!({
            "ldp": { "proof_type": ["RsaSignature2018"] }
        }))
        .unwrap();

        let payload = ClaimFormatDesignation::LdpVc.lookup(&formats).unwrap();
        assert!(payload.accepts_proof_type(Some("RsaSignature2018")));
        assert!(!payload.accepts_proof_type(Some("Ed25519Signature2018")));
        assert!(ClaimFormatDesignation::JwtVc.lookup(&formats).is_none());
    }
}
