use serde::Deserialize;

use crate::core::credential_format::ClaimFormatDesignation;

/// Proof suites able to derive a selectively disclosed credential.
pub const DEFAULT_LIMIT_DISCLOSURE_SUITES: [&str; 2] =
    ["BbsBlsSignatureProof2020", "BbsBlsSignature2020"];

/// Evaluation settings.
///
/// Every field has a default, so a configuration file only needs to name
/// what it changes.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EvaluationConfig {
    /// DIDs controlled by the holder, checked by `is_holder` constraints.
    pub holder_dids: Vec<String>,
    /// Proof suites accepted when an input descriptor limits disclosure.
    pub limit_disclosure_signature_suites: Vec<String>,
    /// When set, only credentials in one of these formats are considered.
    pub restrict_to_formats: Option<Vec<ClaimFormatDesignation>>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            holder_dids: Vec::new(),
            limit_disclosure_signature_suites: DEFAULT_LIMIT_DISCLOSURE_SUITES
                .iter()
                .map(|suite| suite.to_string())
                .collect(),
            restrict_to_formats: None,
        }
    }
}

impl EvaluationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_holder_did(mut self, did: impl Into<String>) -> Self {
        self.holder_dids.push(did.into());
        self
    }

    pub fn set_holder_dids(mut self, dids: Vec<String>) -> Self {
        self.holder_dids = dids;
        self
    }

    pub fn set_limit_disclosure_signature_suites(mut self, suites: Vec<String>) -> Self {
        self.limit_disclosure_signature_suites = suites;
        self
    }

    pub fn set_restrict_to_formats(mut self, formats: Vec<ClaimFormatDesignation>) -> Self {
        self.restrict_to_formats = Some(formats);
        self
    }

    /// Whether `suite` can produce a selectively disclosed credential.
    pub fn supports_limit_disclosure(&self, suite: &str) -> bool {
        self.limit_disclosure_signature_suites
            .iter()
            .any(|supported| supported == suite)
    }

    /// Whether credentials of `format` may be evaluated at all.
    pub fn allows_format(&self, format: &ClaimFormatDesignation) -> bool {
        match &self.restrict_to_formats {
            Some(allowed) => format.aliases().iter().any(|alias| allowed.contains(alias)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_config() {
        let config: EvaluationConfig = serde_json::from_value(json!({
            "holder_dids": ["did:example:ebfeb1f712ebc6f1c276e12ec21"],
            "restrict_to_formats": ["ldp"]
        }))
        .unwrap();

        assert_eq!(config.holder_dids.len(), 1);
        assert!(config.supports_limit_disclosure("BbsBlsSignatureProof2020"));
        assert!(config.allows_format(&ClaimFormatDesignation::LdpVc));
        assert!(!config.allows_format(&ClaimFormatDesignation::JwtVc));
    }
}
