use serde::{Deserialize, Serialize};

pub const RESOLVE_PATH: &str = "smiles";
pub const DEPICTION_PATH: &str = "render2d";
pub const STRUCTURE_PATH: &str = "render3d";

/// Request parameter carrying a resolved identifier on the render endpoints.
pub const IDENTIFIER_PARAM: &str = "smiles";

/// Model format tag understood by the rendering engine for structure blobs.
pub const STRUCTURE_FORMAT: &str = "mol2";
pub const STRUCTURE_MIME_TYPE: &str = "chemical/x-mol2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveQuery {
    pub text: String,
}

/// Ordered identifiers returned by the resolution endpoint; only the first
/// is used. Entries the service could not resolve come back as `null`.
pub type ResolveResponse = Vec<Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierPayload {
    pub smiles: String,
}

impl IdentifierPayload {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            smiles: identifier.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_payload_uses_service_parameter_name() {
        let value = serde_json::to_value(IdentifierPayload::new("CCO")).expect("json");
        assert_eq!(value, serde_json::json!({ IDENTIFIER_PARAM: "CCO" }));
    }

    #[test]
    fn resolve_response_is_a_plain_list() {
        let parsed: ResolveResponse = serde_json::from_str(r#"["CCO",null]"#).expect("parse");
        assert_eq!(parsed, vec![Some("CCO".to_string()), None]);
    }
}
