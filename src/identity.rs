//! Identity summary derived from a Codex `auth.json` document.
//!
//! Extraction is total: any field that is missing, of the wrong type, or fails
//! to decode simply comes back empty. Nothing here returns an error.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// How the credential authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoginType {
    #[serde(rename = "api_key")]
    ApiKey,
    #[serde(rename = "chatgpt")]
    ChatGpt,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl LoginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginType::ApiKey => "api_key",
            LoginType::ChatGpt => "chatgpt",
            LoginType::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, LoginType::Unknown)
    }
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `null` (written by older tools) as [`LoginType::Unknown`].
pub fn login_type_or_unknown<'de, D>(deserializer: D) -> Result<LoginType, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LoginType>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySummary {
    pub account_id: Option<String>,
    pub email: Option<String>,
    pub login_type: LoginType,
}

impl IdentitySummary {
    pub fn is_empty(&self) -> bool {
        self.account_id.is_none() && self.email.is_none() && !self.login_type.is_known()
    }

    /// Same account as `other`, judged by account id only.
    pub fn same_account(&self, other: &IdentitySummary) -> bool {
        matches!((&self.account_id, &other.account_id), (Some(a), Some(b)) if a == b)
    }
}

/// Derive the identity summary from a parsed credential document.
///
/// An API key wins over a refresh token when both are present.
pub fn extract(document: &Value) -> IdentitySummary {
    let tokens = document.get("tokens").filter(|t| t.is_object());

    let account_id = tokens
        .and_then(|t| non_empty_str(t.get("account_id")))
        .map(str::to_string);

    let email = tokens
        .and_then(|t| non_empty_str(t.get("id_token")))
        .and_then(decode_jwt_payload)
        .and_then(|payload| email_claim(&payload));

    let has_api_key = document
        .get("OPENAI_API_KEY")
        .and_then(Value::as_str)
        .is_some_and(|k| !k.trim().is_empty());
    let has_refresh_token = tokens
        .and_then(|t| non_empty_str(t.get("refresh_token")))
        .is_some();

    let login_type = if has_api_key {
        LoginType::ApiKey
    } else if has_refresh_token {
        LoginType::ChatGpt
    } else {
        LoginType::Unknown
    };

    IdentitySummary {
        account_id,
        email,
        login_type,
    }
}

/// Parse raw bytes and extract; malformed JSON yields an empty summary.
pub fn extract_from_bytes(bytes: &[u8]) -> IdentitySummary {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(document) => extract(&document),
        Err(e) => {
            tracing::debug!("credential is not valid JSON: {e}");
            IdentitySummary::default()
        }
    }
}

/// Read and extract; a missing or unreadable file yields an empty summary.
pub fn extract_from_path(path: &Path) -> IdentitySummary {
    match std::fs::read(path) {
        Ok(bytes) => extract_from_bytes(&bytes),
        Err(e) => {
            tracing::debug!(path = %path.display(), "credential unreadable: {e}");
            IdentitySummary::default()
        }
    }
}

/// Decode the payload segment of a `header.payload.signature` token.
///
/// The signature is not checked. Padding is restored before decoding, so both
/// padded and unpadded segments are accepted.
pub fn decode_jwt_payload(token: &str) -> Option<Value> {
    let mut parts = token.split('.');
    let _header = parts.next()?;
    let payload = parts.next()?;

    let mut padded = payload.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    let raw = URL_SAFE.decode(padded.as_bytes()).ok()?;
    let value: Value = serde_json::from_slice(&raw).ok()?;
    value.is_object().then_some(value)
}

fn email_claim(payload: &Value) -> Option<String> {
    ["email", "preferred_username"]
        .iter()
        .find_map(|claim| non_empty_str(payload.get(*claim)))
        .map(str::to_string)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// `abcdefgh…wxyz` for long identifiers, unchanged otherwise.
pub fn shorten(s: &str) -> String {
    const KEEP_START: usize = 8;
    const KEEP_END: usize = 4;

    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= KEEP_START + KEEP_END + 3 {
        return s.to_string();
    }
    let head: String = chars[..KEEP_START].iter().collect();
    let tail: String = chars[chars.len() - KEEP_END..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn fake_jwt(payload: &Value) -> String {
        let b64 = |b: &[u8]| URL_SAFE_NO_PAD.encode(b);
        let header = b64(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = b64(serde_json::to_string(payload).unwrap().as_bytes());
        let signature = b64(b"sig");
        format!("{header}.{payload}.{signature}")
    }

    #[test]
    fn test_empty_document() {
        let summary = extract(&json!({}));
        assert_eq!(summary, IdentitySummary::default());
        assert_eq!(summary.login_type, LoginType::Unknown);
        assert!(summary.is_empty());
    }

    #[test]
    fn test_api_key_login() {
        let summary = extract(&json!({"OPENAI_API_KEY": "sk-x"}));
        assert_eq!(summary.login_type, LoginType::ApiKey);
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let summary = extract(&json!({"OPENAI_API_KEY": "   "}));
        assert_eq!(summary.login_type, LoginType::Unknown);
    }

    #[test]
    fn test_api_key_wins_over_refresh_token() {
        let summary = extract(&json!({
            "OPENAI_API_KEY": "sk-x",
            "tokens": {"refresh_token": "rt"}
        }));
        assert_eq!(summary.login_type, LoginType::ApiKey);
    }

    #[test]
    fn test_chatgpt_login_with_email() {
        let token = fake_jwt(&json!({"email": "a@b.com"}));
        let summary = extract(&json!({
            "tokens": {
                "account_id": "acc1",
                "id_token": token,
                "refresh_token": "rt"
            }
        }));
        assert_eq!(summary.account_id.as_deref(), Some("acc1"));
        assert_eq!(summary.email.as_deref(), Some("a@b.com"));
        assert_eq!(summary.login_type, LoginType::ChatGpt);
    }

    #[test]
    fn test_preferred_username_fallback() {
        let token = fake_jwt(&json!({"preferred_username": "user@example.org"}));
        let summary = extract(&json!({"tokens": {"id_token": token}}));
        assert_eq!(summary.email.as_deref(), Some("user@example.org"));
    }

    #[test]
    fn test_padded_payload_segment() {
        let payload = URL_SAFE.encode(br#"{"email":"a@b.com"}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(
            decode_jwt_payload(&token).unwrap()["email"],
            json!("a@b.com")
        );
    }

    #[test]
    fn test_token_without_payload_segment() {
        assert!(decode_jwt_payload("onlyonepart").is_none());
        let summary = extract(&json!({"tokens": {"id_token": "onlyonepart"}}));
        assert!(summary.email.is_none());
    }

    #[test]
    fn test_garbage_payload_yields_no_email() {
        let summary = extract(&json!({"tokens": {"id_token": "a.!!!not-base64!!!.c"}}));
        assert!(summary.email.is_none());

        let not_json = URL_SAFE_NO_PAD.encode(b"plain text");
        assert!(decode_jwt_payload(&format!("a.{not_json}.c")).is_none());

        let array = URL_SAFE_NO_PAD.encode(b"[1,2]");
        assert!(decode_jwt_payload(&format!("a.{array}.c")).is_none());
    }

    #[test]
    fn test_wrong_field_types_are_ignored() {
        let summary = extract(&json!({
            "tokens": {"account_id": 42, "refresh_token": ""},
            "OPENAI_API_KEY": null
        }));
        assert_eq!(summary, IdentitySummary::default());

        let summary = extract(&json!({"tokens": "not-an-object"}));
        assert_eq!(summary, IdentitySummary::default());

        let summary = extract(&json!([1, 2, 3]));
        assert_eq!(summary, IdentitySummary::default());
    }

    #[test]
    fn test_extract_from_bytes_malformed() {
        assert_eq!(extract_from_bytes(b"{not json"), IdentitySummary::default());
    }

    #[test]
    fn test_login_type_serde() {
        assert_eq!(serde_json::to_string(&LoginType::ChatGpt).unwrap(), "\"chatgpt\"");
        assert_eq!(serde_json::to_string(&LoginType::ApiKey).unwrap(), "\"api_key\"");

        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "login_type_or_unknown")]
            login_type: LoginType,
        }
        let h: Holder = serde_json::from_str(r#"{"login_type": null}"#).unwrap();
        assert_eq!(h.login_type, LoginType::Unknown);
        let h: Holder = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(h.login_type, LoginType::Unknown);
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("short"), "short");
        assert_eq!(shorten("123456789012345"), "123456789012345");
        assert_eq!(shorten("1234567890123456"), "12345678…3456");
    }
}
