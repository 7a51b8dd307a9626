//! Token claims decoding.
//!
//! Tokens are JWT-shaped: `header.claims.signature`. Only the claims segment
//! is read. Signature verification is the server's job; the client uses the
//! claims purely to know *when* a token stops being accepted and *who* it
//! identifies.
//!
//! Claims consumed:
//!
//! | Claim | Type | Required | Meaning |
//! |-------|------|----------|---------|
//! | `exp` | number | yes | expiry, seconds since epoch |
//! | `uid` | string | no | user id |
//! | `usn` | string | no | username |
//! | `vrs` | object of strings | no | session variables |

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

use crate::errors::{Result, SessionError};

/// Claims decoded from a session token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenClaims {
    /// Expiry in seconds since Unix epoch.
    pub expires_at: i64,
    /// User id (`uid`).
    pub user_id: Option<String>,
    /// Username (`usn`).
    pub username: Option<String>,
    /// Session variables (`vrs`).
    pub variables: Option<HashMap<String, String>>,
}

/// Decode the claims segment of `token`.
///
/// Fails if the token does not have exactly three segments, if the claims
/// segment is not base64url JSON, if `exp` is missing or non-numeric, or if
/// an optional claim is present with the wrong type.
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(SessionError::MalformedToken {
            reason: format!("expected 3 segments, found {}", segments.len()),
        });
    }

    // Some issuers keep base64 padding on the segment
    let encoded = segments[1].trim_end_matches('=');
    if encoded.is_empty() {
        return Err(SessionError::MalformedToken {
            reason: "empty claims segment".into(),
        });
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| SessionError::Base64(e.to_string()))?;

    let raw: Map<String, Value> =
        serde_json::from_slice(&bytes).map_err(|e| SessionError::Claims(e.to_string()))?;

    Ok(TokenClaims {
        expires_at: expiry_claim(&raw)?,
        user_id: string_claim(&raw, "uid")?,
        username: string_claim(&raw, "usn")?,
        variables: variables_claim(&raw)?,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn expiry_claim(raw: &Map<String, Value>) -> Result<i64> {
    let value = match raw.get("exp") {
        None | Some(Value::Null) => return Err(SessionError::MissingClaim("exp")),
        Some(v) => v,
    };
    if let Some(secs) = value.as_i64() {
        return Ok(secs);
    }
    // Fractional expiries are truncated to whole seconds
    match value.as_f64() {
        Some(secs) if secs.is_finite() => Ok(secs.trunc() as i64),
        _ => Err(SessionError::InvalidClaim {
            claim: "exp",
            reason: format!("expected a number, found {value}"),
        }),
    }
}

fn string_claim(raw: &Map<String, Value>, claim: &'static str) -> Result<Option<String>> {
    match raw.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SessionError::InvalidClaim {
            claim,
            reason: format!("expected a string, found {other}"),
        }),
    }
}

fn variables_claim(raw: &Map<String, Value>) -> Result<Option<HashMap<String, String>>> {
    let map = match raw.get("vrs") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(SessionError::InvalidClaim {
                claim: "vrs",
                reason: format!("expected an object, found {other}"),
            });
        }
    };

    let mut variables = HashMap::with_capacity(map.len());
    for (key, value) in map {
        let Value::String(s) = value else {
            return Err(SessionError::InvalidClaim {
                claim: "vrs",
                reason: format!("variable `{key}` is not a string"),
            });
        };
        let _ = variables.insert(key.clone(), s.clone());
    }
    Ok(Some(variables))
}


#[cfg(test)]
mod tests {
    use super::test_tokens::token_with;
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn decodes_all_claims() {
        let token = token_with(&json!({
            "exp": 1_700_000_100,
            "uid": "4c2ae592-b2a7-445e-98ec-697694478b1c",
            "usn": "al",
            "vrs": {"region": "eu", "tier": "gold"},
        }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.expires_at, 1_700_000_100);
        assert_eq!(
            claims.user_id.as_deref(),
            Some("4c2ae592-b2a7-445e-98ec-697694478b1c")
        );
        assert_eq!(claims.username.as_deref(), Some("al"));
        let vars = claims.variables.unwrap();
        assert_eq!(vars["region"], "eu");
        assert_eq!(vars["tier"], "gold");
    }

    #[test]
    fn optional_claims_absent() {
        let token = token_with(&json!({"exp": 42}));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.expires_at, 42);
        assert!(claims.user_id.is_none());
        assert!(claims.username.is_none());
        assert!(claims.variables.is_none());
    }

    #[test]
    fn fractional_expiry_truncates() {
        let token = token_with(&json!({"exp": 1_700_000_100.9}));
        assert_eq!(decode_claims(&token).unwrap().expires_at, 1_700_000_100);
    }

    #[test]
    fn padded_claims_segment_accepted() {
        let token = token_with(&json!({"exp": 1}));
        let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
        parts[1].push_str("==");
        let padded = parts.join(".");
        assert_eq!(decode_claims(&padded).unwrap().expires_at, 1);
    }

    #[test]
    fn missing_exp_is_fatal() {
        let token = token_with(&json!({"usn": "al"}));
        assert_matches!(decode_claims(&token), Err(SessionError::MissingClaim("exp")));
    }

    #[test]
    fn null_exp_is_missing() {
        let token = token_with(&json!({"exp": null}));
        assert_matches!(decode_claims(&token), Err(SessionError::MissingClaim("exp")));
    }

    #[test]
    fn string_exp_is_invalid() {
        let token = token_with(&json!({"exp": "1700000100"}));
        assert_matches!(
            decode_claims(&token),
            Err(SessionError::InvalidClaim { claim: "exp", .. })
        );
    }

    #[test]
    fn wrong_segment_count() {
        assert_matches!(
            decode_claims("only.two"),
            Err(SessionError::MalformedToken { .. })
        );
        assert_matches!(decode_claims(""), Err(SessionError::MalformedToken { .. }));
        assert_matches!(
            decode_claims("a.b.c.d"),
            Err(SessionError::MalformedToken { .. })
        );
    }

    #[test]
    fn empty_claims_segment() {
        assert_matches!(
            decode_claims("header..sig"),
            Err(SessionError::MalformedToken { .. })
        );
    }

    #[test]
    fn invalid_base64() {
        assert_matches!(
            decode_claims("header.!!!not-base64!!!.sig"),
            Err(SessionError::Base64(_))
        );
    }

    #[test]
    fn claims_not_json_object() {
        let token = format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2,3]"));
        assert_matches!(decode_claims(&token), Err(SessionError::Claims(_)));
    }

    #[test]
    fn non_string_username_rejected() {
        let token = token_with(&json!({"exp": 1, "usn": 7}));
        assert_matches!(
            decode_claims(&token),
            Err(SessionError::InvalidClaim { claim: "usn", .. })
        );
    }

    #[test]
    fn non_string_variable_rejected() {
        let token = token_with(&json!({"exp": 1, "vrs": {"level": 3}}));
        assert_matches!(
            decode_claims(&token),
            Err(SessionError::InvalidClaim { claim: "vrs", .. })
        );
    }
}
