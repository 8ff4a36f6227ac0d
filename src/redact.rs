//! Credential redaction applied at every boundary that logs, persists,
//! or returns a payload.
//!
//! Each boundary redacts unconditionally rather than trusting that an
//! upstream caller already did.

use serde_json::Value;

/// Field name carrying the bearer token in request, response and
/// parameter payloads.
pub const AUTHORIZATION_TOKEN_FIELD: &str = "authorizationToken";

const MASK_CHAR: &str = "*";

/// Replace a token with an equal-length run of the masking character.
///
/// Length-preserving: consumers align displayed payloads on the masked
/// width, so the mask must keep the token's visual shape.
pub fn mask(token: &str) -> String {
    MASK_CHAR.repeat(token.chars().count())
}

/// Walk a JSON payload and mask every string value stored under the
/// bearer-token field, at any nesting depth. Non-string values under
/// the field are left untouched.
pub fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if key == AUTHORIZATION_TOKEN_FIELD {
                    if let Value::String(token) = entry {
                        *entry = Value::String(mask(token));
                    }
                } else {
                    redact_value(entry);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_value(item);
            }
        }
        _ => {}
    }
}

/// Redacted clone, for call sites that must keep the original payload.
pub fn redacted(value: &Value) -> Value {
    let mut clone = value.clone();
    redact_value(&mut clone);
    clone
}
