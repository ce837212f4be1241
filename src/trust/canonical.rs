// trust/canonical.rs - Deterministic Payload Encoding

//! Canonical byte form of JSON payloads for signing.
//!
//! Object keys are sorted by code point, no whitespace is emitted, and a
//! top-level `signature` field is dropped so a signed payload can carry its
//! own signature. Two equal logical payloads always encode to the same bytes.

use serde::Serialize;
use serde_json::Value;

use super::error::TrustError;

/// Field excluded from the signed bytes of a top-level object
pub const SIGNATURE_FIELD: &str = "signature";

/// Canonical bytes of any serializable payload
pub fn canonical_bytes<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, TrustError> {
    let mut value = serde_json::to_value(payload)?;
    if let Value::Object(map) = &mut value {
        map.remove(SIGNATURE_FIELD);
    }

    let mut out = Vec::with_capacity(128);
    write_value(&value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), TrustError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => serde_json::to_writer(&mut *out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            // Sorted here so the result does not depend on serde_json's map feature flags
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_value(item, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_and_compact() {
        let bytes = canonical_bytes(&json!({"b": 1, "a": {"z": [1, 2], "y": null}})).unwrap();
        assert_eq!(bytes, br#"{"a":{"y":null,"z":[1,2]},"b":1}"#);
    }

    #[test]
    fn test_signature_field_excluded() {
        let signed = json!({"ping": 1, "signature": "abc"});
        let unsigned = json!({"ping": 1});
        assert_eq!(canonical_bytes(&signed).unwrap(), canonical_bytes(&unsigned).unwrap());
    }

    #[test]
    fn test_nested_signature_field_kept() {
        let bytes = canonical_bytes(&json!({"inner": {"signature": "x"}})).unwrap();
        assert_eq!(bytes, br#"{"inner":{"signature":"x"}}"#);
    }

    #[test]
    fn test_string_escaping() {
        let bytes = canonical_bytes(&json!({"msg": "line\n\"quoted\""})).unwrap();
        assert_eq!(bytes, br#"{"msg":"line\n\"quoted\""}"#);
    }

    #[test]
    fn test_struct_and_value_agree() {
        #[derive(Serialize)]
        struct Ping {
            ping: u32,
            from: &'static str,
        }

        let from_struct = canonical_bytes(&Ping { ping: 1, from: "a" }).unwrap();
        let from_value = canonical_bytes(&json!({"from": "a", "ping": 1})).unwrap();
        assert_eq!(from_struct, from_value);
    }
}
