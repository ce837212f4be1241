// trust/bundle.rs - Versioned Export Envelopes

//! Wire format shared by identity and known-peer exports:
//!
//! ```text
//! {"<marker>": {"version": "1.0", "exported": <epoch-ms>, "<field>": <payload>}}
//! ```
//!
//! Importers reject a missing marker (`InvalidFormat`) and any version other
//! than [`EXPORT_VERSION`] (`UnsupportedVersion`).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::TrustError;
use super::now_millis;

pub const EXPORT_VERSION: &str = "1.0";

pub const IDENTITY_EXPORT_MARKER: &str = "identityExport";
pub const PEERS_EXPORT_MARKER: &str = "knownPeersExport";

pub const IDENTITY_FIELD: &str = "identity";
pub const PEERS_FIELD: &str = "peers";

/// Wrap a payload in an export envelope
pub fn wrap<T: Serialize + ?Sized>(
    marker: &str,
    field: &str,
    payload: &T,
) -> Result<String, TrustError> {
    let mut inner = Map::new();
    inner.insert("version".into(), Value::String(EXPORT_VERSION.into()));
    inner.insert("exported".into(), Value::from(now_millis()));
    inner.insert(field.into(), serde_json::to_value(payload)?);

    let mut outer = Map::new();
    outer.insert(marker.into(), Value::Object(inner));

    Ok(serde_json::to_string_pretty(&Value::Object(outer))?)
}

/// Unwrap and decode a payload, validating marker and version first
pub fn unwrap<T: DeserializeOwned>(text: &str, marker: &str, field: &str) -> Result<T, TrustError> {
    let (_, payload) = unwrap_with_timestamp(text, marker, field)?;
    Ok(payload)
}

/// Like [`unwrap`], also returning the `exported` timestamp
pub fn unwrap_with_timestamp<T: DeserializeOwned>(
    text: &str,
    marker: &str,
    field: &str,
) -> Result<(i64, T), TrustError> {
    let mut root: Value = serde_json::from_str(text)?;

    let inner = root
        .as_object_mut()
        .and_then(|obj| obj.remove(marker))
        .ok_or_else(|| TrustError::InvalidFormat(format!("missing `{marker}` marker")))?;

    let Value::Object(mut inner) = inner else {
        return Err(TrustError::InvalidFormat(format!("`{marker}` is not an object")));
    };

    match inner.get("version") {
        Some(Value::String(v)) if v == EXPORT_VERSION => {}
        Some(Value::String(v)) => {
            return Err(TrustError::UnsupportedVersion {
                found: v.clone(),
                expected: EXPORT_VERSION.into(),
            });
        }
        Some(other) => {
            return Err(TrustError::UnsupportedVersion {
                found: other.to_string(),
                expected: EXPORT_VERSION.into(),
            });
        }
        None => return Err(TrustError::InvalidFormat("missing `version`".into())),
    }

    let exported = inner.get("exported").and_then(Value::as_i64).unwrap_or_default();

    let payload = inner
        .remove(field)
        .ok_or_else(|| TrustError::InvalidFormat(format!("missing `{field}` payload")))?;

    let payload = serde_json::from_value(payload)?;
    Ok((exported, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrap_layout() {
        let text = wrap(PEERS_EXPORT_MARKER, PEERS_FIELD, &vec![1, 2, 3]).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        let inner = &value[PEERS_EXPORT_MARKER];
        assert_eq!(inner["version"], "1.0");
        assert!(inner["exported"].as_i64().unwrap() > 0);
        assert_eq!(inner[PEERS_FIELD], json!([1, 2, 3]));
    }

    #[test]
    fn test_unwrap_roundtrip() {
        let text = wrap(PEERS_EXPORT_MARKER, PEERS_FIELD, &vec!["a".to_string()]).unwrap();
        let (exported, peers): (i64, Vec<String>) =
            unwrap_with_timestamp(&text, PEERS_EXPORT_MARKER, PEERS_FIELD).unwrap();
        assert!(exported > 0);
        assert_eq!(peers, vec!["a".to_string()]);
    }

    #[test]
    fn test_wrong_marker_is_invalid_format() {
        let text = wrap(IDENTITY_EXPORT_MARKER, IDENTITY_FIELD, &json!({})).unwrap();
        let result: Result<Value, _> = unwrap(&text, PEERS_EXPORT_MARKER, PEERS_FIELD);
        assert!(matches!(result, Err(TrustError::InvalidFormat(_))));
    }

    #[test]
    fn test_version_checked() {
        let text = json!({"knownPeersExport": {"version": "0.9", "exported": 1, "peers": []}});
        let result: Result<Vec<Value>, _> =
            unwrap(&text.to_string(), PEERS_EXPORT_MARKER, PEERS_FIELD);
        assert!(matches!(result, Err(TrustError::UnsupportedVersion { .. })));

        let numeric = json!({"knownPeersExport": {"version": 1.0, "peers": []}});
        let result: Result<Vec<Value>, _> =
            unwrap(&numeric.to_string(), PEERS_EXPORT_MARKER, PEERS_FIELD);
        assert!(matches!(result, Err(TrustError::UnsupportedVersion { .. })));
    }

    #[test]
    fn test_garbage_is_invalid_format() {
        let result: Result<Value, _> = unwrap("not json", PEERS_EXPORT_MARKER, PEERS_FIELD);
        assert!(matches!(result, Err(TrustError::InvalidFormat(_))));

        let result: Result<Value, _> = unwrap("[1,2]", PEERS_EXPORT_MARKER, PEERS_FIELD);
        assert!(matches!(result, Err(TrustError::InvalidFormat(_))));
    }
}
