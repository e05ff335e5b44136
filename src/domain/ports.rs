use crate::utils::error::{NetilionError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Checks a response body for a Netilion `errors` array and maps the error
/// types onto [`NetilionError`] variants.
pub fn raise_errors(payload: &Value) -> Result<()> {
    let Some(errors) = payload.get("errors") else {
        return Ok(());
    };
    let entries = errors.as_array().map(Vec::as_slice).unwrap_or_default();
    if entries.is_empty() || !entries.iter().all(|entry| entry.get("type").is_some()) {
        return Err(NetilionError::malformed_response(errors.to_string()));
    }

    let has_type = |wanted: &str| {
        entries
            .iter()
            .any(|entry| entry.get("type").and_then(Value::as_str) == Some(wanted))
    };

    // certainly others, extend as needed
    if has_type("not_found_no_permission") {
        Err(NetilionError::BadPermission)
    } else if has_type("quota_exceeded") {
        Err(NetilionError::QuotaExceeded {
            message: errors.to_string(),
        })
    } else {
        Err(NetilionError::Api {
            message: errors.to_string(),
        })
    }
}

/// An object exchanged with the Netilion API.
pub trait ApiObject: DeserializeOwned + Sized {
    const NAME: &'static str;

    /// JSON body as sent to the API.
    fn to_api_json(&self) -> Value;

    fn from_api_json(body: Value) -> Result<Self> {
        serde_json::from_value(body).map_err(NetilionError::from)
    }

    fn parse_from_api(response_body: Value) -> Result<Self> {
        raise_errors(&response_body)?;
        let raw = response_body.to_string();
        Self::from_api_json(response_body).map_err(|err| {
            tracing::warn!("Unable to deserialize {}: {} :: {}", Self::NAME, err, raw);
            match err {
                NetilionError::Serialization(serde_err) => {
                    NetilionError::malformed_response(format!("{}: {}", Self::NAME, serde_err))
                }
                other => other,
            }
        })
    }

    fn parse_multiple_from_api(response_body: Value, under_key: &str) -> Result<Vec<Self>> {
        raise_errors(&response_body)?;
        let items = match response_body {
            Value::Object(mut map) => map.remove(under_key),
            _ => None,
        };
        match items {
            Some(Value::Array(items)) => items.into_iter().map(Self::parse_from_api).collect(),
            _ => {
                tracing::error!("Response for {} lacks a '{}' list", Self::NAME, under_key);
                Err(NetilionError::malformed_response(format!(
                    "missing list '{}' for {}",
                    under_key,
                    Self::NAME
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_errors_passes() {
        assert!(raise_errors(&json!({"id": 1})).is_ok());
    }

    #[test]
    fn test_untyped_error_is_malformed() {
        let err = raise_errors(&json!({"errors": [{"something": "no type"}]})).unwrap_err();
        assert!(matches!(err, NetilionError::MalformedResponse { .. }));
    }

    #[test]
    fn test_no_permission_error() {
        let err = raise_errors(&json!({
            "errors": [{"message": "not found or no permission", "type": "not_found_no_permission"}]
        }))
        .unwrap_err();
        assert!(matches!(err, NetilionError::BadPermission));
    }

    #[test]
    fn test_quota_exceeded_error() {
        let err = raise_errors(&json!({
            "errors": [{"type": "quota_exceeded", "message": "Your subscription limit is reached"}]
        }))
        .unwrap_err();
        assert!(matches!(err, NetilionError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_unknown_error_type_is_generic() {
        let err = raise_errors(&json!({"errors": [{"message": "I AM BATMAN", "type": "batman"}]}))
            .unwrap_err();
        assert!(matches!(err, NetilionError::Api { .. }));
        assert!(err.to_string().contains("batman"));
    }

    #[derive(Debug, serde::Deserialize)]
    struct Gadget {
        id: u64,
    }

    impl ApiObject for Gadget {
        const NAME: &'static str = "Gadget";

        fn to_api_json(&self) -> Value {
            json!({"id": self.id})
        }
    }

    #[test]
    fn test_parse_multiple_under_key() {
        let body = json!({"gadgets": [{"id": 1}, {"id": 2}]});
        let gadgets = Gadget::parse_multiple_from_api(body, "gadgets").unwrap();
        let ids: Vec<u64> = gadgets.iter().map(|gadget| gadget.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(gadgets[0].to_api_json(), json!({"id": 1}));
    }

    #[test]
    fn test_missing_list_is_malformed() {
        for body in [json!({"widgets": []}), json!({"gadgets": {}}), json!([])] {
            let err = Gadget::parse_multiple_from_api(body, "gadgets").unwrap_err();
            let message = err.to_string();
            assert!(message.contains("missing list 'gadgets' for Gadget"));
        }
    }

    #[test]
    fn test_undecodable_object_is_malformed() {
        let err = Gadget::parse_from_api(json!({"id": "one"})).unwrap_err();
        assert!(matches!(err, NetilionError::MalformedResponse { .. }));
        assert!(err.to_string().contains("Gadget"));

        let body = json!({"gadgets": [{"id": 1}, {"name": "no id"}]});
        assert!(Gadget::parse_multiple_from_api(body, "gadgets").is_err());
    }
}
