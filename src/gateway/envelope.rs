//! The `{success, data | error}` wrapper every backend response follows.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message used when the backend answered with something that is not an envelope.
pub const INVALID_RESPONSE: &str = "Invalid response from server.";

/// Message used when the backend reports a failure without an error string.
const UNSPECIFIED_FAILURE: &str = "The server reported an unspecified error.";

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success(Map<String, Value>),
    Failure(String),
}

/// Wire shape of an envelope.
#[derive(Debug, Deserialize, Serialize)]
struct RawEnvelope {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ResponseEnvelope {
    /// Parse a response body. Returns `None` when the body is not JSON or
    /// does not have the envelope shape.
    pub fn parse(body: &str) -> Option<Self> {
        let raw: RawEnvelope = serde_json::from_str(body).ok()?;
        if raw.success {
            match raw.data {
                None | Some(Value::Null) => Some(Self::Success(Map::new())),
                Some(Value::Object(data)) => Some(Self::Success(data)),
                Some(_) => None,
            }
        } else {
            let error = raw
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_FAILURE.to_string());
            Some(Self::Failure(error))
        }
    }

    pub fn invalid() -> Self {
        Self::Failure(INVALID_RESPONSE.to_string())
    }

    pub fn success(data: Map<String, Value>) -> Self {
        Self::Success(data)
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure(error.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Decode one field of the success data. Missing fields decode as `null`.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<serde_json::Result<T>> {
        let data = self.data()?;
        let value = data.get(key).cloned().unwrap_or(Value::Null);
        Some(serde_json::from_value(value))
    }

    pub fn to_json(&self) -> Value {
        let raw = match self {
            Self::Success(data) => RawEnvelope {
                success: true,
                data: Some(Value::Object(data.clone())),
                error: None,
            },
            Self::Failure(error) => RawEnvelope {
                success: false,
                data: None,
                error: Some(error.clone()),
            },
        };
        serde_json::to_value(raw).unwrap_or(Value::Null)
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success() {
        let env = ResponseEnvelope::parse(r#"{"success":true,"data":{"token":"tok123"}}"#).unwrap();
        assert!(env.is_success());
        assert_eq!(env.data().unwrap()["token"], json!("tok123"));
        assert_eq!(env.error(), None);
    }

    #[test]
    fn test_parse_success_without_data() {
        let env = ResponseEnvelope::parse(r#"{"success":true}"#).unwrap();
        assert_eq!(env, ResponseEnvelope::Success(Map::new()));
    }

    #[test]
    fn test_parse_failure() {
        let env =
            ResponseEnvelope::parse(r#"{"success":false,"error":"Credenciales inválidas"}"#).unwrap();
        assert_eq!(env.error(), Some("Credenciales inválidas"));
        assert!(env.data().is_none());
    }

    #[test]
    fn test_failure_without_message_gets_one() {
        let env = ResponseEnvelope::parse(r#"{"success":false}"#).unwrap();
        assert!(!env.error().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_bodies() {
        for body in [
            "",
            "<!DOCTYPE html><html>Error</html>",
            "[1,2,3]",
            r#"{"ok":true}"#,
            r#"{"success":"yes"}"#,
            r#"{"success":true,"data":[1]}"#,
        ] {
            assert!(ResponseEnvelope::parse(body).is_none(), "{:?}", body);
        }
    }

    #[test]
    fn test_field_decoding() {
        let env = ResponseEnvelope::parse(r#"{"success":true,"data":{"count":3}}"#).unwrap();
        let count: u32 = env.field("count").unwrap().unwrap();
        assert_eq!(count, 3);
        let missing: Option<String> = env.field("missing").unwrap().unwrap();
        assert_eq!(missing, None);

        let failure = ResponseEnvelope::failure("nope");
        assert!(failure.field::<u32>("count").is_none());
    }

    #[test]
    fn test_wire_form() {
        let mut data = Map::new();
        data.insert("message".to_string(), json!("ok"));
        assert_eq!(
            serde_json::to_value(ResponseEnvelope::success(data)).unwrap(),
            json!({"success": true, "data": {"message": "ok"}})
        );
        assert_eq!(
            serde_json::to_value(ResponseEnvelope::failure("bad")).unwrap(),
            json!({"success": false, "error": "bad"})
        );
    }
}
