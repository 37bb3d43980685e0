//! Message decoder - raw payload to validated notification request
//!
//! Payloads are UTF-8 JSON objects with the optional keys `title`, `tag`,
//! `category`, `timeout`, `urgency` and the required key `message`.
//! Unknown keys are ignored and an explicit `null` counts as absent.

use serde_json::{Map, Value};

use crate::domain::{Expiry, NotificationRequest, Urgency};
use crate::error::DecodeError;

/// Decode one payload into a request, or explain why it carries nothing to show
pub fn decode(payload: &[u8]) -> Result<NotificationRequest, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
    let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let message = non_empty(string_field(&fields, "message")?).ok_or(DecodeError::MissingMessage)?;

    Ok(NotificationRequest {
        title: non_empty(string_field(&fields, "title")?),
        message,
        tag: non_empty(string_field(&fields, "tag")?),
        category: non_empty(string_field(&fields, "category")?),
        timeout: timeout_field(&fields)?,
        urgency: urgency_field(&fields)?,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn string_field(fields: &Map<String, Value>, name: &'static str) -> Result<Option<String>, DecodeError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DecodeError::InvalidField {
            field: name,
            reason: format!("expected string, got {}", type_name(other)),
        }),
    }
}

fn timeout_field(fields: &Map<String, Value>) -> Result<Option<Expiry>, DecodeError> {
    match fields.get("timeout") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(millis) => Ok(Some(Expiry::from_millis(millis))),
            None => Err(DecodeError::InvalidField {
                field: "timeout",
                reason: format!("expected integer milliseconds, got {}", n),
            }),
        },
        Some(other) => Err(DecodeError::InvalidField {
            field: "timeout",
            reason: format!("expected integer, got {}", type_name(other)),
        }),
    }
}

fn urgency_field(fields: &Map<String, Value>) -> Result<Option<Urgency>, DecodeError> {
    match fields.get("urgency") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(Urgency::from_level)
            .map(Some)
            .ok_or_else(|| DecodeError::UnknownUrgency(n.to_string())),
        Some(Value::String(s)) => s.parse::<Urgency>().map(Some).map_err(DecodeError::UnknownUrgency),
        Some(other) => Err(DecodeError::UnknownUrgency(other.to_string())),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_message_only() {
        let req = decode(br#"{"message":"disk full"}"#).unwrap();
        assert_eq!(req.summary(), "disk full");
        assert_eq!(req.body(), "");
        assert!(req.tag.is_none());
        assert!(req.urgency.is_none());
    }

    #[test]
    fn test_decode_all_fields() {
        let req = decode(
            br#"{"title":"CPU","message":"hot","tag":"cpu","category":"device","timeout":5000,"urgency":2}"#,
        )
        .unwrap();
        assert_eq!(req.summary(), "CPU");
        assert_eq!(req.body(), "hot");
        assert_eq!(req.tag.as_deref(), Some("cpu"));
        assert_eq!(req.category.as_deref(), Some("device"));
        assert_eq!(req.timeout, Some(Expiry::After(5000)));
        assert_eq!(req.urgency, Some(Urgency::Critical));
    }

    #[test]
    fn test_decode_missing_message() {
        assert_eq!(decode(br#"{"title":"CPU"}"#), Err(DecodeError::MissingMessage));
    }

    #[test]
    fn test_decode_empty_message() {
        assert_eq!(decode(br#"{"message":""}"#), Err(DecodeError::MissingMessage));
    }

    #[test]
    fn test_decode_null_message() {
        assert_eq!(decode(br#"{"message":null,"tag":"x"}"#), Err(DecodeError::MissingMessage));
    }

    #[test]
    fn test_missing_message_wins_over_bad_urgency() {
        assert_eq!(decode(br#"{"urgency":9}"#), Err(DecodeError::MissingMessage));
    }

    #[test]
    fn test_decode_malformed_json() {
        assert!(matches!(decode(b"{not json"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert_eq!(decode(&[0xff, 0xfe, 0x00]), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_decode_not_an_object() {
        assert_eq!(decode(br#"["message"]"#), Err(DecodeError::NotAnObject));
        assert_eq!(decode(br#""hello""#), Err(DecodeError::NotAnObject));
    }

    #[test]
    fn test_decode_unknown_urgency_number() {
        assert_eq!(
            decode(br#"{"message":"m","urgency":3}"#),
            Err(DecodeError::UnknownUrgency("3".to_string()))
        );
    }

    #[test]
    fn test_decode_unknown_urgency_name() {
        assert_eq!(
            decode(br#"{"message":"m","urgency":"urgent"}"#),
            Err(DecodeError::UnknownUrgency("urgent".to_string()))
        );
    }

    #[test]
    fn test_decode_urgency_by_name() {
        let req = decode(br#"{"message":"m","urgency":"LOW"}"#).unwrap();
        assert_eq!(req.urgency, Some(Urgency::Low));
    }

    #[test]
    fn test_decode_timeout_variants() {
        assert_eq!(decode(br#"{"message":"m","timeout":-1}"#).unwrap().timeout, Some(Expiry::Default));
        assert_eq!(decode(br#"{"message":"m","timeout":0}"#).unwrap().timeout, Some(Expiry::Never));
    }

    #[test]
    fn test_decode_fractional_timeout_rejected() {
        assert!(matches!(
            decode(br#"{"message":"m","timeout":1.5}"#),
            Err(DecodeError::InvalidField { field: "timeout", .. })
        ));
    }

    #[test]
    fn test_decode_wrong_type_title() {
        assert!(matches!(
            decode(br#"{"message":"m","title":42}"#),
            Err(DecodeError::InvalidField { field: "title", .. })
        ));
    }

    #[test]
    fn test_decode_empty_tag_is_untagged() {
        let req = decode(br#"{"message":"m","tag":""}"#).unwrap();
        assert!(req.tag.is_none());
    }

    #[test]
    fn test_decode_ignores_unknown_keys() {
        let req = decode(br#"{"message":"m","color":"red"}"#).unwrap();
        assert_eq!(req.message, "m");
    }
}
