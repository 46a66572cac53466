use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server rejected request (status {status:?}): {detail}")]
    Rejected { status: Option<u16>, detail: String },

    #[error("authentication expired")]
    AuthExpired,

    #[error("not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            detail: detail.into(),
        }
    }

    /// Maps a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_detail(body);
        match status {
            401 => Self::AuthExpired,
            404 => Self::NotFound(detail),
            _ => Self::Rejected {
                status: Some(status),
                detail,
            },
        }
    }
}

/// The service reports errors as `{"detail": "..."}`; anything else is kept verbatim.
fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Rejected {
                status: e.status().map(|s| s.as_u16()),
                detail: format!("malformed response: {e}"),
            };
        }
        if let Some(status) = e.status() {
            return Self::from_status(status.as_u16(), &e.to_string());
        }
        Self::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(GatewayError::from_status(401, ""), GatewayError::AuthExpired);
        assert_eq!(
            GatewayError::from_status(404, r#"{"detail": "Quiz not found"}"#),
            GatewayError::NotFound("Quiz not found".into())
        );
        assert_eq!(
            GatewayError::from_status(400, r#"{"detail": "Invalid question type"}"#),
            GatewayError::Rejected {
                status: Some(400),
                detail: "Invalid question type".into()
            }
        );
        assert_eq!(
            GatewayError::from_status(502, "Bad Gateway"),
            GatewayError::Rejected {
                status: Some(502),
                detail: "Bad Gateway".into()
            }
        );
    }

    #[test]
    fn structured_detail_is_stringified() {
        let err = GatewayError::from_status(422, r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#);
        let GatewayError::Rejected { status, detail } = err else {
            panic!("expected rejection");
        };
        assert_eq!(status, Some(422));
        assert!(detail.contains("field required"));
    }
}
