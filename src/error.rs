// ABOUTME: Error type shared by the generator client, poller and tracker
// ABOUTME: Flattens transport, HTTP and remote job failures into user-facing messages

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request never produced a response (DNS, connect, timeout).
    Transport(String),
    /// Non-2xx response other than 401.
    Api { status: u16, message: String },
    Unauthorized,
    /// Response body did not match the expected JSON shape.
    Decode(String),
    /// The job itself reached the `failed` state.
    GenerationFailed { detail: Option<String> },
}

impl ClientError {
    /// Builds an `Api` error from a status code and a raw response body.
    ///
    /// The message is taken from the body's `message`, `detail` or `error`
    /// field when the body is JSON, otherwise it is `HTTP <status>`.
    pub fn from_response(status: u16, body: &str) -> Self {
        if status == 401 {
            return ClientError::Unauthorized;
        }

        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["message", "detail", "error"]
                    .iter()
                    .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
                    .map(str::to_string)
            })
            .filter(|msg| !msg.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status));

        ClientError::Api { status, message }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "Network error: {}", msg),
            ClientError::Api { message, .. } => write!(f, "{}", message),
            ClientError::Unauthorized => {
                write!(f, "Not authorized: access token is missing or expired")
            }
            ClientError::Decode(msg) => write!(f, "Unexpected response: {}", msg),
            ClientError::GenerationFailed { detail: None } => write!(f, "Generation failed"),
            ClientError::GenerationFailed {
                detail: Some(detail),
            } => write!(f, "Generation failed: {}", detail),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::from_response(status.as_u16(), "")
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_uses_json_message() {
        let err = ClientError::from_response(422, r#"{"message":"prompt is required"}"#);
        assert_eq!(err.to_string(), "prompt is required");
    }

    #[test]
    fn test_api_error_falls_back_to_detail_field() {
        let err = ClientError::from_response(400, r#"{"detail":"bad framework"}"#);
        assert_eq!(
            err,
            ClientError::Api {
                status: 400,
                message: "bad framework".to_string()
            }
        );
    }

    #[test]
    fn test_api_error_without_json_body() {
        let err = ClientError::from_response(502, "<html>Bad Gateway</html>");
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[test]
    fn test_401_maps_to_unauthorized() {
        let err = ClientError::from_response(401, r#"{"message":"token expired"}"#);
        assert_eq!(err, ClientError::Unauthorized);
    }

    #[test]
    fn test_generation_failed_message_is_non_empty() {
        let plain = ClientError::GenerationFailed { detail: None };
        assert_eq!(plain.to_string(), "Generation failed");

        let detailed = ClientError::GenerationFailed {
            detail: Some("template render error".to_string()),
        };
        assert_eq!(
            detailed.to_string(),
            "Generation failed: template render error"
        );
    }
}
