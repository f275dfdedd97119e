use thiserror::Error;

/// Failures raised by the Railway API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout, or TLS error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not authorized; check the Railway API token")]
    Unauthorized,

    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The request reached the API but the operation was rejected.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The object being created already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }

    /// Classify GraphQL error messages returned alongside a response.
    pub(crate) fn from_graphql_messages(messages: Vec<String>) -> Self {
        let joined = messages.join("; ");
        if messages.iter().any(|m| is_conflict_message(m)) {
            ApiError::Conflict(joined)
        } else if messages.iter().any(|m| is_auth_message(m)) {
            ApiError::Unauthorized
        } else {
            ApiError::GraphQl(joined)
        }
    }
}

fn is_conflict_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already exists") || lower.contains("already taken")
}

fn is_auth_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("not authorized") || lower.contains("unauthorized")
}
