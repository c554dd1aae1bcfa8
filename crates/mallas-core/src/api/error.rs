use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => FetchError::AccessDenied(truncated),
            404 | 410 => FetchError::NotFound(truncated),
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(FetchError::from_status(StatusCode::NOT_FOUND, "").is_not_found());
        assert!(matches!(
            FetchError::from_status(StatusCode::FORBIDDEN, "no"),
            FetchError::AccessDenied(_)
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::BAD_GATEWAY, "oops"),
            FetchError::ServerError(_)
        ));
        match FetchError::from_status(StatusCode::IM_A_TEAPOT, "tea") {
            FetchError::InvalidResponse(msg) => assert!(msg.contains("418")),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_truncate_body() {
        let long = "á".repeat(400); // 800 bytes
        let truncated = FetchError::truncate_body(&long);
        assert!(truncated.ends_with("(truncated, 800 total bytes)"));
        assert_eq!(FetchError::truncate_body("short"), "short");
    }
}
