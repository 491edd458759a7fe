use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};

/// Non-success status returned by an upstream service
///
/// Kept as a typed error so callers can tell an expired session (401/403)
/// apart from other failures after it has been wrapped in `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
#[error("{context} failed with status {status} and body: {body}")]
pub struct HttpStatusError {
    pub context: String,
    pub status: StatusCode,
    pub body: String,
}

impl HttpStatusError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }
}

/// Returns true if the error chain contains a 401 or 403 upstream response
pub fn is_auth_failure(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<HttpStatusError>()
        .is_some_and(HttpStatusError::is_auth_failure)
}

/// Create the HTTP client shared by all outbound calls
///
/// Timeouts are applied per request, since updates and vehicle lookups use
/// different bounds than the rest of the API.
pub fn https_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to create HTTP client")
}

/// Handle HTTP response by checking status and extracting body
///
/// This is a common utility for processing HTTP responses.
/// It ensures the response status is successful and extracts the body text.
///
/// # Arguments
/// * `res` - The HTTP response to handle
/// * `context_msg` - Context message describing the request (e.g., "GET /ravens")
///
/// # Returns
/// * `Ok(String)` - The response body if the status is successful
/// * `Err` - An [`HttpStatusError`] if the status is not successful, or a
///   transport error if reading the body fails
pub async fn handle_http_response(res: Response, context_msg: &str) -> Result<String> {
    let status = res.status();
    let body = res.text().await.context("failed to read response body")?;

    if !status.is_success() {
        return Err(HttpStatusError {
            context: context_msg.to_string(),
            status,
            body,
        }
        .into());
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: StatusCode) -> HttpStatusError {
        HttpStatusError {
            context: "GET /ravens".to_string(),
            status,
            body: "{\"detail\":\"nope\"}".to_string(),
        }
    }

    #[test]
    fn unauthorized_and_forbidden_are_auth_failures() {
        assert!(status_error(StatusCode::UNAUTHORIZED).is_auth_failure());
        assert!(status_error(StatusCode::FORBIDDEN).is_auth_failure());
        assert!(!status_error(StatusCode::NOT_FOUND).is_auth_failure());
        assert!(!status_error(StatusCode::INTERNAL_SERVER_ERROR).is_auth_failure());
    }

    #[test]
    fn auth_failure_is_found_through_context() {
        let error = anyhow::Error::from(status_error(StatusCode::UNAUTHORIZED))
            .context("failed to list devices");
        assert!(is_auth_failure(&error));

        let error = anyhow::anyhow!("connection refused");
        assert!(!is_auth_failure(&error));
    }

    #[test]
    fn status_error_message_includes_body() {
        let message = status_error(StatusCode::BAD_REQUEST).to_string();
        assert!(message.contains("GET /ravens"));
        assert!(message.contains("400"));
        assert!(message.contains("nope"));
    }
}
