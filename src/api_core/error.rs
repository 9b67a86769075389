use std::time::Duration;

/// Outcome taxonomy for upstream calls
///
/// `RateLimited` never escapes the client: the client sleeps and retries the
/// same request until it succeeds, fails differently, or is cancelled.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 401/403 - the current key is expired or revoked
    CredentialInvalid,
    /// 404 - skip the unit of work
    NotFound,
    /// Any other non-2xx status
    Transient { status: u16 },
    /// Transport failure or timeout
    Network(String),
    /// Body could not be decoded
    Decode(String),
    /// Request could not be built (bad base URL, unusable path segment)
    InvalidRequest(String),
    /// Shared cancellation fired while the call was pending
    Cancelled,
}

impl ApiError {
    /// Status code for audit logging, when one exists
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::CredentialInvalid => Some(403),
            ApiError::NotFound => Some(404),
            ApiError::Transient { status } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::CredentialInvalid => write!(f, "Credential rejected by upstream"),
            ApiError::NotFound => write!(f, "Resource not found"),
            ApiError::Transient { status } => write!(f, "Upstream returned status {}", status),
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Decode(msg) => write!(f, "Decode error: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl std::error::Error for ApiError {}

/// How a single HTTP response should be handled
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseClass {
    Success,
    RateLimited(Duration),
    Failure(ApiError),
}

/// Map a status code to the client's handling policy.
///
/// `retry_after` is the parsed `Retry-After` header; `default_wait` applies
/// when a 429 arrives without one.
pub fn classify_status(status: u16, retry_after: Option<Duration>, default_wait: Duration) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        429 => ResponseClass::RateLimited(retry_after.unwrap_or(default_wait)),
        401 | 403 => ResponseClass::Failure(ApiError::CredentialInvalid),
        404 => ResponseClass::Failure(ApiError::NotFound),
        other => ResponseClass::Failure(ApiError::Transient { status: other }),
    }
}

/// Parse a `Retry-After` value expressed in whole seconds
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
