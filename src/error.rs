//! Error taxonomy for calls against the remote service.

use thiserror::Error;

/// Classified failure of a remote call.
///
/// The gateway produces these from transport errors and HTTP statuses; the
/// client decides per operation whether a kind is fatal or degrades
/// gracefully (`NotFound` on an optional endpoint is "this deployment does
/// not have that", not an error).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, invalid or expired token (HTTP 401).
    #[error("not authenticated or token expired")]
    Unauthenticated,

    /// The service refused the call (HTTP 403), usually a bad access key.
    #[error("access denied by the service")]
    Forbidden,

    /// Endpoint absent on this server deployment (HTTP 404).
    #[error("endpoint not available on this deployment: {0}")]
    NotFound(String),

    /// Daily query limit reached (HTTP 429).
    #[error("query limit reached")]
    QuotaExceeded,

    /// The request exceeded the fixed timeout.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure before any HTTP status was received.
    #[error("connection error: {0}")]
    Connection(String),

    /// Server-side failure (HTTP 5xx).
    #[error("server error (HTTP {0})")]
    Server(u16),

    /// Any other non-success status.
    #[error("unexpected status {0}: {1}")]
    UnexpectedStatus(u16, String),

    /// The server answered 2xx with `success: false` and its own message.
    #[error("{0}")]
    Rejected(String),

    /// A 2xx body that lacked structure the caller required.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ApiError {
    /// True for the "capability absent on this server generation" signal.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Remediation hint shown alongside the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ApiError::Unauthenticated => Some("run `manai --login` to authenticate"),
            ApiError::Forbidden => {
                Some("check the service access key (--key or MANAI_ACCESS_KEY)")
            }
            ApiError::QuotaExceeded => {
                Some("wait until tomorrow or upgrade your plan for unlimited queries")
            }
            ApiError::Timeout | ApiError::Connection(_) => {
                Some("check your internet connection, then try `manai --test-connection`")
            }
            ApiError::Server(_) => Some("the service is having trouble; try again later"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_the_only_unsupported_kind() {
        assert!(ApiError::NotFound("GetUserProfile".into()).is_unsupported());
        assert!(!ApiError::Unauthenticated.is_unsupported());
        assert!(!ApiError::Server(500).is_unsupported());
    }

    #[test]
    fn hints_cover_the_actionable_kinds() {
        assert!(ApiError::Unauthenticated.hint().unwrap().contains("--login"));
        assert!(ApiError::Forbidden.hint().unwrap().contains("access key"));
        assert!(ApiError::Timeout.hint().is_some());
        assert!(ApiError::Rejected("nope".into()).hint().is_none());
    }
}
