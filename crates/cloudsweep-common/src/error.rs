//! Provider error classification
//!
//! Providers report failures as an error code plus message. The code decides
//! whether a failure is retryable (throttling) or permanent for the target
//! (not-found, malformed id, permission denied).

use thiserror::Error;

/// Failure reported by a cloud provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Resource does not exist (already deleted, wrong id)
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Caller's credentials may not perform the operation
    #[error("access denied: {message}")]
    AccessDenied { message: String },

    /// Identifier or parameter rejected as malformed
    #[error("malformed request: {message}")]
    Malformed { message: String },

    /// Rate limit exceeded; a later re-invocation may succeed
    #[error("rate limit exceeded: {message}")]
    Throttled { message: String },

    /// Resource is in a state that does not allow the action
    #[error("incorrect state: {message}")]
    IncorrectState { message: String },

    /// The provider does not implement this operation for the family
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: &'static str },

    /// Anything else, with the raw code when one was reported
    #[error("provider error{}: {message}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl ProviderError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ProviderError::NotFound {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        ProviderError::Sdk {
            code: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }

    /// Only throttling is worth re-invoking for
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Throttled { .. })
    }

    /// Errors that belong to a specific target rather than the whole request
    pub fn is_target_specific(&self) -> bool {
        matches!(
            self,
            ProviderError::NotFound { .. }
                | ProviderError::Malformed { .. }
                | ProviderError::AccessDenied { .. }
                | ProviderError::IncorrectState { .. }
        )
    }

    /// The provider error code, when known
    pub fn code(&self) -> Option<&str> {
        match self {
            ProviderError::Sdk { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// A user-facing hint for resolving this error, if available
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ProviderError::AccessDenied { .. } => {
                Some("Check the credentials profile and the IAM policy attached to it.")
            }
            ProviderError::Throttled { .. } => {
                Some("Provider API rate limit hit. Re-run the command later.")
            }
            ProviderError::IncorrectState { .. } => {
                Some("The resource is mid-transition. Re-run once it settles.")
            }
            ProviderError::Sdk { code: Some(c), .. } => suggestion_for_code(c),
            _ => None,
        }
    }
}

/// Known error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchEntity",
    "NotFound",
];

/// Known error codes for malformed identifiers and parameters
const MALFORMED_CODES: &[&str] = &[
    "InvalidInstanceID.Malformed",
    "InvalidInstanceID",
    "InvalidParameterValue",
    "InvalidBucketName",
    "ValidationError",
];

/// Known error codes for permission failures
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "InvalidClientTokenId",
    "AuthFailure",
];

/// Known error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "SlowDown",
];

/// Known error codes for state conflicts
const INCORRECT_STATE_CODES: &[&str] = &["IncorrectInstanceState", "IncorrectState"];

/// Classify a provider failure by its error code.
pub fn classify_error_code(code: Option<&str>, message: Option<&str>) -> ProviderError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => ProviderError::NotFound { message },
        Some(c) if MALFORMED_CODES.contains(&c) => ProviderError::Malformed { message },
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => ProviderError::AccessDenied { message },
        Some(c) if THROTTLING_CODES.contains(&c) => ProviderError::Throttled { message },
        Some(c) if INCORRECT_STATE_CODES.contains(&c) => ProviderError::IncorrectState { message },
        _ => ProviderError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "ExpiredToken",
        "The session token has expired. Refresh the credentials and retry.",
    ),
    (
        "LimitExceeded",
        "The account limit was reached (IAM users may hold at most two access keys).",
    ),
    (
        "OperationAborted",
        "A conflicting operation is in progress on this bucket. Retry later.",
    ),
];

fn suggestion_for_code(code: &str) -> Option<&'static str> {
    SUGGESTIONS.iter().find(|(c, _)| *c == code).map(|(_, s)| *s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_error_code(Some(code), Some("gone"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn throttling_codes_are_the_only_retryable_ones() {
        for code in THROTTLING_CODES {
            let err = classify_error_code(Some(code), Some("slow down"));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
            assert!(!err.is_target_specific());
        }
        for code in MALFORMED_CODES.iter().chain(ACCESS_DENIED_CODES) {
            assert!(!classify_error_code(Some(code), None).is_retryable());
        }
    }

    #[test]
    fn permanent_codes_are_target_specific() {
        for code in NOT_FOUND_CODES
            .iter()
            .chain(MALFORMED_CODES)
            .chain(ACCESS_DENIED_CODES)
            .chain(INCORRECT_STATE_CODES)
        {
            let err = classify_error_code(Some(code), Some("msg"));
            assert!(err.is_target_specific(), "Expected target-specific for code: {code}");
        }
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_error_code(Some("SomeNewError"), Some("details"));
        assert_eq!(err.code(), Some("SomeNewError"));
        assert_eq!(err.to_string(), "provider error (SomeNewError): details");

        let err = classify_error_code(None, None);
        assert!(matches!(err, ProviderError::Sdk { code: None, .. }));
        assert_eq!(err.to_string(), "provider error: Unknown error");
    }

    #[test]
    fn suggestions() {
        assert!(
            classify_error_code(Some("AccessDenied"), None)
                .suggestion()
                .is_some()
        );
        assert!(
            classify_error_code(Some("LimitExceeded"), None)
                .suggestion()
                .is_some()
        );
        assert!(classify_error_code(Some("Whatever"), None).suggestion().is_none());
        for (code, _) in SUGGESTIONS {
            assert!(suggestion_for_code(code).is_some(), "No suggestion for code: {code}");
        }
    }
}
