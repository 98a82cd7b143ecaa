use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DenyCategory, DomainError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    /// 拒绝类别，客户端据此决定重试、退避或放弃
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                category: None,
                retry_after_secs: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    fn denied(category: &DenyCategory) -> Self {
        let (status, code, message) = match category {
            DenyCategory::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "too many messages, slow down",
            ),
            DenyCategory::Banned => (StatusCode::FORBIDDEN, "BANNED", "sender is banned"),
            DenyCategory::BlockedPattern { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "BLOCKED_PATTERN",
                "message contains a blocked link",
            ),
            DenyCategory::TooLong { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "TOO_LONG",
                "message exceeds the length limit",
            ),
            DenyCategory::RecipientUnreachable => (
                StatusCode::NOT_FOUND,
                "RECIPIENT_UNREACHABLE",
                "recipient is not connected",
            ),
        };
        let retry_after_secs = match category {
            DenyCategory::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.to_string(),
                category: Some(category.as_str()),
                retry_after_secs,
            },
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match &error {
            DomainError::Validation { field, message } => ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                format!("{}: {}", field, message),
            ),
            DomainError::Denied(category) => ApiError::denied(category),
            // 瞬时故障只向外暴露笼统的失败
            DomainError::Transient { .. } => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "temporary backend failure, try again",
            ),
            DomainError::Invariant { message } => {
                tracing::error!(error = %message, "不变量被破坏");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_carries_retry_hint() {
        let err = ApiError::from(DomainError::denied(DenyCategory::RateLimited {
            retry_after_secs: 7,
        }));
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.body.retry_after_secs, Some(7));
        assert_eq!(err.body.category, Some("rate-limited"));
    }

    #[test]
    fn transient_is_surfaced_as_generic_failure() {
        let err = ApiError::from(DomainError::transient("redis gone"));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        // 内部细节不暴露
        assert!(!err.body.message.contains("redis"));
    }
}
