//! Unified error handling with Sentry integration.
//!
//! Services return `Result<T, AppError>`. At the boundary where a caller would
//! show a toast, [`report`] turns the error into a [`Notice`]: authentication
//! problems become warnings, everything else an error, and server-side
//! failures are captured to Sentry on the way.

use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Fixed message shown when an action needs a signed-in user.
pub const SIGN_IN_REQUIRED: &str = "Please sign in to continue";

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Local storage could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The action needs a signed-in user.
    #[error("Please sign in to continue")]
    Unauthenticated,

    /// Resource not found locally.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected before reaching the backend.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error means the user has to sign in (again).
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Api(ApiError::Unauthenticated))
    }

    /// Map the error to the notice a user should see.
    #[must_use]
    pub fn notice(&self) -> Notice {
        if self.is_unauthenticated() {
            return Notice::warning(SIGN_IN_REQUIRED);
        }

        // Don't expose transport details to users
        let message = match self {
            Self::Api(ApiError::Rejected(message)) => message.clone(),
            Self::Api(ApiError::NotFound(_)) | Self::NotFound(_) => {
                "The requested item no longer exists".to_string()
            }
            Self::Api(ApiError::RateLimited(secs)) => {
                format!("Too many requests, try again in {secs} seconds")
            }
            Self::Api(_) => "Could not reach the store, please try again".to_string(),
            Self::BadRequest(message) => message.clone(),
            Self::Storage(_) | Self::Internal(_) | Self::Unauthenticated => {
                "Something went wrong".to_string()
            }
        };
        Notice::error(message)
    }

    const fn should_capture(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Storage(_)
                | Self::Api(
                    ApiError::Http(_)
                        | ApiError::Parse(_)
                        | ApiError::Status { .. }
                        | ApiError::InvalidPath { .. }
                )
        )
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Log an error, capture it to Sentry when it is not the user's doing, and
/// return the notice to show.
pub fn report(error: &AppError) -> Notice {
    if error.should_capture() {
        let event_id = sentry::capture_error(error);
        tracing::error!(error = %error, sentry_event_id = %event_id, "Storefront error");
    } else {
        tracing::warn!(error = %error, "Storefront request failed");
    }
    error.notice()
}

/// Set the Sentry user context after sign-in.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Changed quantity", Some(&[("item_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
