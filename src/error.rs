//! Error types for dashboard operations
//!
//! Every failure in the engine is non-fatal. Errors are classified by
//! how the user recovers from them:
//! - Retryable: the storage or data source was unreachable
//! - NonRetryable: the request itself was rejected (unknown id, bad name)

use thiserror::Error;

use crate::types::WidgetId;

/// Failures reported by the widget-storage collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    #[error("widget {0} not found")]
    NotFound(WidgetId),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Failures reported by a market-data collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

/// Error taxonomy surfaced at the dashboard operation boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DashboardError {
    #[error("Failed to create widget: {0}")]
    CreationFailed(#[source] StorageError),

    #[error("Failed to update widget {id}: {source}")]
    UpdateFailed {
        id: WidgetId,
        #[source]
        source: StorageError,
    },

    #[error("Failed to delete widgets: {0}")]
    DeletionFailed(#[source] StorageError),

    #[error("Failed to save layout: {0}")]
    LayoutSaveFailed(#[source] StorageError),

    #[error("Failed to fetch widget data: {0}")]
    FetchFailed(#[source] FetchError),
}

impl DashboardError {
    /// Returns true if repeating the same action may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::CreationFailed(e)
            | DashboardError::UpdateFailed { source: e, .. }
            | DashboardError::DeletionFailed(e)
            | DashboardError::LayoutSaveFailed(e) => e.is_retryable(),
            DashboardError::FetchFailed(_) => true,
        }
    }

    /// User-facing hint shown next to the inline error
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DashboardError::CreationFailed(StorageError::Invalid(_)) => {
                "Enter a widget name between 1 and 100 characters."
            }
            DashboardError::CreationFailed(_) => "Try adding the widget again.",
            DashboardError::UpdateFailed {
                source: StorageError::NotFound(_),
                ..
            } => "Reload the dashboard; the widget may have been removed.",
            DashboardError::UpdateFailed { .. } => "Try saving the widget again.",
            DashboardError::DeletionFailed(_) => "Try deleting again.",
            DashboardError::LayoutSaveFailed(_) => {
                "Your arrangement stays on screen and is saved on the next change."
            }
            DashboardError::FetchFailed(_) => "Data is retried on the next refresh.",
        }
    }
}

/// Serializable error representation for the presentation layer
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
}

impl From<&DashboardError> for WidgetError {
    fn from(err: &DashboardError) -> Self {
        let error_type = if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        WidgetError {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
