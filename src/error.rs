//! Error types for the live tracking service
//!
//! Domain errors are defined with thiserror and propagated as anyhow errors,
//! so callers can downcast when they need to branch on the failure kind.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific tracking scenarios
#[derive(Debug, thiserror::Error)]
pub enum LiveTrackingError {
    #[error("Game-state source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Analytics unavailable: {message}")]
    AnalyticsUnavailable { message: String },

    #[error("Invalid lifecycle transition: {message}")]
    Lifecycle { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl LiveTrackingError {
    /// Whether the error came from an external collaborator rather than this service
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            LiveTrackingError::SourceUnavailable { .. }
                | LiveTrackingError::AnalyticsUnavailable { .. }
        )
    }
}
