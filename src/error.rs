//! Error type shared by the analysis pipeline and the record loaders

use thiserror::Error;

/// Errors produced while loading records or analysing them.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// The input batch cannot be segmented (empty, missing ids, no numeric field).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Standardization, fitting or scoring failed.
    #[error("Computation error: {0}")]
    Computation(String),

    /// The analysis was cancelled or ran out of its time budget between candidate fits.
    #[error("Analysis cancelled: {0}")]
    Cancelled(String),

    /// Reading an input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SegmentError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn computation(message: impl Into<String>) -> Self {
        Self::Computation(message.into())
    }

    /// True when the caller supplied bad input; everything else is a server-side fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Json(_) | Self::Csv(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_vs_server_faults() {
        let validation = SegmentError::validation("no numeric columns");
        let computation = SegmentError::computation("singular input");
        let cancelled = SegmentError::Cancelled("deadline".to_string());

        assert!(validation.is_client_error());
        assert!(!computation.is_client_error());
        assert!(!cancelled.is_client_error());
    }

    #[test]
    fn test_error_messages() {
        let err = SegmentError::validation("no numeric columns found for clustering");
        assert_eq!(
            err.to_string(),
            "Validation error: no numeric columns found for clustering"
        );
    }
}
