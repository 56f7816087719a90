//! Error types for rag_scorecard
//!
//! Every failure the scoring engine can report falls into one of four kinds:
//! configuration, input, statistically undefined, or external payload.
//! None of them is ever silently defaulted.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Main error type for rag_scorecard
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// Invalid weight vector, threshold table, or sweep candidate list
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// A required text field is missing, or there is nothing to assess
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// Correlation requested where it is mathematically undefined
    #[error("Statistic undefined: {message}")]
    StatisticalUndefined { message: String },

    /// A judge or similarity payload is malformed or out of range
    #[error("Malformed external payload: {message}")]
    ExternalPayload { message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ScoringError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Create a statistically-undefined error
    pub fn statistical_undefined(message: impl Into<String>) -> Self {
        Self::StatisticalUndefined {
            message: message.into(),
        }
    }

    /// Create an external payload error
    pub fn external_payload(message: impl Into<String>) -> Self {
        Self::ExternalPayload {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Stable, machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Input { .. } => "input_error",
            Self::StatisticalUndefined { .. } => "statistical_undefined",
            Self::ExternalPayload { .. } => "external_payload_error",
            Self::Serialization { .. } => "serialization_error",
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input { .. })
    }

    /// Check if this error means a correlation could not be computed
    pub fn is_statistical_undefined(&self) -> bool {
        matches!(self, Self::StatisticalUndefined { .. })
    }

    pub fn is_external_payload(&self) -> bool {
        matches!(self, Self::ExternalPayload { .. })
    }
}

impl From<serde_json::Error> for ScoringError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScoringError::configuration("weights sum to 0.9");
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.to_string().contains("weights sum to 0.9"));

        let err = ScoringError::statistical_undefined("fewer than 2 samples");
        assert!(err.to_string().contains("Statistic undefined"));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(ScoringError::input("empty").is_input());
        assert!(!ScoringError::input("empty").is_configuration());
        assert!(ScoringError::statistical_undefined("x").is_statistical_undefined());
        assert!(ScoringError::external_payload("x").is_external_payload());
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            ScoringError::configuration("").code(),
            ScoringError::input("").code(),
            ScoringError::statistical_undefined("").code(),
            ScoringError::external_payload("").code(),
            ScoringError::serialization("").code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_from_serde_json() {
        let err: ScoringError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), "serialization_error");
    }
}
