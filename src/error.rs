use thiserror::Error;

/// Error types for the specfit-rs library.
#[derive(Error, Debug)]
pub enum SpecFitError {
    /// Malformed value or status text.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A status that is not legal for the parameter it was assigned to.
    #[error("Invalid status '{status}' for parameter '{parameter}'")]
    InvalidStatus { parameter: String, status: String },

    /// A parameter name the peak shape does not declare.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// A per-peak status list that is shorter than the number of peaks.
    #[error("Not enough values for status of {parameter}: need {needed}, got {given}")]
    MissingPeakStatus {
        parameter: String,
        needed: usize,
        given: usize,
    },

    /// Division by a value that is exactly zero.
    #[error("Division by zero")]
    DivideByZero,

    /// The nonlinear fit did not converge.
    #[error("Fit did not converge: {0}")]
    FitDidNotConverge(String),

    /// The covariance matrix does not match the declared parameter count.
    #[error("Covariance matrix has dimension {found}, expected {expected}")]
    CovarianceSizeMismatch { expected: usize, found: usize },

    /// A parameter vector with the wrong number of entries.
    #[error("Expected {expected} parameters, found {found}")]
    ParameterCountMismatch { expected: usize, found: usize },

    /// A covariance file with the wrong number of rows or columns.
    #[error("Incorrect format of covariance file: {0}")]
    CovarianceFormatError(String),

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error indicating a singular matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// The fitted curve has no usable maximum to normalize against.
    #[error("Normalization failed: {0}")]
    NormalizationFailed(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for specfit-rs operations.
pub type Result<T> = std::result::Result<T, SpecFitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpecFitError::CovarianceSizeMismatch {
            expected: 3,
            found: 2,
        };
        assert_eq!(
            format!("{}", err),
            "Covariance matrix has dimension 2, expected 3"
        );

        let err = SpecFitError::InvalidStatus {
            parameter: "pos".to_string(),
            status: "equal".to_string(),
        };
        assert!(format!("{}", err).contains("'equal'"));
        assert!(format!("{}", err).contains("'pos'"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SpecFitError = io_err.into();

        match err {
            SpecFitError::Io(_) => (),
            _ => panic!("Expected Io variant"),
        }

        let json_err = serde_json::from_str::<f64>("not json").unwrap_err();
        let err: SpecFitError = json_err.into();
        assert!(matches!(err, SpecFitError::Json(_)));
    }
}
