use std::path::PathBuf;
use thiserror::Error;

/// Load-time failures. All of them are terminal: the server does not start.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("required asset not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read asset {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse asset {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("unsupported model {}: {reason}", path.display())]
    UnsupportedModel { path: PathBuf, reason: String },

    #[error("column manifest rejected: {0}")]
    Schema(#[from] SchemaError),

    #[error("model and column manifest disagree: {0}")]
    Mismatch(String),

    #[error("warmup forward failed: {0}")]
    Warmup(#[source] InferenceError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("manifest has no columns")]
    Empty,

    #[error("column {0:?} appears more than once")]
    DuplicateColumn(String),

    #[error("column {0:?} does not belong to any known flight field")]
    UnknownColumn(String),

    #[error("field {0} is both a numeric column and a one-hot group")]
    MixedEncoding(&'static str),

    #[error("field {field} cannot be encoded as {found}")]
    WrongEncoding {
        field: &'static str,
        found: &'static str,
    },

    #[error("manifest declares in_dim={declared} but lists {listed} columns")]
    DimMismatch { declared: usize, listed: usize },
}

/// Raised when the classifier rejects an aligned row. Recoverable per request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    WidthMismatch { got: usize, expected: usize },

    #[error("column {column} holds a non-finite value")]
    NonFinite { column: String },

    #[error("classifier failed: {0}")]
    Backend(String),
}

impl InferenceError {
    pub fn hint(&self) -> &'static str {
        "Check that the airport codes are valid and match the codes the model was trained on."
    }
}

/// Trivial bounds checks on submitted form values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be a whole number, got {value:?}")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: i64,
        value: i64,
    },

    #[error("{field} must be at most {max}, got {value}")]
    AboveMaximum {
        field: &'static str,
        max: i64,
        value: i64,
    },

    #[error("DayOfWeek must be between 1 and 7, got {0}")]
    DayOutOfRange(i64),

    #[error("unknown airline code {0:?}")]
    UnknownAirline(String),

    #[error("{0} must not be empty")]
    EmptyAirport(&'static str),
}

impl ValidationError {
    pub fn hint(&self) -> &'static str {
        match self {
            ValidationError::NotANumber { .. }
            | ValidationError::BelowMinimum { .. }
            | ValidationError::AboveMaximum { .. } => {
                "Flight number, departure time and duration must be whole, non-negative numbers."
            }
            ValidationError::DayOutOfRange(_) => "Pick a day between 1 and 7.",
            ValidationError::UnknownAirline(_) => "Pick one of the listed airline codes.",
            ValidationError::EmptyAirport(_) => "Enter an airport code such as ATL or SFO.",
        }
    }
}
