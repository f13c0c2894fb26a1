//! Error types: caller mistakes in [`InvalidInput`], everything else in
//! [`CareMatchError`].

use thiserror::Error;

/// Request-level validation failures. These are rejected before any scoring
/// happens and are reported back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("medical issue description is empty")]
    EmptyDescription,
    #[error("unknown urgency level: {0:?} (expected low, medium, high or critical)")]
    UnknownUrgency(String),
    #[error("malformed blood type: {0:?}")]
    MalformedBloodType(String),
    #[error("top_n must be at least 1, got {0}")]
    InvalidTopN(usize),
    #[error("search radius must be a positive number of kilometres, got {0}")]
    InvalidRadius(f64),
    #[error("unknown specialty: {0:?}")]
    UnknownSpecialty(String),
}

impl InvalidInput {
    /// Stable machine-readable code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            InvalidInput::EmptyDescription => "empty_description",
            InvalidInput::UnknownUrgency(_) => "unknown_urgency",
            InvalidInput::MalformedBloodType(_) => "malformed_blood_type",
            InvalidInput::InvalidTopN(_) => "invalid_top_n",
            InvalidInput::InvalidRadius(_) => "invalid_radius",
            InvalidInput::UnknownSpecialty(_) => "unknown_specialty",
        }
    }
}

#[derive(Debug, Error)]
pub enum CareMatchError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),
    #[error("invalid {kind} record {id:?}: {reason}")]
    InvalidRecord {
        kind: &'static str,
        id: String,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("classifier has no training examples")]
    EmptyTrainingSet,
    #[error("token pattern error: {0}")]
    Pattern(#[from] regex::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CareMatchError {
    pub(crate) fn record(kind: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        CareMatchError::InvalidRecord {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CareMatchError>;
