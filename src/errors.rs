use crate::vectoriser::VectoriserError;

/// Malformed input, rejected before any computation takes place.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("item {index} of instrument {instrument_id} has empty text")]
    EmptyText { instrument_id: i64, index: usize },

    #[error("query text is empty")]
    EmptyQuery,

    #[error("instrument id {0} is used more than once")]
    DuplicateInstrument(i64),

    #[error("instrument id {0} leaves no room for a query id")]
    InstrumentIdOutOfRange(i64),

    #[error("dimension mismatch at vector {position}: expected {expected}, got {got}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        got: usize,
    },

    #[error("invalid polarity {value} at position {position}: must be 1 or -1")]
    InvalidPolarity { position: usize, value: f32 },

    #[error("expected {expected} polarities, got {got}")]
    PolarityCount { expected: usize, got: usize },

    #[error("similarity matrix has {got} rows but there are {expected} items")]
    MatrixSize { expected: usize, got: usize },

    #[error("top_k must be a positive integer")]
    NonPositiveTopK,

    #[error("{field} must be a finite value within [-1, 1], got {value}")]
    InvalidScore { field: &'static str, value: f32 },

    #[error("invalid hierarchical cut: {0}")]
    InvalidCut(String),
}

/// Ways an injected vectoriser can break its length/order/dimension contract.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ContractViolation {
    #[error("returned {got} vectors for {expected} texts")]
    Count { expected: usize, got: usize },

    #[error("vector {position} has dimension {got}, expected {expected}")]
    Dimension {
        position: usize,
        expected: usize,
        got: usize,
    },

    #[error("vector {position} is empty")]
    EmptyVector { position: usize },

    #[error("vector {position} contains a non-finite value")]
    NonFinite { position: usize },

    #[error("vector {position} carries index {index}, which is repeated or out of range")]
    Index { position: usize, index: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("vectoriser contract violated: {0}")]
    VectorisationContractViolation(#[from] ContractViolation),

    #[error("vectoriser error: {0}")]
    Vectoriser(VectoriserError),
}

impl From<VectoriserError> for MatchError {
    fn from(err: VectoriserError) -> Self {
        match err {
            VectoriserError::Contract(violation) => Self::VectorisationContractViolation(violation),
            other => Self::Vectoriser(other),
        }
    }
}

impl MatchError {
    /// Whether the caller is at fault (4xx) rather than the vectoriser (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_mapping() {
        let validation: MatchError = ValidationError::NonPositiveTopK.into();
        let contract: MatchError = ContractViolation::Count { expected: 2, got: 1 }.into();
        let vectoriser: MatchError = VectoriserError::EmbeddingFailed("boom".to_string()).into();

        assert!(validation.is_client_error());
        assert!(!contract.is_client_error());
        assert!(!vectoriser.is_client_error());
    }

    #[test]
    fn test_wrapped_contract_violation_surfaces_as_such() {
        let err: MatchError =
            VectoriserError::Contract(ContractViolation::EmptyVector { position: 0 }).into();
        assert!(matches!(err, MatchError::VectorisationContractViolation(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = ValidationError::InvalidPolarity { position: 3, value: 0.5 };
        assert_eq!(err.to_string(), "invalid polarity 0.5 at position 3: must be 1 or -1");

        let err: MatchError = ContractViolation::Count { expected: 3, got: 2 }.into();
        assert_eq!(
            err.to_string(),
            "vectoriser contract violated: returned 2 vectors for 3 texts"
        );
    }
}
