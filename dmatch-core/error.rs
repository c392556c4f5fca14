use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Descriptor row {row} has length {actual}, expected {expected}")]
    RaggedRow { row: usize, expected: usize, actual: usize },
    #[error("Descriptor rows must not be empty")]
    ZeroLengthRow,
    #[error("Flat descriptor buffer of {len} values is not a multiple of row length {row_len}")]
    BufferNotAligned { len: usize, row_len: usize },
    #[error("Non-finite value in descriptor row {row}, column {column}")]
    NonFiniteValue { row: usize, column: usize },
    #[error("Unknown {kind} `{value}`")]
    UnknownOption { kind: &'static str, value: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
