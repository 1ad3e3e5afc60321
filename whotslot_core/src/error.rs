use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("panel count must be 3 or 4, got {0}")]
    InvalidPanelCount(usize),
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    #[error("random source unavailable: {0}")]
    RandomSourceUnavailable(String),
    #[error("amount overflow")]
    Overflow,
}

pub type CoreResult<T> = Result<T, CoreError>;
