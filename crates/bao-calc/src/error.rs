#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("Value overflows a decimal: {0}")]
    Overflow(String),
    #[error("Invalid decimals: {0}")]
    InvalidDecimals(String),
}
