//! Decision errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("Unknown response strategy: {0}")]
    UnknownStrategy(String),

    #[error("Unknown cognitive operation: {0}")]
    UnknownOperation(String),
}
