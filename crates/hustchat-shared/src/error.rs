use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SharedError {
    #[error("Identifier must not be empty")]
    EmptyId,

    #[error("Identifier must not contain '{0}'")]
    ReservedCharacter(char),

    #[error("Invalid message id: {0}")]
    InvalidMessageId(String),
}
