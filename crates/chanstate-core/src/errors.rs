/// Core error type for the channel state crate.
///
/// Only `InvalidIdentifierFormat` comes out of the command layer; absent
/// channels and unknown ids resolve to defined defaults instead of errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid message identifier: {input:?} is not a non-negative integer")]
    InvalidIdentifierFormat { input: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("state runtime is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
