use thiserror::Error;

pub type NamingResult<T> = Result<T, NamingError>;

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("invalid provider id {0:?}")]
    InvalidProviderId(String),

    #[error("hostname {0:?} was not minted by this adapter")]
    ForeignHostname(String),

    #[error("startup script is not valid base64: {0}")]
    ScriptEncoding(#[from] base64::DecodeError),

    #[error("startup script is not valid UTF-8")]
    ScriptUtf8(#[from] std::string::FromUtf8Error),
}
