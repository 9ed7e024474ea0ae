use thiserror::Error;

/// Tessera error types
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Name violates the repository/image naming policy
    #[error("Invalid {kind} name '{name}': must start with a letter, contain only letters, digits, '-' or '_', and be 2-128 characters")]
    InvalidName { kind: String, name: String },

    /// Identifier is not a syntactically valid UUID
    #[error("'{0}' is not a valid UUID")]
    InvalidUuid(String),

    /// Required argument or configuration key missing
    #[error("Missing required value: {0}")]
    MissingArgument(String),

    /// Required metadata sidecar not found
    #[error("Metadata sidecar not found: {0}")]
    MissingSidecar(String),

    /// Image service responded with an error status
    #[error("Image service error: {status} - {body}")]
    RemoteService { status: u16, body: String },

    /// Network-level failure talking to the image service
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response decoded but did not match the expected shape
    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    /// Storage URL in the credentials response did not parse
    #[error("Malformed credentials response: {0}")]
    MalformedCredentials(String),

    /// Tile file violates the container format invariants
    #[error("Invalid format in {file}: {reason}")]
    InvalidFormat { file: String, reason: String },

    /// Object storage transfer failure
    #[error("Storage error for '{key}': {message}")]
    Storage { key: String, message: String },

    /// Username or password rejected by the identity provider
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// Client id rejected by the identity provider
    #[error("Invalid client id: {0}")]
    InvalidClientId(String),

    /// Other authentication failure
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        TesseraError::Other(format!("Serialization error: {}", err))
    }
}

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;
