use udcn_core::{FaceId, NameParseError};

/// Error types for forwarder setup operations
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("Face already exists: {0}")]
    FaceAlreadyExists(FaceId),
    #[error("Face id {0} is outside the reserved range")]
    ReservedFaceId(FaceId),
    #[error("Face not found: {0}")]
    FaceNotFound(FaceId),
    #[error("Invalid name: {0}")]
    InvalidName(#[from] NameParseError),
}

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
