//! Error types for megha-link

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// megha-link error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Transport collaborator failed to deliver a request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Clean-log collaborator failed to fetch
    #[error("Log fetch error: {0}")]
    LogFetch(String),

    /// Payload field could not be decoded
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Compressed binary field could not be decoded
    #[error("Inflate error: {0}")]
    Inflate(String),

    /// Live map has no established geometry for the requested map
    #[error("Map geometry not established for map {0}")]
    MapGeometryUnknown(String),

    /// Map image render requested before all pieces arrived
    #[error("Map image incomplete: {stored}/{expected} pieces")]
    MapImageIncomplete {
        /// Pieces stored so far
        stored: usize,
        /// Pieces expected for a complete raster
        expected: usize,
    },

    /// Raster could not be encoded to PNG
    #[error("Image encoding error: {0}")]
    ImageEncoding(String),

    /// Session has been disconnected
    #[error("Session disconnected")]
    Disconnected,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
