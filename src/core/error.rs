//! Error types for the shipping pipeline

pub type Result<T> = std::result::Result<T, ShipperError>;

#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Sink client could not be constructed
    #[error("Failed to construct sink '{sink}': {message}")]
    SinkConstruction { sink: String, message: String },

    /// The sink rejected the whole batch or could not be reached
    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),

    /// HTTP transport error
    #[cfg(feature = "elasticsearch")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl ShipperError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ShipperError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        ShipperError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a sink construction error
    pub fn sink_construction(sink: impl Into<String>, message: impl Into<String>) -> Self {
        ShipperError::SinkConstruction {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a sink unavailable error
    pub fn sink_unavailable<S: Into<String>>(msg: S) -> Self {
        ShipperError::SinkUnavailable(msg.into())
    }
}
