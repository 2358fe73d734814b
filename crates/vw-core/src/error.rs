//! Unified error type for the vidwall engine.
//!
//! All crates funnel their failures into [`Error`]. Absence of a bundled tool
//! is deliberately *not* an error here -- callers receive it as dependency
//! status -- so [`Error::ToolNotFound`] only appears when an operation was
//! asked to run a tool that could not be resolved at all.

/// Unified error type covering all failure modes in the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required tool could not be resolved in the bundle or system paths.
    #[error("{tool} not found in bundle or system paths")]
    ToolNotFound {
        /// Logical name of the tool (e.g. "ffmpeg").
        tool: String,
    },

    /// An external tool ran but reported an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed or produced unusable output.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Configuration or request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::ToolNotFound`].
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Error::ToolNotFound { tool: tool.into() }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Probe`].
    pub fn probe(message: impl Into<String>) -> Self {
        Error::Probe(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
