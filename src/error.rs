//! Error type shared by the editing engine, the transform client and the CLI.
//!
//! Pre-flight variants (`MissingCredential`, `EmptySelection`, `MissingInput`,
//! `Busy`) are raised before any request leaves the process. Service variants
//! (`InvalidCredential`, `TransformFailure`, `TransportFailure`) come back from
//! the transform call and never leave a partial result in history.

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// No access key configured.
    #[error("No API key is configured. Enter a key to continue.")]
    MissingCredential,

    /// The service rejected the key; the cached copy must be dropped.
    #[error("The API key was rejected: {0}")]
    InvalidCredential(String),

    /// Mask edit requested with an all-transparent mask.
    #[error("Select a region on the image before applying an edit.")]
    EmptySelection,

    /// A required image or prompt is absent.
    #[error("{0}")]
    MissingInput(String),

    /// The call went through but carried no usable image.
    #[error("{0}")]
    TransformFailure(String),

    /// Network or call-level failure.
    #[error("Request failed: {0}")]
    TransportFailure(String),

    /// A transform job is already in flight.
    #[error("Another generation is still running.")]
    Busy,

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("Font error: {0}")]
    Font(String),
}

impl EditError {
    /// Raised locally before a request would be sent.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            EditError::MissingCredential
                | EditError::EmptySelection
                | EditError::MissingInput(_)
                | EditError::Busy
        )
    }

    /// The user has to (re-)enter a key.
    pub fn needs_credential(&self) -> bool {
        matches!(self, EditError::MissingCredential | EditError::InvalidCredential(_))
    }

    /// Short category name for logs and notifications.
    pub fn category(&self) -> &'static str {
        match self {
            EditError::MissingCredential => "missing credential",
            EditError::InvalidCredential(_) => "invalid credential",
            EditError::EmptySelection => "empty selection",
            EditError::MissingInput(_) => "missing input",
            EditError::TransformFailure(_) => "transform failure",
            EditError::TransportFailure(_) => "transport failure",
            EditError::Busy => "busy",
            EditError::Io(_) => "io",
            EditError::Codec(_) => "codec",
            EditError::Font(_) => "font",
        }
    }
}

pub type Result<T> = std::result::Result<T, EditError>;
