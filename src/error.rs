use std::io;

/// User-facing text shown for every export failure.
pub const EXPORT_FAILURE_MESSAGE: &str = "The media could not be added to the Media Library.";

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Error types surfaced by the export pipeline
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// The source URL does not reference a local file
    #[error("Invalid source reference: {0}")]
    InvalidSourceReference(String),

    /// No type identifier could be resolved, or it is not GIF, video or image
    #[error("Unrecognized file type: {0}")]
    UnrecognizedFileType(String),

    /// Filesystem or collaborator failure
    #[error("Underlying IO failure: {0}")]
    UnderlyingIoFailure(#[from] io::Error),
}

impl ExportError {
    /// Localized description shown to the user.
    ///
    /// Every kind renders the same text.
    pub fn description(&self) -> &'static str {
        EXPORT_FAILURE_MESSAGE
    }

    /// Map any failure into an export error.
    ///
    /// An `ExportError` already in the chain is kept as-is, an `io::Error`
    /// becomes `UnderlyingIoFailure`, and anything else is wrapped as an
    /// `UnderlyingIoFailure` carrying the original message.
    pub fn from_failure(error: anyhow::Error) -> Self {
        let error = match error.downcast::<ExportError>() {
            Ok(export_error) => return export_error,
            Err(error) => error,
        };

        // A bare io::Error is kept; context layers are folded into the message
        let error = if error.chain().count() == 1 {
            match error.downcast::<io::Error>() {
                Ok(io_error) => return ExportError::UnderlyingIoFailure(io_error),
                Err(error) => error,
            }
        } else {
            error
        };

        let kind = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<io::Error>())
            .map(io::Error::kind)
            .unwrap_or(io::ErrorKind::Other);

        ExportError::UnderlyingIoFailure(io::Error::new(kind, format!("{:#}", error)))
    }

    pub fn is_invalid_source(&self) -> bool {
        matches!(self, ExportError::InvalidSourceReference(_))
    }

    pub fn is_unrecognized_type(&self) -> bool {
        matches!(self, ExportError::UnrecognizedFileType(_))
    }

    pub fn is_io_failure(&self) -> bool {
        matches!(self, ExportError::UnderlyingIoFailure(_))
    }
}
