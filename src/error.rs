use thiserror::Error;

/// Fatal failures of a document transformation.
///
/// Only decoding and encoding abort a render; everything else degrades to a
/// logged warning or a status value.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("template is not a readable DOCX package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("template is missing part {0}")]
    MissingPart(String),

    #[error("malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("failed to encode document: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn xml(part: &str, message: impl ToString) -> Self {
        EngineError::Xml {
            part: part.to_string(),
            message: message.to_string(),
        }
    }

    /// True for failures raised while reading the template. Image
    /// insertion never surfaces an `EngineError`, so every variant other
    /// than `Encode` comes from decoding.
    pub fn is_decode(&self) -> bool {
        match self {
            EngineError::Package(_)
            | EngineError::MissingPart(_)
            | EngineError::Xml { .. }
            | EngineError::Io(_) => true,
            EngineError::Encode(_) => false,
        }
    }

    pub fn is_encode(&self) -> bool {
        matches!(self, EngineError::Encode(_))
    }
}

/// Reasons an image stream could not be embedded.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image stream is empty")]
    Empty,

    #[error("unsupported image format")]
    Unsupported,

    #[error("PNG decoding failed: {0}")]
    Png(#[from] png::DecodingError),
}
