/// Crate-wide error type. Every fallible codec function returns
/// `Result<T, CardError>`.
///
/// All variants are deterministic data-format failures: retrying a malformed
/// input cannot succeed, so callers should surface them immediately.
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    /// The input could not be parsed as a map-shaped payload at all,
    /// or the donor bytes are not a PNG.
    #[error("Unrecognized payload: {0}")]
    Format(String),

    /// The PNG carries no `chara` text chunk.
    #[error("Character card is missing the \"chara\" text chunk")]
    MissingChunk,

    /// The `chara` chunk value is not valid base64, or the decoded bytes
    /// are not valid UTF-8 JSON. The message says which stage failed.
    #[error("Failed to decode card payload: {0}")]
    Decode(String),

    /// Card export was requested on a record with no associated image.
    #[error("Cannot export a card without a donor image")]
    MissingImage,

    /// File-level I/O at the facade boundary.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering the canonical tree to JSON or YAML failed.
    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl CardError {
    /// Stable machine-readable discriminant, for callers that log or route
    /// errors without matching on the enum.
    pub fn kind(&self) -> &'static str {
        match self {
            CardError::Format(_) => "format",
            CardError::MissingChunk => "missing_chunk",
            CardError::Decode(_) => "decode",
            CardError::MissingImage => "missing_image",
            CardError::Io(_) => "io",
            CardError::Serialize(_) => "serialize",
        }
    }
}
