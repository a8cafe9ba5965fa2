/// Errors from encoding or decoding objects.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The object could not be encoded.
    #[error("{media_type} encode error: {reason}")]
    Serialization {
        media_type: &'static str,
        reason: String,
    },

    /// The bytes could not be decoded into the requested type.
    #[error("{media_type} decode error: {reason}")]
    Deserialization {
        media_type: &'static str,
        reason: String,
    },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
