pub type PromoreelResult<T> = Result<T, PromoreelError>;

#[derive(thiserror::Error, Debug)]
pub enum PromoreelError {
    /// No encoder binary is available on this host.
    #[error("capture unsupported: {0}")]
    CaptureUnsupported(String),

    /// The raster surface could not be allocated.
    #[error("surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// The script parsed to zero scenes.
    #[error("script contains no scenes")]
    NoScenes,

    /// None of the preferred codecs is supported by the encoder.
    #[error("no supported codec: {0}")]
    NoSupportedCodec(String),

    /// The text paint context could not be constructed.
    #[error("paint context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("render cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PromoreelError {
    pub fn capture_unsupported(msg: impl Into<String>) -> Self {
        Self::CaptureUnsupported(msg.into())
    }

    pub fn surface_unavailable(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable(msg.into())
    }

    pub fn no_supported_codec(msg: impl Into<String>) -> Self {
        Self::NoSupportedCodec(msg.into())
    }

    pub fn context_unavailable(msg: impl Into<String>) -> Self {
        Self::ContextUnavailable(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
