/// Crate-level error type for the CGMM/MVDR enhancement pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid parameter value.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Audio data is empty when a non-empty signal was required.
    #[error("audio data is empty")]
    EmptyAudio,

    /// Audio data contains non-finite values (NaN or Inf).
    #[error("audio data contains non-finite values")]
    NonFiniteAudio,

    /// The recording does not have the channel count of the array.
    #[error("expected {expected} channels, got {got}")]
    ChannelCount { expected: usize, got: usize },

    /// Input array has incorrect shape for the operation.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// A required dimension is zero or invalid.
    #[error("invalid size for `{name}`: {value} ({reason})")]
    InvalidSize {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },

    /// FFT buffer length mismatch.
    #[error(transparent)]
    Fft(#[from] realfft::FftError),

    /// Audio I/O errors.
    #[error(transparent)]
    Audio(#[from] crate::io::AudioError),

    /// File I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Mask export errors.
    #[error(transparent)]
    Npy(#[from] ndarray_npy::WriteNpyError),
}

/// Convenience Result type for enhancement operations.
pub type Result<T> = std::result::Result<T, Error>;
