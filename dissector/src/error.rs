use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ReadError {
    #[error("Read out of bounds: {requested} bytes requested at {position}, {available} left")]
    OutOfBounds {
        position: usize,
        requested: usize,
        available: usize,
    },

    #[error("Delimiter not found.")]
    DelimiterNotFound { position: usize },

    #[error("Invalid text.")]
    InvalidText { position: usize },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DissectError {
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Verification failed: {0}")]
    Verify(&'static str),
}

impl DissectError {
    pub fn additional_info(&self) -> Option<String> {
        match self {
            DissectError::Read(err) => Some(err.to_string()),
            DissectError::Verify(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("IO Error.")]
    IOError(#[from] std::io::Error),

    #[error("Unknown capture format, magic {0:#010x}.")]
    UnknownFormat(u32),

    #[error("Block length mismatch at offset {offset}: leading {leading}, trailing {trailing}.")]
    BlockLengthMismatch {
        offset: usize,
        leading: u32,
        trailing: u32,
    },

    #[error("Capture header is invalid.")]
    InvalidHeader(&'static str),

    #[error("Read error.")]
    Read(#[from] ReadError),
}

impl CaptureError {
    pub fn additional_info(&self) -> Option<String> {
        match self {
            CaptureError::IOError(err) => Some(err.to_string()),
            CaptureError::Read(err) => Some(err.to_string()),
            CaptureError::InvalidHeader(reason) => Some(reason.to_string()),
            _ => None,
        }
    }
}
