//! Error types for the rcpt-core library.

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// Scan aborted.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// OCR engine error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that abort a scan call.
///
/// Everything short of an undecodable image degrades into a (possibly empty)
/// receipt instead of an error.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The input bytes could not be decoded as an image.
    #[error("unreadable image: {0}")]
    UnreadableImage(String),
}

/// Errors raised by a single OCR attempt or engine.
///
/// These never escape the arbiter: a failed attempt is dropped from the
/// candidate set.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The engine cannot run in this environment (missing binary or models).
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// The attempt exceeded its time budget.
    #[error("attempt timed out after {0}s")]
    Timeout(u64),

    /// The engine panicked.
    #[error("engine panicked: {0}")]
    Panicked(String),

    /// Invalid image handed to the engine.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// I/O failure while staging the image for the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_converts_into_top_level() {
        let err: RcptError = ScanError::UnreadableImage("bad header".to_string()).into();
        assert_eq!(err.to_string(), "scan error: unreadable image: bad header");
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(OcrError::Timeout(30).to_string(), "attempt timed out after 30s");
    }
}
