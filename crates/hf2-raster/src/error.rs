//! Error types for hf2-raster.

use thiserror::Error;

/// Errors that can occur while decoding or encoding HF2 data.
#[derive(Debug, Error)]
pub enum Hf2Error {
    /// File magic did not match "HF2".
    #[error("Invalid magic: expected \"HF2\", got {0:?}")]
    InvalidMagic(String),

    /// File version other than the supported one.
    #[error("Unsupported version {0} (expected 0)")]
    UnsupportedVersion(u16),

    /// Buffer ended in the middle of a field.
    #[error("Truncated data at offset {offset}: needed {needed} more bytes")]
    Truncated {
        /// Byte offset where the read started.
        offset: usize,
        /// Bytes missing to complete the read.
        needed: usize,
    },

    /// Extended header inconsistent with its declared length.
    #[error("Extended header error at offset {offset}: {message}")]
    ExtendedHeaderOverrun {
        /// Byte offset of the offending block.
        offset: usize,
        /// Description of the inconsistency.
        message: String,
    },

    /// Row delta-width selector was not 1, 2, or 4.
    #[error("Invalid delta width {width} at offset {offset}")]
    InvalidDeltaWidth {
        /// The selector byte as read.
        width: u8,
        /// Byte offset of the selector.
        offset: usize,
    },

    /// Header declared a zero or inconsistent geometry.
    #[error("Invalid raster geometry: {0}")]
    InvalidGeometry(String),
}

impl Hf2Error {
    /// Create an extended-header overrun error at a specific offset.
    pub fn ext_header(offset: usize, message: impl Into<String>) -> Self {
        Hf2Error::ExtendedHeaderOverrun {
            offset,
            message: message.into(),
        }
    }

    /// Create a geometry error.
    pub fn geometry(message: impl Into<String>) -> Self {
        Hf2Error::InvalidGeometry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Hf2Error::Truncated {
            offset: 12,
            needed: 4,
        };
        assert!(err.to_string().contains("offset 12"));

        let err = Hf2Error::ext_header(30, "block length exceeds declared length");
        assert!(err.to_string().contains("offset 30"));
    }
}
