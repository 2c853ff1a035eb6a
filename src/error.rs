use core::fmt;
use thiserror::Error;

/// Represents an error while decoding or encoding an SMF file.
///
/// Decoding errors carry the absolute byte offset into the input buffer at which the problem
/// was detected.
/// Encoding errors carry the index of the offending track instead.
///
/// Decoding is all-or-nothing: any error aborts the whole file, and no partial track list is
/// ever produced.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The input is not a MIDI file, or uses a feature that this crate does not support (such
    /// as SMPTE timing).
    #[error("invalid midi at byte {offset}: {msg}")]
    Format { offset: usize, msg: &'static str },
    /// The input ended (or a chunk ended) in the middle of a structure.
    #[error("truncated midi at byte {offset}: {msg}")]
    Truncated { offset: usize, msg: &'static str },
    /// A value could not be represented in the SMF format while encoding.
    #[error("value out of range in track {track}: {msg}")]
    Range { track: usize, msg: &'static str },
}
impl Error {
    /// The broad category of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Format { .. } => ErrorKind::Format,
            Error::Truncated { .. } => ErrorKind::Truncated,
            Error::Range { .. } => ErrorKind::Range,
        }
    }

    /// The absolute byte offset where a decoding error was detected.
    ///
    /// Always `None` for `ErrorKind::Range` errors.
    #[inline]
    pub fn offset(&self) -> Option<usize> {
        match *self {
            Error::Format { offset, .. } | Error::Truncated { offset, .. } => Some(offset),
            Error::Range { .. } => None,
        }
    }

    /// Get the informative message on what exact part of the MIDI format was not respected.
    #[inline]
    pub fn message(&self) -> &'static str {
        match *self {
            Error::Format { msg, .. } | Error::Truncated { msg, .. } | Error::Range { msg, .. } => {
                msg
            }
        }
    }

    /// Attach a track index to a range error produced by a track-agnostic helper.
    pub(crate) fn in_track(self, index: usize) -> Error {
        match self {
            Error::Range { msg, .. } => Error::Range { track: index, msg },
            other => other,
        }
    }
}

/// The type of error that occurred.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad magic tags, unsupported header values or malformed events.
    Format,
    /// A read past the end of the buffer or of the enclosing chunk.
    Truncated,
    /// A tick or numeric value exceeds the representable range during encode.
    Range,
}
impl fmt::Display for ErrorKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Format => "format error",
            ErrorKind::Truncated => "truncated data",
            ErrorKind::Range => "range error",
        })
    }
}

macro_rules! err_format {
    ($offset:expr, $msg:expr) => {
        $crate::error::Error::Format {
            offset: $offset,
            msg: $msg,
        }
    };
}
macro_rules! err_truncated {
    ($offset:expr, $msg:expr) => {
        $crate::error::Error::Truncated {
            offset: $offset,
            msg: $msg,
        }
    };
}
macro_rules! err_range {
    ($msg:expr) => {
        $crate::error::Error::Range { track: 0, msg: $msg }
    };
}

/// The result type used by the codec.
pub type Result<T> = StdResult<T, Error>;
pub(crate) use core::result::Result as StdResult;
