//! Simple building-block data that can be read in one go.
//! All primitives have a known size, and advance the reader when read.

use crate::prelude::*;

/// A bounded view over the input buffer that remembers its absolute position.
///
/// Every read is checked against the end of the view, so a reader created over a chunk body can
/// never run past the chunk, and errors always point at an absolute byte in the original input.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Reader<'a> {
    /// Starts at the current read position, ends at the end of the view.
    raw: &'a [u8],
    /// Absolute offset of `raw[0]` within the original input.
    base: usize,
}
impl<'a> Reader<'a> {
    #[inline]
    pub fn new(raw: &'a [u8]) -> Reader<'a> {
        Reader { raw, base: 0 }
    }

    #[inline]
    pub fn at(raw: &'a [u8], base: usize) -> Reader<'a> {
        Reader { raw, base }
    }

    /// Absolute offset of the next byte to be read.
    #[inline]
    pub fn offset(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        self.raw
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.raw.first().copied()
    }

    /// Split off the next `len` bytes as a separate reader, or return `None` (without
    /// advancing) if there are not enough bytes.
    #[inline]
    pub fn split_checked(&mut self, len: usize) -> Option<Reader<'a>> {
        if len > self.raw.len() {
            None
        } else {
            let (extracted, remainder) = self.raw.split_at(len);
            let sub = Reader::at(extracted, self.base);
            self.raw = remainder;
            self.base += len;
            Some(sub)
        }
    }

    /// Consume everything that is left.
    #[inline]
    pub fn take_rest(&mut self) -> Reader<'a> {
        let len = self.raw.len();
        let sub = Reader::at(self.raw, self.base);
        self.raw = &[];
        self.base += len;
        sub
    }

    #[inline]
    pub fn read_slice(&mut self, len: usize, msg: &'static str) -> Result<&'a [u8]> {
        let offset = self.base;
        self.split_checked(len)
            .map(|sub| sub.raw)
            .ok_or(err_truncated!(offset, msg))
    }

    #[inline]
    pub fn read_u8(&mut self, msg: &'static str) -> Result<u8> {
        Ok(self.read_slice(1, msg)?[0])
    }

    #[inline]
    pub fn read_u16(&mut self, msg: &'static str) -> Result<u16> {
        let buf = self.read_slice(2, msg)?;
        Ok(u16::from_be_bytes([buf[0], buf[1]]))
    }

    /// Read a variable-length quantity, advancing past it.
    #[inline]
    pub fn read_varlen(&mut self) -> Result<u28> {
        let (int, len) = crate::varlen::decode_vlq(self.raw, 0).map_err(|err| self.rebase(err))?;
        self.raw = &self.raw[len..];
        self.base += len;
        Ok(u28::new(int))
    }

    /// Reads a slice represented in the input as a varlen `len` followed by `len` bytes.
    #[inline]
    pub fn read_varlen_slice(&mut self, msg: &'static str) -> Result<&'a [u8]> {
        let len = self.read_varlen()?.as_int();
        self.read_slice(len as usize, msg)
    }

    /// Translate an error relative to `raw` into one relative to the original input.
    fn rebase(&self, err: Error) -> Error {
        match err {
            Error::Format { offset, msg } => err_format!(self.base + offset, msg),
            Error::Truncated { offset, msg } => err_truncated!(self.base + offset, msg),
            other => other,
        }
    }
}

/// Slightly restricted integers.
macro_rules! restricted_int {
    {$(#[$attr:meta])* $name:ident : $inner:tt => $bits:expr} => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
        #[repr(transparent)]
        #[allow(non_camel_case_types)]
        pub struct $name($inner);
        impl From<$inner> for $name {
            /// Lossy conversion, loses the top bits.
            #[inline]
            fn from(raw: $inner) -> $name {
                $name::new(raw)
            }
        }
        impl From<$name> for $inner {
            #[inline]
            fn from(restricted: $name) -> $inner {restricted.0}
        }
        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
        impl $name {
            const MASK: $inner = (1 << $bits) - 1;

            /// The maximum value that this restricted integer can hold.
            #[inline]
            pub const fn max_value() -> $name {
                $name (Self::MASK)
            }

            /// Creates a restricted int from its non-restricted counterpart by masking off the
            /// extra bits.
            #[inline]
            pub const fn new(raw: $inner) -> $name {
                $name (raw & Self::MASK)
            }

            /// Creates a restricted int from its non-restricted counterpart, saturating at the
            /// maximum value instead of masking.
            #[inline]
            pub const fn clamped(raw: $inner) -> $name {
                if raw > Self::MASK {
                    $name (Self::MASK)
                } else {
                    $name (raw)
                }
            }

            /// Returns `Some` if the raw integer is within range of the restricted integer, and
            /// `None` otherwise.
            #[inline]
            pub fn try_from(raw: $inner) -> Option<$name> {
                if raw <= Self::MASK {
                    Some($name(raw))
                } else {
                    None
                }
            }

            /// Get the inner integer out of the wrapper.
            /// The inner integer is guaranteed to be in range of the restricted wrapper.
            #[inline]
            pub const fn as_int(self) -> $inner {
                self.0
            }
        }
        impl PartialEq<$inner> for $name {
            fn eq(&self, rhs: &$inner) -> bool {
                self.as_int() == *rhs
            }
        }
        impl PartialOrd<$inner> for $name {
            fn partial_cmp(&self, rhs: &$inner) -> Option<core::cmp::Ordering> {
                Some(self.as_int().cmp(rhs))
            }
        }
    };
}
restricted_int! {
    /// A 15-bit integer type.
    ///
    /// Wraps the `u16` type and ensures that the top bit is always zero.
    u15: u16 => 15
}
restricted_int! {
    /// A 7-bit integer type.
    ///
    /// Wraps the `u8` type and ensures that the top bit is always zero.
    u7: u8 => 7
}
restricted_int! {
    /// A 4-bit integer type.
    ///
    /// Wraps the `u8` type and ensures that the top 4 bits are always zero.
    u4: u8 => 4
}
restricted_int! {
    /// A 24-bit integer type.
    ///
    /// Wraps the `u32` type and ensures that the top 8 bits are always zero.
    u24: u32 => 24
}
restricted_int! {
    /// Referred to in the MIDI spec as "variable length int".
    u28: u32 => 28
}

/// The order in which tracks should be laid out when playing back an SMF file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Format {
    /// This file should have a single track only.
    SingleTrack,
    /// This file has several tracks that should be played simultaneously.
    ///
    /// Usually the first track controls tempo and other song metadata.
    Parallel,
}
impl Format {
    pub(crate) fn read(raw: &mut Reader) -> Result<Format> {
        let offset = raw.offset();
        let format = raw.read_u16("failed to read smf format")?;
        Ok(match format {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => bail!(err_format!(offset, "sequential (format 2) files are not supported")),
            _ => bail!(err_format!(offset, "invalid smf format")),
        })
    }

    /// Pick the format matching an amount of tracks.
    #[inline]
    pub fn for_track_count(count: usize) -> Format {
        if count > 1 {
            Format::Parallel
        } else {
            Format::SingleTrack
        }
    }

    pub(crate) fn encode(&self) -> [u8; 2] {
        let code: u16 = match self {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
        };
        code.to_be_bytes()
    }
}
