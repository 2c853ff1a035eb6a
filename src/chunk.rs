//! The chunk layer of the SMF format: 4-byte tags followed by a big-endian `u32` length.

use crate::{event::EventIter, prelude::*, primitive::Format};

/// The tag of the single header chunk that starts every SMF file.
pub const HEADER_TAG: [u8; 4] = *b"MThd";
/// The tag of every track chunk.
pub const TRACK_TAG: [u8; 4] = *b"MTrk";

/// Length of a standard header chunk body.
const HEADER_LEN: usize = 6;

/// The 8-byte prefix of any chunk.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct ChunkHeader {
    /// The 4-byte ASCII chunk type.
    pub tag: [u8; 4],
    /// The exact length of the chunk body, in bytes.
    pub len: u32,
    /// Absolute offset of the first body byte.
    pub body_offset: usize,
}

/// Read the tag and length of the chunk starting at `raw[offset]`.
///
/// Fails with `Error::Format` if fewer than 8 bytes remain.
pub fn read_chunk_header(raw: &[u8], offset: usize) -> Result<ChunkHeader> {
    let bytes = raw
        .get(offset..)
        .and_then(|rest| rest.get(..8))
        .ok_or(err_format!(offset, "failed to read chunk header"))?;
    let mut tag = [0; 4];
    tag.copy_from_slice(&bytes[..4]);
    let len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Ok(ChunkHeader {
        tag,
        len,
        body_offset: offset + 8,
    })
}

/// A MIDI file header.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Header {
    pub format: Format,
    /// The amount of track chunks the file declares.
    pub track_count: u16,
    /// Ticks per quarter-note beat.
    ///
    /// Always non-zero.
    pub division: u15,
}
impl Header {
    pub fn new(format: Format, track_count: u16, division: u15) -> Header {
        Header {
            format,
            track_count,
            division,
        }
    }

    /// Parse the 6-byte header body: format, track count and division, in that order.
    fn read(raw: &mut Reader) -> Result<Header> {
        let format = Format::read(raw)?;
        let track_count = raw.read_u16("failed to read track count")?;
        let offset = raw.offset();
        let division = raw.read_u16("failed to read midi timing")?;
        ensure!(
            division & 0x8000 == 0,
            err_format!(offset, "smpte timing is not supported")
        );
        ensure!(division != 0, err_format!(offset, "division cannot be zero"));
        Ok(Header::new(format, track_count, u15::new(division)))
    }

    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0; HEADER_LEN];
        bytes[0..2].copy_from_slice(&self.format.encode()[..]);
        bytes[2..4].copy_from_slice(&self.track_count.to_be_bytes()[..]);
        bytes[4..6].copy_from_slice(&self.division.as_int().to_be_bytes()[..]);
        bytes
    }
}

/// Read and validate the `MThd` chunk at `raw[offset]`.
///
/// Returns the header along with the offset of the chunk following it.
pub fn read_header_chunk(raw: &[u8], offset: usize) -> Result<(Header, usize)> {
    let mut reader = Reader::at(raw.get(offset..).unwrap_or(&[]), offset);
    let header = read_header(&mut reader)?;
    Ok((header, reader.offset()))
}

pub(crate) fn read_header(raw: &mut Reader) -> Result<Header> {
    let chunk = Chunk::read(raw)?;
    ensure!(
        chunk.tag == HEADER_TAG,
        err_format!(chunk.offset, "expected MThd header chunk")
    );
    let mut body = chunk.body;
    ensure!(
        body.remaining() >= HEADER_LEN,
        err_format!(chunk.offset, "header chunk too short")
    );
    if cfg!(feature = "strict") {
        ensure!(
            body.remaining() == HEADER_LEN,
            err_format!(chunk.offset, "header chunk has extra data")
        );
    }
    // Any extra header bytes belong to future versions of the format and are ignored
    Header::read(&mut body)
}

/// Read and validate the `MTrk` chunk at `raw[offset]`.
///
/// Returns an iterator over the track events, bounded to exactly the chunk body, along with the
/// offset of the chunk following it.
pub fn read_track_chunk(raw: &[u8], offset: usize) -> Result<(EventIter, usize)> {
    let mut reader = Reader::at(raw.get(offset..).unwrap_or(&[]), offset);
    let chunk = Chunk::read(&mut reader)?;
    ensure!(
        chunk.tag == TRACK_TAG,
        err_format!(chunk.offset, "expected MTrk track chunk")
    );
    Ok((EventIter::new(chunk.body), reader.offset()))
}

/// A single raw chunk, with its body bounded to the declared length.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Chunk<'a> {
    pub tag: [u8; 4],
    /// Absolute offset of the chunk header.
    pub offset: usize,
    pub body: Reader<'a>,
}
impl<'a> Chunk<'a> {
    /// Read a chunk and advance `raw` past it.
    pub fn read(raw: &mut Reader<'a>) -> Result<Chunk<'a>> {
        let offset = raw.offset();
        let ChunkHeader { tag, len, .. } = read_chunk_header(raw.unread(), 0).map_err(|_| {
            err_format!(offset, "failed to read chunk header")
        })?;
        let _ = raw.split_checked(8);
        let body = raw
            .split_checked(len as usize)
            .ok_or(err_truncated!(offset + 8, "reached eof before chunk ended"))?;
        trace!(
            "chunk {:?} at byte {} with {} body bytes",
            String::from_utf8_lossy(&tag),
            offset,
            len
        );
        Ok(Chunk { tag, offset, body })
    }
}

/// An iterator over the track chunks of a Standard Midi File.
///
/// Alien chunks (neither `MThd` nor `MTrk`) are skipped, unless the `strict` feature is
/// enabled.
/// Iteration stops after as many track chunks as the header declares.
#[derive(Clone, Debug)]
pub struct TrackIter<'a> {
    raw: Reader<'a>,
    track_count_hint: u16,
    failed: bool,
}
impl<'a> TrackIter<'a> {
    pub(crate) fn new(raw: Reader<'a>, track_count: u16) -> TrackIter<'a> {
        TrackIter {
            raw,
            track_count_hint: track_count,
            failed: false,
        }
    }

    /// Peek at the remaining unparsed bytes in the file.
    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        self.raw.unread()
    }

    fn next_track(&mut self) -> Result<Option<EventIter<'a>>> {
        if self.track_count_hint == 0 {
            if cfg!(feature = "strict") {
                ensure!(
                    self.raw.is_empty(),
                    err_format!(self.raw.offset(), "file has more data than declared")
                );
            }
            return Ok(None);
        }
        loop {
            ensure!(
                !self.raw.is_empty(),
                err_truncated!(self.raw.offset(), "file has fewer tracks than declared")
            );
            let chunk = Chunk::read(&mut self.raw)?;
            match chunk.tag {
                TRACK_TAG => {
                    self.track_count_hint -= 1;
                    break Ok(Some(EventIter::new(chunk.body)));
                }
                HEADER_TAG => bail!(err_format!(chunk.offset, "found duplicate header")),
                _ => {
                    if cfg!(feature = "strict") {
                        bail!(err_format!(chunk.offset, "unknown chunk type"));
                    }
                    debug!("skipping alien chunk at byte {}", chunk.offset);
                }
            }
        }
    }
}
impl<'a> Iterator for TrackIter<'a> {
    type Item = Result<EventIter<'a>>;

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.track_count_hint as usize))
        }
    }

    fn next(&mut self) -> Option<Result<EventIter<'a>>> {
        if self.failed {
            return None;
        }
        match self.next_track() {
            Ok(track) => track.map(Ok),
            Err(err) => {
                // Never read another chunk from the middle of a corrupted one
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Build a complete chunk: the tag, the big-endian `u32` body length and the body itself.
///
/// The length is the exact byte count of `body`.
/// Bodies of 4GB or more cannot be represented and yield `Error::Range`.
pub fn write_chunk(tag: [u8; 4], body: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8 + body.len());
    write_chunk_into(&mut out, tag, body)?;
    Ok(out)
}

pub(crate) fn write_chunk_into(out: &mut Vec<u8>, tag: [u8; 4], body: &[u8]) -> Result<()> {
    let len =
        u32::try_from(body.len()).map_err(|_| err_range!("midi chunk size exceeds 32 bit range"))?;
    out.extend_from_slice(&tag);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(body);
    Ok(())
}

/// Write a header chunk.
pub(crate) fn write_header(out: &mut Vec<u8>, header: &Header) -> Result<()> {
    write_chunk_into(out, HEADER_TAG, &header.encode())
}
