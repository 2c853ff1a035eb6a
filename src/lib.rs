//! # Overview
//!
//! `smfnotes` translates between Standard Midi Files (`.mid` files) and a simple multi-track
//! note model: tracks holding notes with a pitch, a velocity, and a start and duration measured
//! in beats.
//!
//! Decoding a file is as simple as:
//!
//! ```rust
//! # fn read_file() -> Vec<u8> {
//! #     let track = smfnotes::Track::new(smfnotes::TrackId(1), "Piano");
//! #     smfnotes::Encoder::new(120.0, smfnotes::num::u15::new(480)).encode(&[track]).unwrap()
//! # }
//! let bytes = read_file();
//! let song = smfnotes::decode(&bytes).unwrap();
//!
//! for track in song.tracks.iter() {
//!     println!("track {} has {} notes", track.name, track.notes.len());
//! }
//! ```
//!
//! The [`Song`](struct.Song.html) struct holds the decoded header, the tempo (if the file declared
//! one) and every track that contained at least one note.
//!
//! # Writing Standard Midi Files
//!
//! Encoding requires a tempo and a resolution, in ticks per beat:
//!
//! ```rust
//! use smfnotes::{num::u15, Encoder, Note, Track, TrackId};
//!
//! let mut track = Track::new(TrackId(1), "Lead");
//! track.notes.push(Note::new(60, 100, 0.0, 1.0));
//!
//! let bytes = Encoder::new(120.0, u15::new(480)).encode(&[track]).unwrap();
//! println!("midi file fits in {} bytes!", bytes.len());
//! ```
//!
//! The resolution is written as the division of the file header, and the decoder always reads
//! it back from the header, so notes survive a round trip unchanged (as long as their times fall
//! on ticks).
//!
//! # Decoding policy
//!
//! - Notes are built by pairing each note-on with the next note-off (or zero-velocity note-on)
//!   on the same channel and key.
//! - A note-off without a pending note-on is ignored.
//! - A note-on that is never released before the end of its track is discarded.
//! - A note-on for a key that is already sounding ends the pending note at that tick.
//! - Zero-length notes are dropped, as are tracks that yield no notes.
//!
//! Any structural problem (bad chunk tags, SMPTE timing, events running past their chunk)
//! aborts the whole decode with an [`Error`](enum.Error.html).
//!
//! # About features
//!
//! - The `parallel` feature (enabled by default)
//!
//!   Decodes and encodes tracks on multiple threads, through the `rayon` dependency.
//!   Tiny files are always processed on the calling thread.
//!
//! - The `strict` feature
//!
//!   By default alien chunks and oversized header chunks are skipped, and events after
//!   End-of-Track are decoded like any other.
//!   By enabling the `strict` feature the decoder rejects such files, raising
//!   `Error::Format`.
//!
//! # Raw events
//!
//! The [`parse`](fn.parse.html) function gives access to every event of every track chunk,
//! without pairing notes.

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{Error, Result},
        primitive::{u15, u24, u28, u4, u7, Reader},
    };
    pub(crate) use core::{convert::TryFrom, fmt};
    pub(crate) use log::{debug, trace};
    pub(crate) use std::{fs::File, io, path::Path};
}

pub mod chunk;
mod decode;
mod encode;
pub mod event;
mod model;
mod primitive;
mod riff;
pub mod varlen;

pub use crate::{
    chunk::{Header, TrackIter},
    decode::{decode, parse, Decoder},
    encode::Encoder,
    error::{Error, ErrorKind, Result},
    event::{Event, EventIter, EventKind},
    model::{
        IdSource, Note, SequentialIds, Song, Track, TrackId, DEFAULT_INSTRUMENT, DEFAULT_VOLUME,
    },
    primitive::Format,
};

/// Exotically-sized integers used by the MIDI standard.
pub mod num {
    pub use crate::primitive::{u15, u24, u28, u4, u7};
}
