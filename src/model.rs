//! The multi-track note model that decoding produces and encoding consumes.

use crate::{chunk::Header, prelude::*};

/// The instrument tag given to tracks that carry no instrument information.
pub const DEFAULT_INSTRUMENT: &str = "acoustic_grand_piano";
/// The volume given to freshly created tracks.
pub const DEFAULT_VOLUME: f32 = 0.8;

/// A single note, timed in beats (quarter notes).
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Note {
    /// The MIDI key of the note. Middle C is 60.
    pub pitch: u7,
    /// How strongly the note is struck.
    pub velocity: u7,
    /// Beat at which the note starts. Never negative.
    pub start: f64,
    /// Length of the note in beats. Always positive for decoded notes.
    pub duration: f64,
}
impl Note {
    /// Create a note, clamping `pitch` and `velocity` to the 7-bit MIDI range.
    #[inline]
    pub fn new(pitch: u8, velocity: u8, start: f64, duration: f64) -> Note {
        Note {
            pitch: u7::clamped(pitch),
            velocity: u7::clamped(velocity),
            start,
            duration,
        }
    }

    /// Beat at which the note stops sounding.
    #[inline]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// An opaque, stable identifier for a track.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct TrackId(pub u64);
impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A source of fresh track identifiers.
///
/// The decoder draws one id per emitted track, in track order, so a deterministic source yields
/// deterministic decodes.
pub trait IdSource {
    fn next_id(&mut self) -> TrackId;
}
impl<F: FnMut() -> TrackId> IdSource for F {
    #[inline]
    fn next_id(&mut self) -> TrackId {
        self()
    }
}

/// Hands out consecutive ids, starting at a given value.
#[derive(Clone, Debug)]
pub struct SequentialIds {
    next: u64,
}
impl SequentialIds {
    #[inline]
    pub fn starting_at(first: u64) -> SequentialIds {
        SequentialIds { next: first }
    }
}
impl Default for SequentialIds {
    #[inline]
    fn default() -> SequentialIds {
        SequentialIds::starting_at(1)
    }
}
impl IdSource for SequentialIds {
    #[inline]
    fn next_id(&mut self) -> TrackId {
        let id = TrackId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// A track: a named, mixable sequence of notes.
///
/// A track owns its notes exclusively. Notes are kept in insertion order; the encoder sorts a
/// private copy by start time.
#[derive(Clone, PartialEq, Debug)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// An instrument tag, as understood by the playback engine.
    pub instrument: String,
    pub notes: Vec<Note>,
    /// In `[0.0, 1.0]`.
    pub volume: f32,
    /// In `[-1.0, 1.0]`, negative values panning left.
    pub pan: f32,
    pub mute: bool,
    pub solo: bool,
}
impl Track {
    /// Create an empty track with default mixer settings.
    pub fn new(id: TrackId, name: impl Into<String>) -> Track {
        Track {
            id,
            name: name.into(),
            instrument: DEFAULT_INSTRUMENT.to_string(),
            notes: Vec::new(),
            volume: DEFAULT_VOLUME,
            pan: 0.0,
            mute: false,
            solo: false,
        }
    }

    /// Set the volume, clamped to `[0.0, 1.0]`.
    #[inline]
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_f32(volume, 0.0, 1.0);
    }

    /// Set the pan, clamped to `[-1.0, 1.0]`.
    #[inline]
    pub fn set_pan(&mut self, pan: f32) {
        self.pan = clamp_f32(pan, -1.0, 1.0);
    }
}

/// `NaN` is treated as the lower bound.
fn clamp_f32(val: f32, min: f32, max: f32) -> f32 {
    if val >= min {
        val.min(max)
    } else {
        min
    }
}

/// A decoded Standard Midi File.
#[derive(Clone, PartialEq, Debug)]
pub struct Song {
    pub header: Header,
    /// The first Set-Tempo found in the file, in microseconds per beat.
    pub tempo: Option<u24>,
    /// Every track that yielded at least one note, in file order.
    pub tracks: Vec<Track>,
}
impl Song {
    /// The tempo in beats per minute, if the file declared one.
    #[inline]
    pub fn bpm(&self) -> Option<f64> {
        self.tempo
            .filter(|micros| micros.as_int() != 0)
            .map(|micros| 60_000_000.0 / micros.as_int() as f64)
    }
}
