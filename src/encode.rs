//! Turning tracks of notes into SMF bytes.

use crate::{
    chunk::{self, Header, TRACK_TAG},
    event::{meta, Event, EventKind},
    model::{Note, Track},
    prelude::*,
    primitive::Format,
};
use core::cmp::Ordering;

/// How many bytes per note to estimate when allocating memory when writing.
///
/// A note is two events, and since the writer uses running status by default, a value a bit over
/// `2 * 3` is enough for almost all cases.
const NOTES_TO_BYTES: usize = 7;

/// How many bytes must a MIDI body have in order to enable multithreading.
///
/// When writing, the MIDI body size is estimated from the note count using `NOTES_TO_BYTES`.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 3 * 1024;

/// Largest absolute tick a note may land on.
const MAX_TICK: f64 = u32::MAX as f64;

/// Release velocity written in note-off messages.
const NOTE_OFF_VELOCITY: u7 = u7::new(64);

/// Encodes tracks of notes into Standard Midi Files.
///
/// The same `resolution` (ticks per beat) is used to convert note times into ticks and is
/// written as the file's division, so any decoder reading the output recovers the same beats.
///
/// Each track chunk starts with a Set-Tempo event (and a Track-Name event if the track is named),
/// followed by a note-on and a note-off per note, and ends with End-of-Track.
/// At equal ticks, note-offs are written before note-ons, so a note that ends exactly where
/// another note on the same key begins is released before it is retriggered.
#[derive(Clone, Debug, PartialEq)]
pub struct Encoder {
    bpm: f64,
    resolution: u15,
    channel: u4,
    running_status: bool,
    track_names: bool,
}
impl Encoder {
    /// Create an encoder writing the given tempo, with `resolution` ticks per beat.
    pub fn new(bpm: f64, resolution: u15) -> Encoder {
        Encoder {
            bpm,
            resolution,
            channel: u4::new(0),
            running_status: true,
            track_names: true,
        }
    }

    /// The MIDI channel notes are written on. Defaults to channel 0.
    #[inline]
    pub fn channel(mut self, channel: u4) -> Encoder {
        self.channel = channel;
        self
    }

    /// Whether to omit repeated status bytes. Enabled by default.
    #[inline]
    pub fn running_status(mut self, enable: bool) -> Encoder {
        self.running_status = enable;
        self
    }

    /// Whether to write a Track-Name event for named tracks. Enabled by default.
    #[inline]
    pub fn track_names(mut self, enable: bool) -> Encoder {
        self.track_names = enable;
        self
    }

    #[inline]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    #[inline]
    pub fn resolution(&self) -> u15 {
        self.resolution
    }

    /// The tempo in microseconds per beat, as written in the Set-Tempo event.
    pub fn tempo(&self) -> Result<u24> {
        ensure!(
            self.bpm.is_finite() && self.bpm > 0.0,
            err_range!("bpm must be finite and positive")
        );
        let micros = (60_000_000.0 / self.bpm).round();
        ensure!(micros >= 1.0, err_range!("tempo too fast to represent"));
        ensure!(
            micros <= u24::max_value().as_int() as f64,
            err_range!("tempo too slow to represent")
        );
        Ok(u24::new(micros as u32))
    }

    /// The header that `encode` writes for `track_count` tracks.
    pub fn header(&self, track_count: usize) -> Result<Header> {
        self.check_resolution()?;
        let count = u16::try_from(track_count)
            .map_err(|_| err_range!("track count exceeds 16 bit range"))?;
        Ok(Header::new(
            Format::for_track_count(track_count),
            count,
            self.resolution,
        ))
    }

    /// Encode the tracks into a complete SMF file.
    ///
    /// The tracks are not modified. Fails only if some value cannot be represented, in which case
    /// the error carries the index of the offending track.
    pub fn encode(&self, tracks: &[Track]) -> Result<Vec<u8>> {
        let header = self.header(tracks.len())?;
        let tempo = self.tempo()?;
        let note_count = tracks.iter().map(|track| track.notes.len()).sum::<usize>();
        let mut out = Vec::with_capacity(14 + tracks.len() * 32 + note_count * NOTES_TO_BYTES);
        chunk::write_header(&mut out, &header)?;

        //Try to write the file in parallel
        #[cfg(feature = "parallel")]
        {
            if note_count * NOTES_TO_BYTES > PARALLEL_ENABLE_THRESHOLD {
                use rayon::prelude::*;

                //Write out the tracks in parallel into several different buffers
                let track_chunks = tracks
                    .par_iter()
                    .enumerate()
                    .map(|(index, track)| {
                        let mut buf = Vec::new();
                        self.write_track(track, tempo, &mut buf)
                            .map_err(|err| err.in_track(index))?;
                        Ok(buf)
                    })
                    .collect::<Result<Vec<_>>>()?;

                //Write down the tracks sequentially and in order
                for track_chunk in track_chunks {
                    out.extend_from_slice(&track_chunk);
                }
                return Ok(out);
            }
        }

        for (index, track) in tracks.iter().enumerate() {
            self.write_track(track, tempo, &mut out)
                .map_err(|err| err.in_track(index))?;
        }
        Ok(out)
    }

    /// Encode a single track into a complete `MTrk` chunk.
    pub fn encode_track(&self, track: &Track) -> Result<Vec<u8>> {
        let tempo = self.tempo()?;
        let mut out = Vec::new();
        self.write_track(track, tempo, &mut out)?;
        Ok(out)
    }

    /// Encode the tracks and write the file into the given writer.
    ///
    /// Encoding errors are reported as `io::ErrorKind::InvalidInput`.
    pub fn write<W: io::Write>(&self, tracks: &[Track], out: &mut W) -> io::Result<()> {
        let bytes = self
            .encode(tracks)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        out.write_all(&bytes)
    }

    /// Encode the tracks and save the file at the given path.
    pub fn save<P: AsRef<Path>>(&self, tracks: &[Track], path: P) -> io::Result<()> {
        fn save_impl(encoder: &Encoder, tracks: &[Track], path: &Path) -> io::Result<()> {
            encoder.write(tracks, &mut File::create(path)?)
        }
        save_impl(self, tracks, path.as_ref())
    }

    /// Append the `MTrk` chunk for a track to `out`.
    fn write_track(&self, track: &Track, tempo: u24, out: &mut Vec<u8>) -> Result<()> {
        let timeline = self.timeline(track, tempo)?;
        let mut body = Vec::with_capacity(16 + timeline.len() * NOTES_TO_BYTES / 2);
        let mut running_status = None;
        let mut last = 0;
        for timed in timeline.iter() {
            let delta = u32::try_from(timed.tick - last)
                .ok()
                .and_then(u28::try_from)
                .ok_or(err_range!("delta time exceeds 28 bits"))?;
            last = timed.tick;
            Event::new(delta, timed.kind).write(
                &mut running_status,
                self.running_status,
                &mut body,
            )?;
        }
        trace!(
            "track {:?}: {} events in {} bytes",
            track.name,
            timeline.len(),
            body.len()
        );
        chunk::write_chunk_into(out, TRACK_TAG, &body)
    }

    fn check_resolution(&self) -> Result<()> {
        ensure!(
            self.resolution.as_int() != 0,
            err_range!("resolution cannot be zero")
        );
        Ok(())
    }

    /// Lay out every event of a track on an absolute timeline, in writing order.
    fn timeline<'a>(&self, track: &'a Track, tempo: u24) -> Result<Vec<Timed<'a>>> {
        self.check_resolution()?;
        let resolution = self.resolution.as_int() as f64;
        let mut notes: Vec<&Note> = track.notes.iter().collect();
        for note in notes.iter() {
            ensure!(
                note.start.is_finite() && note.start >= 0.0,
                err_range!("note start must be a finite, non-negative beat")
            );
            ensure!(
                note.duration.is_finite(),
                err_range!("note duration must be finite")
            );
        }
        //Stable, so notes starting together keep their relative order
        notes.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));

        let mut timeline = Vec::with_capacity(3 + notes.len() * 2);
        timeline.push(Timed {
            tick: 0,
            rank: Rank::Meta,
            kind: EventKind::Tempo(tempo),
        });
        if self.track_names && !track.name.is_empty() {
            timeline.push(Timed {
                tick: 0,
                rank: Rank::Meta,
                kind: EventKind::Meta {
                    kind: meta::TRACK_NAME,
                    data: track.name.as_bytes(),
                },
            });
        }
        for note in notes {
            if note.duration <= 0.0 {
                debug!(
                    "skipping zero-length note {} at beat {}",
                    note.pitch, note.start
                );
                continue;
            }
            let on = to_tick(note.start * resolution)?;
            let mut off = to_tick(note.end() * resolution)?;
            if off <= on {
                //Rounding collapsed the note, keep it at least one tick long
                off = on + 1;
            }
            timeline.push(Timed {
                tick: on,
                rank: Rank::NoteOn,
                kind: EventKind::NoteOn {
                    channel: self.channel,
                    key: note.pitch,
                    //A zero velocity note-on would read back as a note-off
                    vel: u7::new(note.velocity.as_int().max(1)),
                },
            });
            timeline.push(Timed {
                tick: off,
                rank: Rank::NoteOff,
                kind: EventKind::NoteOff {
                    channel: self.channel,
                    key: note.pitch,
                    vel: NOTE_OFF_VELOCITY,
                },
            });
        }
        timeline.sort_by_key(|timed| (timed.tick, timed.rank));
        let end = timeline.last().map(|timed| timed.tick).unwrap_or(0);
        timeline.push(Timed {
            tick: end,
            rank: Rank::EndOfTrack,
            kind: EventKind::Meta {
                kind: meta::END_OF_TRACK,
                data: &[],
            },
        });
        Ok(timeline)
    }
}

/// Write order of events sharing the same tick.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Rank {
    Meta,
    NoteOff,
    NoteOn,
    EndOfTrack,
}

/// An event at an absolute tick.
#[derive(Copy, Clone, Debug)]
struct Timed<'a> {
    tick: u64,
    rank: Rank,
    kind: EventKind<'a>,
}

fn to_tick(ticks: f64) -> Result<u64> {
    let ticks = ticks.round();
    ensure!(
        ticks <= MAX_TICK,
        err_range!("note tick exceeds representable range")
    );
    Ok(ticks as u64)
}
