//! Turning SMF bytes into tracks of notes.

use crate::{
    chunk::{self, Header, TrackIter},
    event::{meta, EventIter, EventKind},
    model::{IdSource, Note, SequentialIds, Song, Track},
    prelude::*,
    riff,
};

/// How many bytes must a MIDI body have in order to enable multithreading.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 3 * 1024;

/// Amount of distinct (channel, key) pairs.
const KEY_SLOTS: usize = 16 * 128;

/// Parse the header of a MIDI file and return an iterator over its raw track chunks.
///
/// This is the low-level entry point: no note pairing is done, and every event of every track
/// is available through the returned iterators.
/// RMID files (MIDI wrapped in a RIFF container) are unwrapped transparently.
pub fn parse(raw: &[u8]) -> Result<(Header, TrackIter)> {
    let mut raw = riff::unwrap(raw).unwrap_or_else(|| Reader::new(raw));
    let header = chunk::read_header(&mut raw)?;
    let tracks = TrackIter::new(raw, header.track_count);
    Ok((header, tracks))
}

/// Decode a MIDI file into tracks of notes, numbering tracks from 1.
///
/// Shorthand for `Decoder::new().decode(raw)`.
pub fn decode(raw: &[u8]) -> Result<Song> {
    Decoder::new().decode(raw)
}

/// Decodes SMF bytes into a `Song`.
///
/// Decoding is all-or-nothing: if any chunk or event is invalid, an error is returned and no
/// tracks are produced.
///
/// Tracks are assigned ids from the decoder's `IdSource`, one per emitted track and in file
/// order, so the same source state always produces the same ids.
#[derive(Clone, Debug, Default)]
pub struct Decoder<I = SequentialIds> {
    ids: I,
}
impl Decoder<SequentialIds> {
    #[inline]
    pub fn new() -> Decoder<SequentialIds> {
        Decoder {
            ids: SequentialIds::default(),
        }
    }
}
impl<I: IdSource> Decoder<I> {
    /// Replace the source of track ids.
    #[inline]
    pub fn with_ids<J: IdSource>(self, ids: J) -> Decoder<J> {
        Decoder { ids }
    }

    /// Access the id source, for example to continue numbering after a decode.
    #[inline]
    pub fn ids_mut(&mut self) -> &mut I {
        &mut self.ids
    }

    pub fn decode(&mut self, raw: &[u8]) -> Result<Song> {
        let (header, tracks) = parse(raw)?;
        let division = header.division.as_int();
        let decoded = decode_tracks(tracks, division)?;

        let tempo = decoded.iter().find_map(|track| track.tempo);
        let mut out = Vec::with_capacity(decoded.len());
        for (index, track) in decoded.into_iter().enumerate() {
            if track.notes.is_empty() {
                debug!("dropping track {} since it has no notes", index);
                continue;
            }
            let name = match track.name {
                Some(name) => name,
                None => format!("Track {}", out.len() + 1),
            };
            let mut emitted = Track::new(self.ids.next_id(), name);
            emitted.notes = track.notes;
            out.push(emitted);
        }
        Ok(Song {
            header,
            tempo,
            tracks: out,
        })
    }
}

/// Everything a single track chunk contributes to a song.
#[derive(Clone, Debug, Default)]
struct TrackNotes {
    name: Option<String>,
    tempo: Option<u24>,
    notes: Vec<Note>,
}

fn decode_tracks(tracks: TrackIter, division: u16) -> Result<Vec<TrackNotes>> {
    //Attempt to use multiple threads if possible and advantageous
    #[cfg(feature = "parallel")]
    {
        if tracks.unread().len() >= PARALLEL_ENABLE_THRESHOLD {
            use rayon::prelude::*;

            let chunk_vec = tracks.collect::<Result<Vec<_>>>()?;
            return chunk_vec
                .into_par_iter()
                .map(|events| pair_notes(events, division))
                .collect::<Result<Vec<_>>>();
        }
    }
    //Fall back to single-threaded
    tracks
        .map(|events| events.and_then(|events| pair_notes(events, division)))
        .collect::<Result<Vec<_>>>()
}

/// A note-on still waiting for its note-off.
#[derive(Copy, Clone, Debug)]
struct ActiveNote {
    start: u64,
    velocity: u7,
}

/// A finished note, still in ticks.
#[derive(Copy, Clone, Debug)]
struct TickNote {
    key: u7,
    velocity: u7,
    start: u64,
    end: u64,
}

/// Walk the events of a track, pairing note-ons with their note-offs.
fn pair_notes(events: EventIter, division: u16) -> Result<TrackNotes> {
    let mut out = TrackNotes::default();
    let mut active: Vec<Option<ActiveNote>> = vec![None; KEY_SLOTS];
    let mut finished = Vec::new();
    let mut now: u64 = 0;
    for ev in events {
        let ev = ev?;
        now += ev.delta.as_int() as u64;
        match ev.kind {
            EventKind::NoteOn { channel, key, vel } if vel.as_int() > 0 => {
                let slot = &mut active[slot_index(channel, key)];
                if let Some(prev) = slot.take() {
                    //Overlapping note on the same key: cut the pending note short
                    if now > prev.start {
                        finished.push(TickNote {
                            key,
                            velocity: prev.velocity,
                            start: prev.start,
                            end: now,
                        });
                    }
                    debug!("note {} retriggered at tick {}, truncating", key, now);
                }
                *slot = Some(ActiveNote {
                    start: now,
                    velocity: vel,
                });
            }
            EventKind::NoteOn { channel, key, .. } | EventKind::NoteOff { channel, key, .. } => {
                match active[slot_index(channel, key)].take() {
                    Some(on) if now > on.start => finished.push(TickNote {
                        key,
                        velocity: on.velocity,
                        start: on.start,
                        end: now,
                    }),
                    Some(_) => debug!("dropping zero-length note {} at tick {}", key, now),
                    None => debug!("ignoring unmatched note-off {} at tick {}", key, now),
                }
            }
            EventKind::Tempo(micros) => {
                if out.tempo.is_none() {
                    out.tempo = Some(micros);
                }
            }
            EventKind::Meta {
                kind: meta::TRACK_NAME,
                data,
            } => {
                if out.name.is_none() && !data.is_empty() {
                    out.name = Some(String::from_utf8_lossy(data).into_owned());
                }
            }
            //Controllers have no consumer in the note model
            EventKind::Controller { .. }
            | EventKind::Meta { .. }
            | EventKind::Unsupported { .. } => {}
        }
    }
    let dangling = active.iter().filter(|slot| slot.is_some()).count();
    if dangling > 0 {
        debug!("discarding {} notes that were never released", dangling);
    }

    finished.sort_by_key(|note| note.start);
    let division = division as f64;
    out.notes = finished
        .into_iter()
        .map(|note| Note {
            pitch: note.key,
            velocity: note.velocity,
            start: note.start as f64 / division,
            duration: (note.end - note.start) as f64 / division,
        })
        .collect();
    Ok(out)
}

#[inline]
fn slot_index(channel: u4, key: u7) -> usize {
    channel.as_int() as usize * 128 + key.as_int() as usize
}
