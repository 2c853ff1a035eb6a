//! All sort of events and their parsers.

use crate::{
    prelude::*,
    varlen::{write_varlen, write_varlen_slice},
};

/// Well-known meta message type bytes.
pub mod meta {
    /// Information about the name of the track.
    pub const TRACK_NAME: u8 = 0x03;
    /// Obligatory at track end.
    pub const END_OF_TRACK: u8 = 0x2F;
    /// Amount of microseconds per beat (quarter note).
    pub const TEMPO: u8 = 0x51;
}

/// Represents a parsed SMF track event.
///
/// Consists of a delta time (in MIDI ticks relative to the previous event) and the actual track
/// event.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Event<'a> {
    /// How many MIDI ticks after the previous event should this event fire.
    pub delta: u28,
    /// The type of event along with event-specific data.
    pub kind: EventKind<'a>,
}
impl<'a> Event<'a> {
    #[inline]
    pub fn new(delta: u28, kind: EventKind<'a>) -> Event<'a> {
        Event { delta, kind }
    }

    /// Advances the reader and updates `running_status`.
    ///
    /// In case of failure the reader might be left in the middle of an event!
    pub(crate) fn read(
        raw: &mut Reader<'a>,
        running_status: &mut Option<u8>,
    ) -> Result<Event<'a>> {
        let delta = raw.read_varlen()?;
        let kind = EventKind::read(raw, running_status)?;
        Ok(Event { delta, kind })
    }

    /// Write the delta time and the event itself.
    ///
    /// `running_status` keeps track of the last channel status written. It should be shared
    /// between consecutive calls and initially be `None`. If `compress` is false, every channel
    /// message gets an explicit status byte.
    pub(crate) fn write(
        &self,
        running_status: &mut Option<u8>,
        compress: bool,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        write_varlen(out, self.delta);
        self.kind.write(running_status, compress, out)
    }
}

/// The closed set of SMF event kinds this crate distinguishes.
///
/// It notably does *not* include the timing of the event; the `Event` struct is responsible
/// for this.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum EventKind<'a> {
    /// Start playing a note.
    ///
    /// Note that by convention a `NoteOn` message with a velocity of 0 is equivalent to a
    /// `NoteOff`.
    NoteOn { channel: u4, key: u7, vel: u7 },
    /// Stop playing a note.
    NoteOff { channel: u4, key: u7, vel: u7 },
    /// Modify the value of a MIDI controller.
    Controller {
        channel: u4,
        controller: u7,
        value: u7,
    },
    /// Amount of microseconds per beat (quarter note).
    Tempo(u24),
    /// Any other meta message, such as track names or the end of track marker.
    ///
    /// `data` is the length-delimited payload.
    Meta { kind: u8, data: &'a [u8] },
    /// Any message that has no meaning for the note model, kept as its status byte and data.
    ///
    /// This covers program changes, aftertouch, pitch bends, SysEx and escape sequences (whose
    /// `data` excludes the varlen length prefix) and stray system messages.
    Unsupported { status: u8, data: &'a [u8] },
}
impl<'a> EventKind<'a> {
    fn read(raw: &mut Reader<'a>, running_status: &mut Option<u8>) -> Result<EventKind<'a>> {
        let offset = raw.offset();
        //Read status
        let mut status = raw
            .peek()
            .ok_or(err_truncated!(offset, "failed to read status"))?;
        if status < 0x80 {
            //Running status!
            status = running_status.ok_or(err_format!(
                offset,
                "event missing status with no running status active"
            ))?;
        } else {
            let _ = raw.split_checked(1);
        }
        //Delegate further parsing depending on status
        let kind = match status {
            0x80..=0xEF => {
                *running_status = Some(status);
                let data_offset = raw.offset();
                let data = raw.read_slice(channel_msg_length(status), "truncated midi message")?;
                if let Some(pos) = data.iter().position(|&byte| byte >= 0x80) {
                    bail!(err_format!(
                        data_offset + pos,
                        "invalid data byte with top bit set"
                    ));
                }
                EventKind::from_channel_msg(status, data)
            }
            0xFF => {
                *running_status = None;
                EventKind::read_meta(raw)?
            }
            0xF0 | 0xF7 => {
                *running_status = None;
                let data = raw.read_varlen_slice("truncated sysex event")?;
                EventKind::Unsupported { status, data }
            }
            0xF1..=0xFE => {
                let len = system_msg_length(status)
                    .ok_or(err_format!(offset, "undefined system status"))?;
                if status < 0xF8 {
                    //System common messages cancel running status, realtime messages do not
                    *running_status = None;
                }
                let data = raw.read_slice(len, "truncated system message")?;
                EventKind::Unsupported { status, data }
            }
            0x00..=0x7F => bail!(err_format!(offset, "invalid running status")),
        };
        Ok(kind)
    }

    /// Build a channel event out of a status byte and exactly as many data bytes as its type
    /// requires.
    fn from_channel_msg(status: u8, data: &'a [u8]) -> EventKind<'a> {
        let channel = u4::new(status);
        match status >> 4 {
            0x8 => EventKind::NoteOff {
                channel,
                key: u7::new(data[0]),
                vel: u7::new(data[1]),
            },
            0x9 => EventKind::NoteOn {
                channel,
                key: u7::new(data[0]),
                vel: u7::new(data[1]),
            },
            0xB => EventKind::Controller {
                channel,
                controller: u7::new(data[0]),
                value: u7::new(data[1]),
            },
            _ => EventKind::Unsupported { status, data },
        }
    }

    fn read_meta(raw: &mut Reader<'a>) -> Result<EventKind<'a>> {
        let kind = raw.read_u8("failed to read meta message type")?;
        let len_offset = raw.offset();
        let data = raw.read_varlen_slice("truncated meta message")?;
        Ok(match kind {
            meta::TEMPO => {
                ensure!(
                    data.len() == 3,
                    err_format!(len_offset, "tempo meta message must hold 3 bytes")
                );
                EventKind::Tempo(u24::new(
                    (data[0] as u32) << 16 | (data[1] as u32) << 8 | data[2] as u32,
                ))
            }
            _ => EventKind::Meta { kind, data },
        })
    }

    /// Whether this is the End-of-Track meta message.
    #[inline]
    pub fn is_end_of_track(&self) -> bool {
        matches!(
            self,
            EventKind::Meta {
                kind: meta::END_OF_TRACK,
                ..
            }
        )
    }

    /// Writes a single event to the given output buffer.
    fn write(
        &self,
        running_status: &mut Option<u8>,
        compress: bool,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        //Running Status rules:
        // - MIDI Messages (0x80 ..= 0xEF) alter and use running status
        // - Meta messages, SysEx, escapes and system common messages cancel it
        match *self {
            EventKind::NoteOn { channel, key, vel } => write_channel(
                out,
                running_status,
                compress,
                0x90 | channel.as_int(),
                &[key.as_int(), vel.as_int()],
            ),
            EventKind::NoteOff { channel, key, vel } => write_channel(
                out,
                running_status,
                compress,
                0x80 | channel.as_int(),
                &[key.as_int(), vel.as_int()],
            ),
            EventKind::Controller {
                channel,
                controller,
                value,
            } => write_channel(
                out,
                running_status,
                compress,
                0xB0 | channel.as_int(),
                &[controller.as_int(), value.as_int()],
            ),
            EventKind::Unsupported { status, data } if status < 0xF0 => {
                write_channel(out, running_status, compress, status, data)
            }
            EventKind::Tempo(micros) => {
                *running_status = None;
                out.extend_from_slice(&[0xFF, meta::TEMPO]);
                write_varlen_slice(out, &micros.as_int().to_be_bytes()[1..])?;
            }
            EventKind::Meta { kind, data } => {
                *running_status = None;
                out.extend_from_slice(&[0xFF, kind]);
                write_varlen_slice(out, data)?;
            }
            EventKind::Unsupported { status, data } => {
                if status < 0xF8 {
                    *running_status = None;
                }
                out.push(status);
                if status == 0xF0 || status == 0xF7 {
                    write_varlen_slice(out, data)?;
                } else {
                    out.extend_from_slice(data);
                }
            }
        }
        Ok(())
    }
}

/// Write a channel message, omitting the status byte if it matches the running status.
fn write_channel(
    out: &mut Vec<u8>,
    running_status: &mut Option<u8>,
    compress: bool,
    status: u8,
    data: &[u8],
) {
    if !compress || Some(status) != *running_status {
        out.push(status);
        *running_status = Some(status);
    }
    out.extend_from_slice(data);
}

/// Channel messages have a known length, determined by the top nibble of the status.
#[inline]
pub(crate) fn channel_msg_length(status: u8) -> usize {
    const LENGTH_BY_STATUS: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 2, 2, 2, 2, 1, 1, 2, 0];
    LENGTH_BY_STATUS[(status >> 4) as usize] as usize
}

/// Data length of the fixed-size system messages.
///
/// `0xF0`, `0xF7` and `0xFF` are length-prefixed, and `0xF4`/`0xF5` are undefined, so they
/// yield `None`.
#[inline]
pub(crate) fn system_msg_length(status: u8) -> Option<usize> {
    match status {
        //MTC quarter frame, song select
        0xF1 | 0xF3 => Some(1),
        //Song position pointer
        0xF2 => Some(2),
        //Tune request and realtime messages
        0xF6 | 0xF8..=0xFE => Some(0),
        _ => None,
    }
}

/// An iterator of events over a single track chunk.
///
/// The iterator reads events up to exactly the end of the chunk body: an event cut short by the
/// chunk boundary yields `Error::Truncated`.
/// Events following an End-of-Track meta event are still yielded, unless the `strict` feature is
/// enabled, in which case they are an error (as is a missing End-of-Track).
///
/// This `struct` is very light, so it can be cloned freely.
#[derive(Clone, Debug)]
pub struct EventIter<'a> {
    raw: Reader<'a>,
    running_status: Option<u8>,
    /// Whether an End-of-Track event was seen.
    ended: bool,
    done: bool,
}
impl<'a> EventIter<'a> {
    pub(crate) fn new(raw: Reader<'a>) -> EventIter<'a> {
        EventIter {
            raw,
            running_status: None,
            ended: false,
            done: false,
        }
    }

    /// Get the remaining unread bytes.
    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        self.raw.unread()
    }

    /// Absolute offset of the next unread byte within the original input.
    #[inline]
    pub fn offset(&self) -> usize {
        self.raw.offset()
    }

    /// Get the current running status of the track.
    #[inline]
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    /// Parse and collect all remaining events.
    pub fn collect_events(self) -> Result<Vec<Event<'a>>> {
        let mut events = Vec::with_capacity(self.raw.remaining() / 3);
        for ev in self {
            events.push(ev?);
        }
        Ok(events)
    }

    fn next_event(&mut self) -> Result<Option<Event<'a>>> {
        if self.raw.is_empty() {
            if cfg!(feature = "strict") {
                ensure!(
                    self.ended,
                    err_format!(self.raw.offset(), "track is missing end of track")
                );
            }
            return Ok(None);
        }
        let ev = Event::read(&mut self.raw, &mut self.running_status)?;
        if ev.kind.is_end_of_track() {
            if cfg!(feature = "strict") {
                ensure!(
                    self.raw.is_empty(),
                    err_format!(self.raw.offset(), "events after end of track")
                );
            } else if self.ended {
                debug!("repeated end of track at byte {}", self.raw.offset());
            }
            self.ended = true;
        }
        Ok(Some(ev))
    }
}
impl<'a> Iterator for EventIter<'a> {
    type Item = Result<Event<'a>>;

    fn next(&mut self) -> Option<Result<Event<'a>>> {
        if self.done {
            return None;
        }
        match self.next_event() {
            Ok(Some(ev)) => Some(Ok(ev)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
