//! RMID files carry a plain SMF file inside the `data` chunk of a RIFF container.
//! They are read by locating that chunk and decoding its body as usual.

use crate::prelude::*;

/// Iterates over little-endian RIFF chunks, yielding their id and body.
struct ChunkIter<'a>(Reader<'a>);
impl<'a> Iterator for ChunkIter<'a> {
    type Item = ([u8; 4], Reader<'a>);
    fn next(&mut self) -> Option<([u8; 4], Reader<'a>)> {
        let head = self.0.split_checked(8)?.unread();
        let mut id = [0; 4];
        id.copy_from_slice(&head[..4]);
        let len = u32::from_le_bytes([head[4], head[5], head[6], head[7]]) as usize;
        let data = match self.0.split_checked(len) {
            Some(data) => data,
            None => self.0.take_rest(),
        };
        if len % 2 == 1 {
            let _pad = self.0.split_checked(1);
        }
        Some((id, data))
    }
}

/// Find the SMF data inside an RMID file.
///
/// Returns `None` if the input is not an RMID file, in which case it should be read as a plain
/// SMF file.
pub(crate) fn unwrap(raw: &[u8]) -> Option<Reader> {
    let (id, mut riff) = ChunkIter(Reader::new(raw)).next()?;
    if &id != b"RIFF" {
        return None;
    }
    let formtype = riff.split_checked(4)?;
    if formtype.unread() != b"RMID" {
        return None;
    }
    let data = ChunkIter(riff)
        .find(|(id, _)| id == b"data")
        .map(|(_, chunk)| chunk);
    if data.is_none() {
        debug!("rmid file has no data chunk");
    }
    data
}
