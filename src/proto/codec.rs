use bytes::{Buf, BytesMut};
use log::debug;
use std::io;
use tokio_util::codec::Decoder;

use super::frame::{Frame, FRAME_LEN, SYNC};

/// Splits the raw byte stream of the meter into frames.
///
/// The meter sends frames back to back without any delimiter, so the only
/// way to find a frame start is the sync word. Bytes in front of it are
/// dropped.
#[derive(Default)]
pub struct FrameCodec {
    discarded: usize,
}

impl FrameCodec {
    /// Total number of bytes dropped while searching for a sync word.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn sync_position(src: &BytesMut) -> Option<usize> {
        src.as_ref().windows(SYNC.len()).position(|w| w == SYNC)
    }

    fn skip(&mut self, src: &mut BytesMut, n: usize) {
        if n > 0 {
            debug!("discarding {} bytes in front of sync word", n);
            src.advance(n);
            self.discarded += n;
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    // Frames are only split here. A frame with bad header bytes is still
    // returned; rejecting it is up to the caller.
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match Self::sync_position(src) {
            Some(n) => self.skip(src, n),
            None => {
                // Keep a trailing first sync byte, its partner may follow.
                let keep = usize::from(src.last() == Some(&SYNC[0]));
                let n = src.len() - keep;
                self.skip(src, n);
                return Ok(None);
            }
        }

        if src.len() < FRAME_LEN {
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }

        let mut raw = [0u8; FRAME_LEN];
        raw.copy_from_slice(&src[..FRAME_LEN]);
        src.advance(FRAME_LEN);
        Ok(Some(Frame::new(raw)))
    }
}
