use std::fmt;

use thiserror::Error;

/// Every status frame is exactly this long.
pub const FRAME_LEN: usize = 22;

/// First two bytes of every frame.
pub const SYNC: [u8; 2] = [0xAA, 0x55];

/// Bytes 2..6 never change on a healthy device.
pub const HEADER: [u8; 4] = [0x52, 0x24, 0x01, 0x10];

const HEADER_OFFSET: usize = SYNC.len();

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedFrame {
    #[error("sync bytes expected, found {:02X?}", found)]
    Sync { found: [u8; 2] },
    #[error("constant header bytes expected, found {:02X?}", found)]
    Header { found: [u8; 4] },
}

/// One raw status snapshot as sent by the meter.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    pub fn new(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn byte(&self, idx: usize) -> u8 {
        self.0[idx]
    }

    /// Checks the framing bytes. Payload bits are not looked at.
    pub fn validate(&self) -> Result<(), MalformedFrame> {
        let sync = [self.0[0], self.0[1]];
        if sync != SYNC {
            return Err(MalformedFrame::Sync { found: sync });
        }
        let mut header = [0u8; 4];
        header.copy_from_slice(&self.0[HEADER_OFFSET..HEADER_OFFSET + HEADER.len()]);
        if header != HEADER {
            return Err(MalformedFrame::Header { found: header });
        }
        Ok(())
    }
}

impl From<[u8; FRAME_LEN]> for Frame {
    fn from(value: [u8; FRAME_LEN]) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:02X?})", self.0)
    }
}

/// A frame with valid framing bytes and a dark display.
#[cfg(test)]
pub(crate) fn blank_frame() -> [u8; FRAME_LEN] {
    let mut bytes = [0u8; FRAME_LEN];
    bytes[..HEADER_OFFSET].copy_from_slice(&SYNC);
    bytes[HEADER_OFFSET..HEADER_OFFSET + HEADER.len()].copy_from_slice(&HEADER);
    bytes
}
