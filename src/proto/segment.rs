//! Seven segment digits of the main display.
//!
//! Each digit byte carries the segments A..G in bits 0..6. Bit 7 lights the
//! decimal point in front of the digit, except for the leftmost digit which
//! has no point of its own.

use thiserror::Error;

/// Number of digits on the main display.
pub const DIGIT_COUNT: usize = 4;

const SEGMENT_MASK: u8 = 0x7F;
const POINT_MASK: u8 = 0x80;

/// Everything a single digit position can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Digit(u8),
    Blank,
    /// Only used for the `0.L` overload indication.
    L,
}

impl Glyph {
    pub fn from_segments(bits: u8) -> Option<Self> {
        match bits & SEGMENT_MASK {
            0x5F => Some(Self::Digit(0)),
            0x06 => Some(Self::Digit(1)),
            0x6B => Some(Self::Digit(2)),
            0x2F => Some(Self::Digit(3)),
            0x36 => Some(Self::Digit(4)),
            0x3D => Some(Self::Digit(5)),
            0x7D => Some(Self::Digit(6)),
            0x07 => Some(Self::Digit(7)),
            0x7F => Some(Self::Digit(8)),
            0x3F => Some(Self::Digit(9)),
            0x00 => Some(Self::Blank),
            0x58 => Some(Self::L),
            _ => None,
        }
    }

    /// Segment pattern lighting this glyph, `None` for digits above 9.
    pub fn segments(self) -> Option<u8> {
        match self {
            Self::Digit(0) => Some(0x5F),
            Self::Digit(1) => Some(0x06),
            Self::Digit(2) => Some(0x6B),
            Self::Digit(3) => Some(0x2F),
            Self::Digit(4) => Some(0x36),
            Self::Digit(5) => Some(0x3D),
            Self::Digit(6) => Some(0x7D),
            Self::Digit(7) => Some(0x07),
            Self::Digit(8) => Some(0x7F),
            Self::Digit(9) => Some(0x3F),
            Self::Digit(_) => None,
            Self::Blank => Some(0x00),
            Self::L => Some(0x58),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("digit {} shows unknown segment pattern 0x{:02X}", position, pattern)]
    InvalidSegments { position: usize, pattern: u8 },
    #[error("digit {} is a blank gap inside the number", position)]
    MisplacedBlank { position: usize },
}

/// What the main display reads as a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Readout {
    Magnitude(f64),
    /// All digits dark.
    NoReading,
    Overload,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Digits {
    pub glyphs: [Glyph; DIGIT_COUNT],
    /// Number of digits left of the decimal point, if one is lit.
    pub point: Option<usize>,
    pub readout: Readout,
    /// More than one decimal point was lit; only the leftmost one counts.
    pub conflicting_points: bool,
}

/// Decodes the four digit bytes, leftmost (most significant) digit first.
pub fn decode_digits(bytes: [u8; DIGIT_COUNT]) -> Result<Digits, DecodeError> {
    let mut glyphs = [Glyph::Blank; DIGIT_COUNT];
    for (position, (glyph, byte)) in glyphs.iter_mut().zip(bytes).enumerate() {
        *glyph = Glyph::from_segments(byte).ok_or(DecodeError::InvalidSegments {
            position,
            pattern: byte & SEGMENT_MASK,
        })?;
    }

    let mut lit_points = (1..DIGIT_COUNT).filter(|&i| bytes[i] & POINT_MASK != 0);
    let point = lit_points.next();
    let conflicting_points = lit_points.next().is_some();

    let readout = if glyphs.contains(&Glyph::L) {
        Readout::Overload
    } else {
        magnitude(&glyphs, point)?
    };

    Ok(Digits {
        glyphs,
        point,
        readout,
        conflicting_points,
    })
}

fn magnitude(glyphs: &[Glyph; DIGIT_COUNT], point: Option<usize>) -> Result<Readout, DecodeError> {
    let mut value: u32 = 0;
    let mut significant = false;
    // index of the first trailing blank
    let mut end = DIGIT_COUNT;
    for (position, glyph) in glyphs.iter().enumerate() {
        match glyph {
            Glyph::Digit(_) if position > end => {
                return Err(DecodeError::MisplacedBlank { position: end });
            }
            Glyph::Digit(d) => {
                significant = true;
                value = value * 10 + u32::from(*d);
            }
            Glyph::Blank if significant => {
                end = end.min(position);
            }
            // leading blank, counts as zero
            _ => value *= 10,
        }
    }
    if !significant {
        return Ok(Readout::NoReading);
    }

    let decimals = point.map_or(0, |p| end.saturating_sub(p));
    Ok(Readout::Magnitude(
        f64::from(value) / 10f64.powi(decimals as i32),
    ))
}
