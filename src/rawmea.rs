use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use crate::proto::frame::Frame;
use crate::proto::segment::{decode_digits, DecodeError, Digits, DIGIT_COUNT};

/// Digit bytes, leftmost digit first.
pub(crate) const DIGIT_BYTES: [usize; DIGIT_COUNT] = [9, 8, 7, 6];

/// Low battery
/// Byte 10 bit 7
const LOW_BAT: u8 = 0b1000_0000;

/// Minus
/// Byte 10 bit 3
const NEG: u8 = 0b0000_1000;

/// DC
/// Byte 10 bit 2
const DC: u8 = 0b0000_0100;

/// AC
/// Byte 10 bit 1
const AC: u8 = 0b0000_0010;

/// AUTO
/// Byte 18 bit 5
const AUTO: u8 = 0b0010_0000;

/// hFE
/// Byte 19 bit 6
const HFE: u8 = 0b0100_0000;

/// Percent
/// Byte 19 bit 5
const PERCENT: u8 = 0b0010_0000;

/// MIN
/// Byte 19 bit 3
const MIN: u8 = 0b0000_1000;

/// Relative mode (dash)
/// Byte 19 bit 2
const DELTA: u8 = 0b0000_0100;

/// MAX
/// Byte 19 bit 1
const MAX: u8 = 0b0000_0010;

/// "F", "n", "u", "m" of the capacitance unit group and °F/°C
/// Byte 20 bits 7..4, 1, 0
const FARAD: u8 = 0b1000_0000;
const CAP_NANO: u8 = 0b0100_0000;
const CAP_MICRO: u8 = 0b0010_0000;
const CAP_MILLI: u8 = 0b0001_0000;
const DEG_F: u8 = 0b0000_0010;
const DEG_C: u8 = 0b0000_0001;

/// "Hz", "Ω", "k", "M", "V", "A", "m", "u"
/// Byte 21
const HZ: u8 = 0b1000_0000;
const OHM: u8 = 0b0100_0000;
const KILO: u8 = 0b0010_0000;
const MEGA: u8 = 0b0001_0000;
const VOLT: u8 = 0b0000_1000;
const AMPERE: u8 = 0b0000_0100;
const MILLI: u8 = 0b0000_0010;
const MICRO: u8 = 0b0000_0001;

/// Bits with no known icon, per byte. The meter leaves them dark; some may
/// drive the buzzer, diode or USB icons.
const RESERVED: [(usize, u8); 5] = [
    (9, 0b1000_0000),
    (10, 0b0110_0001),
    (18, 0b1101_0000),
    (19, 0b1001_0001),
    (20, 0b0000_1100),
];

/// First byte of the range bar and number of bar segments.
const BAR_OFFSET: usize = 11;
pub const BAR_SEGMENTS: u32 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacitanceIcons {
    pub farad: bool,
    pub nano: bool,
    pub micro: bool,
    pub milli: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OhmHertzIcons {
    pub hertz: bool,
    pub ohm: bool,
    pub kilo: bool,
    pub mega: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoltAmpereIcons {
    pub volt: bool,
    pub ampere: bool,
    pub milli: bool,
    pub micro: bool,
}

/// Every icon of the display as a plain flag. Contradicting combinations
/// are kept as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Icons {
    pub ac: bool,
    pub dc: bool,
    pub negative: bool,
    pub low_battery: bool,
    pub auto_range: bool,
    pub min: bool,
    pub max: bool,
    pub relative: bool,
    pub percent: bool,
    pub hfe: bool,
    pub celsius: bool,
    pub fahrenheit: bool,
    pub capacitance: CapacitanceIcons,
    pub ohm_hertz: OhmHertzIcons,
    pub volt_ampere: VoltAmpereIcons,
}

impl From<&Frame> for Icons {
    fn from(frame: &Frame) -> Self {
        let b10 = frame.byte(10);
        let b18 = frame.byte(18);
        let b19 = frame.byte(19);
        let b20 = frame.byte(20);
        let b21 = frame.byte(21);
        Self {
            ac: b10 & AC != 0,
            dc: b10 & DC != 0,
            negative: b10 & NEG != 0,
            low_battery: b10 & LOW_BAT != 0,
            auto_range: b18 & AUTO != 0,
            min: b19 & MIN != 0,
            max: b19 & MAX != 0,
            relative: b19 & DELTA != 0,
            percent: b19 & PERCENT != 0,
            hfe: b19 & HFE != 0,
            celsius: b20 & DEG_C != 0,
            fahrenheit: b20 & DEG_F != 0,
            capacitance: CapacitanceIcons {
                farad: b20 & FARAD != 0,
                nano: b20 & CAP_NANO != 0,
                micro: b20 & CAP_MICRO != 0,
                milli: b20 & CAP_MILLI != 0,
            },
            ohm_hertz: OhmHertzIcons {
                hertz: b21 & HZ != 0,
                ohm: b21 & OHM != 0,
                kilo: b21 & KILO != 0,
                mega: b21 & MEGA != 0,
            },
            volt_ampere: VoltAmpereIcons {
                volt: b21 & VOLT != 0,
                ampere: b21 & AMPERE != 0,
                milli: b21 & MILLI != 0,
                micro: b21 & MICRO != 0,
            },
        }
    }
}

/// The 60 segment analog bar below the digits. Bit 0 is the leftmost bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeBar(u64);

impl RangeBar {
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Number of lit segments, 0..=60.
    pub fn segments(&self) -> u8 {
        self.0.count_ones() as u8
    }

    /// `n` counts from 1 like the segments on the display.
    pub fn is_lit(&self, n: u32) -> bool {
        (1..=BAR_SEGMENTS).contains(&n) && self.0 & (1 << (n - 1)) != 0
    }
}

impl From<&Frame> for RangeBar {
    fn from(frame: &Frame) -> Self {
        let raw = LittleEndian::read_u64(&frame.as_bytes()[BAR_OFFSET..BAR_OFFSET + 8]);
        Self(raw & ((1 << BAR_SEGMENTS) - 1))
    }
}

/// Set bits without a known meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedBits {
    pub byte: usize,
    pub bits: u8,
}

impl fmt::Display for ReservedBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "byte {}: 0x{:02X}", self.byte, self.bits)
    }
}

pub fn reserved_bits(frame: &Frame) -> Vec<ReservedBits> {
    RESERVED
        .iter()
        .filter_map(|&(byte, mask)| {
            let bits = frame.byte(byte) & mask;
            (bits != 0).then_some(ReservedBits { byte, bits })
        })
        .collect()
}

/// Frame content split into its display parts, not yet interpreted.
#[derive(Debug, Clone)]
pub struct RawMeasurement {
    pub digits: Result<Digits, DecodeError>,
    pub icons: Icons,
    pub range_bar: RangeBar,
    pub reserved: Vec<ReservedBits>,
}

impl From<&Frame> for RawMeasurement {
    fn from(frame: &Frame) -> Self {
        Self {
            digits: decode_digits(DIGIT_BYTES.map(|idx| frame.byte(idx))),
            icons: Icons::from(frame),
            range_bar: RangeBar::from(frame),
            reserved: reserved_bits(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::frame::blank_frame;
    use crate::proto::segment::Readout;

    #[test]
    fn dark_display() {
        let raw = RawMeasurement::from(&Frame::new(blank_frame()));
        assert_eq!(raw.icons, Icons::default());
        assert_eq!(raw.range_bar.segments(), 0);
        assert!(raw.reserved.is_empty());
        assert_eq!(raw.digits.expect("digits").readout, Readout::NoReading);
    }

    #[test]
    fn icon_bits() {
        let mut bytes = blank_frame();
        bytes[10] = LOW_BAT | NEG | DC;
        bytes[18] = AUTO;
        bytes[19] = MIN | MAX;
        bytes[20] = CAP_MICRO | FARAD;
        bytes[21] = KILO | OHM;
        let icons = Icons::from(&Frame::new(bytes));
        assert!(icons.low_battery && icons.negative && icons.dc && !icons.ac);
        assert!(icons.auto_range);
        assert!(icons.min && icons.max && !icons.relative);
        assert!(icons.capacitance.farad && icons.capacitance.micro);
        assert!(!icons.capacitance.nano && !icons.capacitance.milli);
        assert!(icons.ohm_hertz.ohm && icons.ohm_hertz.kilo);
        assert!(!icons.ohm_hertz.hertz && !icons.ohm_hertz.mega);
        assert_eq!(icons.volt_ampere, VoltAmpereIcons::default());
    }

    #[test]
    fn range_bar_spans_eight_bytes() {
        let mut bytes = blank_frame();
        bytes[11] = 0b0000_0111;
        bytes[17] = 0b1000_0000;
        // high nibble of byte 18 is not part of the bar
        bytes[18] = 0b0000_1001 | AUTO;
        let bar = RangeBar::from(&Frame::new(bytes));
        assert_eq!(bar.segments(), 6);
        assert!(bar.is_lit(1) && bar.is_lit(3) && !bar.is_lit(4));
        assert!(bar.is_lit(56) && bar.is_lit(57) && bar.is_lit(60));
        assert!(!bar.is_lit(0) && !bar.is_lit(61));
    }

    #[test]
    fn full_range_bar() {
        let mut bytes = blank_frame();
        bytes[11..18].fill(0xFF);
        bytes[18] = 0xFF;
        let bar = RangeBar::from(&Frame::new(bytes));
        assert_eq!(bar.segments(), 60);
    }

    #[test]
    fn reports_reserved_bits() {
        let mut bytes = blank_frame();
        bytes[9] = 0x80;
        bytes[10] = 0x01 | DC;
        bytes[19] = 0x01;
        let reserved = reserved_bits(&Frame::new(bytes));
        assert_eq!(
            reserved,
            vec![
                ReservedBits { byte: 9, bits: 0x80 },
                ReservedBits { byte: 10, bits: 0x01 },
                ReservedBits { byte: 19, bits: 0x01 },
            ]
        );
    }
}
