use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    proto::{conv::unit_prefix, frame::Frame, segment::DecodeError, segment::Readout},
    rawmea::{Icons, RawMeasurement, ReservedBits},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Unit {
    V_DC,
    MV_DC,
    UV_DC,
    V_AC,
    MV_AC,
    UV_AC,
    A_DC,
    MA_DC,
    UA_DC,
    A_AC,
    MA_AC,
    UA_AC,
    OHMS,
    KILOOHMS,
    MEGAOHMS,
    MILLIOHMS,
    MICROOHMS,
    FARAD,
    MILLIFARAD,
    MICROFARAD,
    NANOFARAD,
    HERTZ,
    KILOHERTZ,
    MEGAHERTZ,
    DEG_C,
    DEG_F,
    PERCENT,
    HFE,
    /// Not produced yet, the icon bits for continuity are unconfirmed.
    CONTINUITY,
    UNKNOWN,
}

impl Unit {
    /// Decimal exponent of the unit prefix, e.g. -3 for millivolts.
    pub fn exponent(&self) -> i16 {
        match self {
            Unit::MV_DC | Unit::MV_AC | Unit::MA_DC | Unit::MA_AC => -3,
            Unit::MILLIOHMS | Unit::MILLIFARAD => -3,
            Unit::UV_DC | Unit::UV_AC | Unit::UA_DC | Unit::UA_AC => -6,
            Unit::MICROOHMS | Unit::MICROFARAD => -6,
            Unit::NANOFARAD => -9,
            Unit::KILOOHMS | Unit::KILOHERTZ => 3,
            Unit::MEGAOHMS | Unit::MEGAHERTZ => 6,
            _ => 0,
        }
    }

    /// Factor to convert a display value into the base unit.
    pub fn multiplier(&self) -> f64 {
        10f64.powi(i32::from(self.exponent()))
    }

    /// Symbol of the base unit without prefix or coupling.
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::V_DC | Unit::MV_DC | Unit::UV_DC | Unit::V_AC | Unit::MV_AC | Unit::UV_AC => "V",
            Unit::A_DC | Unit::MA_DC | Unit::UA_DC | Unit::A_AC | Unit::MA_AC | Unit::UA_AC => "A",
            Unit::OHMS | Unit::KILOOHMS | Unit::MEGAOHMS | Unit::MILLIOHMS | Unit::MICROOHMS => "Ω",
            Unit::FARAD | Unit::MILLIFARAD | Unit::MICROFARAD | Unit::NANOFARAD => "F",
            Unit::HERTZ | Unit::KILOHERTZ | Unit::MEGAHERTZ => "Hz",
            Unit::DEG_C => "°C",
            Unit::DEG_F => "°F",
            Unit::PERCENT => "%",
            Unit::HFE => "hFE",
            Unit::CONTINUITY => "Ω",
            Unit::UNKNOWN => "?",
        }
    }

    pub fn coupling(&self) -> Option<Coupling> {
        match self {
            Unit::V_DC | Unit::MV_DC | Unit::UV_DC | Unit::A_DC | Unit::MA_DC | Unit::UA_DC => {
                Some(Coupling::Dc)
            }
            Unit::V_AC | Unit::MV_AC | Unit::UV_AC | Unit::A_AC | Unit::MA_AC | Unit::UA_AC => {
                Some(Coupling::Ac)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", unit_prefix(self.exponent()), self.symbol())?;
        match self.coupling() {
            Some(Coupling::Dc) => f.write_str(" DC"),
            Some(Coupling::Ac) => f.write_str(" AC"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupling {
    Ac,
    Dc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Volt,
    Ampere,
    Ohm,
    Hertz,
    Farad,
    Celsius,
    Fahrenheit,
    Percent,
    Hfe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Nano,
    Micro,
    Milli,
    Kilo,
    Mega,
}

/// Icon states that do not name a single unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmbiguousUnit {
    #[error("no unit icon lit")]
    NoFamily,
    #[error("{} unit icons lit at once", _0)]
    MultipleFamilies(usize),
    #[error("more than one prefix of a group lit")]
    ConflictingPrefixes,
    #[error("prefix does not belong to the lit unit")]
    ForeignPrefix,
    #[error("voltage or current without exactly one of AC/DC")]
    Coupling,
}

/// Picks at most one prefix out of a group of prefix icons.
fn single_prefix(lit: &[(bool, Prefix)]) -> Result<Option<Prefix>, AmbiguousUnit> {
    let mut found = lit.iter().filter(|(on, _)| *on).map(|(_, p)| *p);
    let first = found.next();
    if found.next().is_some() {
        return Err(AmbiguousUnit::ConflictingPrefixes);
    }
    Ok(first)
}

/// Determines the unit from the icons alone. The digits never influence the
/// unit, the decimal point only scales the value.
pub fn resolve_unit(icons: &Icons) -> Result<Unit, AmbiguousUnit> {
    let families: Vec<Family> = [
        (icons.volt_ampere.volt, Family::Volt),
        (icons.volt_ampere.ampere, Family::Ampere),
        (icons.ohm_hertz.ohm, Family::Ohm),
        (icons.ohm_hertz.hertz, Family::Hertz),
        (icons.capacitance.farad, Family::Farad),
        (icons.celsius, Family::Celsius),
        (icons.fahrenheit, Family::Fahrenheit),
        (icons.percent, Family::Percent),
        (icons.hfe, Family::Hfe),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .map(|(_, family)| family)
    .collect();

    let family = match families.as_slice() {
        [] => return Err(AmbiguousUnit::NoFamily),
        [family] => *family,
        more => return Err(AmbiguousUnit::MultipleFamilies(more.len())),
    };

    let va = single_prefix(&[
        (icons.volt_ampere.milli, Prefix::Milli),
        (icons.volt_ampere.micro, Prefix::Micro),
    ])?;
    let oh = single_prefix(&[
        (icons.ohm_hertz.kilo, Prefix::Kilo),
        (icons.ohm_hertz.mega, Prefix::Mega),
    ])?;
    let cap = single_prefix(&[
        (icons.capacitance.nano, Prefix::Nano),
        (icons.capacitance.micro, Prefix::Micro),
        (icons.capacitance.milli, Prefix::Milli),
    ])?;

    // Only the prefix group that belongs to the family may be lit.
    let prefix = match (family, va, oh, cap) {
        (Family::Volt | Family::Ampere, p, None, None) => p,
        (Family::Ohm, p, None, None) | (Family::Ohm, None, p, None) => p,
        (Family::Hertz, None, p, None) => p,
        (Family::Farad, None, None, p) => p,
        (_, None, None, None) => None,
        _ => return Err(AmbiguousUnit::ForeignPrefix),
    };

    let coupling = match (icons.ac, icons.dc) {
        (true, false) => Some(Coupling::Ac),
        (false, true) => Some(Coupling::Dc),
        _ => None,
    };

    let unit = match (family, prefix) {
        (Family::Volt | Family::Ampere, _) => {
            let coupling = coupling.ok_or(AmbiguousUnit::Coupling)?;
            match (family, prefix, coupling) {
                (Family::Volt, None, Coupling::Dc) => Unit::V_DC,
                (Family::Volt, Some(Prefix::Milli), Coupling::Dc) => Unit::MV_DC,
                (Family::Volt, Some(Prefix::Micro), Coupling::Dc) => Unit::UV_DC,
                (Family::Volt, None, Coupling::Ac) => Unit::V_AC,
                (Family::Volt, Some(Prefix::Milli), Coupling::Ac) => Unit::MV_AC,
                (Family::Volt, Some(Prefix::Micro), Coupling::Ac) => Unit::UV_AC,
                (_, None, Coupling::Dc) => Unit::A_DC,
                (_, Some(Prefix::Milli), Coupling::Dc) => Unit::MA_DC,
                (_, Some(Prefix::Micro), Coupling::Dc) => Unit::UA_DC,
                (_, None, Coupling::Ac) => Unit::A_AC,
                (_, Some(Prefix::Milli), Coupling::Ac) => Unit::MA_AC,
                (_, Some(Prefix::Micro), Coupling::Ac) => Unit::UA_AC,
                _ => return Err(AmbiguousUnit::ForeignPrefix),
            }
        }
        (Family::Ohm, None) => Unit::OHMS,
        (Family::Ohm, Some(Prefix::Kilo)) => Unit::KILOOHMS,
        (Family::Ohm, Some(Prefix::Mega)) => Unit::MEGAOHMS,
        (Family::Ohm, Some(Prefix::Milli)) => Unit::MILLIOHMS,
        (Family::Ohm, Some(Prefix::Micro)) => Unit::MICROOHMS,
        (Family::Hertz, None) => Unit::HERTZ,
        (Family::Hertz, Some(Prefix::Kilo)) => Unit::KILOHERTZ,
        (Family::Hertz, Some(Prefix::Mega)) => Unit::MEGAHERTZ,
        (Family::Farad, None) => Unit::FARAD,
        (Family::Farad, Some(Prefix::Milli)) => Unit::MILLIFARAD,
        (Family::Farad, Some(Prefix::Micro)) => Unit::MICROFARAD,
        (Family::Farad, Some(Prefix::Nano)) => Unit::NANOFARAD,
        (Family::Celsius, None) => Unit::DEG_C,
        (Family::Fahrenheit, None) => Unit::DEG_F,
        (Family::Percent, None) => Unit::PERCENT,
        (Family::Hfe, None) => Unit::HFE,
        _ => return Err(AmbiguousUnit::ForeignPrefix),
    };
    Ok(unit)
}

/// Secondary display state kept next to the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub ac: bool,
    pub dc: bool,
    pub auto_range: bool,
    pub low_battery: bool,
    pub min: bool,
    pub max: bool,
    pub relative: bool,
    /// Display shows `0.L`.
    pub overload: bool,
}

impl From<&Icons> for Flags {
    fn from(icons: &Icons) -> Self {
        Self {
            ac: icons.ac,
            dc: icons.dc,
            auto_range: icons.auto_range,
            low_battery: icons.low_battery,
            min: icons.min,
            max: icons.max,
            relative: icons.relative,
            overload: false,
        }
    }
}

/// Something odd on the display that did not stop decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    AmbiguousUnit(AmbiguousUnit),
    Decode(DecodeError),
    ConflictingPoints,
    ReservedBits(ReservedBits),
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::AmbiguousUnit(err) => write!(f, "ambiguous unit: {}", err),
            Anomaly::Decode(err) => write!(f, "unreadable digits: {}", err),
            Anomaly::ConflictingPoints => f.write_str("more than one decimal point lit"),
            Anomaly::ReservedBits(bits) => write!(f, "reserved bits set at {}", bits),
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Wall clock time of decoding, for display.
    pub ts: DateTime<Utc>,
    /// Monotonic time of decoding. Orders samples even if the wall clock
    /// steps backwards.
    pub instant: Instant,
    /// Name of the meter that produced the sample, see [`Device::with_name`].
    ///
    /// [`Device::with_name`]: crate::device::Device::with_name
    pub device: Option<String>,
    /// Value as shown on the display, in `unit`. `None` if the display shows
    /// no number.
    pub value: Option<f64>,
    pub unit: Unit,
    pub flags: Flags,
    /// Lit segments of the analog bar, 0..=60.
    pub range_bar: u8,
    pub anomalies: Vec<Anomaly>,
}

impl Measurement {
    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }

    /// Value converted into the base unit (V, A, Ω, F, Hz).
    pub fn base_value(&self) -> Option<f64> {
        self.value.map(|v| v * self.unit.multiplier())
    }

    /// Decodes a frame that already passed validation.
    pub fn from_frame(frame: &Frame) -> Self {
        Self::from(RawMeasurement::from(frame))
    }
}

impl From<RawMeasurement> for Measurement {
    fn from(raw: RawMeasurement) -> Self {
        let mut anomalies: Vec<Anomaly> = raw.reserved.into_iter().map(Anomaly::ReservedBits).collect();
        let mut flags = Flags::from(&raw.icons);

        let unit = resolve_unit(&raw.icons).unwrap_or_else(|err| {
            anomalies.push(Anomaly::AmbiguousUnit(err));
            Unit::UNKNOWN
        });

        let value = match raw.digits {
            Ok(digits) => {
                if digits.conflicting_points {
                    anomalies.push(Anomaly::ConflictingPoints);
                }
                match digits.readout {
                    Readout::Magnitude(m) if raw.icons.negative => Some(-m),
                    Readout::Magnitude(m) => Some(m),
                    Readout::NoReading => None,
                    Readout::Overload => {
                        flags.overload = true;
                        None
                    }
                }
            }
            Err(err) => {
                anomalies.push(Anomaly::Decode(err));
                None
            }
        };

        for anomaly in &anomalies {
            debug!("display anomaly: {}", anomaly);
        }

        Self {
            ts: Utc::now(),
            instant: Instant::now(),
            device: None,
            value,
            unit,
            flags,
            range_bar: raw.range_bar.segments(),
            anomalies,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{} {}", v, self.unit),
            None if self.flags.overload => write!(f, "OL {}", self.unit),
            None => write!(f, "---- {}", self.unit),
        }
    }
}
