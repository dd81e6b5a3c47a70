//! Decoded sensor readings
//!
//! A captured [raw frame](crate::framing::RawFrame) is turned into a
//! typed reading here. The two families are mutually exclusive and
//! selected by the signature at frame byte 1. Nothing is emitted for
//! a frame that fails its integrity check or carries an out-of-range
//! field; such frames produce a [`DecodeErr`] and the session
//! controller decides whether time remains for another attempt.

use std::fmt;

use thiserror::Error;

use crate::checksum::{crc8, rotating_checksum};
use crate::framing::{LONG_FRAME_LENGTH, SHORT_FRAME_LENGTH};

/// Frame byte 1 signature of the thermo-hygrometer family
pub(crate) const FAMILY_THERMO: u8 = 0x45;

/// Frame byte 1 signature of the weather-station family
pub(crate) const FAMILY_STATION: u8 = 0x4C;

// CRC seed for the weather-station family
const STATION_CRC_SEED: u8 = 0xC0;

// Realigned weather-station payload: 13 data bytes plus the CRC
const STATION_PAYLOAD_LENGTH: usize = 14;

/// Error decoding a captured frame
///
/// None of these are fatal: every decode attempt is independent, and
/// the receiver starts the next attempt from preamble search if its
/// deadline allows.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeErr {
    /// Frame byte 1 matches neither known family
    #[error("unrecognized sensor family {0:#04x}")]
    UnrecognizedFamily(u8),

    /// Thermo-hygrometer checksum did not match
    #[error("invalid thermo-hygrometer frame: checksum mismatch")]
    ChecksumMismatch,

    /// Weather-station CRC did not match
    #[error("invalid weather-station frame: CRC mismatch")]
    CrcMismatch,

    /// Humidity field outside 0–100 despite a correct checksum
    #[error("invalid thermo-hygrometer frame: humidity {0} out of range")]
    HumidityOutOfRange(u8),
}

/// Battery state reported by a sensor
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString,
)]
pub enum Battery {
    /// Battery is good
    #[default]
    #[strum(serialize = "OK")]
    Ok,

    /// Sensor reports low battery
    #[strum(serialize = "LOW")]
    Low,
}

/// A fully-validated sensor reading
///
/// Exactly one variant per sensor family. A `Reading` only exists if
/// its family's checksum or CRC matched and all range checks passed;
/// there are no partially-populated readings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reading {
    /// Indoor/outdoor thermo-hygrometer (7-byte frame)
    ThermoHygrometer(ThermoReading),

    /// All-in-one weather station (16-byte frame)
    WeatherStation(StationReading),
}

impl Reading {
    // Dispatch a complete raw frame to the matching decoder
    pub(crate) fn from_frame(frame: &[u8]) -> Result<Self, DecodeErr> {
        match (frame.len(), frame[1]) {
            (SHORT_FRAME_LENGTH, FAMILY_THERMO) => {
                Ok(Reading::ThermoHygrometer(ThermoReading::decode(frame)?))
            }
            (LONG_FRAME_LENGTH, FAMILY_STATION) => {
                Ok(Reading::WeatherStation(StationReading::decode(frame)?))
            }
            (_, family) => Err(DecodeErr::UnrecognizedFamily(family)),
        }
    }

    pub(crate) fn set_sequence(&mut self, sequence: u32) {
        match self {
            Reading::ThermoHygrometer(r) => r.sequence = sequence,
            Reading::WeatherStation(r) => r.sequence = sequence,
        }
    }

    /// Battery state
    pub fn battery(&self) -> Battery {
        match self {
            Reading::ThermoHygrometer(r) => r.battery,
            Reading::WeatherStation(r) => r.battery,
        }
    }

    /// Temperature in degrees Celsius
    pub fn temperature_c(&self) -> f32 {
        match self {
            Reading::ThermoHygrometer(r) => r.temperature_c(),
            Reading::WeatherStation(r) => r.temperature_c(),
        }
    }

    /// Relative humidity, percent
    pub fn humidity(&self) -> u8 {
        match self {
            Reading::ThermoHygrometer(r) => r.humidity,
            Reading::WeatherStation(r) => r.humidity,
        }
    }

    /// Message sequence number
    ///
    /// Increments once per accepted reading for the lifetime of the
    /// receiver.
    pub fn sequence(&self) -> u32 {
        match self {
            Reading::ThermoHygrometer(r) => r.sequence,
            Reading::WeatherStation(r) => r.sequence,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::ThermoHygrometer(r) => write!(
                f,
                "thermo-hygrometer: channel {} {:.1} °C {} %RH battery {}",
                r.channel,
                r.temperature_c(),
                r.humidity,
                r.battery
            ),
            Reading::WeatherStation(r) => write!(
                f,
                "weather station: {:.1} °C {} %RH wind {} gust {} dir {} rain {} battery {}",
                r.temperature_c(),
                r.humidity,
                r.wind_avg,
                r.wind_gust,
                r.wind_direction,
                r.rain,
                r.battery
            ),
        }
    }
}

/// Reading from a thermo-hygrometer sensor
///
/// Sample frame, as documented by the transmitter's reverse
/// engineers:
///
/// ```txt
/// 0        1        2        3        4        5        6
/// FD       45       4F       04       4B       0B       52
/// hhhhhhhh SSSSSSSS NRRRRRRR bCCCTTTT TTTTTTTT HHHHHHHH CCCCCCCC
/// ```
///
/// Byte 0 is the header remnant; byte 1 the family signature; byte 2
/// a rolling code that changes when the battery is swapped; byte 3
/// packs the battery bit, the channel field, and the temperature high
/// bits; byte 4 the temperature low bits; byte 5 the humidity; byte 6
/// the checksum over bytes 1–5.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThermoReading {
    /// Channel selected on the sensor's dip switches, 1–8
    pub channel: u8,

    /// Rolling code; resets when the battery is changed
    pub device: u8,

    /// Battery state
    pub battery: Battery,

    /// Raw 12-bit temperature, in the transmitter's 400-offset
    /// tenths-°F convention
    pub temperature_raw: u16,

    /// Relative humidity, percent, 0–100
    pub humidity: u8,

    /// Message sequence number, stamped by the receiver
    pub sequence: u32,

    /// Verified checksum byte
    pub checksum: u8,
}

impl ThermoReading {
    fn decode(frame: &[u8]) -> Result<Self, DecodeErr> {
        debug_assert_eq!(SHORT_FRAME_LENGTH, frame.len());

        let computed = rotating_checksum(&frame[1..6]);
        if computed != frame[6] {
            return Err(DecodeErr::ChecksumMismatch);
        }

        // a checksum-valid frame can still carry an impossible
        // humidity; reject it rather than report garbage
        let humidity = frame[5];
        if humidity > 100 {
            return Err(DecodeErr::HumidityOutOfRange(humidity));
        }

        Ok(Self {
            channel: ((frame[3] & 0x70) >> 4) + 1,
            device: frame[2],
            battery: if frame[3] & 0x80 != 0 {
                Battery::Low
            } else {
                Battery::Ok
            },
            temperature_raw: u16::from(frame[3] & 0x07) << 8 | u16::from(frame[4]),
            humidity,
            sequence: 0,
            checksum: computed,
        })
    }

    /// Temperature in degrees Fahrenheit
    pub fn temperature_f(&self) -> f32 {
        f32::from(self.temperature_raw as i16 - 400) / 10.0
    }

    /// Temperature in degrees Celsius
    pub fn temperature_c(&self) -> f32 {
        (self.temperature_f() - 32.0) * (5.0 / 9.0)
    }
}

/// Reading from an all-in-one weather station
///
/// The station's frame is transmitted shifted half a byte relative to
/// the capture boundaries; see [`realign()`]. Wind, rain, and light
/// fields are in the transmitter's native units and are left
/// unscaled.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StationReading {
    /// Device type nibble
    pub device: u8,

    /// Serial fragment; changes when the battery is swapped
    pub serial: u8,

    /// Battery state
    pub battery: Battery,

    /// Average wind speed, 9-bit raw value
    pub wind_avg: u16,

    /// Gust speed, 9-bit raw value
    pub wind_gust: u16,

    /// Wind direction, degrees, 9-bit raw value
    pub wind_direction: u16,

    /// Cumulative rainfall counter, 16-bit raw value
    pub rain: u16,

    /// Raw 12-bit temperature, in the transmitter's 400-offset
    /// tenths-°F convention
    pub temperature_raw: u16,

    /// Relative humidity, percent
    pub humidity: u8,

    /// Light level, 17-bit raw value
    pub light: u32,

    /// UV index
    pub uv: u8,

    /// Message sequence number, stamped by the receiver
    pub sequence: u32,

    /// Verified CRC byte
    pub crc: u8,
}

impl StationReading {
    fn decode(frame: &[u8]) -> Result<Self, DecodeErr> {
        debug_assert_eq!(LONG_FRAME_LENGTH, frame.len());

        let payload = realign(frame);
        let computed = crc8(STATION_CRC_SEED, &payload[..13]);
        if computed != payload[13] {
            return Err(DecodeErr::CrcMismatch);
        }

        let flags = payload[1] & 0x0f;
        let second_flags = (payload[7] & 0xf0) >> 4;

        Ok(Self {
            device: (payload[0] & 0xf0) >> 4,
            serial: (payload[0] & 0x0f) << 4 | (payload[1] & 0xf0) >> 4,
            battery: if flags & 0x08 != 0 {
                Battery::Low
            } else {
                Battery::Ok
            },
            wind_avg: u16::from(payload[2]) | u16::from(flags & 0x01) << 8,
            wind_gust: u16::from(payload[3]) | u16::from(flags & 0x02) << 7,
            wind_direction: u16::from(payload[4]) | u16::from(flags & 0x04) << 6,
            rain: u16::from(payload[5]) << 8 | u16::from(payload[6]),
            temperature_raw: u16::from(payload[7] & 0x0f) << 8 | u16::from(payload[8]),
            humidity: payload[9],
            light: u32::from(payload[10]) << 8
                | u32::from(payload[11])
                | u32::from(second_flags & 0x08) << 9,
            uv: payload[12],
            sequence: 0,
            crc: computed,
        })
    }

    /// Temperature in degrees Fahrenheit
    pub fn temperature_f(&self) -> f32 {
        f32::from(self.temperature_raw as i16 - 400) / 10.0
    }

    /// Temperature in degrees Celsius
    pub fn temperature_c(&self) -> f32 {
        (self.temperature_f() - 32.0) * (5.0 / 9.0)
    }
}

// Reconstruct the transmitter's byte boundaries
//
// The station's payload arrives shifted by one nibble: true byte i is
// the low nibble of raw byte i+1 followed by the high nibble of raw
// byte i+2. Raw byte 0 is the header remnant and contributes nothing.
fn realign(raw: &[u8]) -> [u8; STATION_PAYLOAD_LENGTH] {
    let mut out = [0u8; STATION_PAYLOAD_LENGTH];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = (raw[i + 1] & 0x0f) << 4 | (raw[i + 2] & 0xf0) >> 4;
    }
    out
}
