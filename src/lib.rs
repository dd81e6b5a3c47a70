//! # wxrack: 433 MHz weather-sensor reception
//!
//! This crate provides a software demodulator and decoder for the
//! Manchester-encoded, on-off-keyed frames transmitted by low-cost
//! 434/868 MHz weather sensors: the F007TH-style thermo-hygrometer
//! (7-byte frames, up to eight channels) and the FT0300-style
//! all-in-one weather station (16-byte frames with wind, rain,
//! light, and UV).
//!
//! ## Example
//!
//! You will first need the demodulated *data line* of an OOK
//! receiver module, the digital output pin that follows the 433 MHz
//! carrier. Obtaining that signal is beyond the scope of this crate;
//! implement [`LineSampler`] for your platform's GPIO and
//! microsecond timer and hand it to the builder.
//!
//! ```
//! use wxrack::{Outcome, Reading, ReceiverBuilder};
//!
//! # struct MyPin;
//! # impl wxrack::LineSampler for MyPin {
//! #     fn level(&mut self) -> bool { false }
//! #     fn now_micros(&mut self) -> u64 { 0 }
//! # }
//! # let my_pin = MyPin;
//! // create a receiver bound to your line sampler
//! let mut rx = ReceiverBuilder::new()
//!     .with_timeout_millis(0)     // deadline per decode call
//!     .with_families(true, true)  // thermo-hygrometer, station
//!     .build(my_pin);
//!
//! // one blocking receive attempt under the deadline
//! match rx.decode_once() {
//!     Outcome::Reading(Reading::ThermoHygrometer(t)) => {
//!         println!("channel {}: {:.1} °C", t.channel, t.temperature_c());
//!     }
//!     Outcome::Reading(Reading::WeatherStation(w)) => {
//!         println!("wind {} gust {}", w.wind_avg, w.wind_gust);
//!     }
//!     Outcome::Error(err) => println!("frame rejected: {}", err),
//!     Outcome::Timeout => println!("nothing heard"),
//! }
//! ```
//!
//! Every accepted reading has survived its family's checksum or CRC
//! and all range checks; there are no partially-decoded readings.
//! Session [counters](SensorReceiver::counters) tally detected
//! headers and accepted frames per family.
//!
//! ## Background
//!
//! These sensors transmit each reading as a single burst: a long run
//! of Manchester one-bits, a single zero marking the frame start, and
//! then the frame bytes, most-significant bit first. The receiver
//! recovers bits by delay sampling rather than by edge interrupts,
//! polling the line at quarter- and half-bit offsets around each
//! mid-bit transition, so it needs nothing from the platform beyond
//! a GPIO read and a microsecond clock.
//!
//! The two families share the preamble and bit layer but differ in
//! length, integrity check, and payload layout. The frame length is
//! settled on the fly: capture starts expecting the short family and
//! grows to the station length when the family signature byte says
//! so. See [`Reading`] for the decoded fields.
//!
//! The demodulator is a tight polling loop and blocks the calling
//! thread for up to the configured deadline. There is no internal
//! locking; to listen on several radios at once, give each thread
//! its own [`SensorReceiver`].

mod builder;
mod checksum;
mod framing;
mod manchester;
mod message;
mod receiver;
mod sampler;

#[cfg(test)]
mod waveform;

pub use builder::ReceiverBuilder;
pub use manchester::Polarity;
pub use message::{Battery, DecodeErr, Reading, StationReading, ThermoReading};
pub use receiver::{Counters, Outcome, SensorReceiver};
pub use sampler::LineSampler;
