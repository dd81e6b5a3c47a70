use crate::framing::PREAMBLE_BITS;
use crate::manchester::{LONG_DELAY_US, Polarity, SHORT_DELAY_US};
use crate::receiver::SensorReceiver;
use crate::sampler::LineSampler;

/// Builds a [`SensorReceiver`]
///
/// The builder comes with defaults matching the sensors this crate
/// was written for: a 980 µs bit period sampled at quarter- and
/// half-bit offsets, a nine-bit preamble, falling-edge-is-one
/// polarity, both frame families accepted, and a ten second decode
/// deadline.
///
/// The API specified by the builder is part of this crate's API. The
/// actual default values are *not*, however, and are subject to
/// revision in any minor release. If you care very strongly about a
/// setting, be sure to configure it here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiverBuilder {
    polarity: Polarity,
    short_delay_micros: u32,
    long_delay_micros: u32,
    preamble_bits: u32,
    accept_thermo: bool,
    accept_station: bool,
    timeout_millis: u64,
}

impl ReceiverBuilder {
    /// New builder with default settings
    pub fn new() -> Self {
        Self {
            polarity: Polarity::default(),
            short_delay_micros: SHORT_DELAY_US,
            long_delay_micros: LONG_DELAY_US,
            preamble_bits: PREAMBLE_BITS,
            accept_thermo: true,
            accept_station: true,
            timeout_millis: 10_000,
        }
    }

    /// Bind a line sampler and build the receiver
    ///
    /// Once built, the receiver is immediately ready to
    /// [`decode_once()`](SensorReceiver::decode_once).
    pub fn build<S>(&self, line: S) -> SensorReceiver<S>
    where
        S: LineSampler,
    {
        SensorReceiver::from_builder(self, line)
    }

    /// Mid-bit transition polarity
    ///
    /// Which transition direction encodes a logical one. The
    /// supported sensors use
    /// [`FallingIsOne`](Polarity::FallingIsOne).
    pub fn with_polarity(&mut self, polarity: Polarity) -> &mut Self {
        self.polarity = polarity;
        self
    }

    /// Symbol probe delays, in microseconds
    ///
    /// `short` is the delay from the mid-bit transition to the
    /// half-bit stability probe (nominally a quarter bit); `long` the
    /// further delay to the next-cell probe (nominally half a bit).
    /// These are design constants of the waveform, not values to tune
    /// at runtime; change them only for a transmitter with a
    /// different bit period.
    pub fn with_symbol_delays(&mut self, short: u32, long: u32) -> &mut Self {
        self.short_delay_micros = short.max(1);
        self.long_delay_micros = long.max(1);
        self
    }

    /// Preamble run length required before the sync zero
    ///
    /// Transmitters send a generous run of ones; requiring nine of
    /// them rejects most impulse noise while leaving margin for the
    /// bits lost to transition-sense acquisition. Values below 1 are
    /// clamped.
    pub fn with_preamble_bits(&mut self, bits: u32) -> &mut Self {
        self.preamble_bits = bits.max(1);
        self
    }

    /// Which frame families to accept
    ///
    /// A captured frame from a disabled family is discarded as
    /// unrecognized and the receive attempt repeats.
    pub fn with_families(&mut self, thermo: bool, station: bool) -> &mut Self {
        self.accept_thermo = thermo;
        self.accept_station = station;
        self
    }

    /// Decode deadline, in milliseconds
    ///
    /// Each [`decode_once()`](SensorReceiver::decode_once) call
    /// retries failed receive attempts until this much time has
    /// elapsed. A zero deadline makes the call return
    /// [`Timeout`](crate::Outcome::Timeout) without touching the
    /// line.
    pub fn with_timeout_millis(&mut self, millis: u64) -> &mut Self {
        self.timeout_millis = millis;
        self
    }

    pub(crate) fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub(crate) fn symbol_delays(&self) -> (u32, u32) {
        (self.short_delay_micros, self.long_delay_micros)
    }

    pub(crate) fn preamble_bits(&self) -> u32 {
        self.preamble_bits
    }

    pub(crate) fn families(&self) -> (bool, bool) {
        (self.accept_thermo, self.accept_station)
    }

    pub(crate) fn timeout_millis(&self) -> u64 {
        self.timeout_millis
    }
}

impl Default for ReceiverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
