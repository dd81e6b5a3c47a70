//! Session controller

#[cfg(not(test))]
use log::{debug, info, warn};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;
#[cfg(test)]
use std::println as warn;

use crate::builder::ReceiverBuilder;
use crate::framing::{FrameAccumulator, HeaderSync, RawFrame, SyncOut};
use crate::manchester::{BitRecovery, Polarity, SymbolError};
use crate::message::{DecodeErr, Reading};
use crate::sampler::LineSampler;

/// Result of one blocking decode call
///
/// Exactly one of these is returned by
/// [`decode_once()`](SensorReceiver::decode_once). Receive attempts
/// that fail mid-flight (waveform violations, broken preambles,
/// rejected frames) are retried internally and never surface here
/// while deadline remains.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A frame was captured, validated, and decoded
    Reading(Reading),

    /// The deadline expired; the last completed frame was rejected
    ///
    /// At least one frame of plausible shape was captured during the
    /// call, but its integrity or range checks failed and no time
    /// remained to receive another.
    Error(DecodeErr),

    /// The deadline expired without capturing any frame
    Timeout,
}

impl Outcome {
    /// Decoded reading, if any
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            Outcome::Reading(r) => Some(r),
            _ => None,
        }
    }

    /// Consume the outcome, returning the reading, if any
    pub fn into_reading(self) -> Option<Reading> {
        match self {
            Outcome::Reading(r) => Some(r),
            _ => None,
        }
    }

    /// True if the deadline expired without an accepted frame
    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::Timeout)
    }
}

impl AsRef<str> for Outcome {
    fn as_ref(&self) -> &str {
        match self {
            Outcome::Reading(_) => "reading",
            Outcome::Error(_) => "decode error",
            Outcome::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Reading(r) => write!(f, "{}: {}", self.as_ref(), r),
            Outcome::Error(e) => write!(f, "{}: {}", self.as_ref(), e),
            Outcome::Timeout => write!(f, "{}", self.as_ref()),
        }
    }
}

/// Session counters
///
/// Lifetime tallies for one receiver instance. Only successful
/// header and frame events increment them; they survive across
/// decode calls and reset only with
/// [`reset()`](SensorReceiver::reset).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Qualifying preamble runs detected
    pub headers_found: u64,

    /// Thermo-hygrometer frames accepted
    pub thermo_accepted: u64,

    /// Weather-station frames accepted
    pub station_accepted: u64,
}

// Controller phase within one decode call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    // hunting for a preamble
    Searching,

    // preamble locked; capturing frame bits
    Receiving,

    // frame complete; running its decoder
    Decoding,

    // outcome determined
    Done,
}

// One receive attempt, from preamble search to a complete frame
enum Attempt {
    // a complete raw frame was captured
    Frame(RawFrame),

    // preamble broke or the waveform violated Manchester timing
    Failed,

    // the session deadline passed while polling
    OutOfTime,
}

/// A complete sensor receiver session
///
/// Owns the line sampler and all per-session state: the family
/// filter, the decode deadline, the message sequence, and the
/// [`Counters`]. One blocking [`decode_once()`](Self::decode_once)
/// call runs receive attempts (bit recovery, preamble sync, frame
/// capture, decode) until a frame is accepted or the deadline
/// expires.
///
/// The receiver is strictly single-threaded: it busy-polls the line
/// and must not be shared. For concurrent reception on several
/// radios, give each its own receiver and sampler.
///
/// ```
/// use wxrack::{Outcome, ReceiverBuilder};
///
/// # struct DeadLine;
/// # impl wxrack::LineSampler for DeadLine {
/// #     fn level(&mut self) -> bool { false }
/// #     fn now_micros(&mut self) -> u64 { 0 }
/// # }
/// # let my_line_sampler = DeadLine;
/// let mut rx = ReceiverBuilder::new()
///     .with_families(true, true) // thermo-hygrometer and station
///     .with_timeout_millis(0)
///     .build(my_line_sampler);
///
/// match rx.decode_once() {
///     Outcome::Reading(reading) => println!("{}", reading),
///     Outcome::Error(err) => println!("bad frame: {}", err),
///     Outcome::Timeout => println!("nothing heard"),
/// }
/// ```
#[derive(Clone, Debug)]
pub struct SensorReceiver<S> {
    line: S,

    // session configuration
    polarity: Polarity,
    short_delay: u32,
    long_delay: u32,
    preamble_bits: u32,
    accept_thermo: bool,
    accept_station: bool,
    timeout_millis: u64,

    // session state
    counters: Counters,
    sequence: u32,
    state: State,
}

impl<S> SensorReceiver<S>
where
    S: LineSampler,
{
    /// Run one blocking decode under the session deadline
    ///
    /// Drives receive attempts back to back: each attempt starts from
    /// preamble search with fresh recovery state, and ends with a
    /// complete frame, a mid-flight failure, or deadline expiry. The
    /// deadline is checked between attempts only; a started frame is
    /// either captured whole or abandoned by its own failure.
    ///
    /// Returns exactly one [`Outcome`]. Decoded readings are stamped
    /// with the next message sequence number.
    pub fn decode_once(&mut self) -> Outcome {
        let deadline = self
            .line
            .now_micros()
            .saturating_add(self.timeout_millis.saturating_mul(1000));

        // rejection carried out of the most recent completed frame
        let mut last_rejection: Option<DecodeErr> = None;

        loop {
            self.set_state(State::Searching);
            if self.line.now_micros() >= deadline {
                self.set_state(State::Done);
                let out = match last_rejection {
                    Some(err) => Outcome::Error(err),
                    None => Outcome::Timeout,
                };
                info!("receiver: {}", out);
                return out;
            }

            match self.attempt(deadline) {
                Attempt::Frame(frame) => {
                    self.set_state(State::Decoding);
                    match Reading::from_frame(&frame) {
                        Ok(reading) if self.accepts(&reading) => {
                            self.set_state(State::Done);
                            return Outcome::Reading(self.accept(reading));
                        }
                        Ok(reading) => {
                            debug!("receiver: family disabled, discarding: {}", reading);
                            last_rejection = Some(DecodeErr::UnrecognizedFamily(frame[1]));
                        }
                        Err(err) => {
                            warn!("receiver: frame rejected: {}", err);
                            last_rejection = Some(err);
                        }
                    }
                }
                Attempt::Failed => {}
                Attempt::OutOfTime => {}
            }
        }
    }

    /// Read-only snapshot of the session counters
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Clear counters and the message sequence
    ///
    /// Configuration is untouched. Decode calls hold no other state
    /// across attempts, so there is nothing else to clear.
    pub fn reset(&mut self) {
        self.counters = Counters::default();
        self.sequence = 0;
        self.state = State::Searching;
    }

    /// Change the decode deadline for subsequent calls
    pub fn set_timeout_millis(&mut self, millis: u64) {
        self.timeout_millis = millis;
    }

    /// Accept or reject thermo-hygrometer frames in subsequent calls
    pub fn set_read_thermo(&mut self, accept: bool) {
        self.accept_thermo = accept;
    }

    /// Accept or reject weather-station frames in subsequent calls
    pub fn set_read_station(&mut self, accept: bool) {
        self.accept_station = accept;
    }

    // One receive attempt with fresh per-attempt state
    fn attempt(&mut self, deadline: u64) -> Attempt {
        let mut recovery = BitRecovery::new(self.polarity, self.short_delay, self.long_delay);
        let mut sync = HeaderSync::new(self.preamble_bits);
        let mut accumulator = FrameAccumulator::new();

        loop {
            let bit = match recovery.next_bit(&mut self.line, deadline) {
                Ok(bit) => bit,
                Err(SymbolError::Waveform) => {
                    debug!("receiver: waveform violation, attempt abandoned");
                    return Attempt::Failed;
                }
                Err(SymbolError::Deadline) => return Attempt::OutOfTime,
            };

            match sync.input(bit) {
                SyncOut::Searching | SyncOut::Synced => {}
                SyncOut::HeaderFound => {
                    self.counters.headers_found += 1;
                    self.set_state(State::Receiving);
                }
                SyncOut::Data(bit) => {
                    if accumulator.push(bit) {
                        return Attempt::Frame(accumulator.into_frame());
                    }
                }
                SyncOut::Desync => {
                    debug!("receiver: preamble broke, attempt abandoned");
                    return Attempt::Failed;
                }
            }
        }
    }

    fn set_state(&mut self, state: State) {
        if state != self.state {
            debug!("receiver: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn accepts(&self, reading: &Reading) -> bool {
        match reading {
            Reading::ThermoHygrometer(_) => self.accept_thermo,
            Reading::WeatherStation(_) => self.accept_station,
        }
    }

    // Stamp and tally an accepted reading
    fn accept(&mut self, mut reading: Reading) -> Reading {
        self.sequence += 1;
        reading.set_sequence(self.sequence);
        match &reading {
            Reading::ThermoHygrometer(_) => self.counters.thermo_accepted += 1,
            Reading::WeatherStation(_) => self.counters.station_accepted += 1,
        }
        info!("receiver: accepted: {}", reading);
        reading
    }
}

impl<S> SensorReceiver<S> {
    pub(crate) fn from_builder(cfg: &ReceiverBuilder, line: S) -> Self {
        let (short_delay, long_delay) = cfg.symbol_delays();
        let (accept_thermo, accept_station) = cfg.families();

        Self {
            line,
            polarity: cfg.polarity(),
            short_delay,
            long_delay,
            preamble_bits: cfg.preamble_bits(),
            accept_thermo,
            accept_station,
            timeout_millis: cfg.timeout_millis(),
            counters: Counters::default(),
            sequence: 0,
            state: State::Searching,
        }
    }

    /// Give back the line sampler, consuming the receiver
    pub fn into_line(self) -> S {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    use crate::waveform::{frame_bits, frame_line, transmission_segments, SimLine};
    use crate::Battery;

    const THERMO_FRAME: &[u8] = &[0xFD, 0x45, 0x4F, 0x04, 0x4B, 0x0B, 0x52];
    const STATION_FRAME: &[u8] = &[
        0xFD, 0x4C, 0x5A, 0x41, 0x72, 0x10, 0xE0, 0x12, 0x30, 0x44, 0xB3, 0x71, 0x23, 0x40, 0x30,
        0xD0,
    ];

    // preamble ones per transmission; the recovery engine picks up
    // the first of them while acquiring its transition sense
    const PREAMBLE_ONES: usize = 9;

    fn line_with(frames: &[&[u8]]) -> SimLine {
        let mut segments = vec![];
        for frame in frames {
            segments.extend(transmission_segments(
                &frame_bits(frame, PREAMBLE_ONES),
                Polarity::default(),
            ));
        }
        SimLine::new(&segments)
    }

    fn receiver(line: SimLine, timeout_millis: u64) -> SensorReceiver<SimLine> {
        ReceiverBuilder::new()
            .with_timeout_millis(timeout_millis)
            .build(line)
    }

    #[test]
    fn test_decode_thermo_end_to_end() {
        let mut rx = receiver(line_with(&[THERMO_FRAME]), 2000);

        let reading = match rx.decode_once() {
            Outcome::Reading(Reading::ThermoHygrometer(r)) => r,
            other => panic!("expected thermo reading, got {:?}", other),
        };

        assert_eq!(1, reading.channel);
        assert_eq!(11, reading.humidity);
        assert_eq!(Battery::Ok, reading.battery);
        assert_eq!(1, reading.sequence);
        assert_approx_eq!(21.1, reading.temperature_c(), 0.06);

        let counters = rx.counters();
        assert_eq!(1, counters.headers_found);
        assert_eq!(1, counters.thermo_accepted);
        assert_eq!(0, counters.station_accepted);
    }

    #[test]
    fn test_decode_station_end_to_end() {
        let mut rx = receiver(line_with(&[STATION_FRAME]), 2000);

        let reading = match rx.decode_once() {
            Outcome::Reading(Reading::WeatherStation(r)) => r,
            other => panic!("expected station reading, got {:?}", other),
        };

        assert_eq!(23, reading.wind_avg);
        assert_eq!(33, reading.wind_gust);
        assert_eq!(270, reading.wind_direction);
        assert_eq!(291, reading.rain);
        assert_eq!(55, reading.humidity);
        assert_eq!(3, reading.uv);
        assert_approx_eq!(21.1, reading.temperature_c(), 0.06);

        let counters = rx.counters();
        assert_eq!(1, counters.headers_found);
        assert_eq!(1, counters.station_accepted);
    }

    #[test]
    fn test_zero_deadline_times_out() {
        let mut rx = receiver(line_with(&[THERMO_FRAME]), 0);

        assert!(rx.decode_once().is_timeout());
        assert_eq!(Counters::default(), rx.counters());
    }

    #[test]
    fn test_dead_line_times_out() {
        let mut rx = receiver(SimLine::new(&[(10_000_000, false)]), 50);

        assert_eq!(Outcome::Timeout, rx.decode_once());
    }

    #[test]
    fn test_glitch_then_clean_frame() {
        // impulse noise ruins the first attempt; the retry decodes
        let mut segments = vec![(2000, false), (100, true), (400, false), (150, true)];
        segments.extend(transmission_segments(
            &frame_bits(THERMO_FRAME, PREAMBLE_ONES),
            Polarity::default(),
        ));
        let mut rx = receiver(SimLine::new(&segments), 2000);

        assert!(rx.decode_once().reading().is_some());
    }

    #[test]
    fn test_bad_checksum_reported_at_deadline() {
        let mut corrupt = THERMO_FRAME.to_vec();
        corrupt[4] ^= 0x08;
        let mut rx = receiver(line_with(&[corrupt.as_slice()]), 250);

        assert_eq!(
            Outcome::Error(DecodeErr::ChecksumMismatch),
            rx.decode_once()
        );
        assert_eq!(1, rx.counters().headers_found);
        assert_eq!(0, rx.counters().thermo_accepted);
    }

    #[test]
    fn test_short_preamble_never_syncs() {
        // one transmitted one short of the nine-bit threshold: the
        // sync zero lands early and every attempt desyncs
        let mut rx = receiver(line_with_preamble(8), 150);

        assert_eq!(Outcome::Timeout, rx.decode_once());
        assert_eq!(0, rx.counters().headers_found);
    }

    #[test]
    fn test_boundary_preamble_syncs() {
        // exactly the nine-bit threshold locks and captures
        let mut rx = receiver(line_with_preamble(9), 2000);

        assert!(rx.decode_once().reading().is_some());
        assert_eq!(1, rx.counters().headers_found);
    }

    fn line_with_preamble(ones: usize) -> SimLine {
        frame_line(THERMO_FRAME, ones, Polarity::default())
    }

    #[test]
    fn test_sequence_and_counters_accumulate() {
        let mut rx = receiver(line_with(&[THERMO_FRAME, STATION_FRAME]), 2000);

        let first = rx.decode_once().into_reading().expect("first reading");
        let second = rx.decode_once().into_reading().expect("second reading");

        assert_eq!(1, first.sequence());
        assert_eq!(2, second.sequence());

        let counters = rx.counters();
        assert_eq!(1, counters.thermo_accepted);
        assert_eq!(1, counters.station_accepted);
        assert_eq!(2, counters.headers_found);
    }

    #[test]
    fn test_disabled_family_is_discarded() {
        let line = line_with(&[THERMO_FRAME]);
        let mut rx = ReceiverBuilder::new()
            .with_families(false, true)
            .with_timeout_millis(250)
            .build(line);

        assert_eq!(
            Outcome::Error(DecodeErr::UnrecognizedFamily(0x45)),
            rx.decode_once()
        );
        assert_eq!(0, rx.counters().thermo_accepted);
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut rx = receiver(line_with(&[THERMO_FRAME]), 2000);

        assert!(rx.decode_once().reading().is_some());
        rx.reset();
        assert_eq!(Counters::default(), rx.counters());
    }
}
