//! Line sampling abstraction

/// Source of line levels and time
///
/// The receiver is a polled design: it recovers symbols by reading
/// the demodulated data line of an OOK receiver module at carefully
/// timed offsets. Everything it needs from the platform is expressed
/// by this trait:
///
/// 1. the current logic level of the data line; and
/// 2. a monotonic microsecond clock.
///
/// On embedded targets, implement `level()` as a GPIO read and
/// `now_micros()` from a free-running timer. The clock must be
/// monotonic for the lifetime of the sampler; wrapping timers should
/// be widened to `u64` by the implementation.
///
/// Obtaining the RF signal itself is beyond the scope of this crate.
/// Any superheterodyne 433 MHz receiver module with a digital data
/// output will do. Tests drive the receiver with a scripted
/// `LineSampler` instead of hardware.
pub trait LineSampler {
    /// Current logic level of the data line
    ///
    /// `true` is the high line level. For most receiver modules,
    /// high means "carrier present."
    fn level(&mut self) -> bool;

    /// Monotonic clock, in microseconds
    ///
    /// The origin is arbitrary; only differences are used.
    fn now_micros(&mut self) -> u64;

    /// Microseconds elapsed since `since`
    ///
    /// `since` must be a value previously obtained from
    /// [`now_micros()`](LineSampler::now_micros) on this sampler.
    fn elapsed_micros(&mut self, since: u64) -> u64 {
        self.now_micros().saturating_sub(since)
    }
}

impl<S> LineSampler for &mut S
where
    S: LineSampler + ?Sized,
{
    fn level(&mut self) -> bool {
        (**self).level()
    }

    fn now_micros(&mut self) -> u64 {
        (**self).now_micros()
    }
}
