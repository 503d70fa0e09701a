//! Time units

pub use fugit::{
    HertzU32 as Hertz, KilohertzU32 as KiloHertz, MegahertzU32 as MegaHertz,
    MicrosDurationU32 as MicroSeconds, MillisDurationU32 as MilliSeconds,
};

/// Rough core cycles spent per iteration of a register poll loop.
///
/// The busy-wait loops in this crate are bounded by iteration counts, not by
/// a timer (the chip has none to spare). This constant is the conversion
/// factor between wall-clock time and loop iterations: a register read, a
/// flag test and the loop branch.
const CYCLES_PER_POLL: u32 = 16;

/// Convert a wall-clock timeout into a poll-loop iteration budget.
///
/// `clk` is the core clock. The result is suitable for
/// [`crate::i2c::Config::timeout_iters`]. Saturates instead of overflowing
/// for large timeouts, and always allows at least one iteration.
pub fn poll_budget(clk: Hertz, timeout: MicroSeconds) -> u32 {
    let cycles = (u64::from(clk.raw()) * u64::from(timeout.ticks())) / 1_000_000;
    let iters = cycles / u64::from(CYCLES_PER_POLL);
    iters.clamp(1, u64::from(u32::MAX)) as u32
}
