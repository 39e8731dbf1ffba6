use std::time::Duration;

use rand::Rng;

/// Delay before the next probe cycle: `interval` stretched by a random share
/// of up to `jitter_percent` percent, so probes of many gates drift apart.
pub(crate) fn next_cycle_in(interval: Duration, jitter_percent: u32) -> Duration {
    if jitter_percent == 0 || interval.is_zero() {
        return interval;
    }
    let spread = f64::from(jitter_percent.min(100)) / 100.0;
    let stretch: f64 = rand::rng().random_range(0.0..spread);
    interval + interval.mul_f64(stretch)
}
