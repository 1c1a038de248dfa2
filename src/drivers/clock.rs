use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use crate::drivers::error::{Result, SamplerError};
/// Strictly periodic deadline generator.
///
/// Deadlines are `baseline + n * period`. Each wait advances the deadline by
/// exactly one period, so a late wake-up never shifts the ticks after it.
#[derive(Clone, Debug)]
pub struct Scheduler {
    period: Duration,
    baseline: Instant,
    next_deadline: Instant,
}
impl Scheduler {
    pub fn new(period: Duration) -> Self {
        let baseline = Instant::now();
        Self {
            period,
            baseline,
            next_deadline: baseline + period,
        }
    }
    /// Re-anchor the baseline at "now"; the first deadline is one period away.
    pub fn reset(&mut self) {
        self.baseline = Instant::now();
        self.next_deadline = self.baseline + self.period;
    }
    pub fn period(&self) -> Duration {
        self.period
    }
    pub fn baseline(&self) -> Instant {
        self.baseline
    }
    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }
    pub fn elapsed(&self) -> Duration {
        self.baseline.elapsed()
    }
    /// Block until the next deadline with a tight poll, then advance it.
    ///
    /// The poll does not sleep: OS sleep granularity is far coarser than a
    /// 1 kHz period. `cancel` is checked before and during the wait; a
    /// cancelled wait leaves the deadline untouched.
    pub fn tick(&mut self, cancel: &AtomicBool) -> Result<()> {
        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(SamplerError::Cancelled);
            }
            if Instant::now() >= self.next_deadline {
                break;
            }
            std::hint::spin_loop();
        }
        self.next_deadline += self.period;
        Ok(())
    }
    /// True when "now" is already past the deadline after the one just served.
    pub fn is_behind(&self) -> bool {
        Instant::now() > self.next_deadline
    }
}
