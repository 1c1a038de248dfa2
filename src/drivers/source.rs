use std::collections::VecDeque;
use std::f64::consts::TAU;
use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
/// Anything that can hand over one calibrated multi-channel sample on demand.
///
/// Called once per tick from the sampling thread, with the session lock held.
/// Implementations must return quickly; a slow provider stalls the cadence.
pub trait SampleProvider: Send {
    fn next_sample(&mut self) -> Result<Vec<f64>>;
}
impl<F> SampleProvider for F
where
    F: FnMut() -> Result<Vec<f64>> + Send,
{
    fn next_sample(&mut self) -> Result<Vec<f64>> {
        self()
    }
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<Vec<f64>>,
    looping: bool,
}
impl ManualSource {
    pub fn new(frames: impl IntoIterator<Item = Vec<f64>>) -> Self {
        Self {
            queue: frames.into_iter().collect(),
            looping: false,
        }
    }
    /// Replay the frames forever instead of running dry.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}
impl SampleProvider for ManualSource {
    fn next_sample(&mut self) -> Result<Vec<f64>> {
        let frame = self
            .queue
            .pop_front()
            .ok_or_else(|| anyhow!("manual source exhausted"))?;
        if self.looping {
            self.queue.push_back(frame.clone());
        }
        Ok(frame)
    }
}
/// Synthetic biosignal: one sine per channel (10 Hz plus 0.5 Hz per channel
/// index) with uniform noise on top.
pub struct SimulatedSource {
    channel_count: usize,
    sample_rate_hz: f64,
    amplitude: f64,
    noise: f64,
    sample_index: u64,
    rng: StdRng,
}
impl SimulatedSource {
    pub fn new(channel_count: usize, sample_rate_hz: f64, amplitude: f64, noise: f64, seed: u64) -> Self {
        Self {
            channel_count,
            sample_rate_hz,
            amplitude,
            noise: noise.abs(),
            sample_index: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}
impl SampleProvider for SimulatedSource {
    fn next_sample(&mut self) -> Result<Vec<f64>> {
        let t = self.sample_index as f64 / self.sample_rate_hz;
        self.sample_index += 1;
        let frame = (0..self.channel_count)
            .map(|ch| {
                let freq = 10.0 + ch as f64 * 0.5;
                let jitter = if self.noise > 0.0 {
                    self.rng.gen_range(-self.noise..=self.noise)
                } else {
                    0.0
                };
                self.amplitude * (TAU * freq * t).sin() + jitter
            })
            .collect();
        Ok(frame)
    }
}
