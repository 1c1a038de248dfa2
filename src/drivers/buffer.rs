use std::collections::VecDeque;
use crate::drivers::error::{Result, SamplerError};
/// Copy of every channel window, oldest sample first.
#[derive(Clone, Debug, PartialEq)]
pub struct HistorySnapshot {
    pub frequency_hz: f64,
    pub samples: Vec<Vec<f64>>, // channels x history_depth
}
impl HistorySnapshot {
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }
    pub fn depth(&self) -> usize {
        self.samples.first().map(|c| c.len()).unwrap_or(0)
    }
    pub fn duration_seconds(&self) -> f64 {
        self.depth() as f64 / self.frequency_hz
    }
    pub fn channel(&self, index: usize) -> Option<&[f64]> {
        self.samples.get(index).map(Vec::as_slice)
    }
}
/// Fixed-length sliding window per channel.
///
/// Windows are zero-filled at construction and never change length: each
/// pushed frame evicts the oldest value of every channel.
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    per_channel: Vec<VecDeque<f64>>, // channel -> samples
    frequency_hz: f64,
    depth: usize,
}
impl HistoryBuffer {
    pub fn zeroed(channel_count: usize, depth: usize, frequency_hz: f64) -> Self {
        let per_channel = (0..channel_count)
            .map(|_| std::iter::repeat(0.0).take(depth).collect())
            .collect();
        Self {
            per_channel,
            frequency_hz,
            depth,
        }
    }
    pub fn depth(&self) -> usize {
        self.depth
    }
    pub fn num_channels(&self) -> usize {
        self.per_channel.len()
    }
    pub fn push_frame(&mut self, frame: &[f64]) -> Result<()> {
        if frame.len() != self.per_channel.len() {
            return Err(SamplerError::ChannelMismatch {
                expected: self.per_channel.len(),
                actual: frame.len(),
            });
        }
        if self.depth == 0 {
            return Ok(());
        }
        for (window, &value) in self.per_channel.iter_mut().zip(frame) {
            window.pop_front();
            window.push_back(value);
        }
        Ok(())
    }
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            frequency_hz: self.frequency_hz,
            samples: self
                .per_channel
                .iter()
                .map(|window| window.iter().copied().collect())
                .collect(),
        }
    }
}
