//! Fixed-capacity numeric buffers fed by `MB` / `BK` samples
//!
//! Each channel keeps two parallel buffers of the same capacity:
//!
//! - `live` - mutated in place by every incoming sample
//! - `original` - the untouched baseline used to compute gain/offset
//!   display transforms without compounding them
//!
//! Addresses outside `[0, capacity)` are never written; the decoder turns
//! them into an end-of-stream signal before they reach a buffer.

use crate::config::BufferConfig;
use crate::types::Channel;

/// Fixed-capacity ordered sequence of floats
#[derive(Debug, Clone, PartialEq)]
pub struct NumericBuffer {
    data: Vec<f64>,
}

impl NumericBuffer {
    /// Create a zero-filled buffer
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Write a value; returns false if the address is out of range
    pub fn set(&mut self, address: usize, value: f64) -> bool {
        match self.data.get_mut(address) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, address: usize) -> Option<f64> {
        self.data.get(address).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Reset every slot to zero
    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Gain and offset applied to one display segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentScale {
    pub gain: f64,
    pub offset: f64,
}

impl Default for SegmentScale {
    fn default() -> Self {
        Self {
            gain: 1.0,
            offset: 0.0,
        }
    }
}

impl SegmentScale {
    pub fn new(gain: f64, offset: f64) -> Self {
        Self { gain, offset }
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        value * self.gain + self.offset
    }
}

/// Live and baseline buffers for one channel
#[derive(Debug, Clone)]
pub struct ChannelBuffers {
    channel: Channel,
    live: NumericBuffer,
    original: NumericBuffer,
    samples_since_end: usize,
}

impl ChannelBuffers {
    pub fn new(channel: Channel, capacity: usize) -> Self {
        Self {
            channel,
            live: NumericBuffer::new(capacity),
            original: NumericBuffer::new(capacity),
            samples_since_end: 0,
        }
    }

    /// Create both channels sized from the config, indexed by [`Channel::index`]
    pub fn pair_from_config(config: &BufferConfig) -> [ChannelBuffers; 2] {
        [
            ChannelBuffers::new(Channel::Primary, config.primary_capacity),
            ChannelBuffers::new(Channel::Secondary, config.secondary_capacity),
        ]
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn capacity(&self) -> usize {
        self.live.capacity()
    }

    /// Store a sample in both the live and original buffers
    pub fn apply_sample(&mut self, address: usize, value: f64) -> bool {
        let stored = self.live.set(address, value) && self.original.set(address, value);
        if stored {
            self.samples_since_end += 1;
        } else {
            tracing::warn!(
                "{} sample address {} outside capacity {}",
                self.channel,
                address,
                self.capacity()
            );
        }
        stored
    }

    /// Mark the end of a streamed buffer, returning how many samples it carried
    pub fn finish_stream(&mut self) -> usize {
        std::mem::take(&mut self.samples_since_end)
    }

    pub fn live(&self) -> &NumericBuffer {
        &self.live
    }

    pub fn original(&self) -> &NumericBuffer {
        &self.original
    }

    /// Display copy of the baseline with per-segment gain/offset applied
    ///
    /// Segment `i` covers `[i * points_per_segment, (i + 1) * points_per_segment)`.
    /// Values past the last scaled segment are copied unchanged.
    pub fn transformed(&self, scales: &[SegmentScale], points_per_segment: usize) -> Vec<f64> {
        let mut out = self.original.as_slice().to_vec();
        if points_per_segment == 0 {
            return out;
        }

        for (chunk, scale) in out.chunks_mut(points_per_segment).zip(scales) {
            for value in chunk.iter_mut() {
                *value = scale.apply(*value);
            }
        }
        out
    }

    /// Zero both buffers
    pub fn clear(&mut self) {
        self.live.clear();
        self.original.clear();
        self.samples_since_end = 0;
    }
}
