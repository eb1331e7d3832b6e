use std::collections::VecDeque;

use crate::measurement::Measurement;

/// Fixed size history of measurements, oldest first. Once full, every push
/// drops the oldest entry.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Measurement>,
    capacity: usize,
}

impl SampleBuffer {
    /// `capacity` must not be zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, mea: Measurement) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(mea);
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.samples.iter()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Measurement> {
        self.samples.iter().cloned().collect()
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::frame::{blank_frame, Frame};

    fn sample(range_bar: u8) -> Measurement {
        let mut mea = Measurement::from_frame(&Frame::new(blank_frame()));
        mea.range_bar = range_bar;
        mea
    }

    #[test]
    fn empty_buffer() {
        let buffer = SampleBuffer::new(3);
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn evicts_oldest() {
        let mut buffer = SampleBuffer::new(3);
        for i in 0..8 {
            buffer.push(sample(i));
        }
        assert_eq!(buffer.len(), 3);
        let bars: Vec<u8> = buffer.snapshot().iter().map(|m| m.range_bar).collect();
        assert_eq!(bars, vec![5, 6, 7]);
        assert_eq!(buffer.latest().map(|m| m.range_bar), Some(7));
    }

    #[test]
    fn below_capacity_keeps_all() {
        let mut buffer = SampleBuffer::new(10);
        buffer.push(sample(1));
        buffer.push(sample(2));
        let bars: Vec<u8> = buffer.iter().map(|m| m.range_bar).collect();
        assert_eq!(bars, vec![1, 2]);
    }

    #[test]
    fn default_capacity() {
        assert_eq!(SampleBuffer::default().capacity(), 1000);
    }
}
