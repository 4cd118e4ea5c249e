//! Bounded rolling window of bars.
//!
//! Bars are kept in strictly increasing timestamp order. A pushed bar that is
//! not newer than the tail replaces it. Once the window holds `capacity` bars
//! the oldest is evicted on every push.

use crate::domain::ohlcv::Bar;

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct BarWindow {
    bars: Vec<Bar>,
    capacity: usize,
}

impl BarWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bars: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Replace the contents with the most recent `capacity` bars of `bars`.
    pub fn reset(&mut self, bars: Vec<Bar>) {
        self.bars = bars;
        self.evict();
    }

    pub fn push(&mut self, bar: Bar) {
        match self.bars.last_mut() {
            Some(tail) if bar.timestamp <= tail.timestamp => {
                let timestamp = tail.timestamp;
                *tail = Bar { timestamp, ..bar };
            }
            _ => {
                self.bars.push(bar);
                self.evict();
            }
        }
    }

    fn evict(&mut self) {
        if self.bars.len() > self.capacity {
            let excess = self.bars.len() - self.capacity;
            self.bars.drain(..excess);
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BarWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
