use crate::constants::HISTORY_CAPACITY;
use arrayvec::ArrayVec;

/// A fixed capacity ring of round-trip latency samples, in seconds.
///
/// Samples are appended at a cursor which wraps at [`HISTORY_CAPACITY`], so
/// once the ring is full each new sample silently replaces the oldest one.
///
/// Lost replies are recorded as `0.0`.
#[derive(Debug, Clone, Default)]
pub struct History {
    samples: ArrayVec<f64, HISTORY_CAPACITY>,
    cursor: usize,
}

impl History {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: ArrayVec::new_const(),
            cursor: 0,
        }
    }

    /// Record a sample at the cursor and advance it.
    pub fn push(&mut self, sample: f64) {
        if self.samples.is_full() {
            self.samples[self.cursor] = sample;
        } else {
            self.samples.push(sample);
        }
        self.cursor = (self.cursor + 1) % HISTORY_CAPACITY;
    }

    /// Discard all samples and rewind the cursor.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.cursor = 0;
    }

    /// The number of valid samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        HISTORY_CAPACITY
    }

    /// The slot the next sample will be written to.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// The valid samples in slot order (not insertion order once wrapped).
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// The valid samples which carry a positive latency.
    pub fn positive(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied().filter(|&sample| sample > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_below_capacity() {
        let mut history = History::new();
        history.push(0.1);
        history.push(0.0);
        history.push(0.3);
        assert_eq!(3, history.len());
        assert_eq!(3, history.cursor());
        assert_eq!(&[0.1, 0.0, 0.3], history.samples());
        assert_eq!(vec![0.1, 0.3], history.positive().collect::<Vec<_>>());
    }

    #[test]
    fn test_cursor_wraps_at_capacity() {
        let mut history = History::new();
        for _ in 0..HISTORY_CAPACITY {
            history.push(1.0);
        }
        assert_eq!(HISTORY_CAPACITY, history.len());
        assert_eq!(0, history.cursor());
    }

    #[test]
    fn test_overwrites_oldest_once_full() {
        let mut history = History::new();
        for i in 0..HISTORY_CAPACITY + 2 {
            history.push(i as f64);
        }
        assert_eq!(HISTORY_CAPACITY, history.len());
        assert_eq!(2, history.cursor());
        assert_eq!(1024.0, history.samples()[0]);
        assert_eq!(1025.0, history.samples()[1]);
        assert_eq!(2.0, history.samples()[2]);
        assert!(!history.samples().contains(&1.0));
    }

    #[test]
    fn test_clear() {
        let mut history = History::new();
        history.push(0.5);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(0, history.cursor());
        assert_eq!(HISTORY_CAPACITY, history.capacity());
    }
}
