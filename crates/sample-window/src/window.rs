//! Sample Window Implementation

use std::collections::VecDeque;

/// Default window capacity (5 samples = ~250ms at 20Hz)
pub const DEFAULT_CAPACITY: usize = 5;

/// A measurement that can be averaged
pub trait Sample: Copy {
    /// Additive identity
    fn zero() -> Self;
    /// Component-wise sum
    fn add(self, other: Self) -> Self;
    /// Component-wise scale
    fn scale(self, factor: f64) -> Self;
}

impl Sample for f64 {
    fn zero() -> Self {
        0.0
    }

    fn add(self, other: Self) -> Self {
        self + other
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }
}

impl Sample for (f64, f64) {
    fn zero() -> Self {
        (0.0, 0.0)
    }

    fn add(self, other: Self) -> Self {
        (self.0 + other.0, self.1 + other.1)
    }

    fn scale(self, factor: f64) -> Self {
        (self.0 * factor, self.1 * factor)
    }
}

/// Bounded FIFO window; the oldest sample is evicted once full
#[derive(Debug, Clone)]
pub struct SampleWindow<T> {
    /// Samples in insertion order (front = oldest)
    data: VecDeque<T>,
    /// Capacity of the window
    capacity: usize,
    /// Total samples pushed (for statistics)
    total_written: usize,
}

impl<T: Sample> SampleWindow<T> {
    /// Create a new window with given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    /// Create a window with default capacity (5 samples)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Push a sample, evicting the oldest when full
    pub fn push(&mut self, sample: T) {
        if self.data.len() >= self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(sample);
        self.total_written += 1;
    }

    /// Push a sample and return the mean of the window afterwards
    pub fn push_and_mean(&mut self, sample: T) -> T {
        self.push(sample);
        // Never empty right after a push
        self.mean().unwrap_or(sample)
    }

    /// Arithmetic mean of the current contents
    pub fn mean(&self) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        let sum = self.data.iter().fold(T::zero(), |acc, s| acc.add(*s));
        Some(sum.scale(1.0 / self.data.len() as f64))
    }

    /// Get the number of samples currently held
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if window is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if window is full
    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    /// Get the window capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate samples oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Get total samples ever pushed
    pub fn total_written(&self) -> usize {
        self.total_written
    }

    /// Clear the window
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl<T: Sample> Default for SampleWindow<T> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_and_mean() {
        let mut window = SampleWindow::new(5);
        assert_eq!(window.mean(), None);

        assert_eq!(window.push_and_mean(10.0), 10.0);
        assert_eq!(window.push_and_mean(20.0), 15.0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut window = SampleWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            window.push(v);
        }

        assert_eq!(window.len(), 3);
        assert!(window.is_full());
        assert_eq!(window.iter().copied().collect::<Vec<f64>>(), vec![3.0, 4.0, 5.0]);
        assert_eq!(window.mean(), Some(4.0));
        assert_eq!(window.total_written(), 5);
    }

    #[test]
    fn test_pair_mean() {
        let mut window = SampleWindow::with_default_capacity();
        window.push((0.0, 10.0));
        window.push((4.0, 20.0));
        assert_eq!(window.mean(), Some((2.0, 15.0)));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut window = SampleWindow::new(0);
        window.push(1.0);
        window.push(2.0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.mean(), Some(2.0));
    }

    #[test]
    fn test_clear() {
        let mut window = SampleWindow::new(4);
        window.push(1.0);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.mean(), None);
    }

    proptest! {
        #[test]
        fn mean_covers_only_last_five(values in proptest::collection::vec(-1000.0f64..1000.0, 1..40)) {
            let mut window = SampleWindow::new(5);
            let mut last = 0.0;
            for v in &values {
                last = window.push_and_mean(*v);
            }

            let tail = &values[values.len().saturating_sub(5)..];
            let expected = tail.iter().sum::<f64>() / tail.len() as f64;
            prop_assert!(window.len() <= 5);
            prop_assert!((last - expected).abs() < 1e-9);
        }
    }
}
