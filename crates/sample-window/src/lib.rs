//! Bounded Sample Window
//!
//! Fixed-capacity FIFO history used to smooth noisy per-frame measurements.

mod window;

pub use window::{Sample, SampleWindow, DEFAULT_CAPACITY};
