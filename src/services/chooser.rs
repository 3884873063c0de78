//! Injectable randomness for canned-phrase and CTA-variant rotation.
//!
//! Production code draws from the OS; tests inject a fixed chooser so
//! assertions stay deterministic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Random source used for phrase selection and CTA frequency draws.
pub trait Chooser: Send + Sync {
    /// Picks an index in `0..len`. Returns 0 for empty collections.
    fn pick(&self, len: usize) -> usize;

    /// Draws a uniform value in `[0, 1)`.
    fn roll(&self) -> f32;
}

/// OS-seeded chooser.
pub struct RandomChooser {
    rng: Mutex<StdRng>,
}

impl RandomChooser {
    /// Creates a chooser seeded from the OS.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Creates a chooser with a fixed seed (reproducible runs).
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomChooser {
    fn default() -> Self {
        Self::new()
    }
}

impl Chooser for RandomChooser {
    fn pick(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng
            .lock()
            .map(|mut rng| rng.random_range(0..len))
            .unwrap_or(0)
    }

    fn roll(&self) -> f32 {
        self.rng
            .lock()
            .map(|mut rng| rng.random::<f32>())
            .unwrap_or(0.0)
    }
}

/// Fixed chooser for tests: always picks index 0 and rolls 0.0.
pub struct FixedChooser;

impl Chooser for FixedChooser {
    fn pick(&self, _len: usize) -> usize {
        0
    }

    fn roll(&self) -> f32 {
        0.0
    }
}
