use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform choice of an index in `0..pool`. Callers never pass an empty pool.
pub trait WinnerPicker: Send + Sync {
    fn pick(&self, pool: usize) -> usize;
}

/// Thread-local generator seeded from OS entropy.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngPicker;

impl WinnerPicker for ThreadRngPicker {
    fn pick(&self, pool: usize) -> usize {
        rand::thread_rng().gen_range(0..pool)
    }
}

/// Reproducible sequence of picks, for audits and demos.
#[derive(Debug)]
pub struct SeededPicker {
    rng: Mutex<StdRng>,
}

impl SeededPicker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl WinnerPicker for SeededPicker {
    fn pick(&self, pool: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..pool)
    }
}

pub fn picker_for_seed(seed: Option<u64>) -> Arc<dyn WinnerPicker> {
    match seed {
        Some(seed) => Arc::new(SeededPicker::new(seed)),
        None => Arc::new(ThreadRngPicker),
    }
}
