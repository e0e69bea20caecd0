use std::collections::VecDeque;

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Injectable randomness seam. The demand simulator's walk and the payment
/// step's Bernoulli trial both draw through this trait so tests can force
/// deterministic outcomes.
pub trait RandomSource: Send {
    /// Uniform draw in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Gaussian draw with the given mean and standard deviation.
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64;

    /// Uniform integer draw in `[low, high]`.
    fn pick_in(&mut self, low: u32, high: u32) -> u32;
}

/// Production source backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn uniform(&mut self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        match Normal::new(mean, std_dev) {
            Ok(dist) => dist.sample(&mut rand::thread_rng()),
            Err(_) => mean,
        }
    }

    fn pick_in(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Scripted source for tests: draws are served from queues, falling back to
/// neutral values (0.5, the mean, the low bound) once a queue runs dry.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    uniforms: VecDeque<f64>,
    gaussians: VecDeque<f64>,
    picks: VecDeque<u32>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uniforms(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.uniforms.extend(values);
        self
    }

    pub fn gaussians(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.gaussians.extend(values);
        self
    }

    pub fn picks(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.picks.extend(values);
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self) -> f64 {
        self.uniforms.pop_front().unwrap_or(0.5)
    }

    fn gaussian(&mut self, mean: f64, _std_dev: f64) -> f64 {
        self.gaussians.pop_front().unwrap_or(mean)
    }

    fn pick_in(&mut self, low: u32, high: u32) -> u32 {
        self.picks
            .pop_front()
            .map(|v| v.clamp(low, high))
            .unwrap_or(low)
    }
}
