use std::f64::consts::PI;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

/// Linear warmup followed by cosine decay, as a multiplicative factor on the
/// base learning rate.
///
/// The factor is a pure function of the optimizer step `x`:
/// - warmup (`x <= warmup_steps`): ramps linearly from `warmup_factor` to 1;
/// - afterwards: cosine from 1 down to `end_factor` at `total_steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupCosine {
    pub warmup_steps: usize,
    pub total_steps: usize,
    pub warmup_factor: f64,
    pub end_factor: f64,
}

impl WarmupCosine {
    pub const DEFAULT_WARMUP_FACTOR: f64 = 1e-3;
    pub const DEFAULT_END_FACTOR: f64 = 1e-6;

    /// Builds the schedule from epoch counts. `warmup_epochs` is ignored when
    /// `warmup` is false.
    pub fn new(steps_per_epoch: usize, epochs: usize, warmup: bool, warmup_epochs: usize) -> Result<Self> {
        if steps_per_epoch == 0 || epochs == 0 {
            return Err(Error::invalid_config(format!(
                "scheduler needs steps_per_epoch > 0 and epochs > 0 (got {} and {})",
                steps_per_epoch, epochs
            )));
        }
        let warmup_epochs = if warmup { warmup_epochs } else { 0 };
        if warmup_epochs >= epochs {
            return Err(Error::invalid_config(format!(
                "warmup_epochs ({}) must be smaller than epochs ({})",
                warmup_epochs, epochs
            )));
        }
        Ok(WarmupCosine {
            warmup_steps: warmup_epochs * steps_per_epoch,
            total_steps: epochs * steps_per_epoch,
            warmup_factor: Self::DEFAULT_WARMUP_FACTOR,
            end_factor: Self::DEFAULT_END_FACTOR,
        })
    }

    pub fn with_factors(mut self, warmup_factor: f64, end_factor: f64) -> Self {
        self.warmup_factor = warmup_factor;
        self.end_factor = end_factor;
        self
    }

    pub fn factor(&self, x: usize) -> f64 {
        if self.warmup_steps > 0 && x <= self.warmup_steps {
            let alpha = x as f64 / self.warmup_steps as f64;
            self.warmup_factor * (1.0 - alpha) + alpha
        } else {
            let current = (x - self.warmup_steps) as f64;
            let cosine_steps = (self.total_steps - self.warmup_steps) as f64;
            ((1.0 + (current * PI / cosine_steps).cos()) / 2.0) * (1.0 - self.end_factor) + self.end_factor
        }
    }
}

/// Stateful wrapper: base learning rate plus a step counter.
///
/// `lr()` is the rate for the upcoming optimizer step; call `step()` once
/// after every optimizer update.
#[derive(Debug, Clone)]
pub struct LrScheduler {
    base_lr: f64,
    schedule: WarmupCosine,
    step: usize,
}

impl LrScheduler {
    pub fn new(base_lr: f64, schedule: WarmupCosine) -> Self {
        LrScheduler { base_lr, schedule, step: 0 }
    }

    pub fn lr(&self) -> f64 {
        self.base_lr * self.schedule.factor(self.step)
    }

    pub fn step(&mut self) {
        self.step += 1;
    }

    pub fn current_step(&self) -> usize {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn boundary_factors() {
        let s = WarmupCosine::new(10, 20, true, 5).unwrap();
        assert_relative_eq!(s.factor(0), 1e-3);
        assert_relative_eq!(s.factor(s.warmup_steps), 1.0);
        assert_relative_eq!(s.factor(s.total_steps), 1e-6, epsilon = 1e-12);
    }

    #[test]
    fn warmup_is_linear_and_decay_is_monotone() {
        let s = WarmupCosine::new(4, 10, true, 2).unwrap();
        let mid = s.factor(4);
        assert_relative_eq!(mid, 1e-3 * 0.5 + 0.5);
        let decay: Vec<f64> = (s.warmup_steps..=s.total_steps).map(|x| s.factor(x)).collect();
        assert!(decay.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn without_warmup_starts_at_one() {
        let s = WarmupCosine::new(3, 5, false, 2).unwrap();
        assert_eq!(s.warmup_steps, 0);
        assert_relative_eq!(s.factor(0), 1.0);
    }

    #[test]
    fn custom_factors_bound_the_schedule() {
        let s = WarmupCosine::new(2, 6, true, 1).unwrap().with_factors(0.1, 0.01);
        assert_relative_eq!(s.factor(0), 0.1);
        assert_relative_eq!(s.factor(s.total_steps), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn rejects_degenerate_schedules() {
        assert!(WarmupCosine::new(0, 5, true, 1).is_err());
        assert!(WarmupCosine::new(5, 3, true, 3).is_err());
    }

    #[test]
    fn stateful_scheduler_advances_per_step() {
        let mut sched = LrScheduler::new(0.1, WarmupCosine::new(2, 4, true, 1).unwrap());
        assert_relative_eq!(sched.lr(), 0.1 * 1e-3);
        sched.step();
        sched.step();
        assert_eq!(sched.current_step(), 2);
        assert_relative_eq!(sched.lr(), 0.1);
    }
}
