//! Linear warmup / linear decay learning-rate schedule.
//!
//! The rate climbs from 0 to `base_lr` over `warmup_steps`, then falls
//! linearly to 0 at `total_steps`:
//!
//! ```text
//! t <  warmup:  lr = base * t / warmup
//! t >= warmup:  lr = base * max(0, (total - t) / (total - warmup))
//! ```
//!
//! With no warmup the first optimizer step uses the full base rate.

/// Per-batch learning-rate schedule. Read [`LinearSchedule::lr`] for
/// the current step, then call [`LinearSchedule::step`] once the
/// optimizer has used it.
#[derive(Debug, Clone)]
pub struct LinearSchedule {
    base_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
    current_step: usize,
}

impl LinearSchedule {
    pub fn new(base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            base_lr,
            warmup_steps,
            total_steps,
            current_step: 0,
        }
    }

    pub fn lr(&self) -> f64 {
        let t = self.current_step as f64;

        if self.current_step < self.warmup_steps {
            return self.base_lr * t / self.warmup_steps.max(1) as f64;
        }

        let remaining = self.total_steps.saturating_sub(self.current_step) as f64;
        let span      = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        self.base_lr * (remaining / span).max(0.0)
    }

    pub fn step(&mut self) {
        self.current_step += 1;
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_no_warmup_starts_at_base() {
        let s = LinearSchedule::new(5e-5, 0, 100);
        assert!(close(s.lr(), 5e-5));
    }

    #[test]
    fn test_decays_to_zero_at_total() {
        let mut s = LinearSchedule::new(1.0, 0, 4);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(s.lr());
            s.step();
        }
        assert!(close(seen[0], 1.0));
        assert!(close(seen[1], 0.75));
        assert!(close(seen[2], 0.5));
        assert!(close(seen[3], 0.25));
        assert!(close(seen[4], 0.0));
        assert_eq!(s.current_step(), 5);
    }

    #[test]
    fn test_warmup_ramps_linearly() {
        let mut s = LinearSchedule::new(1.0, 4, 12);
        assert!(close(s.lr(), 0.0));
        s.step();
        assert!(close(s.lr(), 0.25));
        for _ in 0..3 {
            s.step();
        }
        // Peak at the end of warmup, then linear decay over 8 steps
        assert!(close(s.lr(), 1.0));
        s.step();
        assert!(close(s.lr(), 7.0 / 8.0));
    }

    #[test]
    fn test_never_negative_past_the_end() {
        let mut s = LinearSchedule::new(1.0, 0, 2);
        for _ in 0..10 {
            s.step();
        }
        assert!(close(s.lr(), 0.0));
    }
}
