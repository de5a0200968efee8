use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSample {
    pub screen_x: f64,
    pub at: Instant,
}

/// Bounded history of drag positions used to derive a release velocity.
#[derive(Debug, Clone)]
pub struct MomentumSampler {
    samples: VecDeque<DragSample>,
    capacity: usize,
    window: Duration,
}

impl MomentumSampler {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(2),
            window,
        }
    }

    pub fn record(&mut self, sample: DragSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Release velocity in world units per second, negated so that flicking the
    /// content left moves the view right.
    ///
    /// Only samples younger than the trailing window count. Fewer than two of
    /// them, or no elapsed time between them, yields zero.
    pub fn estimate_velocity(&self, now: Instant, units_per_pixel: f64) -> f64 {
        let recent: Vec<&DragSample> = self
            .samples
            .iter()
            .filter(|s| now.saturating_duration_since(s.at) < self.window)
            .collect();
        if recent.len() < 2 {
            return 0.0;
        }

        let mut distance = 0.0;
        let mut elapsed = 0.0;
        for pair in recent.windows(2) {
            let dt = pair[1].at.saturating_duration_since(pair[0].at).as_secs_f64();
            if dt > 0.0 {
                distance += pair[1].screen_x - pair[0].screen_x;
                elapsed += dt;
            }
        }
        if elapsed <= 0.0 {
            return 0.0;
        }

        -(distance / elapsed) * units_per_pixel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, base: Instant, ms: u64) -> DragSample {
        DragSample {
            screen_x: x,
            at: base + Duration::from_millis(ms),
        }
    }

    #[test]
    fn fewer_than_two_recent_samples_yield_zero() {
        let base = Instant::now();
        let mut sampler = MomentumSampler::new(10, Duration::from_millis(100));
        assert_eq!(sampler.estimate_velocity(base, 1.0), 0.0);

        sampler.record(sample(0.0, base, 0));
        sampler.record(sample(50.0, base, 10));
        sampler.record(sample(120.0, base, 150));
        // Only the last sample falls inside the window ending at 160ms.
        assert_eq!(
            sampler.estimate_velocity(base + Duration::from_millis(160), 1.0),
            0.0
        );
    }

    #[test]
    fn simultaneous_samples_do_not_divide_by_zero() {
        let base = Instant::now();
        let mut sampler = MomentumSampler::new(10, Duration::from_millis(100));
        sampler.record(sample(0.0, base, 5));
        sampler.record(sample(40.0, base, 5));
        assert_eq!(
            sampler.estimate_velocity(base + Duration::from_millis(10), 1.0),
            0.0
        );
    }

    #[test]
    fn rightward_flick_produces_negative_velocity() {
        let base = Instant::now();
        let mut sampler = MomentumSampler::new(10, Duration::from_millis(100));
        for i in 0..5u64 {
            sampler.record(sample(i as f64 * 10.0, base, i * 10));
        }
        // 40px over 40ms = 1000 px/s.
        let v = sampler.estimate_velocity(base + Duration::from_millis(45), 0.01);
        assert!((v + 10.0).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn buffer_is_bounded() {
        let base = Instant::now();
        let mut sampler = MomentumSampler::new(10, Duration::from_millis(100));
        for i in 0..25u64 {
            sampler.record(sample(i as f64, base, i));
        }
        assert_eq!(sampler.len(), 10);
    }
}
