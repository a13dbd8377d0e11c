use log::warn;
use std::time::Duration;

/// Turns variable frame times into a whole number of fixed collision steps.
pub struct TimeAccumulator {
    accumulated_time: Duration,
    frame_number: u64,
    num_steps: u32,
    max_steps: u32,
    update_rate: Duration,
    time_dilation: f64,
}

impl TimeAccumulator {
    pub fn new(step_secs: f32) -> Self {
        TimeAccumulator {
            accumulated_time: Duration::from_nanos(0),
            frame_number: 0,
            num_steps: 0,
            max_steps: 4,
            update_rate: Duration::from_secs_f32(step_secs),
            time_dilation: 1.0,
        }
    }

    pub fn update(&mut self, delta: Duration) {
        self.frame_number += 1;
        self.accumulated_time += delta.mul_f64(self.time_dilation);
        self.num_steps = (self.accumulated_time.as_nanos() / self.update_rate.as_nanos()) as u32;
        if self.num_steps > self.max_steps {
            warn!(
                "capping collision steps {} on frame {} from time {} accumulated {} at rate {}",
                self.num_steps,
                self.frame_number,
                delta.as_secs_f64(),
                self.accumulated_time.as_secs_f64(),
                self.update_rate.as_secs_f64(),
            );
            self.accumulated_time = Duration::from_nanos(0);
            self.num_steps = self.max_steps;
        } else {
            self.accumulated_time -= self.update_rate * self.num_steps;
        }
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn num_steps(&self) -> u32 {
        self.num_steps
    }

    pub fn time_dilation(&self) -> f64 {
        self.time_dilation
    }

    pub fn set_time_dilation(&mut self, time_dilation: f64) {
        self.time_dilation = time_dilation;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fixed_steps() {
        let mut accum = TimeAccumulator::new(0.5);
        let frame = Duration::from_millis(300);

        accum.update(frame);
        assert_eq!(accum.num_steps(), 0);
        accum.update(frame);
        assert_eq!(accum.num_steps(), 1);
        accum.update(frame);
        assert_eq!(accum.num_steps(), 0);

        accum.set_time_dilation(2.0);
        accum.update(frame);
        assert_eq!(accum.num_steps(), 2);
    }

    #[test]
    fn test_long_frame_is_capped() {
        let mut accum = TimeAccumulator::new(0.5);
        accum.update(Duration::from_secs(5));
        assert_eq!(accum.num_steps(), 4);

        // the backlog is dropped rather than carried over
        accum.update(Duration::from_millis(100));
        assert_eq!(accum.num_steps(), 0);
        assert_eq!(accum.frame_number(), 2);
    }
}
