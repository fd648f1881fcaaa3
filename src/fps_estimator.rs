use log::info;

/// Paces a loop to a target rate and reports the real time between ticks.
#[derive(Debug)]
pub struct FpsEstimator {
    iteration_start: std::time::Instant,
    pub iteration_duration: std::time::Duration,
    pace: bool,
}

static NATIVE_SLEEP_ACCURACY: std::time::Duration = std::time::Duration::from_micros(500);

impl FpsEstimator {
    /// A non-positive `fps` disables pacing; `tick` then only measures.
    pub fn new(fps: f64) -> FpsEstimator {
        let pace = fps.is_finite() && fps > 0.0;
        FpsEstimator {
            iteration_start: std::time::Instant::now(),
            iteration_duration: if pace {
                std::time::Duration::from_secs_f64(1.0 / fps)
            } else {
                std::time::Duration::ZERO
            },
            pace,
        }
    }

    fn high_resolution_sleep_until(done: &std::time::Instant) {
        let now = std::time::Instant::now();
        let system_sleep_until = done.checked_sub(NATIVE_SLEEP_ACCURACY).unwrap_or(now);
        if now < system_sleep_until {
            std::thread::sleep(system_sleep_until.duration_since(now));
        }
        while std::time::Instant::now() < *done {
            std::hint::spin_loop();
        }
    }

    /// Waits out the rest of the current frame and returns the time since the
    /// previous tick.
    pub fn tick(&mut self) -> std::time::Duration {
        if self.pace {
            let sleep_until = self.iteration_start + self.iteration_duration;
            FpsEstimator::high_resolution_sleep_until(&sleep_until);
            let now = std::time::Instant::now();
            if now > sleep_until + NATIVE_SLEEP_ACCURACY {
                info!("Over time budget by: {:?}", now - sleep_until);
            }
        }
        let delta_t = self.iteration_start.elapsed();
        self.iteration_start = std::time::Instant::now();
        delta_t
    }
}
