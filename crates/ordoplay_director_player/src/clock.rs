// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-timestep frame clock.
//!
//! Host time is scaled and accumulated; each whole timestep becomes one
//! engine frame. A host frame never produces more than `max_steps` engine
//! frames, and leftover time is dropped when that cap is hit.

/// Fixed-timestep clock
#[derive(Debug, Clone)]
pub struct FrameClock {
    fixed_timestep: f64,
    time_scale: f32,
    max_steps: u32,
    accumulated_time: f64,
    /// Engine frames produced so far
    pub frame_count: u64,
    /// Simulation seconds elapsed
    pub elapsed_time: f64,
}

impl FrameClock {
    pub fn new(fixed_timestep: f64, time_scale: f32, max_steps: u32) -> Self {
        let mut clock = Self {
            fixed_timestep,
            time_scale: 1.0,
            max_steps: max_steps.max(1),
            accumulated_time: 0.0,
            frame_count: 0,
            elapsed_time: 0.0,
        };
        clock.set_time_scale(time_scale);
        clock
    }

    /// Feed host time; returns how many engine frames to run
    pub fn advance(&mut self, delta_time: f64) -> u32 {
        self.accumulated_time += delta_time * f64::from(self.time_scale);

        let mut steps = 0;
        while self.accumulated_time >= self.fixed_timestep {
            self.accumulated_time -= self.fixed_timestep;
            steps += 1;

            if steps >= self.max_steps {
                self.accumulated_time = 0.0;
                break;
            }
        }

        self.frame_count += u64::from(steps);
        self.elapsed_time += f64::from(steps) * self.fixed_timestep;
        steps
    }

    /// Simulation seconds per engine frame
    pub fn sim_delta(&self) -> f32 {
        self.fixed_timestep as f32
    }

    /// Host seconds per engine frame at the current time scale
    pub fn real_delta(&self) -> f32 {
        (self.fixed_timestep / f64::from(self.time_scale)) as f32
    }

    /// Host seconds that produce one engine frame
    pub fn host_step(&self) -> f64 {
        self.fixed_timestep / f64::from(self.time_scale)
    }

    /// Set time scale (clamped to a sane range)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.clamp(0.01, 10.0);
    }
}
