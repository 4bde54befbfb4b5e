//! Repetition state machine.
//!
//! One oscillator with two drive modes: guided playback advances the angle
//! itself from elapsed time, sensed counting consumes measured joint angles.
//! Both share the bound-exit rule, so a repetition counted while guiding is
//! counted the same way while observing a patient.

use kinetrack_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default angular step per second of elapsed time, in radians.
pub const DEFAULT_ANGULAR_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveMode {
    /// Angle generated by the machine itself
    #[default]
    Guided,
    /// Angle measured from the tracked body
    Sensed,
}

/// One tick's input to the machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveInput {
    /// Seconds elapsed since the previous tick
    Elapsed(f64),
    /// Measured angle in radians
    Sample(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepetitionConfig {
    /// Radians
    pub lower_bound: f64,
    /// Radians
    pub upper_bound: f64,
    /// Full back-and-forth cycles
    pub target_repetitions: u32,
    /// Radians per second before the speed multiplier
    pub angular_step: f64,
    pub speed: f64,
}

impl RepetitionConfig {
    pub fn new(lower_bound: f64, upper_bound: f64, target_repetitions: u32) -> Result<Self> {
        let config = Self {
            lower_bound,
            upper_bound,
            target_repetitions,
            angular_step: DEFAULT_ANGULAR_STEP,
            speed: 1.0,
        };
        config.validate()?;
        Ok(config)
    }

    /// Bounds given in degrees, as exercise prescriptions are written.
    pub fn from_degrees(lower_deg: f64, upper_deg: f64, target_repetitions: u32) -> Result<Self> {
        Self::new(lower_deg.to_radians(), upper_deg.to_radians(), target_repetitions)
    }

    pub fn with_step(mut self, angular_step: f64) -> Self {
        self.angular_step = angular_step;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lower_bound.is_finite()
            || !self.upper_bound.is_finite()
            || self.lower_bound >= self.upper_bound
        {
            return Err(Error::InvalidBounds {
                lower: self.lower_bound,
                upper: self.upper_bound,
            });
        }
        if self.target_repetitions == 0 {
            return Err(Error::InvalidInput(
                "target repetitions must be at least 1".to_string(),
            ));
        }
        if !(self.angular_step.is_finite() && self.angular_step > 0.0) {
            return Err(Error::InvalidInput(format!(
                "angular step must be positive, got {}",
                self.angular_step
            )));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(Error::InvalidInput(format!(
                "speed must be positive, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepetitionPhase {
    InProgress,
    Completed,
}

/// Point-in-time view for reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepetitionSnapshot {
    pub angle: f64,
    pub direction: f64,
    pub half_cycles_remaining: u32,
    pub completed_repetitions: u32,
    pub target_repetitions: u32,
    pub phase: RepetitionPhase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionStateMachine {
    config: RepetitionConfig,
    angle: f64,
    /// +1 toward the upper bound, -1 toward the lower
    direction: f64,
    half_cycles_remaining: u32,
    phase: RepetitionPhase,
}

impl RepetitionStateMachine {
    /// Starts at the lower bound moving toward the upper bound.
    pub fn new(config: RepetitionConfig) -> Self {
        let half_cycles_remaining = config.target_repetitions.saturating_mul(2);
        Self {
            config,
            angle: config.lower_bound,
            direction: 1.0,
            half_cycles_remaining,
            phase: if half_cycles_remaining == 0 {
                RepetitionPhase::Completed
            } else {
                RepetitionPhase::InProgress
            },
        }
    }

    pub fn drive(&mut self, input: DriveInput) -> RepetitionPhase {
        match input {
            DriveInput::Elapsed(secs) => self.advance(secs),
            DriveInput::Sample(angle) => self.observe(angle),
        }
    }

    /// Guided mode: move by `direction * step * speed * elapsed`.
    pub fn advance(&mut self, elapsed_secs: f64) -> RepetitionPhase {
        if self.is_completed() {
            return self.phase;
        }
        if !(elapsed_secs.is_finite() && elapsed_secs >= 0.0) {
            tracing::debug!(elapsed_secs, "ignoring invalid elapsed time");
            return self.phase;
        }
        let delta = self.direction * self.config.angular_step * self.config.speed * elapsed_secs;
        self.settle(self.angle + delta)
    }

    /// Sensed mode: take a measured angle in radians.
    pub fn observe(&mut self, angle: f64) -> RepetitionPhase {
        if self.is_completed() {
            return self.phase;
        }
        if !angle.is_finite() {
            return self.phase;
        }
        self.settle(angle)
    }

    /// A half-cycle ends when the angle leaves the range through the bound
    /// it is heading for. Leaving through the other bound does not count.
    fn settle(&mut self, angle: f64) -> RepetitionPhase {
        self.angle = angle;

        let exited = if self.direction > 0.0 {
            angle > self.config.upper_bound
        } else {
            angle < self.config.lower_bound
        };
        if !exited {
            return self.phase;
        }

        self.direction = -self.direction;
        self.half_cycles_remaining = self.half_cycles_remaining.saturating_sub(1);
        tracing::debug!(
            angle,
            remaining = self.half_cycles_remaining,
            "repetition half-cycle"
        );

        if self.half_cycles_remaining == 0 {
            self.phase = RepetitionPhase::Completed;
            tracing::info!(
                repetitions = self.config.target_repetitions,
                "exercise completed"
            );
        }
        self.phase
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn direction(&self) -> f64 {
        self.direction
    }

    pub fn half_cycles_remaining(&self) -> u32 {
        self.half_cycles_remaining
    }

    pub fn phase(&self) -> RepetitionPhase {
        self.phase
    }

    pub fn is_completed(&self) -> bool {
        self.phase == RepetitionPhase::Completed
    }

    pub fn config(&self) -> &RepetitionConfig {
        &self.config
    }

    pub fn completed_repetitions(&self) -> u32 {
        let total = self.config.target_repetitions.saturating_mul(2);
        (total - self.half_cycles_remaining) / 2
    }

    pub fn snapshot(&self) -> RepetitionSnapshot {
        RepetitionSnapshot {
            angle: self.angle,
            direction: self.direction,
            half_cycles_remaining: self.half_cycles_remaining,
            completed_repetitions: self.completed_repetitions(),
            target_repetitions: self.config.target_repetitions,
            phase: self.phase,
        }
    }

    /// Start over from the lower bound.
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn machine(target: u32) -> RepetitionStateMachine {
        RepetitionStateMachine::new(RepetitionConfig::new(0.0, FRAC_PI_2, target).unwrap())
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(matches!(
            RepetitionConfig::new(1.0, 1.0, 3),
            Err(Error::InvalidBounds { .. })
        ));
        assert!(RepetitionConfig::new(f64::NAN, 1.0, 3).is_err());
        assert!(RepetitionConfig::new(0.0, 1.0, 0).is_err());
        assert!(RepetitionConfig::new(0.0, 1.0, 1)
            .unwrap()
            .with_speed(0.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_degrees_are_converted() {
        let config = RepetitionConfig::from_degrees(0.0, 90.0, 1).unwrap();
        assert!((config.upper_bound - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_guided_advance_scales_with_speed_and_time() {
        let config = RepetitionConfig::new(0.0, FRAC_PI_2, 1)
            .unwrap()
            .with_step(0.2)
            .with_speed(2.0);
        let mut m = RepetitionStateMachine::new(config);
        m.advance(0.5);
        assert!((m.angle() - 0.2).abs() < 1e-12);
        assert_eq!(m.half_cycles_remaining(), 2);
    }

    #[test]
    fn test_guided_oscillation_flips_at_bounds() {
        let config = RepetitionConfig::new(0.0, 1.0, 1).unwrap().with_step(0.3);
        let mut m = RepetitionStateMachine::new(config);

        for _ in 0..4 {
            m.advance(1.0);
        }
        // 1.2 is past the upper bound.
        assert_eq!(m.direction(), -1.0);
        assert_eq!(m.half_cycles_remaining(), 1);

        while !m.is_completed() {
            m.advance(1.0);
        }
        assert!(m.angle() < 0.0);
        assert_eq!(m.completed_repetitions(), 1);
    }

    #[test]
    fn test_sensed_wrong_bound_does_not_count() {
        let mut m = machine(1);
        // Heading up, dipping below the lower bound is ignored.
        m.observe(-0.2);
        assert_eq!(m.half_cycles_remaining(), 2);
        m.observe(FRAC_PI_2 + 0.1);
        assert_eq!(m.half_cycles_remaining(), 1);
        // Heading down now, staying above the upper bound is not a second exit.
        m.observe(FRAC_PI_2 + 0.2);
        assert_eq!(m.half_cycles_remaining(), 1);
        m.observe(-0.1);
        assert!(m.is_completed());
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut m = machine(1);
        m.observe(2.0);
        m.observe(-1.0);
        assert!(m.is_completed());

        let frozen = m.snapshot();
        m.observe(3.0);
        m.advance(10.0);
        assert_eq!(m.snapshot(), frozen);
    }

    #[test]
    fn test_non_finite_inputs_are_ignored() {
        let mut m = machine(1);
        m.drive(DriveInput::Sample(f64::NAN));
        m.drive(DriveInput::Elapsed(f64::INFINITY));
        m.drive(DriveInput::Elapsed(-1.0));
        assert_eq!(m.angle(), 0.0);
        assert_eq!(m.phase(), RepetitionPhase::InProgress);
    }

    #[test]
    fn test_reset() {
        let mut m = machine(1);
        m.observe(2.0);
        m.reset();
        assert_eq!(m.half_cycles_remaining(), 2);
        assert_eq!(m.direction(), 1.0);
    }
}
