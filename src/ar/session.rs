// src/ar/session.rs
//! Idle -> Calibrating -> Placing -> Active, and who may send input when.

use bevy::prelude::*;

use super::config::CalibrationConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ArMode {
    /// Menu; AR disabled.
    #[default]
    Idle,
    /// Scanning surfaces; placement input ignored.
    Calibrating,
    /// Scanning continues; placement and zone input accepted.
    Placing,
    /// Game running; placement frozen.
    Active,
}

/// Lives from entering calibration until it completes or is reset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CalibrationSession {
    pub elapsed: f32,
    pub surface_count: usize,
}

#[derive(Debug)]
pub struct ModeMachine {
    mode: ArMode,
    time_in_mode: f32,
    calibration: Option<CalibrationSession>,
    cfg: CalibrationConfig,
}

impl ModeMachine {
    pub fn new(cfg: CalibrationConfig) -> Self {
        Self { mode: ArMode::Idle, time_in_mode: 0.0, calibration: None, cfg }
    }

    pub fn set_config(&mut self, cfg: CalibrationConfig) {
        self.cfg = cfg;
    }

    pub fn mode(&self) -> ArMode {
        self.mode
    }

    pub fn time_in_mode(&self) -> f32 {
        self.time_in_mode
    }

    pub fn calibration(&self) -> Option<&CalibrationSession> {
        self.calibration.as_ref()
    }

    /// Placement / zone input is only processed while placing.
    pub fn accepts_input(&self) -> bool {
        self.mode == ArMode::Placing
    }

    /// Surface scanning runs during calibration and placement.
    pub fn scanning(&self) -> bool {
        matches!(self.mode, ArMode::Calibrating | ArMode::Placing)
    }

    /// Advance timers and sample the usable surface count.
    pub fn tick(&mut self, dt: f32, usable_surfaces: usize) {
        self.time_in_mode += dt;
        if let Some(cal) = self.calibration.as_mut() {
            cal.elapsed += dt;
            cal.surface_count = usable_surfaces;
        }
    }

    /// Enough surfaces, or the grace period ran out.
    pub fn calibration_eligible(&self) -> bool {
        match (self.mode, self.calibration) {
            (ArMode::Calibrating, Some(cal)) => {
                cal.surface_count >= self.cfg.min_surfaces || cal.elapsed > self.cfg.grace_period
            }
            _ => false,
        }
    }

    pub fn start_calibration(&mut self) -> Result<(), TransitionError> {
        self.expect(ArMode::Idle, "start_calibration")?;
        self.calibration = Some(CalibrationSession::default());
        self.enter(ArMode::Calibrating);
        Ok(())
    }

    /// Operator tap once calibration is eligible.
    pub fn confirm_calibration(&mut self) -> Result<(), TransitionError> {
        self.expect(ArMode::Calibrating, "confirm_calibration")?;
        if !self.calibration_eligible() {
            return Err(TransitionError::NotEligible);
        }
        self.calibration = None;
        self.enter(ArMode::Placing);
        Ok(())
    }

    pub fn start_game(&mut self) -> Result<(), TransitionError> {
        self.expect(ArMode::Placing, "start_game")?;
        self.enter(ArMode::Active);
        Ok(())
    }

    /// Back to Idle from anywhere.
    pub fn reset(&mut self) {
        self.calibration = None;
        self.enter(ArMode::Idle);
    }

    fn expect(&self, from: ArMode, command: &'static str) -> Result<(), TransitionError> {
        if self.mode != from {
            return Err(TransitionError::Invalid { from: self.mode, command });
        }
        Ok(())
    }

    fn enter(&mut self, mode: ArMode) {
        info!("Session: {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.time_in_mode = 0.0;
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("'{command}' is not valid in {from:?}")]
    Invalid { from: ArMode, command: &'static str },
    #[error("calibration is not complete yet")]
    NotEligible,
}
