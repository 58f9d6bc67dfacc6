use serde::{Deserialize, Serialize};
use thiserror::Error;

use finsim_core::Scalar;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be greater than zero (got {value})")]
    NotPositive { name: &'static str, value: Scalar },
    #[error("{name} must be within {min}..={max} (got {value})")]
    OutOfRange { name: &'static str, value: Scalar, min: Scalar, max: Scalar },
}

/// Tunable swim parameters, immutable for the duration of a run. Angles in
/// degrees, frequency in frames per tail cycle. Defaults match a medium
/// shark rig.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwimParams {
    /// Total mass resisting thrust.
    pub mass: Scalar,
    /// Quadratic drag coefficient on forward velocity.
    pub drag: Scalar,
    /// Forward force per unit of tail-fin speed at full fin angle.
    pub power: Scalar,
    /// Tail cycle length in frames at minimum effort.
    pub max_freq: Scalar,
    /// Effort demanded per unit of distance-to-target along the forward axis.
    pub effort_gain: Scalar,
    /// First-order smoothing factor for effort and steering (0..=0.6).
    pub effort_ramp: Scalar,
    /// Resistance to changing direction.
    pub angular_drag: Scalar,
    /// Extra steering authority on top of the rudder effect (0..=10).
    pub turn_assist: Scalar,
    pub max_tail_angle_deg: Scalar,
    pub max_steering_angle_deg: Scalar,
    pub max_vertical_angle_deg: Scalar,
    pub max_tail_fin_angle_deg: Scalar,
    /// Tail fin speed of response to tail movement.
    pub tail_fin_gain: Scalar,
    /// Pull of the tail fin back to its rest scale (0..=1).
    pub tail_fin_stiffness: Scalar,
    /// Deflection ratio of the lower tail stub to the primary fin.
    pub tail_fin_stub_ratio: Scalar,
    pub max_side_fin_angle_deg: Scalar,
    pub side_fin_gain: Scalar,
    pub side_fin_stiffness: Scalar,
    /// Counter-rotation of the chest against the tail swing.
    pub chest_ratio: Scalar,
    /// Chest raise while turning.
    pub chest_raise: Scalar,
    /// Torso roll into the turn.
    pub lean_into_turn: Scalar,
    /// Per-run jitter fraction applied once to max frequency and tail angle.
    pub random: Scalar,
}

impl Default for SwimParams {
    fn default() -> Self {
        Self {
            mass: 30.0,
            drag: 8.0,
            power: 20.0,
            max_freq: 30.0,
            effort_gain: 0.5,
            effort_ramp: 0.2,
            angular_drag: 1.0,
            turn_assist: 3.0,
            max_tail_angle_deg: 15.0,
            max_steering_angle_deg: 15.0,
            max_vertical_angle_deg: 0.1,
            max_tail_fin_angle_deg: 15.0,
            tail_fin_gain: 5.0,
            tail_fin_stiffness: 0.2,
            tail_fin_stub_ratio: 0.3,
            max_side_fin_angle_deg: 15.0,
            side_fin_gain: 2.0,
            side_fin_stiffness: 0.2,
            chest_ratio: 0.5,
            chest_raise: 1.0,
            lean_into_turn: 1.0,
            random: 0.25,
        }
    }
}

impl SwimParams {
    /// Reject parameter sets that would divide by zero or break a clamp
    /// range inside the integrator. Called once, before a run starts;
    /// the integrator itself assumes a valid set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &'static str, value: Scalar) -> Result<(), ConfigError> {
            if value > 0.0 { Ok(()) } else { Err(ConfigError::NotPositive { name, value }) }
        }
        fn in_range(name: &'static str, value: Scalar, min: Scalar, max: Scalar) -> Result<(), ConfigError> {
            if (min..=max).contains(&value) { Ok(()) } else {
                Err(ConfigError::OutOfRange { name, value, min, max })
            }
        }

        positive("mass", self.mass)?;
        positive("max_freq", self.max_freq)?;
        positive("angular_drag", self.angular_drag)?;
        positive("max_steering_angle_deg", self.max_steering_angle_deg)?;
        in_range("drag", self.drag, 0.0, 3000.0)?;
        in_range("power", self.power, 0.0, Scalar::INFINITY)?;
        in_range("effort_gain", self.effort_gain, 0.0, Scalar::INFINITY)?;
        in_range("effort_ramp", self.effort_ramp, 0.0, 0.6)?;
        in_range("turn_assist", self.turn_assist, 0.0, 10.0)?;
        in_range("max_tail_angle_deg", self.max_tail_angle_deg, 0.0, 30.0)?;
        in_range("max_steering_angle_deg", self.max_steering_angle_deg, 0.0, 40.0)?;
        in_range("max_vertical_angle_deg", self.max_vertical_angle_deg, 0.0, 40.0)?;
        in_range("max_tail_fin_angle_deg", self.max_tail_fin_angle_deg, 0.0, 30.0)?;
        in_range("tail_fin_gain", self.tail_fin_gain, 0.0, 25.0)?;
        in_range("tail_fin_stiffness", self.tail_fin_stiffness, 0.0, 1.0)?;
        in_range("tail_fin_stub_ratio", self.tail_fin_stub_ratio, 0.0, 3.0)?;
        in_range("max_side_fin_angle_deg", self.max_side_fin_angle_deg, 0.0, 60.0)?;
        in_range("side_fin_gain", self.side_fin_gain, 0.0, 100.0)?;
        in_range("side_fin_stiffness", self.side_fin_stiffness, 0.0, 10.0)?;
        in_range("chest_ratio", self.chest_ratio, 0.0, 2.0)?;
        in_range("chest_raise", self.chest_raise, 0.0, 20.0)?;
        in_range("lean_into_turn", self.lean_into_turn, 0.0, 20.0)?;
        in_range("random", self.random, 0.0, 1.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test] fn defaults_validate() {
        assert_eq!(SwimParams::default().validate(), Ok(()));
    }

    #[test] fn zero_angular_drag_rejected() {
        let p = SwimParams { angular_drag: 0.0, ..Default::default() };
        assert!(matches!(p.validate(), Err(ConfigError::NotPositive { name: "angular_drag", .. })));
    }

    #[test] fn zero_steering_angle_rejected() {
        let p = SwimParams { max_steering_angle_deg: 0.0, ..Default::default() };
        assert!(p.validate().is_err());
    }

    #[test] fn effort_ramp_over_limit_rejected() {
        let p = SwimParams { effort_ramp: 0.7, ..Default::default() };
        assert!(matches!(p.validate(), Err(ConfigError::OutOfRange { name: "effort_ramp", .. })));
    }

    #[test] fn jitter_fraction_bounded() {
        let p = SwimParams { random: 1.5, ..Default::default() };
        assert!(p.validate().is_err());
    }

    #[test] fn json_round_trip_with_partial_fields() {
        let p: SwimParams = serde_json::from_str(r#"{"mass": 45.0, "turn_assist": 5.0}"#).unwrap();
        assert_eq!(p.mass, 45.0);
        assert_eq!(p.turn_assist, 5.0);
        assert_eq!(p.drag, SwimParams::default().drag);
    }
}
