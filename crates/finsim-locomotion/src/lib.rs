//! Per-frame swimming integrator. One call to [`step_frame`] advances the
//! run state by a single frame: guidance is folded into smoothed effort and
//! steering, the tail oscillator advances, joint commands are written into
//! the pose, and the tail-thrust waveform is converted into forward and
//! angular forces applied to the rig transform. Frame N is a pure function
//! of frame N-1's state; the loop is strictly sequential per rig.

mod params;

pub use params::{ConfigError, SwimParams};

use glam::Quat;

use finsim_core::{Scalar, XorShift64};
use finsim_guidance::Guidance;
use finsim_rig::{FishPose, RigTransform};

/// Fin deflection is exchanged between a bone scale and an equivalent fin
/// angle at 0.4 scale units per 30 degrees.
const FIN_SCALE_PER_DEG: Scalar = 0.4 / 30.0;
/// Keeps the frequency division finite at zero effort.
const EFFORT_FLOOR: Scalar = 0.01;

/// Mutable per-run simulation state. Created fresh at the start of each run,
/// advanced in place once per frame, discarded when the run ends. Never
/// shared across rigs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SwimState {
    /// Forward speed in units per frame.
    pub velocity: Scalar,
    /// Smoothed effort; clamped to 1.0 from above each frame.
    pub effort: Scalar,
    /// Tail oscillator phase accumulator, degrees, unbounded.
    pub phase_deg: Scalar,
    /// Current tail cycle length in frames; recomputed from effort.
    pub freq: Scalar,
    /// Current tail swing amplitude, degrees; recomputed from effort.
    pub tail_amplitude_deg: Scalar,
    /// Smoothed steering bias added to the tail swing, degrees.
    pub turn_offset_deg: Scalar,
    /// Smoothed vertical angular force, degrees per frame.
    pub vertical_force_deg: Scalar,
    /// Tail-tip lateral position from the previous frame. `None` until the
    /// first frame completes; derivative terms treat that frame as neutral.
    pub prev_tail_tip_lateral: Option<Scalar>,
    /// Per-run randomized ceilings, fixed at seed time.
    pub run_max_tail_angle_deg: Scalar,
    pub run_max_freq: Scalar,
}

impl SwimState {
    /// Fresh state for one run. The jitter fraction in `params.random` is
    /// applied exactly once here, to the tail-angle and frequency ceilings.
    pub fn seeded(params: &SwimParams, rng: &mut XorShift64) -> Self {
        Self {
            velocity: 0.0,
            effort: 0.0,
            phase_deg: 0.0,
            freq: 0.0,
            tail_amplitude_deg: 0.0,
            turn_offset_deg: 0.0,
            vertical_force_deg: 0.0,
            prev_tail_tip_lateral: None,
            run_max_tail_angle_deg: params.max_tail_angle_deg * rng.jitter(params.random),
            run_max_freq: params.max_freq * rng.jitter(params.random),
        }
    }

    /// False only before the first frame of a run has been stepped.
    pub fn is_running(&self) -> bool { self.prev_tail_tip_lateral.is_some() }
}

/// Forces derived for one frame, already applied to the transform. Returned
/// for recording and for host-side tail re-evaluation.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StepOutput {
    pub forward_force: Scalar,
    pub angular_force_deg: Scalar,
    pub vertical_force_deg: Scalar,
    /// Commanded spine yaw for this frame, radians.
    pub tail_angle_rad: Scalar,
}

/// Advance one frame. Mutates `state`, writes joint commands into `pose`,
/// and integrates `transform` by one explicit Euler step. `pose.tail_tip`
/// must carry the host-evaluated tail-tip position for the current frame;
/// its rig-local X is the lateral sample the fin response differentiates.
///
/// `params` must have passed [`SwimParams::validate`] before the run began.
pub fn step_frame(
    params: &SwimParams,
    state: &mut SwimState,
    guidance: Guidance,
    pose: &mut FishPose,
    transform: &mut RigTransform,
) -> StepOutput {
    let ramp = params.effort_ramp;

    // Effort: first-order low-pass toward the scaled demand. Upper clamp
    // only; a target behind the rig can pull effort below zero.
    state.effort = (params.effort_gain * guidance.required_effort * ramp
        + state.effort * (1.0 - ramp))
        .min(1.0);

    // Effort sets how fast and how wide the tail swings.
    state.freq = state.run_max_freq * (1.0 / (state.effort + EFFORT_FLOOR));
    state.tail_amplitude_deg = state.run_max_tail_angle_deg * state.effort;

    // Steering bias, smoothed with the same ramp.
    state.turn_offset_deg = state.turn_offset_deg * (1.0 - ramp)
        + guidance.horizontal_turn * params.max_steering_angle_deg * ramp;

    // Tail oscillator.
    state.phase_deg += 360.0 / state.freq;
    let turn_offset_rad = state.turn_offset_deg.to_radians();
    let tail_angle = state.phase_deg.to_radians().sin()
        * state.tail_amplitude_deg.to_radians()
        + turn_offset_rad;

    // Joint commands: spine swings the tail, chest counter-rotates and
    // raises through turns, torso leans into the turn.
    pose.spine.rotation = Quat::from_rotation_z(tail_angle);
    let chest_yaw = Quat::from_rotation_z(-tail_angle * params.chest_ratio - turn_offset_rad);
    let chest_raise = Quat::from_rotation_x(-turn_offset_rad.abs() * params.chest_raise);
    pose.chest.rotation = chest_yaw * chest_raise;
    pose.torso.rotation = Quat::from_rotation_y(-turn_offset_rad * params.lean_into_turn);

    // Two-point lateral derivative of the tail tip; neutral on the first
    // frame of a run, where no prior sample exists.
    let lateral = pose.tail_tip.head.x;
    let first_frame = state.prev_tail_tip_lateral.is_none();
    let tail_delta = state.prev_tail_tip_lateral.map_or(0.0, |prev| lateral - prev);
    state.prev_tail_tip_lateral = Some(lateral);

    // Tail fin reacts against the water: pushed toward full deflection at a
    // rate set by the tail speed, pulled back to rest by stiffness.
    let max_tail_scale = params.max_tail_fin_angle_deg * FIN_SCALE_PER_DEG;
    let current_scale = pose.tail_fin.scale.y;
    let scale_target = if tail_delta < 0.0 { 1.0 + max_tail_scale } else { 1.0 - max_tail_scale };
    let scale_incr = (scale_target - current_scale) * params.tail_fin_gain * tail_delta.abs();
    let stiffness_incr = (1.0 - current_scale) * params.tail_fin_stiffness;
    let fin_scale = if first_frame {
        1.0
    } else {
        (current_scale + scale_incr + stiffness_incr)
            .clamp(1.0 - max_tail_scale, 1.0 + max_tail_scale)
    };
    pose.tail_fin.scale.y = fin_scale;
    pose.tail_fin_stub.scale.y = 1.0 - (1.0 - fin_scale) * params.tail_fin_stub_ratio;

    // Side fins: same reactive structure on a rotation angle, mirrored.
    let max_side = params.max_side_fin_angle_deg;
    let current_side_deg = quat_twist_x(pose.side_fin_r.rotation).to_degrees();
    let side_target = if tail_delta < 0.0 { max_side } else { -max_side };
    let side_incr = (side_target - current_side_deg) * params.side_fin_gain * tail_delta.abs();
    let side_stiffness = -current_side_deg * params.side_fin_stiffness;
    let side_deg = if first_frame {
        0.0
    } else {
        (current_side_deg + side_incr + side_stiffness).clamp(-max_side, max_side)
    };
    pose.side_fin_l.rotation = Quat::from_rotation_x(-side_deg.to_radians());
    pose.side_fin_r.rotation = Quat::from_rotation_x(side_deg.to_radians());

    // Thrust: fin speed times the sine of the effective fin angle. A fin
    // pinned at its extreme pushes less.
    let fin_angle_deg = (fin_scale - 1.0) / FIN_SCALE_PER_DEG;
    let thrust_efficiency = fin_angle_deg.to_radians().sin();
    let forward_force = -tail_delta * thrust_efficiency * params.power;

    // Angular force: swish from the tail stroke, rudder from the deflected
    // tail at speed, and a turn-assist bias.
    let mut angular_force_deg = tail_delta / params.angular_drag;
    angular_force_deg += -tail_angle * state.velocity / params.angular_drag;
    angular_force_deg +=
        -(state.turn_offset_deg / params.max_steering_angle_deg) * params.turn_assist;

    state.vertical_force_deg = state.vertical_force_deg * (1.0 - ramp)
        + guidance.vertical_turn * params.max_vertical_angle_deg;

    // Explicit Euler transform step: translate along the current forward
    // direction, then rotate.
    let drag_force = params.drag * state.velocity * state.velocity;
    state.velocity += (forward_force - drag_force) / params.mass;
    let forward = transform.forward();
    transform.position += forward * state.velocity;
    transform.yaw_rad += angular_force_deg.to_radians();
    transform.pitch_rad += state.vertical_force_deg.to_radians();

    StepOutput {
        forward_force,
        angular_force_deg,
        vertical_force_deg: state.vertical_force_deg,
        tail_angle_rad: tail_angle,
    }
}

/// Rotation about local X encoded in a quaternion. Exact for the pure
/// X-axis rotations the integrator writes to the fin bones.
#[inline]
fn quat_twist_x(q: Quat) -> Scalar {
    2.0 * q.x.atan2(q.w)
}
