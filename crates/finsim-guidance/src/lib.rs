use glam::Vec2;

use finsim_core::{Scalar, Vec3};

/// Horizontal turn intent saturates at this angle to the target.
const HORIZONTAL_SATURATION_DEG: Scalar = 90.0;
/// Vertical turn intent saturates much earlier; climbs are gentle.
const VERTICAL_SATURATION_DEG: Scalar = 20.0;
/// Stand-in target distance when no target object is supplied: dead ahead,
/// so the rig swims forward with no steering correction.
pub const DEFAULT_TARGET_DISTANCE: Scalar = 10.0;

/// Per-frame steering demand. `horizontal_turn`/`vertical_turn` are in
/// [-1, 1]; positive means turn to starboard / pitch up. `required_effort`
/// is the unbounded dot of the target offset with the forward axis.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Guidance {
    pub required_effort: Scalar,
    pub horizontal_turn: Scalar,
    pub vertical_turn: Scalar,
}

/// Compute effort and turn intents from the rig's forward unit vector, its
/// position, and an optional target point. Pure; stable when the target
/// coincides with the rig (both intents 0, no NaN).
pub fn compute_guidance(forward: Vec3, position: Vec3, target: Option<Vec3>) -> Guidance {
    let to_target = match target {
        Some(t) => t - position,
        None => forward * DEFAULT_TARGET_DISTANCE,
    };

    let required_effort = to_target.dot(forward);

    // Horizontal plane: positive angle = target to starboard.
    let fwd_h = Vec2::new(forward.x, forward.y);
    let tgt_h = Vec2::new(to_target.x, to_target.y);
    let h_deg = signed_angle_deg(fwd_h, tgt_h, AngleSign::Starboard);
    let horizontal_turn = (h_deg / HORIZONTAL_SATURATION_DEG).clamp(-1.0, 1.0);

    // Vertical plane: horizontal distance vs. height, positive = target above.
    let fwd_v = Vec2::new(fwd_h.length(), forward.z);
    let tgt_v = Vec2::new(tgt_h.length(), to_target.z);
    let v_deg = signed_angle_deg(fwd_v, tgt_v, AngleSign::Ccw);
    let vertical_turn = (v_deg / VERTICAL_SATURATION_DEG).clamp(-1.0, 1.0);

    Guidance { required_effort, horizontal_turn, vertical_turn }
}

#[derive(Copy, Clone)]
enum AngleSign { Ccw, Starboard }

/// Signed angle in degrees from `a` to `b`, in -180..180. The angle of a
/// zero-length vector is undefined; define it as 0 so a target sitting on
/// the rig produces no turn demand.
fn signed_angle_deg(a: Vec2, b: Vec2, sign: AngleSign) -> Scalar {
    if a.length_squared() <= Scalar::EPSILON || b.length_squared() <= Scalar::EPSILON {
        return 0.0;
    }
    let cross = a.x * b.y - a.y * b.x;
    let dot = a.dot(b);
    let rad = match sign {
        AngleSign::Ccw => cross.atan2(dot),
        AngleSign::Starboard => (-cross).atan2(dot),
    };
    rad.to_degrees()
}
