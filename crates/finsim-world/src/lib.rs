//! Run orchestration: owns the frame loop that feeds guidance into the
//! locomotion integrator and hands each frame's rig transform and bone pose
//! to a keyframe sink. Rigs are simulated independently; one rig's
//! structural failure never aborts the rest of a batch.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use finsim_core::{hash_scalar, hash_vec3, vec3, RigId, Scalar, StepHasher, TargetId, Vec3, XorShift64};
use finsim_guidance::compute_guidance;
use finsim_locomotion::{step_frame, ConfigError, SwimParams, SwimState};
use finsim_rig::{FishPose, FishRig, RigError, RigTransform};

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Structure(#[from] RigError),
}

/// Closed frame range `[start, end)`. Interactive edits coerce the other
/// bound so the span never inverts; deserialization goes through the same
/// coercion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SpanRepr")]
pub struct FrameSpan {
    start: i32,
    end: i32,
}

#[derive(Deserialize)]
struct SpanRepr {
    start: i32,
    end: i32,
}

impl From<SpanRepr> for FrameSpan {
    fn from(r: SpanRepr) -> Self {
        Self::new(r.start, r.end)
    }
}

impl Default for FrameSpan {
    fn default() -> Self { Self { start: 1, end: 250 } }
}

impl FrameSpan {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn start(&self) -> i32 { self.start }
    pub fn end(&self) -> i32 { self.end }

    /// Move the start; a start past the end drags it down to the end.
    pub fn set_start(&mut self, start: i32) {
        self.start = start.min(self.end);
    }

    /// Move the end; an end before the start drags it up to the start.
    pub fn set_end(&mut self, end: i32) {
        self.end = end.max(self.start);
    }

    pub fn frames(&self) -> std::ops::Range<i32> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool { self.start == self.end }
}

/// Per-run settings shared by every rig in a batch.
#[derive(Copy, Clone, Debug)]
pub struct RunConfig {
    pub span: FrameSpan,
    /// Seed for the per-run parameter jitter. Batch runs derive a distinct
    /// per-rig stream from this.
    pub seed: u64,
    /// Initial yaw offset applied once at run start.
    pub start_yaw_deg: Scalar,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { span: FrameSpan::default(), seed: 0x5EED_F15F, start_yaw_deg: 0.0 }
    }
}

/// A steering target in world space, as matched to a rig by the host.
#[derive(Copy, Clone, Debug)]
pub struct TargetPoint {
    pub id: TargetId,
    pub position: Vec3,
}

/// One rig/target pairing to simulate. The association is explicit; the
/// simulator never goes looking through scene objects for it.
#[derive(Clone, Debug)]
pub struct RunUnit {
    pub rig: FishRig,
    pub target: Option<TargetPoint>,
}

/// Receives one sample per simulated frame, in frame order. Hosts record
/// these as keyframes; tests record them for inspection.
pub trait KeyframeSink {
    fn record(&mut self, frame: i32, transform: &RigTransform, pose: &FishPose);
}

/// Discards every sample.
pub struct NullSink;
impl KeyframeSink for NullSink {
    fn record(&mut self, _frame: i32, _transform: &RigTransform, _pose: &FishPose) {}
}

/// One recorded frame of output, flattened for serialization.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub frame: i32,
    pub position: [Scalar; 3],
    pub yaw_rad: Scalar,
    pub pitch_rad: Scalar,
    pub tail_fin_scale: Scalar,
    pub side_fin_rad: Scalar,
}

/// Vec-backed sink with a blake3 digest over everything it saw. Two runs
/// with the same inputs must produce the same digest.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryRecorder {
    pub samples: Vec<TrajectorySample>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self { Self::default() }

    pub fn digest(&self) -> [u8; 32] {
        let mut h = StepHasher::new();
        for s in &self.samples {
            h.update_bytes(&s.frame.to_le_bytes());
            hash_vec3(&mut h, &Vec3::from_array(s.position));
            hash_scalar(&mut h, s.yaw_rad);
            hash_scalar(&mut h, s.pitch_rad);
            hash_scalar(&mut h, s.tail_fin_scale);
            hash_scalar(&mut h, s.side_fin_rad);
        }
        h.finalize()
    }

    pub fn digest_hex(&self) -> String {
        self.digest().iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl KeyframeSink for TrajectoryRecorder {
    fn record(&mut self, frame: i32, transform: &RigTransform, pose: &FishPose) {
        self.samples.push(TrajectorySample {
            frame,
            position: transform.position.to_array(),
            yaw_rad: transform.yaw_rad,
            pitch_rad: transform.pitch_rad,
            tail_fin_scale: pose.tail_fin.scale.y,
            side_fin_rad: 2.0 * pose.side_fin_r.rotation.x.atan2(pose.side_fin_r.rotation.w),
        });
    }
}

/// Supplies the evaluated tail-tip position after a frame's joint commands,
/// standing in for the host's armature evaluation. Hosts that re-evaluate
/// the armature per frame implement this against their own pose data.
pub trait TailTipSource {
    fn evaluate(&mut self, tail_angle_rad: Scalar) -> Vec3;
}

/// Kinematic stand-in: the tail tip swings on a rigid arc behind the rig
/// (forward is -Y, so the tail sits at +Y), lateral deflection along X.
#[derive(Copy, Clone, Debug)]
pub struct KinematicTailTip {
    pub tail_length: Scalar,
}

impl Default for KinematicTailTip {
    fn default() -> Self { Self { tail_length: 1.0 } }
}

impl TailTipSource for KinematicTailTip {
    fn evaluate(&mut self, tail_angle_rad: Scalar) -> Vec3 {
        vec3(
            tail_angle_rad.sin() * self.tail_length,
            tail_angle_rad.cos() * self.tail_length,
            0.0,
        )
    }
}

/// Simulate one rig over the configured span. The driven-bone snapshot is
/// resolved before any state mutation, so a structural mismatch leaves the
/// rig untouched. On success the rig carries the final transform and pose.
pub fn simulate_run(
    params: &SwimParams,
    cfg: &RunConfig,
    unit: &mut RunUnit,
    tail: &mut dyn TailTipSource,
    sink: &mut dyn KeyframeSink,
) -> Result<(), SimError> {
    params.validate()?;
    let mut pose = unit.rig.driven_pose()?;

    let mut rng = XorShift64::new(cfg.seed);
    let mut state = SwimState::seeded(params, &mut rng);
    let mut transform = unit.rig.transform;
    transform.yaw_rad += cfg.start_yaw_deg.to_radians();

    let target = unit.target.map(|t| t.position);
    for frame in cfg.span.frames() {
        let guidance = compute_guidance(transform.forward(), transform.position, target);
        let out = step_frame(params, &mut state, guidance, &mut pose, &mut transform);
        // The host re-evaluates the armature after the joint commands; the
        // next frame differentiates this sample.
        pose.tail_tip.head = tail.evaluate(out.tail_angle_rad);
        sink.record(frame, &transform, &pose);
    }

    unit.rig.transform = transform;
    unit.rig.write_pose(&pose);
    info!(rig = %unit.rig.id, frames = cfg.span.len(), "run complete");
    Ok(())
}

/// Outcome of one rig's run within a batch.
#[derive(Debug)]
pub struct RunReport {
    pub rig: RigId,
    pub result: Result<(), SimError>,
    pub trajectory: TrajectoryRecorder,
}

/// Simulate every rig/target pair independently. Parameters are validated
/// once up front; a structurally mismatched rig is skipped with a warning
/// and the batch continues. Each rig gets its own jitter stream derived
/// from the batch seed and its id, and its own tail-tip source from the
/// supplied factory.
pub fn simulate_all<F, T>(
    params: &SwimParams,
    cfg: &RunConfig,
    units: &mut [RunUnit],
    mut tail_source: F,
) -> Result<Vec<RunReport>, ConfigError>
where
    F: FnMut(&RunUnit) -> T,
    T: TailTipSource,
{
    params.validate()?;

    let mut reports = Vec::with_capacity(units.len());
    for unit in units.iter_mut() {
        let rig_cfg = RunConfig {
            seed: cfg.seed ^ (unit.rig.id.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
            ..*cfg
        };
        let mut recorder = TrajectoryRecorder::new();
        let mut tail = tail_source(unit);
        let result = simulate_run(params, &rig_cfg, unit, &mut tail, &mut recorder);
        if let Err(err) = &result {
            warn!(rig = %unit.rig.id, name = %unit.rig.name, %err, "skipping rig");
        }
        reports.push(RunReport { rig: unit.rig.id, result, trajectory: recorder });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsim_rig::bone_names;

    fn unit_with_target(id: u32, target: Vec3) -> RunUnit {
        RunUnit {
            rig: FishRig::with_default_bones(RigId(id), format!("shark.{id:03}")),
            target: Some(TargetPoint { id: TargetId(id), position: target }),
        }
    }

    #[test] fn span_coercion_keeps_order() {
        let mut span = FrameSpan::new(1, 250);
        span.set_start(400);
        assert_eq!(span.start(), 250);
        span.set_end(100);
        assert_eq!(span.end(), 250);
        let inverted = FrameSpan::new(50, 10);
        assert_eq!(inverted.end(), 50);
        assert!(inverted.is_empty());
    }

    #[test] fn run_records_one_sample_per_frame() {
        let params = SwimParams::default();
        let cfg = RunConfig { span: FrameSpan::new(1, 25), ..Default::default() };
        let mut unit = unit_with_target(0, vec3(0.0, -40.0, 0.0));
        let mut rec = TrajectoryRecorder::new();
        let mut tail = KinematicTailTip::default();
        simulate_run(&params, &cfg, &mut unit, &mut tail, &mut rec).unwrap();
        assert_eq!(rec.samples.len(), 24);
        assert_eq!(rec.samples[0].frame, 1);
        assert_eq!(rec.samples.last().unwrap().frame, 24);
    }

    #[test] fn rig_closes_on_target_ahead() {
        let params = SwimParams { random: 0.0, ..Default::default() };
        let cfg = RunConfig { span: FrameSpan::new(1, 250), ..Default::default() };
        let target = vec3(0.0, -100.0, 0.0);
        let mut unit = unit_with_target(0, target);
        let start = unit.rig.transform.position;
        let mut tail = KinematicTailTip::default();
        simulate_run(&params, &cfg, &mut unit, &mut tail, &mut NullSink).unwrap();
        let before = (target - start).length();
        let after = (target - unit.rig.transform.position).length();
        assert!(after < before - 5.0, "no progress: {before} -> {after}");
    }

    #[test] fn rig_turns_toward_starboard_target() {
        let params = SwimParams { random: 0.0, ..Default::default() };
        let cfg = RunConfig { span: FrameSpan::new(1, 150), ..Default::default() };
        let target = vec3(-50.0, 0.0, 0.0);
        let mut unit = unit_with_target(0, target);
        let mut tail = KinematicTailTip::default();
        simulate_run(&params, &cfg, &mut unit, &mut tail, &mut NullSink).unwrap();
        let t = &unit.rig.transform;
        // Starboard is -X for a -Y-facing rig, reached through negative yaw.
        assert!(t.yaw_rad < -0.3, "did not turn: yaw {}", t.yaw_rad);
        let to_target = (target - t.position).normalize();
        assert!(t.forward().dot(to_target) > 0.5, "not facing target");
    }

    #[test] fn no_target_swims_straight_ahead() {
        let params = SwimParams { random: 0.0, ..Default::default() };
        let cfg = RunConfig { span: FrameSpan::new(1, 100), ..Default::default() };
        let mut unit = RunUnit {
            rig: FishRig::with_default_bones(RigId(9), "loner"),
            target: None,
        };
        let mut tail = KinematicTailTip::default();
        simulate_run(&params, &cfg, &mut unit, &mut tail, &mut NullSink).unwrap();
        let t = &unit.rig.transform;
        assert!(t.position.y < -1.0, "did not move forward");
        assert!(t.position.x.abs() < t.position.y.abs() * 0.2);
    }

    #[test] fn start_yaw_offsets_initial_heading() {
        let params = SwimParams { random: 0.0, ..Default::default() };
        let cfg = RunConfig {
            span: FrameSpan::new(1, 50),
            start_yaw_deg: 90.0,
            ..Default::default()
        };
        // No target: the rig holds whatever heading it started with.
        let mut unit = RunUnit {
            rig: FishRig::with_default_bones(RigId(3), "angled"),
            target: None,
        };
        let mut tail = KinematicTailTip::default();
        simulate_run(&params, &cfg, &mut unit, &mut tail, &mut NullSink).unwrap();
        // Yaw +90 deg points the -Y forward axis at +X.
        assert!(unit.rig.transform.position.x > 0.5);
    }

    #[test] fn identical_runs_share_a_digest() {
        let params = SwimParams::default(); // jitter active; same seed, same stream
        let cfg = RunConfig { span: FrameSpan::new(1, 80), ..Default::default() };
        let digest_of = || {
            let mut unit = unit_with_target(0, vec3(-10.0, -60.0, 3.0));
            let mut rec = TrajectoryRecorder::new();
            let mut tail = KinematicTailTip::default();
            simulate_run(&params, &cfg, &mut unit, &mut tail, &mut rec).unwrap();
            rec.digest()
        };
        assert_eq!(digest_of(), digest_of());
    }

    #[test] fn different_seeds_diverge_with_jitter() {
        let params = SwimParams::default();
        let mut digests = Vec::new();
        for seed in [1u64, 2u64] {
            let cfg = RunConfig { span: FrameSpan::new(1, 80), seed, ..Default::default() };
            let mut unit = unit_with_target(0, vec3(0.0, -60.0, 0.0));
            let mut rec = TrajectoryRecorder::new();
            let mut tail = KinematicTailTip::default();
            simulate_run(&params, &cfg, &mut unit, &mut tail, &mut rec).unwrap();
            digests.push(rec.digest());
        }
        assert_ne!(digests[0], digests[1]);
    }

    #[test] fn invalid_config_fails_before_any_frames() {
        let params = SwimParams { angular_drag: 0.0, ..Default::default() };
        let cfg = RunConfig::default();
        let mut unit = unit_with_target(0, vec3(0.0, -10.0, 0.0));
        let mut rec = TrajectoryRecorder::new();
        let mut tail = KinematicTailTip::default();
        let err = simulate_run(&params, &cfg, &mut unit, &mut tail, &mut rec);
        assert!(matches!(err, Err(SimError::Config(_))));
        assert!(rec.samples.is_empty());
    }

    #[test] fn structural_mismatch_leaves_rig_untouched() {
        let params = SwimParams::default();
        let cfg = RunConfig::default();
        let mut unit = unit_with_target(0, vec3(0.0, -10.0, 0.0));
        unit.rig.remove_bone(bone_names::TORSO);
        let before = unit.rig.transform;
        let mut rec = TrajectoryRecorder::new();
        let mut tail = KinematicTailTip::default();
        let err = simulate_run(&params, &cfg, &mut unit, &mut tail, &mut rec);
        assert!(matches!(err, Err(SimError::Structure(RigError::MissingBone { .. }))));
        assert!(rec.samples.is_empty());
        assert_eq!(unit.rig.transform, before);
    }

    #[test] fn batch_skips_bad_rig_and_finishes_the_rest() {
        let params = SwimParams::default();
        let cfg = RunConfig { span: FrameSpan::new(1, 30), ..Default::default() };
        let mut units = vec![
            unit_with_target(0, vec3(0.0, -20.0, 0.0)),
            unit_with_target(1, vec3(5.0, -20.0, 0.0)),
            unit_with_target(2, vec3(-5.0, -20.0, 0.0)),
        ];
        units[1].rig.remove_bone(bone_names::SIDE_FIN_L);
        let reports =
            simulate_all(&params, &cfg, &mut units, |_| KinematicTailTip::default()).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports[0].result.is_ok());
        assert!(reports[1].result.is_err());
        assert!(reports[2].result.is_ok());
        assert_eq!(reports[0].trajectory.samples.len(), 29);
        assert!(reports[1].trajectory.samples.is_empty());
    }

    #[test] fn batch_rigs_get_distinct_jitter_streams() {
        let params = SwimParams::default();
        let cfg = RunConfig { span: FrameSpan::new(1, 60), ..Default::default() };
        let mut units = vec![
            unit_with_target(0, vec3(0.0, -40.0, 0.0)),
            unit_with_target(1, vec3(0.0, -40.0, 0.0)),
        ];
        let reports =
            simulate_all(&params, &cfg, &mut units, |_| KinematicTailTip::default()).unwrap();
        assert_ne!(reports[0].trajectory.digest(), reports[1].trajectory.digest());
    }

    #[test] fn batch_uses_the_supplied_tail_source() {
        // Kill jitter so only the injected tail geometry can separate the
        // two otherwise-identical rigs.
        let params = SwimParams { random: 0.0, ..Default::default() };
        let cfg = RunConfig { span: FrameSpan::new(1, 60), ..Default::default() };
        let mut units = vec![
            unit_with_target(0, vec3(0.0, -40.0, 0.0)),
            unit_with_target(1, vec3(0.0, -40.0, 0.0)),
        ];
        let reports = simulate_all(&params, &cfg, &mut units, |unit| KinematicTailTip {
            tail_length: 1.0 + unit.rig.id.0 as Scalar,
        })
        .unwrap();
        assert_ne!(reports[0].trajectory.digest(), reports[1].trajectory.digest());
    }

    #[test] fn deserialized_span_is_coerced() {
        let span: FrameSpan = serde_json::from_str(r#"{"start":50,"end":10}"#).unwrap();
        assert_eq!(span.start(), 50);
        assert_eq!(span.end(), 50);
        assert!(span.is_empty());
        assert_eq!(span.len(), 0);
    }
}
