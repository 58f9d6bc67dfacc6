use std::collections::HashMap;

use glam::Quat;
use thiserror::Error;

use finsim_core::{vec3, RigId, Scalar, Vec3};

/// Bone names of the Rigify-style shark armature the simulator drives.
pub mod bone_names {
    pub const SPINE_MASTER: &str = "spine_master";
    pub const CHEST: &str = "chest";
    pub const TORSO: &str = "torso";
    /// Primary tail-fin control; deflection is expressed as Y scale.
    pub const TAIL_FIN: &str = "back_fin_masterBk.001";
    /// Lower tail-fin stub; follows the primary at the stub ratio.
    pub const TAIL_FIN_STUB: &str = "back_fin_masterBk";
    /// Mid-tail deform bone; only its posed position is read.
    pub const TAIL_TIP: &str = "DEF-back_fin.T.001.Bk";
    pub const SIDE_FIN_L: &str = "side_fin.L";
    pub const SIDE_FIN_R: &str = "side_fin.R";
}

/// All bones a rig must carry before a run may start, in resolution order.
pub const REQUIRED_BONES: [&str; 8] = [
    bone_names::SPINE_MASTER,
    bone_names::CHEST,
    bone_names::TORSO,
    bone_names::TAIL_FIN,
    bone_names::TAIL_FIN_STUB,
    bone_names::TAIL_TIP,
    bone_names::SIDE_FIN_L,
    bone_names::SIDE_FIN_R,
];

#[derive(Debug, Error)]
pub enum RigError {
    /// The rig's joint set does not match the expected skeleton topology.
    /// Non-fatal for a batch: skip this rig, simulate the rest.
    #[error("rig '{rig}' has no bone '{bone}'; not a suitable armature")]
    MissingBone { rig: String, bone: &'static str },
}

/// Local pose of one bone as the host stores it: rotation quaternion,
/// scale, and the posed head position in rig space (read-only input,
/// meaningful for the tail-tip bone).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BonePose {
    pub rotation: Quat,
    pub scale: Vec3,
    pub head: Vec3,
}

impl Default for BonePose {
    fn default() -> Self {
        Self { rotation: Quat::IDENTITY, scale: Vec3::ONE, head: Vec3::ZERO }
    }
}

/// Rig world transform. The rig's local forward axis is -Y; yaw rotates
/// about +Z, positive pitch raises the nose.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RigTransform {
    pub position: Vec3,
    pub yaw_rad: Scalar,
    pub pitch_rad: Scalar,
}

impl Default for RigTransform {
    fn default() -> Self {
        Self { position: Vec3::ZERO, yaw_rad: 0.0, pitch_rad: 0.0 }
    }
}

impl RigTransform {
    /// World forward unit vector for the current yaw/pitch.
    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw_rad.sin_cos();
        let (sp, cp) = self.pitch_rad.sin_cos();
        vec3(sy * cp, -cy * cp, sp)
    }
}

/// Snapshot of the driven bones for one simulated frame. Read from the rig
/// before the frame, written back after; the integrator mutates it in place.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct FishPose {
    pub spine: BonePose,
    pub chest: BonePose,
    pub torso: BonePose,
    pub tail_fin: BonePose,
    pub tail_fin_stub: BonePose,
    pub side_fin_l: BonePose,
    pub side_fin_r: BonePose,
    pub tail_tip: BonePose,
}

/// One articulated figure as the host hands it to us: a world transform and
/// a name-keyed bone set. Target association lives with the orchestration
/// layer, not on the rig.
#[derive(Clone, Debug)]
pub struct FishRig {
    pub id: RigId,
    pub name: String,
    pub transform: RigTransform,
    bones: HashMap<String, BonePose>,
}

impl FishRig {
    pub fn new(id: RigId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), transform: RigTransform::default(), bones: HashMap::new() }
    }

    /// A rig carrying every required bone at the rest pose. Test and tool
    /// scaffolding; hosts populate bones from their own armature data.
    pub fn with_default_bones(id: RigId, name: impl Into<String>) -> Self {
        let mut rig = Self::new(id, name);
        for bone in REQUIRED_BONES {
            rig.insert_bone(bone, BonePose::default());
        }
        rig
    }

    pub fn insert_bone(&mut self, name: impl Into<String>, pose: BonePose) {
        self.bones.insert(name.into(), pose);
    }

    pub fn remove_bone(&mut self, name: &str) -> Option<BonePose> {
        self.bones.remove(name)
    }

    pub fn bone(&self, name: &str) -> Option<&BonePose> {
        self.bones.get(name)
    }

    fn lookup(&self, bone: &'static str) -> Result<BonePose, RigError> {
        self.bones
            .get(bone)
            .copied()
            .ok_or(RigError::MissingBone { rig: self.name.clone(), bone })
    }

    /// Resolve the full driven-bone snapshot. Fails with the first missing
    /// bone; callers must not mutate any state before this succeeds.
    pub fn driven_pose(&self) -> Result<FishPose, RigError> {
        Ok(FishPose {
            spine: self.lookup(bone_names::SPINE_MASTER)?,
            chest: self.lookup(bone_names::CHEST)?,
            torso: self.lookup(bone_names::TORSO)?,
            tail_fin: self.lookup(bone_names::TAIL_FIN)?,
            tail_fin_stub: self.lookup(bone_names::TAIL_FIN_STUB)?,
            side_fin_l: self.lookup(bone_names::SIDE_FIN_L)?,
            side_fin_r: self.lookup(bone_names::SIDE_FIN_R)?,
            tail_tip: self.lookup(bone_names::TAIL_TIP)?,
        })
    }

    /// Write a frame's pose back onto the rig's bone set.
    pub fn write_pose(&mut self, pose: &FishPose) {
        self.bones.insert(bone_names::SPINE_MASTER.into(), pose.spine);
        self.bones.insert(bone_names::CHEST.into(), pose.chest);
        self.bones.insert(bone_names::TORSO.into(), pose.torso);
        self.bones.insert(bone_names::TAIL_FIN.into(), pose.tail_fin);
        self.bones.insert(bone_names::TAIL_FIN_STUB.into(), pose.tail_fin_stub);
        self.bones.insert(bone_names::SIDE_FIN_L.into(), pose.side_fin_l);
        self.bones.insert(bone_names::SIDE_FIN_R.into(), pose.side_fin_r);
        self.bones.insert(bone_names::TAIL_TIP.into(), pose.tail_tip);
    }
}
