use glam::Vec3A;
use crate::Scalar;

pub type Vec3 = Vec3A;

#[inline] pub fn vec3(x: Scalar, y: Scalar, z: Scalar) -> Vec3 { Vec3::new(x, y, z) }
