pub mod scalar;
pub mod ids;
pub mod types;
pub mod hash;
pub mod rng;

pub use scalar::Scalar;
pub use ids::{RigId, TargetId};
pub use types::{Vec3, vec3};
pub use hash::{StepHasher, hash_vec3, hash_scalar};
pub use rng::XorShift64;
